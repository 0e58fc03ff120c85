use std::convert::Infallible;

use axum::Json;
use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use futures::StreamExt;

use genvn_assets::SearchOptions;
use genvn_llm::ChatOptions;
use genvn_story::{StoryEvent, StoryRequest};

use crate::error::ApiError;
use crate::server::AppState;

#[derive(serde::Deserialize)]
pub(crate) struct LoadAssetsParams {
    /// Overrides the configured captioning default for this run.
    pub infer_metadata: Option<bool>,
}

/// Incoming asset search request (`api_schemas` shape of the frontend).
#[derive(serde::Deserialize)]
pub(crate) struct AssetRequest {
    pub asset_type: String,
    #[serde(default)]
    #[allow(dead_code, reason = "accepted for wire compatibility, not used yet")]
    pub asset_category: Option<String>,
    pub query: String,
}

#[derive(serde::Deserialize)]
pub(crate) struct SearchParams {
    pub k: Option<usize>,
    /// Query-time search breadth (HNSW ef).
    pub efs: Option<u64>,
    pub rewrite: Option<bool>,
}

#[derive(serde::Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    uptime_secs: u64,
}

pub(crate) async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.started_at.elapsed().as_secs(),
    })
}

pub(crate) async fn load_assets_handler(
    State(state): State<AppState>,
    Query(params): Query<LoadAssetsParams>,
) -> Result<impl IntoResponse, ApiError> {
    let infer_metadata = params.infer_metadata.unwrap_or(state.infer_metadata);
    let report = state.indexer.load_assets(infer_metadata).await?;
    Ok(Json(report))
}

pub(crate) async fn retrieve_image_candidates(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
    Json(request): Json<AssetRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if request.asset_type != "image" {
        return Err(ApiError::validation(format!(
            "asset_type must be \"image\", got \"{}\"",
            request.asset_type
        )));
    }
    if request.query.trim().is_empty() {
        return Err(ApiError::validation("query must not be empty"));
    }

    let options = SearchOptions {
        rewrite: params.rewrite.unwrap_or(state.search_defaults.rewrite),
        k: params.k.unwrap_or(state.search_defaults.k),
        search_breadth: params.efs.unwrap_or(state.search_defaults.search_breadth),
    };
    let matches = state.searcher.search(&request.query, options).await?;
    Ok(Json(serde_json::json!({ "image_assets": matches })))
}

pub(crate) async fn retrieve_audio_candidates(
    State(_state): State<AppState>,
) -> Result<Response, ApiError> {
    Err(ApiError::not_implemented(
        "audio candidate retrieval is not implemented",
    ))
}

pub(crate) async fn generate_chunk_handler(
    State(state): State<AppState>,
    Json(request): Json<StoryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let reply = state
        .story
        .generate_chunk(&request, &ChatOptions::new())
        .await?;
    Ok(Json(serde_json::json!({
        "text": reply.text,
        "is_final": true,
    })))
}

/// Streams generation as NDJSON chunks `{"text", "is_final"}`.
///
/// A mid-stream failure emits a terminal `{"error", "is_final": true}` chunk
/// so consumers can distinguish truncation from completion.
pub(crate) async fn generate_stream_handler(
    State(state): State<AppState>,
    Json(request): Json<StoryRequest>,
) -> Result<Response, ApiError> {
    let events = state
        .story
        .generate_stream(&request, &ChatOptions::new())
        .await?;

    let body = events.map(|event| {
        let line = match event {
            Ok(StoryEvent::Delta(text)) => {
                serde_json::json!({ "text": text, "is_final": false })
            }
            Ok(StoryEvent::Done) => serde_json::json!({ "text": "", "is_final": true }),
            Err(e) => {
                tracing::warn!(error = %e, "generation stream failed");
                serde_json::json!({ "text": "", "is_final": true, "error": e.to_string() })
            }
        };
        Ok::<_, Infallible>(line.to_string() + "\n")
    });

    Response::builder()
        .header(header::CONTENT_TYPE, "application/x-ndjson")
        .body(Body::from_stream(body))
        .map_err(|e| ApiError {
            status: axum::http::StatusCode::INTERNAL_SERVER_ERROR,
            message: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn asset_request_deserializes() {
        let raw = r#"{"asset_type":"image","asset_category":"bg","query":"messy red kitchen"}"#;
        let request: AssetRequest = serde_json::from_str(raw).unwrap();
        assert_eq!(request.asset_type, "image");
        assert_eq!(request.asset_category.as_deref(), Some("bg"));
        assert_eq!(request.query, "messy red kitchen");
    }

    #[test]
    fn asset_request_category_optional() {
        let request: AssetRequest =
            serde_json::from_str(r#"{"asset_type":"image","query":"q"}"#).unwrap();
        assert!(request.asset_category.is_none());
    }

    #[test]
    fn health_response_shape() {
        let json = serde_json::to_value(HealthResponse {
            status: "ok",
            version: "0.1.0",
            uptime_secs: 7,
        })
        .unwrap();
        assert_eq!(json.get("status").unwrap(), "ok");
        assert_eq!(json.get("uptime_secs").unwrap(), 7);
    }
}
