use axum::Router;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

use crate::handlers::{
    generate_chunk_handler, generate_stream_handler, health_handler, load_assets_handler,
    retrieve_audio_candidates, retrieve_image_candidates,
};
use crate::server::AppState;

/// Assemble the gateway routes over the given application state.
#[must_use]
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/asset/load_assets", post(load_assets_handler))
        .route(
            "/api/asset/retrieve_image_candidates",
            post(retrieve_image_candidates),
        )
        .route(
            "/api/asset/retrieve_audio_candidates",
            post(retrieve_audio_candidates),
        )
        .route("/api/story/generate_stream", post(generate_stream_handler))
        .route("/api/story/generate_chunk", post(generate_chunk_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
