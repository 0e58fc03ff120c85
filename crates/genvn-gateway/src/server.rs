use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::watch;

use genvn_assets::{AssetIndexer, AssetSearcher, SearchOptions};
use genvn_story::StoryEngine;

use crate::error::GatewayError;
use crate::router::build_router;

#[derive(Clone)]
pub struct AppState {
    pub indexer: Arc<AssetIndexer>,
    pub searcher: Arc<AssetSearcher>,
    pub story: Arc<StoryEngine>,
    /// Configured captioning default for `load_assets`.
    pub infer_metadata: bool,
    pub search_defaults: SearchOptions,
    pub started_at: Instant,
}

impl AppState {
    #[must_use]
    pub fn new(
        indexer: Arc<AssetIndexer>,
        searcher: Arc<AssetSearcher>,
        story: Arc<StoryEngine>,
        infer_metadata: bool,
        search_defaults: SearchOptions,
    ) -> Self {
        Self {
            indexer,
            searcher,
            story,
            infer_metadata,
            search_defaults,
            started_at: Instant::now(),
        }
    }
}

pub struct GatewayServer {
    addr: SocketAddr,
    state: AppState,
    shutdown_rx: watch::Receiver<bool>,
}

impl GatewayServer {
    #[must_use]
    pub fn new(bind: &str, port: u16, state: AppState, shutdown_rx: watch::Receiver<bool>) -> Self {
        let addr: SocketAddr = format!("{bind}:{port}").parse().unwrap_or_else(|e| {
            tracing::warn!("invalid bind '{bind}': {e}, falling back to 127.0.0.1:{port}");
            SocketAddr::from(([127, 0, 0, 1], port))
        });

        Self {
            addr,
            state,
            shutdown_rx,
        }
    }

    /// Start the HTTP gateway server.
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails to bind or encounters a fatal
    /// I/O error.
    pub async fn serve(self) -> Result<(), GatewayError> {
        let router = build_router(self.state);

        let listener = tokio::net::TcpListener::bind(self.addr)
            .await
            .map_err(|e| GatewayError::Bind(self.addr.to_string(), e))?;
        tracing::info!("gateway listening on {}", self.addr);

        let mut shutdown_rx = self.shutdown_rx;
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                while !*shutdown_rx.borrow_and_update() {
                    if shutdown_rx.changed().await.is_err() {
                        std::future::pending::<()>().await;
                    }
                }
                tracing::info!("gateway shutting down");
            })
            .await
            .map_err(|e| GatewayError::Server(format!("{e}")))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_bind_falls_back_to_loopback() {
        let (_tx, rx) = watch::channel(false);
        let state = crate::test_support::app_state(&[]);
        let server = GatewayServer::new("not_an_ip", 9999, state, rx);
        assert_eq!(server.addr.port(), 9999);
        assert!(server.addr.ip().is_loopback());
    }
}
