use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Request};
use axum::http::{header, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use voxnote_core::summary::Summarizer;
use voxnote_core::transcript::Transcriber;
use voxnote_store::RecordStore;

use crate::error::ApiError;
use crate::handlers;

/// Server configuration.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    /// 0 picks a free port.
    pub port: u16,
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            max_upload_bytes: 50 * 1024 * 1024,
        }
    }
}

/// Shared application state passed to axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub transcriber: Arc<dyn Transcriber>,
    /// `None` when no summarization credential is configured.
    pub summarizer: Option<Arc<dyn Summarizer>>,
    pub store: Arc<dyn RecordStore>,
}

/// Build the axum router with all routes.
pub fn build_router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/transcribe", post(handlers::transcribe))
        .route(
            "/regenerate-summary/{recording_id}",
            post(handlers::regenerate_summary),
        )
        .route("/test-summary", post(handlers::test_summary))
        .route("/health", get(handlers::health))
        .with_state(state)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_upload_bytes))
        .layer(middleware::from_fn(json_payload_too_large))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// The body limit layer answers 413 in plain text; give clients the usual
/// error envelope instead.
async fn json_payload_too_large(request: Request, next: Next) -> Response {
    let response = next.run(request).await;
    if response.status() != StatusCode::PAYLOAD_TOO_LARGE {
        return response;
    }
    let is_json = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/json"));
    if is_json {
        return response;
    }
    ApiError::PayloadTooLarge("Upload too large".into()).into_response()
}

/// Bind and serve in a background task.
pub async fn start(config: ServerConfig, state: AppState) -> Result<ServerHandle, std::io::Error> {
    let summarizer = state.summarizer.is_some();
    let store = state.store.backend();
    let router = build_router(state, config.max_upload_bytes);

    let listener = tokio::net::TcpListener::bind((config.host.as_str(), config.port)).await?;
    let local_addr = listener.local_addr()?;

    tracing::info!(addr = %local_addr, summarizer, store, "voxnote server started");

    let server = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            tracing::error!(error = %e, "server stopped");
        }
    });

    Ok(ServerHandle {
        addr: local_addr,
        server,
    })
}

/// Handle returned by [`start`]; dropping it leaves the server running.
pub struct ServerHandle {
    pub addr: SocketAddr,
    server: tokio::task::JoinHandle<()>,
}

impl ServerHandle {
    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn shutdown(self) {
        self.server.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use tower::ServiceExt;

    #[test]
    fn default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 5000);
        assert_eq!(config.max_upload_bytes, 52_428_800);
    }

    #[tokio::test]
    async fn over_limit_body_gets_json_error() {
        let app = Router::new()
            .route("/echo", post(|body: String| async move { body }))
            .layer(DefaultBodyLimit::disable())
            .layer(RequestBodyLimitLayer::new(8))
            .layer(middleware::from_fn(json_payload_too_large));
        let response = app
            .oneshot(
                axum::http::Request::post("/echo")
                    .header(header::CONTENT_LENGTH, "64")
                    .body(Body::from(vec![b'x'; 64]))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Upload too large");
    }
}
