//! HTTP control surface
//!
//! Exposes a session over HTTP using Axum: the current status view and session
//! snapshot, connect/disconnect triggers standing in for the control panel,
//! and Prometheus metrics.

use crate::matchmaking::{MatchmakingHandle, SessionSnapshot};
use crate::metrics::{encode_metrics, MetricsCollector};
use crate::status::{SharedStatusPanel, StatusView};
use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, watch};
use tracing::{debug, error, info, warn};

/// Control server configuration
#[derive(Debug, Clone)]
pub struct ControlServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to bind to
    pub port: u16,
}

impl Default for ControlServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

/// Shared state for the control server
#[derive(Clone)]
pub struct ControlServerState {
    pub handle: MatchmakingHandle,
    pub snapshots: watch::Receiver<SessionSnapshot>,
    pub status: SharedStatusPanel,
    pub metrics_collector: Arc<MetricsCollector>,
}

/// Body returned by `GET /status`
#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub session: SessionSnapshot,
    pub status: StatusView,
}

/// HTTP server driving one matchmaking session
pub struct ControlServer {
    config: ControlServerConfig,
    state: ControlServerState,
    shutdown_tx: broadcast::Sender<()>,
}

impl ControlServer {
    pub fn new(config: ControlServerConfig, state: ControlServerState) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            config,
            state,
            shutdown_tx,
        }
    }

    /// Serve until `stop` is called
    pub async fn start(&self) -> Result<()> {
        let addr: SocketAddr = format!("{}:{}", self.config.host, self.config.port)
            .parse()
            .context("Invalid control server address")?;

        let app = self.create_router();
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind control server to {}", addr))?;

        info!("Control server listening on http://{}", addr);

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
                info!("Control server shutdown signal received");
            })
            .await?;

        info!("Control server stopped");
        Ok(())
    }

    /// Create the Axum router with all endpoints
    pub fn create_router(&self) -> Router {
        Router::new()
            .route("/", get(root_handler))
            .route("/health", get(health_handler))
            .route("/status", get(status_handler))
            .route("/connect", post(connect_handler))
            .route("/disconnect", post(disconnect_handler))
            .route("/metrics", get(metrics_handler))
            .with_state(self.state.clone())
    }

    /// Signal the server to stop
    pub fn stop(&self) {
        if let Err(e) = self.shutdown_tx.send(()) {
            warn!("Failed to send shutdown signal to control server: {}", e);
        }
    }
}

async fn root_handler() -> impl IntoResponse {
    Json(json!({
        "service": "duo-match",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": ["/health", "/status", "/connect", "/disconnect", "/metrics"]
    }))
}

async fn health_handler() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "service": "duo-match",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn status_handler(State(state): State<ControlServerState>) -> impl IntoResponse {
    debug!("Status requested");
    Json(StatusResponse {
        session: state.snapshots.borrow().clone(),
        status: state.status.view(),
    })
}

async fn connect_handler(State(state): State<ControlServerState>) -> Response {
    match state.handle.connect() {
        Ok(()) => (StatusCode::ACCEPTED, Json(json!({ "accepted": "connect" }))).into_response(),
        Err(e) => {
            error!("Connect request rejected: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

async fn disconnect_handler(State(state): State<ControlServerState>) -> Response {
    match state.handle.disconnect() {
        Ok(()) => (
            StatusCode::ACCEPTED,
            Json(json!({ "accepted": "disconnect" })),
        )
            .into_response(),
        Err(e) => {
            error!("Disconnect request rejected: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

async fn metrics_handler(State(state): State<ControlServerState>) -> Response {
    match encode_metrics(&state.metrics_collector) {
        Ok(text) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(e) => {
            error!("Failed to render metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matchmaking::Session;
    use crate::types::MatchmakingInput;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt; // for oneshot

    fn test_server() -> (ControlServer, crate::matchmaking::MatchmakingInbox) {
        let (handle, inbox) = MatchmakingHandle::channel();
        let (_tx, snapshots) = watch::channel(Session::new("0.0.1").snapshot());
        let state = ControlServerState {
            handle,
            snapshots,
            status: SharedStatusPanel::new(),
            metrics_collector: Arc::new(MetricsCollector::new().unwrap()),
        };
        (ControlServer::new(ControlServerConfig::default(), state), inbox)
    }

    #[tokio::test]
    async fn test_root_endpoint() {
        let (server, _inbox) = test_server();
        let response = server
            .create_router()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_status_endpoint_reports_idle_session() {
        let (server, _inbox) = test_server();
        let response = server
            .create_router()
            .oneshot(Request::builder().uri("/status").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["session"]["state"]["state"], "idle");
        assert_eq!(value["status"]["control_panel_visible"], true);
        assert_eq!(value["status"]["progress_visible"], false);
    }

    #[tokio::test]
    async fn test_connect_endpoint_forwards_to_controller() {
        let (server, mut inbox) = test_server();
        let response = server
            .create_router()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/connect")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(inbox.try_recv(), Some(MatchmakingInput::Connect));
    }

    #[tokio::test]
    async fn test_connect_endpoint_without_controller() {
        let (server, inbox) = test_server();
        drop(inbox);
        let response = server
            .create_router()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/connect")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let (server, _inbox) = test_server();
        server.state.metrics_collector.record_connect_request(true);

        let response = server
            .create_router()
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response.headers().get("content-type").unwrap();
        assert!(content_type.to_str().unwrap().contains("text/plain"));
    }
}
