//! HTTP server exposing the tool gateway

use axum::{
    Json, Router,
    body::Body,
    extract::{Path, State},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::trace::TraceLayer;

use super::relay::{GatewayOutcome, ToolGateway, ToolRequest};
use super::response::{error_response, stream_response};
use crate::classifier::{ClassifiedError, ErrorCategory};
use crate::config::ServerConfig;
use crate::error::{Result, ToolrunError};
use crate::registry::ToolSummary;

/// Shared application state for all handlers
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<ToolGateway>,
    /// Largest accepted run request body
    pub max_body_bytes: usize,
}

/// The gateway HTTP server
pub struct GatewayServer {
    config: ServerConfig,
    gateway: Arc<ToolGateway>,
}

impl GatewayServer {
    pub fn new(config: ServerConfig, gateway: Arc<ToolGateway>) -> Self {
        Self { config, gateway }
    }

    /// Start the server and listen for requests until shutdown
    pub async fn serve(&self) -> Result<()> {
        let state = Arc::new(AppState {
            gateway: self.gateway.clone(),
            max_body_bytes: self.config.max_body_bytes,
        });
        let app = create_router(state);

        let addr: SocketAddr = self
            .config
            .listen_addr
            .parse()
            .map_err(|e| ToolrunError::Config(format!("Invalid listen address: {e}")))?;

        tracing::info!("Starting tool gateway on {addr}");
        tracing::info!("{} tools registered", self.gateway.registry().len());

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ToolrunError::Server(format!("Failed to bind to {addr}: {e}")))?;

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| ToolrunError::Server(format!("Server error: {e}")))?;

        tracing::info!("Tool gateway shut down gracefully");
        Ok(())
    }
}

/// Create the router with all routes configured
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/tools", get(list_tools_handler))
        .route("/api/tools/run", post(run_tool_handler))
        .route("/api/tools/{slug}", get(show_tool_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint - returns JSON status
async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

async fn list_tools_handler(State(state): State<Arc<AppState>>) -> Response {
    let tools: Vec<ToolSummary<'_>> = state.gateway.registry().list().map(|t| t.summary()).collect();
    Json(tools).into_response()
}

async fn show_tool_handler(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> Response {
    match state.gateway.registry().lookup(&slug) {
        Some(tool) => Json(tool.info()).into_response(),
        None => error_response(&ClassifiedError::new(
            ErrorCategory::NotFound,
            format!("Unknown tool: {slug}"),
        )),
    }
}

/// Run a tool and stream its output
///
/// The body is decoded here rather than through the `Json` extractor so
/// malformed payloads get the same error shape as every other failure.
async fn run_tool_handler(State(state): State<Arc<AppState>>, body: Body) -> Response {
    let bytes = match axum::body::to_bytes(body, state.max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(e) => {
            return invalid_request(format!(
                "Request body unreadable or larger than {} bytes: {e}",
                state.max_body_bytes
            ));
        }
    };

    let request: ToolRequest = match serde_json::from_slice(&bytes) {
        Ok(request) => request,
        Err(e) => return invalid_request(format!("Invalid request body: {e}")),
    };

    match state.gateway.run(request).await {
        GatewayOutcome::Streaming(stream) => stream_response(stream),
        GatewayOutcome::Failed(classified) => error_response(&classified),
    }
}

fn invalid_request(error: String) -> Response {
    tracing::warn!(stage = "validating", error = %error, "Rejected run request body");
    error_response(&ClassifiedError::new(ErrorCategory::InvalidRequest, error))
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        },
    }
}
