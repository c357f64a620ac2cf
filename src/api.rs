//! HTTP surface: `POST /set_working_directory`, `POST /generate`,
//! `GET /health`.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::AssistantError;
use crate::handler::AssistantService;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    pub query: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub response: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetDirectoryRequest {
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetDirectoryResponse {
    pub message: String,
    pub current_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Error reply rendered as `{"detail": "..."}`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub detail: String,
}

impl From<AssistantError> for ApiError {
    fn from(err: AssistantError) -> Self {
        match err {
            AssistantError::InvalidInput(detail) => {
                warn!(detail = %detail, "rejected request");
                Self {
                    status: StatusCode::BAD_REQUEST,
                    detail,
                }
            }
            AssistantError::ServiceUnavailable { endpoint, reason } => {
                error!(endpoint = %endpoint, reason = %reason, "tool service unavailable");
                Self {
                    status: StatusCode::SERVICE_UNAVAILABLE,
                    detail: format!(
                        "Could not connect to the backend tool service at {endpoint}. \
                         Please ensure it's running."
                    ),
                }
            }
            other => {
                error!(error = ?other, "request failed");
                Self {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    detail: format!("An internal error occurred: {other}"),
                }
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(serde_json::json!({ "detail": self.detail })),
        )
            .into_response()
    }
}

/// Build the router over a shared service.
pub fn router(service: Arc<AssistantService>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/set_working_directory", post(set_working_directory))
        .route("/generate", post(generate))
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

/// Bind `config.bind_addr()` and serve until the process exits.
///
/// # Errors
///
/// Returns an error if the address cannot be bound or the server fails.
pub async fn serve(config: &Config, service: Arc<AssistantService>) -> anyhow::Result<()> {
    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(
        addr = %listener.local_addr()?,
        tool_service = %service.tool_endpoint(),
        model = %config.model,
        "assistant API listening"
    );
    axum::serve(listener, router(service)).await?;
    Ok(())
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_owned(),
        version: env!("CARGO_PKG_VERSION").to_owned(),
    })
}

async fn set_working_directory(
    State(service): State<Arc<AssistantService>>,
    Json(req): Json<SetDirectoryRequest>,
) -> Result<Json<SetDirectoryResponse>, ApiError> {
    let current_path = service.set_working_directory(&req.path)?;
    Ok(Json(SetDirectoryResponse {
        message: "Working directory successfully set.".to_owned(),
        current_path,
    }))
}

async fn generate(
    State(service): State<Arc<AssistantService>>,
    Json(req): Json<QueryRequest>,
) -> Result<Json<GenerateResponse>, ApiError> {
    let response = service.generate(&req.query).await?;
    Ok(Json(GenerateResponse { response }))
}
