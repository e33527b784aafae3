use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;
use tracing::{debug, error};

use crate::models::{ErrorResponse, HealthResponse};
use crate::state::AppState;

/// Health check endpoint
pub async fn health_check() -> Json<HealthResponse> {
    debug!("Health check requested");
    Json(HealthResponse {
        status: "ok".to_string(),
        message: "Server is running".to_string(),
    })
}

/// Readiness check endpoint. Ready once the session store answers.
pub async fn ready_check(
    State(state): State<Arc<AppState>>,
) -> Result<Json<HealthResponse>, (StatusCode, Json<ErrorResponse>)> {
    debug!("Readiness check requested");
    match state.sessions.exists("readiness-probe").await {
        Ok(_) => Ok(Json(HealthResponse {
            status: "ok".to_string(),
            message: "Service is ready".to_string(),
        })),
        Err(e) => {
            error!("Session store not ready: {}", e);
            Err(ErrorResponse::reply(StatusCode::SERVICE_UNAVAILABLE, e.to_string()))
        }
    }
}
