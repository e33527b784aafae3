use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Extension, Json,
};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::models::{ErrorResponse, FormResponse, LoginRequest, SignupRequest};
use crate::routes::SharedSession;
use crate::services::auth_service::{self, auth_login_session};
use crate::state::AppState;

const INVALID_LOGIN: &str = "Invalid Username or Password.";

fn form(title: &str, errors: Vec<String>) -> Json<FormResponse> {
    Json(FormResponse {
        title: title.to_string(),
        errors,
    })
}

pub async fn login_form() -> Json<FormResponse> {
    form("Log in", Vec::new())
}

/// Log in and go home, or show the form again with an error.
pub async fn login(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SharedSession>,
    Json(request): Json<LoginRequest>,
) -> Response {
    let mut session = session.lock().await;
    if auth_login_session(state.auth.as_ref(), &mut session, &request.username, &request.password).await {
        return Redirect::to("/").into_response();
    }
    warn!("Rejected login for '{}'", request.username);
    form("Log in", vec![INVALID_LOGIN.to_string()]).into_response()
}

pub async fn signup_form() -> Json<FormResponse> {
    form("Sign up", Vec::new())
}

/// Create an account with its personal group, log in and go home.
pub async fn signup(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SharedSession>,
    Json(request): Json<SignupRequest>,
) -> Response {
    let mut session = session.lock().await;
    match auth_service::signup(
        state.auth.as_ref(),
        &mut session,
        &request.username,
        &request.password,
        &request.bio,
    )
    .await
    {
        Ok(user) => {
            info!("Signed up user '{}' ({})", user.username, user.id);
            Redirect::to("/").into_response()
        }
        Err(e) => {
            error!("Signup failed for '{}': {}", request.username, e);
            let message = if state.config.is_production() {
                format!("We were unable to create an account for user {}.", request.username)
            } else {
                format!("We were unable to create an account for user {}: {}", request.username, e)
            };
            form("Sign up", vec![message]).into_response()
        }
    }
}

pub async fn logout(Extension(session): Extension<SharedSession>) -> Response {
    let mut session = session.lock().await;
    match auth_service::logout(&mut session).await {
        Ok(()) => Redirect::to("/").into_response(),
        Err(e) => {
            error!("Failed to end session: {}", e);
            ErrorResponse::reply(StatusCode::SERVICE_UNAVAILABLE, "Session store unavailable").into_response()
        }
    }
}
