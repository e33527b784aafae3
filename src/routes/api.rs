use crate::handlers::{about, contact, health_check, home, login, login_form, logout, ready_check, signup, signup_form};
use crate::routes::session_middleware::session_middleware;
use crate::state::AppState;
use axum::{middleware, routing::get, Router};
use std::sync::Arc;

/// Create the site routes
pub fn create_routes(state: Arc<AppState>) -> Router {
    Router::<Arc<AppState>>::new()
        .route("/", get(home))
        .route("/contact/", get(contact))
        .route("/about/", get(about))
        .route("/login/", get(login_form).post(login))
        .route("/signup/", get(signup_form).post(signup))
        .route("/logout/", get(logout).post(logout))
        .route_layer(middleware::from_fn_with_state(state.clone(), session_middleware)) // Applies to all routes added above
        .route("/health", get(health_check))
        .route("/ready", get(ready_check))
        .with_state(state)
}
