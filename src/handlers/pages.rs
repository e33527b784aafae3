use axum::{extract::State, Extension, Json};
use chrono::{Datelike, Utc};
use std::sync::Arc;

use crate::models::PageResponse;
use crate::routes::SharedSession;
use crate::services::relay_service::home_diagnostics;
use crate::state::AppState;

fn page(title: &str, message: Option<&str>, errors: Vec<String>) -> Json<PageResponse> {
    Json(PageResponse {
        title: title.to_string(),
        message: message.map(str::to_string),
        year: Utc::now().year(),
        errors,
    })
}

/// Home page. For a logged-in session this relays the upstream data into
/// the document store before rendering.
pub async fn home(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<SharedSession>,
) -> Json<PageResponse> {
    let mut session = session.lock().await;
    let errors = home_diagnostics(&state, &mut session).await;
    page("Home Page", None, errors)
}

pub async fn contact() -> Json<PageResponse> {
    page("Contact", Some("Your contact page."), Vec::new())
}

pub async fn about() -> Json<PageResponse> {
    page("About", Some("Your application description page."), Vec::new())
}
