use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use cookie::{time::Duration as CookieDuration, Cookie, SameSite};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error};

use crate::models::ErrorResponse;
use crate::sessions::SessionStore;
use crate::state::AppState;

/// Per-request session handed to handlers through request extensions
pub type SharedSession = Arc<Mutex<SessionStore>>;

// Get the session key from the request cookies
fn session_key_from_request(req: &Request, cookie_name: &str) -> Option<String> {
    let cookie_header = req.headers().get(header::COOKIE)?.to_str().ok()?;
    Cookie::split_parse(cookie_header)
        .filter_map(Result::ok)
        .find(|c| c.name() == cookie_name)
        .map(|c| c.value().to_string())
}

fn session_cookie(state: &AppState, value: String, max_age: i64) -> Cookie<'static> {
    Cookie::build((state.config.session_cookie_name.clone(), value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(state.config.is_production())
        .max_age(CookieDuration::seconds(max_age))
        .build()
}

pub async fn session_middleware(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Response {
    // 1. Bind the request to the session named by its cookie
    let cookie_key = session_key_from_request(&req, &state.config.session_cookie_name);
    let session: SharedSession = Arc::new(Mutex::new(SessionStore::new(
        state.sessions.clone(),
        cookie_key.clone(),
        state.config.session_cookie_age,
    )));
    req.extensions_mut().insert(session.clone());

    // 2. Run the handler
    let mut response = next.run(req).await;

    // 3. Persist what the handler changed and tell the client about it
    let mut session = session.lock().await;
    if !session.is_modified() {
        return response;
    }

    let cookie = if session.session_key().is_none() && session.is_empty() {
        // Flushed, or never held anything worth keeping
        cookie_key.map(|_| {
            debug!("Session flushed, expiring cookie");
            session_cookie(&state, String::new(), 0)
        })
    } else {
        if let Err(e) = session.save(false).await {
            error!("Failed to save session: {}", e);
            return ErrorResponse::reply(StatusCode::SERVICE_UNAVAILABLE, "Session store unavailable")
                .into_response();
        }
        session
            .session_key()
            .map(|key| session_cookie(&state, key.to_string(), session.get_expiry_age() as i64))
    };

    if let Some(cookie) = cookie {
        match HeaderValue::from_str(&cookie.to_string()) {
            Ok(value) => {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
            Err(e) => error!("Invalid session cookie header: {}", e),
        }
    }
    response
}
