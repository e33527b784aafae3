use utoipa::OpenApi;
use crate::models::*;

/// Home page; relays upstream data for logged-in sessions
#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Home page context", body = PageResponse)
    )
)]
#[allow(dead_code)]
pub async fn home_doc() {}

#[utoipa::path(
    get,
    path = "/contact/",
    responses(
        (status = 200, description = "Contact page context", body = PageResponse)
    )
)]
#[allow(dead_code)]
pub async fn contact_doc() {}

#[utoipa::path(
    get,
    path = "/about/",
    responses(
        (status = 200, description = "About page context", body = PageResponse)
    )
)]
#[allow(dead_code)]
pub async fn about_doc() {}

/// Log in with username and password
#[utoipa::path(
    post,
    path = "/login/",
    request_body = LoginRequest,
    responses(
        (status = 303, description = "Logged in, redirect to the home page"),
        (status = 200, description = "Rejected credentials", body = FormResponse)
    )
)]
#[allow(dead_code)]
pub async fn login_doc() {}

/// Create an account and log in
#[utoipa::path(
    post,
    path = "/signup/",
    request_body = SignupRequest,
    responses(
        (status = 303, description = "Account created, redirect to the home page"),
        (status = 200, description = "Account could not be created", body = FormResponse)
    )
)]
#[allow(dead_code)]
pub async fn signup_doc() {}

#[utoipa::path(
    post,
    path = "/logout/",
    responses(
        (status = 303, description = "Session ended, redirect to the home page"),
        (status = 503, description = "Session store unavailable", body = ErrorResponse)
    )
)]
#[allow(dead_code)]
pub async fn logout_doc() {}

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    )
)]
#[allow(dead_code)]
pub async fn health_check_doc() {}

#[utoipa::path(
    get,
    path = "/ready",
    responses(
        (status = 200, description = "Session store reachable", body = HealthResponse),
        (status = 503, description = "Session store unavailable", body = ErrorResponse)
    )
)]
#[allow(dead_code)]
pub async fn ready_check_doc() {}

#[derive(OpenApi)]
#[openapi(
    paths(
        home_doc,
        contact_doc,
        about_doc,
        login_doc,
        signup_doc,
        logout_doc,
        health_check_doc,
        ready_check_doc,
    ),
    components(
        schemas(PageResponse, FormResponse, LoginRequest, SignupRequest, ErrorResponse, HealthResponse, WrappedDocument)
    ),
    tags(
        (name = "site", description = "Site pages and account flow")
    )
)]
pub struct ApiDoc;
