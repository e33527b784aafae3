use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Rendered page context
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PageResponse {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub year: i32,
    /// Non-fatal problems hit while preparing the page
    #[serde(default)]
    pub errors: Vec<String>,
}

/// Login and signup form context
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct FormResponse {
    pub title: String,
    #[serde(default)]
    pub errors: Vec<String>,
}
