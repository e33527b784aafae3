pub mod api;
pub mod session_middleware;

pub use api::create_routes;
pub use session_middleware::{session_middleware, SharedSession};
