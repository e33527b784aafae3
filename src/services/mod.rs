pub mod auth_service;
pub mod relay_service;
