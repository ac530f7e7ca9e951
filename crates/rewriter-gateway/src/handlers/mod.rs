mod admin;
mod health;

pub use admin::{cache_status_handler, clear_cache_handler};
pub use health::health_handler;

use axum::http::StatusCode;

/// Answers requests that no route and no rewrite rule handled.
pub async fn not_found_handler() -> StatusCode {
    StatusCode::NOT_FOUND
}
