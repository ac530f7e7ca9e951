mod admin_auth;
mod rewrite;

pub use admin_auth::require_admin_token;
pub use rewrite::rewrite;
