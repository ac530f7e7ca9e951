//! HTTP front of the rewriter: redirects matching requests and exposes the
//! administrative cache endpoints.

pub mod app;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod model;
pub mod state;

pub use app::App;
pub use state::AppState;
