use axum::routing::{get, post};
use axum::{middleware, Router};
use tower_http::trace::TraceLayer;

use crate::handlers::{
    cache_status_handler, clear_cache_handler, health_handler, not_found_handler,
};
use crate::middleware::{require_admin_token, rewrite};
use crate::state::AppState;

pub struct App {}

impl App {
    /// Builds the gateway router.
    ///
    /// The health and admin routes are never rewritten; every other request
    /// goes through the rewrite middleware and, when no rule applies, ends in
    /// a 404. Admin routes require the configured bearer token.
    pub fn router(state: AppState) -> Router {
        Self::with_content(state, Router::new().fallback(not_found_handler))
    }

    /// Builds the gateway router in front of `content`, which serves every
    /// request that is not redirected.
    pub fn with_content(state: AppState, content: Router) -> Router {
        let content = content.layer(middleware::from_fn_with_state(state.clone(), rewrite));

        Router::new()
            .route("/health", get(health_handler))
            .nest(
                "/admin/rewriter",
                Router::new()
                    .route("/cache", get(cache_status_handler))
                    .route("/cache/clear", post(clear_cache_handler))
                    .route_layer(middleware::from_fn_with_state(
                        state.clone(),
                        require_admin_token,
                    )),
            )
            .with_state(state)
            .fallback_service(content)
            .layer(TraceLayer::new_for_http())
    }
}
