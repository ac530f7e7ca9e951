use crate::error::{AppError, Result};
use crate::model::{CacheStatusResponse, ClearCacheRequest, ClearCacheResponse};
use crate::state::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use tracing::{info, warn};

pub async fn cache_status_handler(State(state): State<AppState>) -> Json<CacheStatusResponse> {
    Json(state.pipeline.cache().status().into())
}

/// Clears the rule cache of every instance.
///
/// Requires `{"confirm": true}`; the local cache is cleared before the
/// other instances are notified.
pub async fn clear_cache_handler(
    State(state): State<AppState>,
    Json(request): Json<ClearCacheRequest>,
) -> Result<(StatusCode, Json<ClearCacheResponse>)> {
    if !request.confirm {
        warn!("refusing to clear rewrite rule cache without confirmation");
        return Err(AppError::ConfirmationRequired);
    }

    let event = state.invalidator.clear_all().await?;
    info!(event_id = %event.id, "rewrite rule cache cleared on request");

    Ok((
        StatusCode::ACCEPTED,
        Json(ClearCacheResponse { event_id: event.id }),
    ))
}
