use crate::model::ErrorResponse;
use axum::http::header::WWW_AUTHENTICATE;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use rewriter_cache::ChannelError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("clearing the rewrite rule cache must be confirmed with \"confirm\": true")]
    ConfirmationRequired,
    #[error("missing or invalid admin token")]
    Unauthorized,
    #[error("administrative endpoints are disabled, no admin token is configured")]
    AdminDisabled,
    #[error("local cache cleared, but other instances could not be notified: {0}")]
    Invalidation(#[from] ChannelError),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::ConfirmationRequired => StatusCode::CONFLICT,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::AdminDisabled => StatusCode::FORBIDDEN,
            AppError::Invalidation(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let challenge = matches!(self, AppError::Unauthorized);
        let body = Json(ErrorResponse {
            error: self.to_string(),
        });

        let mut response = (status, body).into_response();
        if challenge {
            response
                .headers_mut()
                .insert(WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}
