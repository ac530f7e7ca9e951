use thiserror::Error;

/// Type alias for invalidation channel results.
pub type Result<T> = std::result::Result<T, ChannelError>;

#[derive(Debug, Clone, Error)]
pub enum ChannelError {
    #[error("invalidation channel unavailable: {0}")]
    Unavailable(String),
    #[error("invalidation channel operation timed out: {0}")]
    Timeout(String),
    #[error("invalidation channel operation failed: {0}")]
    Operation(String),
    #[error("invalidation event is invalid: {0}")]
    InvalidData(String),
    #[error("invalidation channel closed")]
    Closed,
}
