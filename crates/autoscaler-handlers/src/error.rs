//! Handler error types.

use autoscaler_types::CloudError;
use thiserror::Error;

/// Result type alias for handler calls.
pub type HandlerResult<T> = Result<T, HandlerError>;

/// Errors raised while invoking a handler.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("invalid handler endpoint {endpoint:?}: {message}")]
    InvalidEndpoint { endpoint: String, message: String },

    #[error("connect to handler {endpoint}: {message}")]
    Connect { endpoint: String, message: String },

    #[error("handler rpc failed: {0}")]
    Rpc(#[from] tonic::Status),

    #[error("handler {endpoint} is not serving (status {status})")]
    NotServing { endpoint: String, status: i32 },

    #[error("handler returned unknown status {0}")]
    UnknownStatus(i32),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("response stream closed: {0}")]
    Send(String),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Cloud(#[from] CloudError),
}
