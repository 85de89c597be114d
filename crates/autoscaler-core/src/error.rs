//! Core error types.

use std::time::Duration;

use autoscaler_handlers::HandlerError;
use autoscaler_types::{CloudError, JobState};
use thiserror::Error;

use crate::config::ConfigError;

/// Result type alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur while admitting or running a scaling job.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("core is shutting down")]
    ShuttingDown,

    #[error("resource {0:?} not found")]
    ResourceNotFound(String),

    #[error("job {job_id:?} is not acceptable: status={status}")]
    Unacceptable { job_id: String, status: JobState },

    #[error("resolve {definition:?}: {message}")]
    Resolution { definition: String, message: String },

    #[error("handler {handler:?} failed in {step}: {source}")]
    Handler {
        handler: String,
        step: &'static str,
        #[source]
        source: HandlerError,
    },

    #[error("cloud api error: {0}")]
    Cloud(#[from] CloudError),

    #[error("job {job_id:?} failed: {source}")]
    JobFailed {
        job_id: String,
        #[source]
        source: Box<CoreError>,
    },

    #[error("job task aborted: {0}")]
    TaskAborted(String),

    #[error("shutdown timed out after {0:?}")]
    ShutdownTimeout(Duration),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl CoreError {
    pub(crate) fn resolution(definition: &str, message: impl Into<String>) -> Self {
        Self::Resolution {
            definition: definition.to_string(),
            message: message.into(),
        }
    }
}
