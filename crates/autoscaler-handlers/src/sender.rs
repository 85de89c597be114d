//! One-way response stream from a handler back to the pipeline.

use async_trait::async_trait;
use autoscaler_types::{HandleResponse, HandleStatus};

use crate::error::HandlerResult;

/// Receives the status progression a handler reports for one call.
#[async_trait]
pub trait ResponseSender: Send + Sync {
    async fn send(&self, response: HandleResponse) -> HandlerResult<()>;

    /// Shorthand for [`ResponseSender::send`].
    async fn report(&self, scaling_job_id: &str, status: HandleStatus, log: &str) -> HandlerResult<()> {
        self.send(HandleResponse {
            scaling_job_id: scaling_job_id.to_string(),
            status,
            log: log.to_string(),
        })
        .await
    }
}
