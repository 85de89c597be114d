//! Logs every phase it sees. Never mutates anything.

use async_trait::async_trait;
use autoscaler_types::{HandleRequest, HandleStatus, PostHandleRequest};
use tracing::info;

use crate::error::HandlerResult;
use crate::handler::BuiltinHandler;
use crate::sender::ResponseSender;

pub(super) const LOGGING: &str = "logging";

pub struct LoggingHandler;

impl LoggingHandler {
    fn log(phase: &str, req: &HandleRequest) {
        info!(
            handler = LOGGING,
            phase,
            request_type = %req.request.request_type,
            source = %req.request.source,
            resource = %req.resource.name(),
            kind = %req.resource.kind(),
            instruction = %req.resource.instruction(),
            "request received"
        );
    }
}

#[async_trait]
impl BuiltinHandler for LoggingHandler {
    fn name(&self) -> &str {
        LOGGING
    }

    async fn pre_handle(&self, req: &HandleRequest, sender: &dyn ResponseSender) -> HandlerResult<()> {
        Self::log("PreHandle", req);
        sender.report(&req.request.scaling_job_id, HandleStatus::Ignored, "").await
    }

    async fn handle(&self, req: &HandleRequest, sender: &dyn ResponseSender) -> HandlerResult<()> {
        Self::log("Handle", req);
        sender.report(&req.request.scaling_job_id, HandleStatus::Ignored, "").await
    }

    async fn post_handle(&self, req: &PostHandleRequest, sender: &dyn ResponseSender) -> HandlerResult<()> {
        info!(
            handler = LOGGING,
            phase = "PostHandle",
            resource = %req.resource.name(),
            kind = %req.resource.kind(),
            result = %req.result,
            "request received"
        );
        sender.report(&req.request.scaling_job_id, HandleStatus::Ignored, "").await
    }
}
