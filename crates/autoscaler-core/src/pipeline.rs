//! Per-resource handler pipeline.
//!
//! ```text
//!   compute ──► PreHandle (all handlers, in order)
//!          ──► Handle    (all handlers, in order)
//!          ──► compute(refresh)
//!          ──► PostHandle(all handlers, in order, with the result)
//! ```
//!
//! The first error aborts the resource. Nothing already done is undone.

use std::fmt;

use async_trait::async_trait;
use autoscaler_handlers::{Handler, HandlerError, HandlerResult, ResponseSender};
use autoscaler_types::{Computed, HandleRequest, HandleResponse, HandleStatus, PostHandleRequest};
use tracing::{debug, info};

use crate::context::{HandlingContext, RequestContext};
use crate::error::{CoreError, CoreResult};
use crate::resource::ResourceGraph;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    PreHandle,
    Handle,
    PostHandle,
}

impl Step {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PreHandle => "PreHandle",
            Self::Handle => "Handle",
            Self::PostHandle => "PostHandle",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Logs every status a handler reports and flips the request's
/// `handled` flag on RUNNING or DONE.
struct LogSender<'a> {
    ctx: &'a RequestContext,
    resource: &'a Computed,
    step: Step,
    handler: &'a str,
}

#[async_trait]
impl ResponseSender for LogSender<'_> {
    async fn send(&self, response: HandleResponse) -> HandlerResult<()> {
        if response.status.marks_handled() {
            self.ctx.mark_handled();
        }

        let request = self.ctx.request();
        let zone = self.resource.zone().unwrap_or("global");
        let id = match self.resource.id() {
            "" => "(known after handle)",
            id => id,
        };
        if response.status == HandleStatus::Ignored && response.log.is_empty() {
            debug!(
                request_type = %request.request_type,
                source = %request.source,
                resource_name = %request.resource_name,
                kind = %self.resource.kind(),
                zone,
                id,
                name = %self.resource.name(),
                step = %self.step,
                handler = %self.handler,
                status = %response.status,
                "ignored"
            );
        } else {
            info!(
                request_type = %request.request_type,
                source = %request.source,
                resource_name = %request.resource_name,
                kind = %self.resource.kind(),
                zone,
                id,
                name = %self.resource.name(),
                step = %self.step,
                handler = %self.handler,
                status = %response.status,
                "{}",
                response.log
            );
        }
        Ok(())
    }
}

fn step_failed(handler: &Handler, step: Step) -> impl FnOnce(HandlerError) -> CoreError + '_ {
    move |source| CoreError::Handler {
        handler: handler.name().to_string(),
        step: step.as_str(),
        source,
    }
}

/// Run all three phases for node `idx` of `graph`.
pub async fn handle_resource(
    handlers: &[Handler],
    graph: &mut ResourceGraph<'_>,
    idx: usize,
    ctx: &RequestContext,
) -> CoreResult<()> {
    let computed = graph.compute(idx, ctx, false).await?;
    let handling = HandlingContext::new(ctx, computed);
    debug!(
        job_id = %ctx.job_id(),
        kind = %handling.computed().kind(),
        name = %handling.computed().name(),
        instruction = %handling.computed().instruction(),
        "handling resource"
    );

    let req = HandleRequest {
        request: ctx.request().clone(),
        resource: handling.computed().clone(),
    };
    for step in [Step::PreHandle, Step::Handle] {
        for handler in handlers {
            let sender = LogSender {
                ctx,
                resource: handling.computed(),
                step,
                handler: handler.name(),
            };
            let called = match step {
                Step::PreHandle => handler.pre_handle(&req, &sender).await,
                _ => handler.handle(&req, &sender).await,
            };
            called.map_err(step_failed(handler, step))?;
        }
    }

    let refreshed = graph.compute(idx, ctx, true).await?;
    let result = handling.compute_result(&refreshed);
    let post_handling = HandlingContext::new(ctx, refreshed);
    let req = PostHandleRequest {
        request: ctx.request().clone(),
        result,
        resource: post_handling.computed().clone(),
    };
    for handler in handlers {
        let sender = LogSender {
            ctx,
            resource: post_handling.computed(),
            step: Step::PostHandle,
            handler: handler.name(),
        };
        handler
            .post_handle(&req, &sender)
            .await
            .map_err(step_failed(handler, Step::PostHandle))?;
    }
    Ok(())
}
