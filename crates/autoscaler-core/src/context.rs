//! Request and handling contexts.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use autoscaler_types::{Computed, HandleResult, Instruction, RequestType, ScalingRequest};

/// Scope of one scaling request, shared by every resource it touches.
#[derive(Debug, Clone)]
pub struct RequestContext {
    request: ScalingRequest,
    /// Name of the definition the request resolved to.
    target: String,
    handled: Arc<AtomicBool>,
}

impl RequestContext {
    pub fn new(request: ScalingRequest, target: impl Into<String>) -> Self {
        Self {
            request,
            target: target.into(),
            handled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn request(&self) -> &ScalingRequest {
        &self.request
    }

    pub fn request_type(&self) -> RequestType {
        self.request.request_type
    }

    pub fn job_id(&self) -> &str {
        &self.request.scaling_job_id
    }

    /// Whether resources of `definition` receive plan selection.
    pub fn is_target(&self, definition: &str) -> bool {
        !definition.is_empty() && self.target == definition
    }

    /// True once any handler reported RUNNING or DONE. Never reverts.
    pub fn handled(&self) -> bool {
        self.handled.load(Ordering::SeqCst)
    }

    pub fn mark_handled(&self) {
        self.handled.store(true, Ordering::SeqCst);
    }
}

/// Per-resource scope: the request plus the snapshot taken before Handle.
#[derive(Debug, Clone)]
pub struct HandlingContext<'a> {
    parent: &'a RequestContext,
    computed: Computed,
}

impl<'a> HandlingContext<'a> {
    pub fn new(parent: &'a RequestContext, computed: Computed) -> Self {
        Self { parent, computed }
    }

    pub fn request(&self) -> &'a RequestContext {
        self.parent
    }

    pub fn computed(&self) -> &Computed {
        &self.computed
    }

    /// Classify what Handle did, comparing this snapshot to `after`.
    pub fn compute_result(&self, after: &Computed) -> HandleResult {
        compute_result(&self.computed, after)
    }
}

pub fn compute_result(before: &Computed, after: &Computed) -> HandleResult {
    if after.instruction() != Instruction::Noop {
        return HandleResult::Unknown;
    }
    if after.id().is_empty() {
        return HandleResult::Deleted;
    }
    if before.id().is_empty() {
        return HandleResult::Created;
    }
    if before.instruction() == Instruction::Update {
        // Same ID, or a plan change that made the cloud re-create it.
        return HandleResult::Updated;
    }
    HandleResult::Unknown
}
