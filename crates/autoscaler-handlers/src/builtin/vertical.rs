//! Plan changes for appliances that resize without re-creation.

use std::sync::Arc;

use async_trait::async_trait;
use autoscaler_types::{CloudApi, HandleRequest, HandleStatus, Instruction, ResourceKind, ResourcePayload};
use tracing::info;

use super::{accept, ignore};
use crate::error::{HandlerError, HandlerResult};
use crate::handler::BuiltinHandler;
use crate::sender::ResponseSender;

pub(super) const ELB_VERTICAL_SCALER: &str = "elb-vertical-scaler";
pub(super) const ROUTER_VERTICAL_SCALER: &str = "router-vertical-scaler";

async fn apply_plan(
    cloud: &dyn CloudApi,
    kind: ResourceKind,
    req: &HandleRequest,
    sender: &dyn ResponseSender,
) -> HandlerResult<()> {
    let resource = &req.resource;
    if resource.kind() != kind || resource.instruction() != Instruction::Update {
        return ignore(req, sender).await;
    }
    let desired = resource.desired().ok_or_else(|| {
        HandlerError::InvalidRequest(format!("{kind} {} has no desired plan", resource.id()))
    })?;
    let plan = match &desired.payload {
        ResourcePayload::Elb(elb) => format!("cps={}", elb.cps),
        ResourcePayload::Router(router) => format!("band_width={}", router.band_width),
        other => {
            return Err(HandlerError::InvalidRequest(format!(
                "unexpected {} payload for {kind}",
                other.kind()
            )));
        }
    };

    let job = &req.request.scaling_job_id;
    accept(job, sender).await?;
    sender
        .report(job, HandleStatus::Running, &format!("changing plan: {plan}"))
        .await?;
    cloud.update(desired.clone()).await?;
    info!(%kind, id = %resource.id(), %plan, "plan changed");
    sender.report(job, HandleStatus::Done, "").await
}

pub struct ElbVerticalScaler {
    cloud: Arc<dyn CloudApi>,
}

impl ElbVerticalScaler {
    pub fn new(cloud: Arc<dyn CloudApi>) -> Self {
        Self { cloud }
    }
}

#[async_trait]
impl BuiltinHandler for ElbVerticalScaler {
    fn name(&self) -> &str {
        ELB_VERTICAL_SCALER
    }

    async fn handle(&self, req: &HandleRequest, sender: &dyn ResponseSender) -> HandlerResult<()> {
        apply_plan(self.cloud.as_ref(), ResourceKind::Elb, req, sender).await
    }
}

pub struct RouterVerticalScaler {
    cloud: Arc<dyn CloudApi>,
}

impl RouterVerticalScaler {
    pub fn new(cloud: Arc<dyn CloudApi>) -> Self {
        Self { cloud }
    }
}

#[async_trait]
impl BuiltinHandler for RouterVerticalScaler {
    fn name(&self) -> &str {
        ROUTER_VERTICAL_SCALER
    }

    async fn handle(&self, req: &HandleRequest, sender: &dyn ResponseSender) -> HandlerResult<()> {
        apply_plan(self.cloud.as_ref(), ResourceKind::Router, req, sender).await
    }
}
