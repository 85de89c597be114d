//! Adds and removes server group instances.

use std::sync::Arc;

use async_trait::async_trait;
use autoscaler_types::{CloudApi, HandleRequest, HandleStatus, Instruction, ResourceKind};
use tracing::info;

use super::{accept, ignore, wait_for_setup};
use crate::error::{HandlerError, HandlerResult};
use crate::handler::BuiltinHandler;
use crate::sender::ResponseSender;

pub(super) const SERVER_HORIZONTAL_SCALER: &str = "server-horizontal-scaler";

pub struct ServerHorizontalScaler {
    cloud: Arc<dyn CloudApi>,
}

impl ServerHorizontalScaler {
    pub fn new(cloud: Arc<dyn CloudApi>) -> Self {
        Self { cloud }
    }
}

#[async_trait]
impl BuiltinHandler for ServerHorizontalScaler {
    fn name(&self) -> &str {
        SERVER_HORIZONTAL_SCALER
    }

    async fn handle(&self, req: &HandleRequest, sender: &dyn ResponseSender) -> HandlerResult<()> {
        let resource = &req.resource;
        if resource.kind() != ResourceKind::ServerGroupInstance {
            return ignore(req, sender).await;
        }
        let job = &req.request.scaling_job_id;

        match resource.instruction() {
            Instruction::Create => {
                let desired = resource.desired().ok_or_else(|| {
                    HandlerError::InvalidRequest(format!("instance {} has no desired state", resource.name()))
                })?;
                accept(job, sender).await?;
                sender
                    .report(job, HandleStatus::Running, &format!("creating server {}", desired.name))
                    .await?;
                let created = self.cloud.create(desired.clone()).await?;
                info!(id = %created.id, name = %created.name, "server group instance created");
                wait_for_setup(req, sender).await?;
                sender.report(job, HandleStatus::Done, "").await
            }
            Instruction::Delete => {
                accept(job, sender).await?;
                sender
                    .report(job, HandleStatus::Running, &format!("deleting server {}", resource.id()))
                    .await?;
                self.cloud.delete(ResourceKind::Server, resource.id()).await?;
                info!(id = %resource.id(), name = %resource.name(), "server group instance deleted");
                sender.report(job, HandleStatus::Done, "").await
            }
            Instruction::Noop | Instruction::Update => ignore(req, sender).await,
        }
    }
}
