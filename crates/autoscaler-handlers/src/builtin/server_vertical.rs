//! Changes the core/memory plan of a server in place.

use std::sync::Arc;

use async_trait::async_trait;
use autoscaler_types::{CloudApi, HandleRequest, HandleStatus, Instruction, ResourceKind};
use tracing::info;

use super::{accept, ignore, wait_for_setup};
use crate::error::{HandlerError, HandlerResult};
use crate::handler::BuiltinHandler;
use crate::sender::ResponseSender;

pub(super) const SERVER_VERTICAL_SCALER: &str = "server-vertical-scaler";

pub struct ServerVerticalScaler {
    cloud: Arc<dyn CloudApi>,
}

impl ServerVerticalScaler {
    pub fn new(cloud: Arc<dyn CloudApi>) -> Self {
        Self { cloud }
    }
}

#[async_trait]
impl BuiltinHandler for ServerVerticalScaler {
    fn name(&self) -> &str {
        SERVER_VERTICAL_SCALER
    }

    async fn handle(&self, req: &HandleRequest, sender: &dyn ResponseSender) -> HandlerResult<()> {
        let resource = &req.resource;
        if resource.kind() != ResourceKind::Server || resource.instruction() != Instruction::Update {
            return ignore(req, sender).await;
        }
        let desired = resource
            .desired()
            .and_then(|d| d.as_server().map(|s| (d, s)));
        let Some((desired, plan)) = desired else {
            return Err(HandlerError::InvalidRequest(format!(
                "server {} has no desired plan",
                resource.id()
            )));
        };

        let job = &req.request.scaling_job_id;
        accept(job, sender).await?;
        sender
            .report(
                job,
                HandleStatus::Running,
                &format!("changing plan: core={} memory={}", plan.core, plan.memory),
            )
            .await?;

        let updated = self.cloud.update(desired.clone()).await?;
        info!(from = %resource.id(), to = %updated.id, core = plan.core, memory = plan.memory, "server plan changed");

        wait_for_setup(req, sender).await?;
        sender.report(job, HandleStatus::Done, "").await
    }
}

#[cfg(test)]
mod tests {
    use autoscaler_types::{CloudResource, Computed, InMemoryCloud, ResourcePayload, ServerSpec};

    use super::*;
    use crate::builtin::testing::request;
    use crate::sender::testing::RecordingSender;

    fn server(core: u32, memory: u32) -> CloudResource {
        CloudResource::new(
            "web",
            Some("is1a".into()),
            ResourcePayload::Server(ServerSpec {
                core,
                memory,
                ..Default::default()
            }),
        )
    }

    #[tokio::test]
    async fn updates_plan_and_reports_done() {
        let cloud = Arc::new(InMemoryCloud::new());
        let current = cloud.create(server(2, 4)).await.unwrap();
        let mut desired = current.clone();
        desired.as_server_mut().unwrap().core = 4;
        desired.as_server_mut().unwrap().memory = 8;

        let handler = ServerVerticalScaler::new(cloud.clone());
        let sender = RecordingSender::default();
        handler
            .handle(&request(Computed::update(ResourceKind::Server, current, desired)), &sender)
            .await
            .unwrap();

        assert_eq!(
            sender.statuses(),
            vec![
                HandleStatus::Received,
                HandleStatus::Accepted,
                HandleStatus::Running,
                HandleStatus::Done
            ]
        );
        let servers = cloud.snapshot().await;
        assert_eq!(servers.len(), 1);
        assert_eq!(servers[0].as_server().unwrap().core, 4);
    }

    #[tokio::test]
    async fn ignores_noop() {
        let cloud = Arc::new(InMemoryCloud::new());
        let current = cloud.create(server(2, 4)).await.unwrap();
        let handler = ServerVerticalScaler::new(cloud);
        let sender = RecordingSender::default();
        handler
            .handle(&request(Computed::noop(ResourceKind::Server, current)), &sender)
            .await
            .unwrap();
        assert_eq!(sender.statuses(), vec![HandleStatus::Ignored]);
    }
}
