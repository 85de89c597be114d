//! Builtin handlers.
//!
//! Registered in a fixed order. PreHandle detaches servers from their
//! parents before any scaler touches them, and PostHandle re-attaches
//! them once the refreshed state is known.
//!
//! ```text
//!   elb-vertical-scaler
//!   elb-servers-handler ─┐
//!   gslb-servers-handler │ attach / detach servers
//!   dns-servers-handler  │ on their parent
//!   load-balancer-servers-handler
//!   router-vertical-scaler
//!   server-horizontal-scaler
//!   server-vertical-scaler
//!   logging
//! ```

mod logging;
mod parent_servers;
mod server_horizontal;
mod server_vertical;
mod vertical;

use std::sync::Arc;
use std::time::Duration;

use autoscaler_types::{CloudApi, HandleRequest, HandleStatus};

pub use logging::LoggingHandler;
pub use parent_servers::ParentServersHandler;
pub use server_horizontal::ServerHorizontalScaler;
pub use server_vertical::ServerVerticalScaler;
pub use vertical::{ElbVerticalScaler, RouterVerticalScaler};

use crate::error::HandlerResult;
use crate::handler::BuiltinHandler;
use crate::sender::ResponseSender;

/// Every builtin handler, in execution order.
pub fn builtin_handlers(cloud: Arc<dyn CloudApi>) -> Vec<Arc<dyn BuiltinHandler>> {
    vec![
        Arc::new(ElbVerticalScaler::new(cloud.clone())),
        Arc::new(ParentServersHandler::elb(cloud.clone())),
        Arc::new(ParentServersHandler::gslb(cloud.clone())),
        Arc::new(ParentServersHandler::dns(cloud.clone())),
        Arc::new(ParentServersHandler::load_balancer(cloud.clone())),
        Arc::new(RouterVerticalScaler::new(cloud.clone())),
        Arc::new(ServerHorizontalScaler::new(cloud.clone())),
        Arc::new(ServerVerticalScaler::new(cloud)),
        Arc::new(LoggingHandler),
    ]
}

/// Names of every builtin handler, in execution order.
pub const BUILTIN_HANDLER_NAMES: &[&str] = &[
    vertical::ELB_VERTICAL_SCALER,
    parent_servers::ELB_SERVERS_HANDLER,
    parent_servers::GSLB_SERVERS_HANDLER,
    parent_servers::DNS_SERVERS_HANDLER,
    parent_servers::LOAD_BALANCER_SERVERS_HANDLER,
    vertical::ROUTER_VERTICAL_SCALER,
    server_horizontal::SERVER_HORIZONTAL_SCALER,
    server_vertical::SERVER_VERTICAL_SCALER,
    logging::LOGGING,
];

async fn ignore(req: &HandleRequest, sender: &dyn ResponseSender) -> HandlerResult<()> {
    sender
        .report(&req.request.scaling_job_id, HandleStatus::Ignored, "")
        .await
}

/// Acknowledge a request this handler is going to act on.
async fn accept(job: &str, sender: &dyn ResponseSender) -> HandlerResult<()> {
    sender.report(job, HandleStatus::Received, "").await?;
    sender.report(job, HandleStatus::Accepted, "").await
}

/// Hold the handler while a freshly booted server finishes its setup.
async fn wait_for_setup(req: &HandleRequest, sender: &dyn ResponseSender) -> HandlerResult<()> {
    let secs = req.resource.setup_grace_period();
    if secs == 0 {
        return Ok(());
    }
    sender
        .report(
            &req.request.scaling_job_id,
            HandleStatus::Running,
            &format!("waiting for setup to complete: setup_grace_period={secs}"),
        )
        .await?;
    tokio::time::sleep(Duration::from_secs(secs)).await;
    Ok(())
}

#[cfg(test)]
pub(crate) mod testing {
    use autoscaler_types::{Computed, RequestType, ScalingRequest};

    use super::*;

    pub fn request(resource: Computed) -> HandleRequest {
        HandleRequest {
            request: ScalingRequest {
                request_type: RequestType::Up,
                source: "default".into(),
                resource_name: "default".into(),
                desired_state_name: "default".into(),
                scaling_job_id: "job".into(),
            },
            resource,
        }
    }

    #[test]
    fn names_match_registration_order() {
        let cloud: Arc<dyn CloudApi> = Arc::new(autoscaler_types::InMemoryCloud::new());
        let names: Vec<String> = builtin_handlers(cloud)
            .iter()
            .map(|h| h.name().to_string())
            .collect();
        assert_eq!(names, BUILTIN_HANDLER_NAMES);
    }
}
