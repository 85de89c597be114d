//! Keeps a server's membership on its parent in step with scaling.
//!
//! A server that is about to be resized is detached first so the parent
//! stops sending it traffic; after the refreshed state shows it updated
//! or created, it is attached again. Servers being deleted are removed
//! from the parent before they go away.

use std::sync::Arc;

use async_trait::async_trait;
use autoscaler_types::{
    BackendServer, CloudApi, Computed, DnsRecord, HandleRequest, HandleResult, HandleStatus,
    Instruction, PostHandleRequest, ResourceKind, ResourcePayload,
};
use tracing::info;

use super::accept;
use crate::error::{HandlerError, HandlerResult};
use crate::handler::BuiltinHandler;
use crate::sender::ResponseSender;

pub(super) const ELB_SERVERS_HANDLER: &str = "elb-servers-handler";
pub(super) const GSLB_SERVERS_HANDLER: &str = "gslb-servers-handler";
pub(super) const DNS_SERVERS_HANDLER: &str = "dns-servers-handler";
pub(super) const LOAD_BALANCER_SERVERS_HANDLER: &str = "load-balancer-servers-handler";

const DEFAULT_BACKEND_PORT: u16 = 80;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Membership {
    /// Keep the entry but stop routing to it.
    Detach,
    /// Route to the server, adding an entry when missing.
    Attach,
    Remove,
}

pub struct ParentServersHandler {
    name: &'static str,
    parent_kind: ResourceKind,
    cloud: Arc<dyn CloudApi>,
}

impl ParentServersHandler {
    pub fn elb(cloud: Arc<dyn CloudApi>) -> Self {
        Self::new(ELB_SERVERS_HANDLER, ResourceKind::Elb, cloud)
    }

    pub fn gslb(cloud: Arc<dyn CloudApi>) -> Self {
        Self::new(GSLB_SERVERS_HANDLER, ResourceKind::Gslb, cloud)
    }

    pub fn dns(cloud: Arc<dyn CloudApi>) -> Self {
        Self::new(DNS_SERVERS_HANDLER, ResourceKind::Dns, cloud)
    }

    pub fn load_balancer(cloud: Arc<dyn CloudApi>) -> Self {
        Self::new(LOAD_BALANCER_SERVERS_HANDLER, ResourceKind::LoadBalancer, cloud)
    }

    fn new(name: &'static str, parent_kind: ResourceKind, cloud: Arc<dyn CloudApi>) -> Self {
        Self {
            name,
            parent_kind,
            cloud,
        }
    }

    /// The parent and the server's address, when this handler applies.
    fn target<'a>(&self, resource: &'a Computed) -> Option<(&'a Computed, &'a str)> {
        if !matches!(resource.kind(), ResourceKind::Server | ResourceKind::ServerGroupInstance) {
            return None;
        }
        let parent = resource.parent().filter(|p| p.kind() == self.parent_kind)?;
        let ip = resource
            .current()
            .or(resource.desired())
            .and_then(|r| r.as_server())
            .and_then(|s| s.primary_ip())?;
        Some((parent, ip))
    }

    async fn apply(
        &self,
        job: &str,
        op: Membership,
        parent: &Computed,
        ip: &str,
        server_name: &str,
        sender: &dyn ResponseSender,
    ) -> HandlerResult<()> {
        accept(job, sender).await?;
        let verb = match op {
            Membership::Detach => "detaching",
            Membership::Attach => "attaching",
            Membership::Remove => "removing",
        };
        sender
            .report(
                job,
                HandleStatus::Running,
                &format!("{verb} {ip} on {} {}", self.parent_kind, parent.name()),
            )
            .await?;

        let mut current = self
            .cloud
            .read(self.parent_kind, parent.id())
            .await?
            .ok_or_else(|| HandlerError::InvalidRequest(format!(
                "{} {} not found",
                self.parent_kind,
                parent.id()
            )))?;
        if apply_membership(&mut current.payload, op, ip, server_name) {
            self.cloud.update(current).await?;
            info!(handler = self.name, parent = %parent.id(), %ip, ?op, "parent membership changed");
        }
        sender.report(job, HandleStatus::Done, "").await
    }
}

#[async_trait]
impl BuiltinHandler for ParentServersHandler {
    fn name(&self) -> &str {
        self.name
    }

    async fn pre_handle(&self, req: &HandleRequest, sender: &dyn ResponseSender) -> HandlerResult<()> {
        let job = &req.request.scaling_job_id;
        let op = match req.resource.instruction() {
            Instruction::Update => Membership::Detach,
            Instruction::Delete => Membership::Remove,
            Instruction::Noop | Instruction::Create => {
                return sender.report(job, HandleStatus::Ignored, "").await;
            }
        };
        match self.target(&req.resource) {
            Some((parent, ip)) => {
                self.apply(job, op, parent, ip, req.resource.name(), sender)
                    .await
            }
            None => sender.report(job, HandleStatus::Ignored, "").await,
        }
    }

    async fn post_handle(&self, req: &PostHandleRequest, sender: &dyn ResponseSender) -> HandlerResult<()> {
        let job = &req.request.scaling_job_id;
        let target = match req.result {
            HandleResult::Updated | HandleResult::Created => self.target(&req.resource),
            HandleResult::Deleted | HandleResult::Unknown => None,
        };
        match target {
            Some((parent, ip)) => {
                self.apply(job, Membership::Attach, parent, ip, req.resource.name(), sender)
                    .await
            }
            None => sender.report(job, HandleStatus::Ignored, "").await,
        }
    }
}

fn apply_membership(payload: &mut ResourcePayload, op: Membership, ip: &str, server_name: &str) -> bool {
    match payload {
        ResourcePayload::Elb(elb) => apply_backends(&mut elb.servers, op, ip, None),
        ResourcePayload::Gslb(gslb) => apply_backends(&mut gslb.servers, op, ip, None),
        ResourcePayload::LoadBalancer(lb) => lb
            .virtual_ips
            .iter_mut()
            .fold(false, |changed, vip| {
                apply_backends(&mut vip.servers, op, ip, Some(vip.port)) || changed
            }),
        ResourcePayload::Dns(dns) => apply_records(&mut dns.records, op, ip, server_name),
        ResourcePayload::Server(_) | ResourcePayload::Router(_) => false,
    }
}

fn apply_backends(servers: &mut Vec<BackendServer>, op: Membership, ip: &str, port: Option<u16>) -> bool {
    let before = servers.clone();
    match op {
        Membership::Detach => servers
            .iter_mut()
            .filter(|s| s.ip_address == ip)
            .for_each(|s| s.enabled = false),
        Membership::Attach => {
            if servers.iter().any(|s| s.ip_address == ip) {
                servers
                    .iter_mut()
                    .filter(|s| s.ip_address == ip)
                    .for_each(|s| s.enabled = true);
            } else {
                let port = port
                    .or_else(|| servers.first().map(|s| s.port))
                    .unwrap_or(DEFAULT_BACKEND_PORT);
                servers.push(BackendServer {
                    ip_address: ip.to_string(),
                    port,
                    enabled: true,
                });
            }
        }
        Membership::Remove => servers.retain(|s| s.ip_address != ip),
    }
    *servers != before
}

fn apply_records(records: &mut Vec<DnsRecord>, op: Membership, ip: &str, server_name: &str) -> bool {
    let is_server_record = |r: &DnsRecord| r.record_type == "A" && r.value == ip;
    let before = records.len();
    match op {
        Membership::Detach | Membership::Remove => {
            records.retain(|r| !is_server_record(r));
            records.len() != before
        }
        Membership::Attach => {
            if records.iter().any(is_server_record) {
                return false;
            }
            records.push(DnsRecord {
                name: server_name.to_string(),
                record_type: "A".to_string(),
                value: ip.to_string(),
                ttl: 300,
            });
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use autoscaler_types::{
        CloudResource, DnsSpec, ElbSpec, InMemoryCloud, LoadBalancerSpec, ServerSpec, VirtualIp,
    };

    use super::*;
    use crate::builtin::testing::request;
    use crate::sender::testing::RecordingSender;

    fn server(ip: &str) -> CloudResource {
        let mut r = CloudResource::new(
            "web-001",
            Some("is1a".into()),
            ResourcePayload::Server(ServerSpec {
                core: 1,
                memory: 1,
                ip_addresses: vec![ip.to_string()],
                ..Default::default()
            }),
        );
        r.id = "100000000001".into();
        r
    }

    fn post(request: HandleRequest, result: HandleResult) -> PostHandleRequest {
        PostHandleRequest {
            request: request.request,
            result,
            resource: request.resource,
        }
    }

    async fn elb_cloud(ip: &str) -> (Arc<InMemoryCloud>, CloudResource) {
        let cloud = Arc::new(InMemoryCloud::new());
        let elb = cloud
            .create(CloudResource::new(
                "elb",
                None,
                ResourcePayload::Elb(ElbSpec {
                    cps: 100,
                    virtual_ip: "192.0.2.1".into(),
                    servers: vec![BackendServer {
                        ip_address: ip.into(),
                        port: 8080,
                        enabled: true,
                    }],
                }),
            ))
            .await
            .unwrap();
        (cloud, elb)
    }

    fn elb_servers(r: &CloudResource) -> Vec<BackendServer> {
        match &r.payload {
            ResourcePayload::Elb(elb) => elb.servers.clone(),
            _ => panic!("not an elb"),
        }
    }

    #[tokio::test]
    async fn detaches_before_update_and_attaches_after() {
        let (cloud, elb) = elb_cloud("10.0.0.1").await;
        let handler = ParentServersHandler::elb(cloud.clone());
        let parent = Computed::noop(ResourceKind::Elb, elb.clone());

        let mut desired = server("10.0.0.1");
        desired.as_server_mut().unwrap().core = 2;
        let req = request(
            Computed::update(ResourceKind::Server, server("10.0.0.1"), desired).with_parent(parent.clone()),
        );

        let sender = RecordingSender::default();
        handler.pre_handle(&req, &sender).await.unwrap();
        let after = cloud.read(ResourceKind::Elb, &elb.id).await.unwrap().unwrap();
        assert!(!elb_servers(&after)[0].enabled);
        assert_eq!(sender.statuses()[..2], [HandleStatus::Received, HandleStatus::Accepted]);
        assert_eq!(sender.statuses().last(), Some(&HandleStatus::Done));

        let refreshed = request(Computed::noop(ResourceKind::Server, server("10.0.0.1")).with_parent(parent));
        handler
            .post_handle(&post(refreshed, HandleResult::Updated), &sender)
            .await
            .unwrap();
        let after = cloud.read(ResourceKind::Elb, &elb.id).await.unwrap().unwrap();
        assert!(elb_servers(&after)[0].enabled);
        assert_eq!(elb_servers(&after)[0].port, 8080);
    }

    #[tokio::test]
    async fn created_server_is_registered() {
        let (cloud, elb) = elb_cloud("10.0.0.1").await;
        let handler = ParentServersHandler::elb(cloud.clone());
        let parent = Computed::noop(ResourceKind::Elb, elb.clone());

        let refreshed = request(
            Computed::noop(ResourceKind::ServerGroupInstance, server("10.0.0.2")).with_parent(parent),
        );
        let sender = RecordingSender::default();
        handler
            .post_handle(&post(refreshed, HandleResult::Created), &sender)
            .await
            .unwrap();

        let after = cloud.read(ResourceKind::Elb, &elb.id).await.unwrap().unwrap();
        let servers = elb_servers(&after);
        assert_eq!(servers.len(), 2);
        assert_eq!(servers[1].ip_address, "10.0.0.2");
        assert_eq!(servers[1].port, 8080);
    }

    #[tokio::test]
    async fn other_parent_kinds_are_ignored() {
        let (cloud, elb) = elb_cloud("10.0.0.1").await;
        let handler = ParentServersHandler::gslb(cloud);
        let mut desired = server("10.0.0.1");
        desired.as_server_mut().unwrap().core = 2;
        let req = request(
            Computed::update(ResourceKind::Server, server("10.0.0.1"), desired)
                .with_parent(Computed::noop(ResourceKind::Elb, elb)),
        );

        let sender = RecordingSender::default();
        handler.pre_handle(&req, &sender).await.unwrap();
        assert_eq!(sender.statuses(), vec![HandleStatus::Ignored]);
    }

    #[tokio::test]
    async fn noop_is_ignored_without_reading_parent() {
        let cloud = Arc::new(InMemoryCloud::new());
        let handler = ParentServersHandler::dns(cloud);
        let req = request(Computed::noop(ResourceKind::Server, server("10.0.0.1")));
        let sender = RecordingSender::default();
        handler.pre_handle(&req, &sender).await.unwrap();
        assert_eq!(sender.statuses(), vec![HandleStatus::Ignored]);
    }

    #[test]
    fn dns_records_follow_membership() {
        let mut payload = ResourcePayload::Dns(DnsSpec {
            zone_name: "example.com".into(),
            records: vec![],
        });
        assert!(apply_membership(&mut payload, Membership::Attach, "10.0.0.1", "web-001"));
        assert!(!apply_membership(&mut payload, Membership::Attach, "10.0.0.1", "web-001"));
        assert!(apply_membership(&mut payload, Membership::Detach, "10.0.0.1", "web-001"));
        let ResourcePayload::Dns(dns) = payload else { unreachable!() };
        assert!(dns.records.is_empty());
    }

    #[test]
    fn load_balancer_uses_vip_port() {
        let mut payload = ResourcePayload::LoadBalancer(LoadBalancerSpec {
            virtual_ips: vec![VirtualIp {
                address: "192.0.2.10".into(),
                port: 443,
                servers: vec![],
            }],
        });
        assert!(apply_membership(&mut payload, Membership::Attach, "10.0.0.1", "web-001"));
        let ResourcePayload::LoadBalancer(lb) = payload else { unreachable!() };
        assert_eq!(lb.virtual_ips[0].servers[0].port, 443);
    }

    #[test]
    fn remove_drops_backend_entry() {
        let mut servers = vec![BackendServer {
            ip_address: "10.0.0.1".into(),
            port: 80,
            enabled: true,
        }];
        assert!(apply_backends(&mut servers, Membership::Remove, "10.0.0.1", None));
        assert!(servers.is_empty());
    }
}
