//! Resource resolution.
//!
//! A [`ResourceGraph`] is built fresh for every request. Each node is one
//! resolved cloud object (or a planned fleet instance) together with the
//! index of its parent node, so lineage is an acyclic chain of indices
//! rather than shared references:
//!
//! ```text
//!   nodes: [0] ELB "elb"          parent: None
//!          [1] Server "web-001"   parent: Some(0)
//!          [2] Server "web-002"   parent: Some(0)
//! ```
//!
//! `compute(refresh = false)` derives the desired state from the last
//! read plus plan selection; `compute(refresh = true)` re-reads every
//! node in the lineage and reports what is actually there.

use std::collections::HashSet;

use autoscaler_types::{
    CloudApi, CloudResource, Computed, RequestType, ResourceKind, ResourcePayload, ResourceSelector,
    ServerSpec,
};
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::context::RequestContext;
use crate::definition::{DefinitionSpec, ParentDefinition, ResourceDefinition, ServerGroupDefinition};
use crate::error::{CoreError, CoreResult};
use crate::plan::{
    ResourcePlan, default_elb_plans, default_router_plans, default_server_plans, desired_plan,
};

/// Tag prefix that lets a server be found again after its ID changed.
pub const RESOURCE_ID_MARKER_PREFIX: &str = "@autoscaler-resource-id=";

pub fn resource_id_marker(id: &str) -> String {
    format!("{RESOURCE_ID_MARKER_PREFIX}{id}")
}

/// Kinds whose cloud ID can change under a plan change.
fn carries_id_marker(kind: ResourceKind) -> bool {
    matches!(
        kind,
        ResourceKind::Server
            | ResourceKind::ServerGroupInstance
            | ResourceKind::Elb
            | ResourceKind::Router
            | ResourceKind::LoadBalancer
    )
}

#[derive(Debug, Clone, Copy)]
enum Origin<'a> {
    Definition(&'a ResourceDefinition),
    Parent(&'a ParentDefinition),
}

impl Origin<'_> {
    fn name(&self) -> &str {
        match self {
            Origin::Definition(def) => &def.name,
            Origin::Parent(_) => "",
        }
    }
}

#[derive(Debug, Clone)]
enum State {
    Existing(CloudResource),
    ToCreate(CloudResource),
    ToDelete(CloudResource),
    /// Read back after a delete and no longer there.
    Gone { name: String, zone: Option<String> },
}

#[derive(Debug)]
struct Resource<'a> {
    origin: Origin<'a>,
    kind: ResourceKind,
    state: State,
    parent: Option<usize>,
}

pub struct ResourceGraph<'a> {
    cloud: &'a dyn CloudApi,
    nodes: Vec<Resource<'a>>,
}

impl<'a> ResourceGraph<'a> {
    pub fn new(cloud: &'a dyn CloudApi) -> Self {
        Self {
            cloud,
            nodes: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn parent_of(&self, idx: usize) -> Option<usize> {
        self.nodes.get(idx).and_then(|n| n.parent)
    }

    fn push(&mut self, origin: Origin<'a>, kind: ResourceKind, state: State, parent: Option<usize>) -> usize {
        self.nodes.push(Resource {
            origin,
            kind,
            state,
            parent,
        });
        self.nodes.len() - 1
    }

    /// Resolve `def` into nodes and return their indices.
    ///
    /// `nesting_parent` is the enclosing definition's resource; an
    /// explicit `parent` on the definition takes precedence.
    pub async fn resolve(
        &mut self,
        def: &'a ResourceDefinition,
        nesting_parent: Option<usize>,
        ctx: &RequestContext,
    ) -> CoreResult<Vec<usize>> {
        let parent = match def.parent() {
            Some(p) => Some(self.resolve_parent(def, p).await?),
            None => nesting_parent,
        };

        let (kind, states) = match &def.spec {
            DefinitionSpec::ServerGroup(group) => (
                ResourceKind::ServerGroupInstance,
                self.plan_fleet(def, group, ctx).await?,
            ),
            _ => {
                let found = lookup(self.cloud, def).await?;
                if found.is_empty() {
                    return Err(CoreError::resolution(
                        &def.name,
                        format!("no resources found by selector ({})", selector_of(def)),
                    ));
                }
                let tag = carries_id_marker(def.kind()) && ctx.is_target(&def.name);
                let mut states = Vec::with_capacity(found.len());
                for resource in found {
                    let resource = if tag { self.ensure_marker(resource).await? } else { resource };
                    states.push(State::Existing(resource));
                }
                (def.kind(), states)
            }
        };

        debug!(definition = %def.name, %kind, count = states.len(), "resolved");
        Ok(states
            .into_iter()
            .map(|state| self.push(Origin::Definition(def), kind, state, parent))
            .collect())
    }

    async fn resolve_parent(&mut self, def: &ResourceDefinition, parent: &'a ParentDefinition) -> CoreResult<usize> {
        let kind = parent.parent_type.kind();
        let mut found = self.cloud.find(kind, &parent.selector).await?;
        if found.len() != 1 {
            return Err(CoreError::resolution(
                &def.name,
                format!(
                    "parent {kind} must resolve to exactly one resource, got {} ({})",
                    found.len(),
                    parent.selector
                ),
            ));
        }
        let resource = found.remove(0);
        Ok(self.push(Origin::Parent(parent), kind, State::Existing(resource), None))
    }

    /// Tag a resource with its own ID so it can be found after a re-create.
    ///
    /// Only the target's resources are tagged at resolve time; everything
    /// in a handled lineage is (re)tagged when it is refreshed.
    async fn ensure_marker(&self, mut resource: CloudResource) -> CoreResult<CloudResource> {
        let marker = resource_id_marker(&resource.id);
        if resource.has_tag(&marker) {
            return Ok(resource);
        }
        resource.tags.retain(|t| !t.starts_with(RESOURCE_ID_MARKER_PREFIX));
        resource.tags.push(marker);
        Ok(self.cloud.update(resource).await?)
    }

    async fn plan_fleet(
        &self,
        def: &ResourceDefinition,
        group: &ServerGroupDefinition,
        ctx: &RequestContext,
    ) -> CoreResult<Vec<State>> {
        let target = ctx.is_target(&def.name);
        let mut existing = Vec::new();
        for instance in lookup_fleet(self.cloud, group).await? {
            existing.push(if target { self.ensure_marker(instance).await? } else { instance });
        }

        let current = existing.len();
        let desired = if target {
            fleet_size(def, group, ctx, current)?
        } else {
            current
        };
        if desired != current {
            debug!(definition = %def.name, from = current, to = desired, "fleet size changes");
        }

        let mut taken: HashSet<String> = existing.iter().map(|r| r.name.clone()).collect();
        let mut states: Vec<State> = existing
            .into_iter()
            .enumerate()
            .map(|(i, r)| {
                if i < desired {
                    State::Existing(r)
                } else {
                    State::ToDelete(r)
                }
            })
            .collect();
        for _ in current..desired {
            let name = next_instance_name(&group.server_name_prefix, &taken);
            taken.insert(name.clone());
            states.push(State::ToCreate(instance_from_template(group, name)));
        }
        Ok(states)
    }

    /// Compute the snapshot for node `idx`, with its lineage attached.
    pub async fn compute(&mut self, idx: usize, ctx: &RequestContext, refresh: bool) -> CoreResult<Computed> {
        let mut chain = vec![idx];
        while let Some(parent) = self.parent_of(chain[chain.len() - 1]) {
            chain.push(parent);
        }

        if refresh {
            for &i in &chain {
                self.refresh(i).await?;
            }
        }

        let mut lineage: Option<Computed> = None;
        for &i in chain.iter().rev() {
            let computed = self.compute_one(i, ctx, refresh)?;
            lineage = Some(match lineage.take() {
                Some(parent) => computed.with_parent(parent),
                None => computed,
            });
        }
        lineage.ok_or_else(|| CoreError::resolution("", format!("resource #{idx} does not exist")))
    }

    fn compute_one(&self, idx: usize, ctx: &RequestContext, refresh: bool) -> CoreResult<Computed> {
        let node = &self.nodes[idx];
        let computed = match &node.state {
            State::Existing(current) => {
                let desired = match node.origin {
                    Origin::Definition(def) if !refresh && ctx.is_target(&def.name) => {
                        desired_state(def, ctx, current)?
                    }
                    _ => None,
                };
                match desired {
                    Some(desired) => Computed::update(node.kind, current.clone(), desired),
                    None => Computed::noop(node.kind, current.clone()),
                }
            }
            State::ToCreate(desired) => Computed::create(node.kind, desired.clone()),
            State::ToDelete(current) => Computed::delete(node.kind, current.clone()),
            State::Gone { name, zone } => Computed::absent(node.kind, name.clone(), zone.clone()),
        };
        let grace = match node.origin {
            Origin::Definition(def) => def.setup_grace_period(),
            Origin::Parent(_) => 0,
        };
        Ok(computed.with_setup_grace_period(grace))
    }

    /// Re-read node `idx` from the cloud.
    async fn refresh(&mut self, idx: usize) -> CoreResult<()> {
        let node = &self.nodes[idx];
        let (kind, definition) = (node.kind, node.origin.name().to_string());
        let state = node.state.clone();

        let refreshed = match state {
            State::Existing(r) => match self.read_by_id(kind, &r).await? {
                Some(found) => State::Existing(self.retag(kind, found).await?),
                None => {
                    return Err(CoreError::resolution(
                        &definition,
                        format!("refresh {kind} {:?}: resource {} disappeared", r.name, r.id),
                    ));
                }
            },
            State::ToDelete(r) => match self.read_by_id(kind, &r).await? {
                Some(found) => State::Existing(self.retag(kind, found).await?),
                None => State::Gone {
                    name: r.name,
                    zone: r.zone,
                },
            },
            State::ToCreate(r) => {
                let selector = ResourceSelector::by_name(r.name.clone()).in_zone(r.zone.clone());
                let mut found: Vec<CloudResource> = self
                    .cloud
                    .find(kind, &selector)
                    .await?
                    .into_iter()
                    .filter(|f| f.name == r.name)
                    .collect();
                if found.len() != 1 {
                    return Err(CoreError::resolution(
                        &definition,
                        format!(
                            "refresh {kind} {:?}: expected one resource by name, got {}",
                            r.name,
                            found.len()
                        ),
                    ));
                }
                State::Existing(self.retag(kind, found.remove(0)).await?)
            }
            gone @ State::Gone { .. } => gone,
        };
        self.nodes[idx].state = refreshed;
        Ok(())
    }

    async fn retag(&self, kind: ResourceKind, resource: CloudResource) -> CoreResult<CloudResource> {
        if carries_id_marker(kind) {
            self.ensure_marker(resource).await
        } else {
            Ok(resource)
        }
    }

    /// Read by ID, falling back to the marker tag for resources whose ID
    /// was rotated by a plan change.
    async fn read_by_id(&self, kind: ResourceKind, resource: &CloudResource) -> CoreResult<Option<CloudResource>> {
        if let Some(found) = self.cloud.read(kind, &resource.id).await? {
            return Ok(Some(found));
        }
        if !carries_id_marker(kind) {
            return Ok(None);
        }

        let selector = ResourceSelector::by_tag(resource_id_marker(&resource.id)).in_zone(resource.zone.clone());
        let mut found = self.cloud.find(kind, &selector).await?;
        match found.len() {
            0 => Ok(None),
            1 => {
                let found = found.remove(0);
                debug!(%kind, old_id = %resource.id, new_id = %found.id, name = %found.name, "found by marker tag");
                Ok(Some(found))
            }
            n => Err(CoreError::resolution(
                "",
                format!("{n} {kind} resources carry marker tag of {}", resource.id),
            )),
        }
    }
}

// ── Lookups ────────────────────────────────────────────────────────

fn selector_of(def: &ResourceDefinition) -> String {
    def.selector().map(ToString::to_string).unwrap_or_default()
}

/// Find the cloud resources a definition currently points at.
pub async fn lookup(cloud: &dyn CloudApi, def: &ResourceDefinition) -> CoreResult<Vec<CloudResource>> {
    match (&def.spec, def.selector()) {
        (DefinitionSpec::ServerGroup(group), _) => lookup_fleet(cloud, group).await,
        (_, Some(selector)) => Ok(cloud.find(def.kind(), selector).await?),
        (_, None) => Ok(Vec::new()),
    }
}

/// Instances of a server group, sorted by name.
pub async fn lookup_fleet(cloud: &dyn CloudApi, group: &ServerGroupDefinition) -> CoreResult<Vec<CloudResource>> {
    let prefix = format!("{}-", group.server_name_prefix);
    let selector = ResourceSelector::by_name(prefix.clone()).in_zone(Some(group.zone.clone()));
    let mut instances: Vec<CloudResource> = cloud
        .find(ResourceKind::ServerGroupInstance, &selector)
        .await?
        .into_iter()
        .filter(|r| r.name.starts_with(&prefix))
        .collect();
    instances.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(instances)
}

/// Most recent modification time among the resources of `def`.
///
/// An empty server group has no timestamp; any other definition that
/// resolves to nothing is an error.
pub async fn last_modified_at(cloud: &dyn CloudApi, def: &ResourceDefinition) -> CoreResult<Option<DateTime<Utc>>> {
    let found = lookup(cloud, def).await?;
    if found.is_empty() && !matches!(def.spec, DefinitionSpec::ServerGroup(_)) {
        return Err(CoreError::ResourceNotFound(def.name.clone()));
    }
    Ok(found.iter().map(|r| r.modified_at).max())
}

// ── Desired state ──────────────────────────────────────────────────

fn fleet_size(
    def: &ResourceDefinition,
    group: &ServerGroupDefinition,
    ctx: &RequestContext,
    current: usize,
) -> CoreResult<usize> {
    let request_type = ctx.request_type();
    let size = if group.plans.is_empty() {
        match request_type {
            RequestType::Up => current + 1,
            RequestType::Down => current.saturating_sub(1),
            RequestType::Keep => current,
        }
    } else {
        desired_plan(request_type, &ctx.request().desired_state_name, &current, &group.plans)
            .map_err(|e| CoreError::resolution(&def.name, e.to_string()))?
            .map_or(current, |plan| plan.size)
    };
    Ok(size.max(group.min_size).min(group.max_size))
}

fn next_instance_name(prefix: &str, taken: &HashSet<String>) -> String {
    (1..)
        .map(|i| format!("{prefix}-{i:03}"))
        .find(|name| !taken.contains(name))
        .unwrap_or_else(|| format!("{prefix}-new"))
}

fn instance_from_template(group: &ServerGroupDefinition, name: String) -> CloudResource {
    let template = &group.template;
    let mut resource = CloudResource::new(
        name,
        Some(group.zone.clone()),
        ResourcePayload::Server(ServerSpec {
            core: template.core,
            memory: template.memory,
            dedicated_cpu: template.dedicated_cpu,
            ip_addresses: Vec::new(),
        }),
    );
    resource.tags = template.tags.clone();
    resource.description = template.description.clone();
    resource
}

/// Apply plan selection to `current`. `None` means nothing changes.
fn desired_state(
    def: &ResourceDefinition,
    ctx: &RequestContext,
    current: &CloudResource,
) -> CoreResult<Option<CloudResource>> {
    let request_type = ctx.request_type();
    let name = ctx.request().desired_state_name.as_str();
    let plan_error = |e: crate::plan::PlanError| CoreError::resolution(&def.name, e.to_string());
    let mut desired = current.clone();

    match (&def.spec, &mut desired.payload) {
        (DefinitionSpec::Server(d), ResourcePayload::Server(spec)) => {
            let plans = if d.plans.is_empty() { default_server_plans() } else { d.plans.clone() };
            match desired_plan(request_type, name, &*spec, &plans).map_err(plan_error)? {
                Some(plan) if !plan.equals(spec) => {
                    spec.core = plan.core;
                    spec.memory = plan.memory;
                    spec.dedicated_cpu = d.dedicated_cpu;
                }
                _ => return Ok(None),
            }
        }
        (DefinitionSpec::Elb(d), ResourcePayload::Elb(spec)) => {
            let plans = if d.plans.is_empty() { default_elb_plans() } else { d.plans.clone() };
            match desired_plan(request_type, name, &*spec, &plans).map_err(plan_error)? {
                Some(plan) if !plan.equals(spec) => spec.cps = plan.cps,
                _ => return Ok(None),
            }
        }
        (DefinitionSpec::Router(d), ResourcePayload::Router(spec)) => {
            let plans = if d.plans.is_empty() { default_router_plans() } else { d.plans.clone() };
            match desired_plan(request_type, name, &*spec, &plans).map_err(plan_error)? {
                Some(plan) if !plan.equals(spec) => spec.band_width = plan.band_width,
                _ => return Ok(None),
            }
        }
        (DefinitionSpec::Server(_) | DefinitionSpec::Elb(_) | DefinitionSpec::Router(_), _) => {
            return Err(CoreError::resolution(
                &def.name,
                format!("resource {} is a {}, not a {}", current.id, current.kind(), def.kind()),
            ));
        }
        _ => return Ok(None),
    }
    Ok(Some(desired))
}

#[cfg(test)]
mod tests {
    use autoscaler_types::{ElbSpec, InMemoryCloud, Instruction, RouterSpec, ScalingRequest};
    use serde::Deserialize;

    use super::*;

    #[derive(Deserialize)]
    struct Defs {
        resources: Vec<ResourceDefinition>,
    }

    fn defs(toml_str: &str) -> Vec<ResourceDefinition> {
        toml::from_str::<Defs>(toml_str).unwrap().resources
    }

    fn server(name: &str, core: u32, memory: u32, tags: &[&str]) -> CloudResource {
        let mut r = CloudResource::new(
            name,
            Some("is1a".into()),
            ResourcePayload::Server(ServerSpec {
                core,
                memory,
                ip_addresses: vec![format!("192.0.2.{}", core + memory)],
                ..Default::default()
            }),
        );
        r.tags = tags.iter().map(|t| t.to_string()).collect();
        r
    }

    fn elb(name: &str) -> CloudResource {
        CloudResource::new(
            name,
            None,
            ResourcePayload::Elb(ElbSpec {
                cps: 100,
                virtual_ip: "198.51.100.1".into(),
                servers: Vec::new(),
            }),
        )
    }

    fn ctx(request_type: RequestType, target: &str) -> RequestContext {
        RequestContext::new(
            ScalingRequest {
                request_type,
                source: "default".into(),
                resource_name: target.into(),
                desired_state_name: String::new(),
                scaling_job_id: target.into(),
            },
            target,
        )
    }

    const SERVER: &str = r#"
        [[resources]]
        type = "Server"
        name = "web"
        selector = { tags = ["web"], zone = "is1a" }
        plans = [{ core = 2, memory = 4 }, { core = 4, memory = 8 }]
    "#;

    const FLEET: &str = r#"
        [[resources]]
        type = "ServerGroup"
        name = "fleet"
        server_name_prefix = "web"
        zone = "is1a"
        min_size = 1
        max_size = 3
        template = { core = 1, memory = 2, tags = ["fleet"] }
    "#;

    #[tokio::test]
    async fn target_server_gets_next_plan_and_marker() {
        let cloud = InMemoryCloud::with_resources(vec![server("web", 2, 4, &["web"])]);
        let defs = defs(SERVER);
        let ctx = ctx(RequestType::Up, "web");
        let mut graph = ResourceGraph::new(&cloud);

        let nodes = graph.resolve(&defs[0], None, &ctx).await.unwrap();
        assert_eq!(nodes.len(), 1);
        let computed = graph.compute(nodes[0], &ctx, false).await.unwrap();
        assert_eq!(computed.instruction(), Instruction::Update);
        let desired = computed.desired().unwrap().as_server().unwrap();
        assert_eq!((desired.core, desired.memory), (4, 8));
        let current = computed.current().unwrap();
        assert!(current.has_tag(&resource_id_marker(&current.id)));
    }

    #[tokio::test]
    async fn non_target_resources_are_noop() {
        let cloud = InMemoryCloud::with_resources(vec![server("web", 2, 4, &["web"])]);
        let defs = defs(SERVER);
        let ctx = ctx(RequestType::Up, "other");
        let mut graph = ResourceGraph::new(&cloud);

        let nodes = graph.resolve(&defs[0], None, &ctx).await.unwrap();
        let computed = graph.compute(nodes[0], &ctx, false).await.unwrap();
        assert_eq!(computed.instruction(), Instruction::Noop);
    }

    #[tokio::test]
    async fn largest_plan_cannot_go_up() {
        let cloud = InMemoryCloud::with_resources(vec![server("web", 4, 8, &["web"])]);
        let defs = defs(SERVER);
        let ctx = ctx(RequestType::Up, "web");
        let mut graph = ResourceGraph::new(&cloud);

        let nodes = graph.resolve(&defs[0], None, &ctx).await.unwrap();
        let computed = graph.compute(nodes[0], &ctx, false).await.unwrap();
        assert_eq!(computed.instruction(), Instruction::Noop);
    }

    #[tokio::test]
    async fn empty_selection_is_an_error() {
        let cloud = InMemoryCloud::new();
        let defs = defs(SERVER);
        let ctx = ctx(RequestType::Up, "web");
        let mut graph = ResourceGraph::new(&cloud);

        let err = graph.resolve(&defs[0], None, &ctx).await.unwrap_err();
        assert!(matches!(err, CoreError::Resolution { .. }), "{err}");
    }

    #[tokio::test]
    async fn explicit_parent_is_attached_to_lineage() {
        let cloud = InMemoryCloud::with_resources(vec![server("web", 2, 4, &["web"]), elb("elb")]);
        let defs = defs(
            r#"
            [[resources]]
            type = "Server"
            name = "web"
            selector = { tags = ["web"], zone = "is1a" }
            parent = { type = "ELB", selector = { names = ["elb"] } }
        "#,
        );
        let ctx = ctx(RequestType::Keep, "web");
        let mut graph = ResourceGraph::new(&cloud);

        let nodes = graph.resolve(&defs[0], None, &ctx).await.unwrap();
        assert_eq!(graph.len(), 2);
        let computed = graph.compute(nodes[0], &ctx, false).await.unwrap();
        let parent = computed.parent().unwrap();
        assert_eq!(parent.kind(), ResourceKind::Elb);
        assert_eq!(parent.zone(), None);
        assert_eq!(parent.instruction(), Instruction::Noop);
    }

    #[tokio::test]
    async fn fleet_grows_into_first_free_name() {
        let cloud = InMemoryCloud::with_resources(vec![server("web-002", 1, 2, &[])]);
        let defs = defs(FLEET);
        let ctx = ctx(RequestType::Up, "fleet");
        let mut graph = ResourceGraph::new(&cloud);

        let nodes = graph.resolve(&defs[0], None, &ctx).await.unwrap();
        assert_eq!(nodes.len(), 2);
        let created = graph.compute(nodes[1], &ctx, false).await.unwrap();
        assert_eq!(created.instruction(), Instruction::Create);
        assert_eq!(created.kind(), ResourceKind::ServerGroupInstance);
        assert_eq!(created.name(), "web-001");
        assert!(created.desired().unwrap().has_tag("fleet"));
    }

    #[tokio::test]
    async fn fleet_shrinks_from_the_end_and_respects_min() {
        let cloud = InMemoryCloud::with_resources(vec![
            server("web-001", 1, 2, &[]),
            server("web-002", 1, 2, &[]),
        ]);
        let defs = defs(FLEET);
        let ctx = ctx(RequestType::Down, "fleet");
        let mut graph = ResourceGraph::new(&cloud);

        let nodes = graph.resolve(&defs[0], None, &ctx).await.unwrap();
        let first = graph.compute(nodes[0], &ctx, false).await.unwrap();
        let second = graph.compute(nodes[1], &ctx, false).await.unwrap();
        assert_eq!(first.instruction(), Instruction::Noop);
        assert_eq!(second.instruction(), Instruction::Delete);
        assert_eq!(second.name(), "web-002");

        // One instance left: the minimum holds.
        let cloud = InMemoryCloud::with_resources(vec![server("web-001", 1, 2, &[])]);
        let mut graph = ResourceGraph::new(&cloud);
        let nodes = graph.resolve(&defs[0], None, &ctx).await.unwrap();
        assert_eq!(nodes.len(), 1);
        let only = graph.compute(nodes[0], &ctx, false).await.unwrap();
        assert_eq!(only.instruction(), Instruction::Noop);
    }

    #[tokio::test]
    async fn refresh_follows_rotated_id_via_marker() {
        let cloud = InMemoryCloud::with_resources(vec![server("web", 2, 4, &["web"])]);
        let defs = defs(SERVER);
        let ctx = ctx(RequestType::Up, "web");
        let mut graph = ResourceGraph::new(&cloud);

        let nodes = graph.resolve(&defs[0], None, &ctx).await.unwrap();
        let before = graph.compute(nodes[0], &ctx, false).await.unwrap();
        let updated = cloud.update(before.desired().unwrap().clone()).await.unwrap();
        assert_ne!(updated.id, before.id());

        let after = graph.compute(nodes[0], &ctx, true).await.unwrap();
        assert_eq!(after.instruction(), Instruction::Noop);
        assert_eq!(after.id(), updated.id);
    }

    /// Delete `current` and create it again under a new ID, keeping its tags.
    async fn recreate(cloud: &InMemoryCloud, kind: ResourceKind, current: &CloudResource) -> CloudResource {
        cloud.delete(kind, &current.id).await.unwrap();
        let recreated = cloud.create(current.clone()).await.unwrap();
        assert_ne!(recreated.id, current.id);
        recreated
    }

    #[tokio::test]
    async fn refresh_finds_recreated_router_and_retags_it() {
        let router = CloudResource::new(
            "rt",
            Some("is1a".into()),
            ResourcePayload::Router(RouterSpec { band_width: 100 }),
        );
        let cloud = InMemoryCloud::with_resources(vec![router]);
        let defs = defs(
            r#"
            [[resources]]
            type = "Router"
            name = "rt"
            selector = { names = ["rt"], zone = "is1a" }
        "#,
        );
        let ctx = ctx(RequestType::Up, "rt");
        let mut graph = ResourceGraph::new(&cloud);

        let nodes = graph.resolve(&defs[0], None, &ctx).await.unwrap();
        let before = graph.compute(nodes[0], &ctx, false).await.unwrap();
        let current = before.current().unwrap().clone();
        assert!(current.has_tag(&resource_id_marker(&current.id)));

        let recreated = recreate(&cloud, ResourceKind::Router, &current).await;
        let after = graph.compute(nodes[0], &ctx, true).await.unwrap();
        assert_eq!(after.id(), recreated.id);
        let tags = &after.current().unwrap().tags;
        assert!(tags.contains(&resource_id_marker(&recreated.id)));
        assert!(!tags.contains(&resource_id_marker(&current.id)));
    }

    #[tokio::test]
    async fn refresh_finds_recreated_elb() {
        let cloud = InMemoryCloud::with_resources(vec![elb("elb")]);
        let defs = defs(
            r#"
            [[resources]]
            type = "ELB"
            name = "elb"
            selector = { names = ["elb"] }
        "#,
        );
        let ctx = ctx(RequestType::Up, "elb");
        let mut graph = ResourceGraph::new(&cloud);

        let nodes = graph.resolve(&defs[0], None, &ctx).await.unwrap();
        let before = graph.compute(nodes[0], &ctx, false).await.unwrap();
        let current = before.current().unwrap().clone();
        assert!(current.has_tag(&resource_id_marker(&current.id)));

        let recreated = recreate(&cloud, ResourceKind::Elb, &current).await;
        let after = graph.compute(nodes[0], &ctx, true).await.unwrap();
        assert_eq!(after.kind(), ResourceKind::Elb);
        assert_eq!(after.id(), recreated.id);
    }

    #[tokio::test]
    async fn resolving_a_non_target_writes_nothing() {
        let cloud = InMemoryCloud::with_resources(vec![server("web", 2, 4, &["web"])]);
        let seeded = cloud
            .find(ResourceKind::Server, &ResourceSelector::by_name("web"))
            .await
            .unwrap()
            .remove(0);
        let defs = defs(SERVER);
        let ctx = ctx(RequestType::Keep, "other");
        let mut graph = ResourceGraph::new(&cloud);

        graph.resolve(&defs[0], None, &ctx).await.unwrap();
        let read = cloud.read(ResourceKind::Server, &seeded.id).await.unwrap().unwrap();
        assert_eq!(read.tags, vec!["web".to_string()]);
        assert_eq!(read.modified_at, seeded.modified_at);
    }

    #[tokio::test]
    async fn refresh_of_deleted_instance_is_absent() {
        let cloud = InMemoryCloud::with_resources(vec![
            server("web-001", 1, 2, &[]),
            server("web-002", 1, 2, &[]),
        ]);
        let defs = defs(FLEET);
        let ctx = ctx(RequestType::Down, "fleet");
        let mut graph = ResourceGraph::new(&cloud);

        let nodes = graph.resolve(&defs[0], None, &ctx).await.unwrap();
        let before = graph.compute(nodes[1], &ctx, false).await.unwrap();
        cloud.delete(ResourceKind::Server, before.id()).await.unwrap();

        let after = graph.compute(nodes[1], &ctx, true).await.unwrap();
        assert_eq!(after.instruction(), Instruction::Noop);
        assert_eq!(after.id(), "");
        assert_eq!(after.name(), "web-002");
    }

    #[tokio::test]
    async fn last_modified_of_empty_fleet_is_none() {
        let cloud = InMemoryCloud::new();
        assert_eq!(last_modified_at(&cloud, &defs(FLEET)[0]).await.unwrap(), None);
        let err = last_modified_at(&cloud, &defs(SERVER)[0]).await.unwrap_err();
        assert!(matches!(err, CoreError::ResourceNotFound(name) if name == "web"));
    }

    #[test]
    fn instance_names_fill_gaps() {
        let taken: HashSet<String> = ["web-001".to_string(), "web-003".to_string()].into();
        assert_eq!(next_instance_name("web", &taken), "web-002");
    }
}
