//! Resource definitions.
//!
//! Definitions are the static, config-derived description of what the
//! autoscaler manages. They form a tree: a definition's `resources` are
//! its children, which see the resolved parent as their lineage.
//!
//! ```toml
//! [[resources]]
//! type = "ELB"
//! name = "elb"
//! selector = { names = ["example-elb"] }
//!
//!   [[resources.resources]]
//!   type = "Server"
//!   name = "web"
//!   selector = { tags = ["web"], zone = "is1a" }
//!   plans = [{ core = 2, memory = 4 }, { core = 4, memory = 8 }]
//! ```

use autoscaler_types::{DEFAULT_NAME, ResourceKind, ResourceSelector};
use serde::{Deserialize, Serialize};

use crate::job::CoolDown;
use crate::plan::{ElbPlan, RouterPlan, ServerGroupPlan, ServerPlan};

/// Setup grace period for definitions that boot servers.
pub const DEFAULT_SERVER_SETUP_GRACE_PERIOD: u64 = 60;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceDefinition {
    /// Unique across the tree; filled in at load time when omitted.
    #[serde(default)]
    pub name: String,
    #[serde(flatten)]
    pub spec: DefinitionSpec,
    /// Seconds to wait for a booted server to finish its setup.
    #[serde(default)]
    pub setup_grace_period: Option<u64>,
    /// Overrides the global cooldown for jobs targeting this definition.
    #[serde(default)]
    pub cooldown: Option<CoolDown>,
    #[serde(default)]
    pub resources: Vec<ResourceDefinition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DefinitionSpec {
    Server(ServerDefinition),
    ServerGroup(ServerGroupDefinition),
    #[serde(rename = "ELB")]
    Elb(ElbDefinition),
    #[serde(rename = "GSLB")]
    Gslb(SelectorDefinition),
    #[serde(rename = "DNS")]
    Dns(SelectorDefinition),
    LoadBalancer(SelectorDefinition),
    Router(RouterDefinition),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerDefinition {
    pub selector: ResourceSelector,
    /// Defaults to the standard core/memory ladder when empty.
    #[serde(default)]
    pub plans: Vec<ServerPlan>,
    #[serde(default)]
    pub dedicated_cpu: bool,
    #[serde(default)]
    pub parent: Option<ParentDefinition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerGroupDefinition {
    /// Instances are named `{server_name_prefix}-{NNN}`.
    pub server_name_prefix: String,
    pub zone: String,
    pub min_size: usize,
    pub max_size: usize,
    #[serde(default)]
    pub plans: Vec<ServerGroupPlan>,
    pub template: ServerTemplate,
    #[serde(default)]
    pub parent: Option<ParentDefinition>,
}

/// Shape of servers created for a server group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerTemplate {
    pub core: u32,
    pub memory: u32,
    #[serde(default)]
    pub dedicated_cpu: bool,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElbDefinition {
    pub selector: ResourceSelector,
    #[serde(default)]
    pub plans: Vec<ElbPlan>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouterDefinition {
    pub selector: ResourceSelector,
    #[serde(default)]
    pub plans: Vec<RouterPlan>,
}

/// Definitions that have no plans and only locate a resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectorDefinition {
    pub selector: ResourceSelector,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParentType {
    #[serde(rename = "ELB")]
    Elb,
    #[serde(rename = "GSLB")]
    Gslb,
    #[serde(rename = "DNS")]
    Dns,
    LoadBalancer,
    Router,
}

impl ParentType {
    pub fn kind(self) -> ResourceKind {
        match self {
            Self::Elb => ResourceKind::Elb,
            Self::Gslb => ResourceKind::Gslb,
            Self::Dns => ResourceKind::Dns,
            Self::LoadBalancer => ResourceKind::LoadBalancer,
            Self::Router => ResourceKind::Router,
        }
    }
}

/// A parent referenced from a server definition; must resolve to exactly
/// one resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParentDefinition {
    #[serde(rename = "type")]
    pub parent_type: ParentType,
    pub selector: ResourceSelector,
}

impl ResourceDefinition {
    pub fn kind(&self) -> ResourceKind {
        match &self.spec {
            DefinitionSpec::Server(_) => ResourceKind::Server,
            DefinitionSpec::ServerGroup(_) => ResourceKind::ServerGroup,
            DefinitionSpec::Elb(_) => ResourceKind::Elb,
            DefinitionSpec::Gslb(_) => ResourceKind::Gslb,
            DefinitionSpec::Dns(_) => ResourceKind::Dns,
            DefinitionSpec::LoadBalancer(_) => ResourceKind::LoadBalancer,
            DefinitionSpec::Router(_) => ResourceKind::Router,
        }
    }

    /// `None` for server groups, which locate instances by name prefix.
    pub fn selector(&self) -> Option<&ResourceSelector> {
        match &self.spec {
            DefinitionSpec::Server(d) => Some(&d.selector),
            DefinitionSpec::Elb(d) => Some(&d.selector),
            DefinitionSpec::Router(d) => Some(&d.selector),
            DefinitionSpec::Gslb(d) | DefinitionSpec::Dns(d) | DefinitionSpec::LoadBalancer(d) => {
                Some(&d.selector)
            }
            DefinitionSpec::ServerGroup(_) => None,
        }
    }

    pub fn parent(&self) -> Option<&ParentDefinition> {
        match &self.spec {
            DefinitionSpec::Server(d) => d.parent.as_ref(),
            DefinitionSpec::ServerGroup(d) => d.parent.as_ref(),
            _ => None,
        }
    }

    pub fn setup_grace_period(&self) -> u64 {
        self.setup_grace_period.unwrap_or(match self.kind() {
            ResourceKind::Server | ResourceKind::ServerGroup => DEFAULT_SERVER_SETUP_GRACE_PERIOD,
            _ => 0,
        })
    }

    /// Depth-first search by name.
    pub fn find(&self, name: &str) -> Option<&ResourceDefinition> {
        if self.name == name {
            return Some(self);
        }
        self.resources.iter().find_map(|child| child.find(name))
    }

    /// Visit this definition and all descendants, parents first.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a ResourceDefinition)) {
        visit(self);
        for child in &self.resources {
            child.walk(visit);
        }
    }
}

/// Locate the definition a request targets.
///
/// Returns the index of the top-level definition that contains it and
/// the definition itself. An empty or `"default"` name targets the sole
/// top-level definition when there is exactly one.
pub fn find_target<'a>(
    definitions: &'a [ResourceDefinition],
    resource_name: &str,
) -> Option<(usize, &'a ResourceDefinition)> {
    if (resource_name.is_empty() || resource_name == DEFAULT_NAME)
        && let [only] = definitions
    {
        return Some((0, only));
    }
    definitions
        .iter()
        .enumerate()
        .find_map(|(i, def)| def.find(resource_name).map(|found| (i, found)))
}

/// Give every unnamed definition a name derived from its position.
pub(crate) fn assign_names(definitions: &mut [ResourceDefinition]) {
    fn assign(def: &mut ResourceDefinition, path: &str) {
        if def.name.is_empty() {
            def.name = format!("{}-{path}", def.kind().as_str().to_lowercase());
        }
        for (i, child) in def.resources.iter_mut().enumerate() {
            assign(child, &format!("{path}-{i}"));
        }
    }

    if let [only] = definitions
        && only.name.is_empty()
    {
        only.name = DEFAULT_NAME.to_string();
    }
    for (i, def) in definitions.iter_mut().enumerate() {
        assign(def, &i.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Defs {
        resources: Vec<ResourceDefinition>,
    }

    fn parse(toml_str: &str) -> Vec<ResourceDefinition> {
        toml::from_str::<Defs>(toml_str).unwrap().resources
    }

    const NESTED: &str = r#"
        [[resources]]
        type = "ELB"
        name = "elb"
        selector = { names = ["example-elb"] }

          [[resources.resources]]
          type = "Server"
          name = "web"
          selector = { tags = ["web"], zone = "is1a" }
          plans = [{ core = 2, memory = 4 }, { name = "large", core = 4, memory = 8 }]

        [[resources]]
        type = "Router"
        selector = { names = ["router"] }
    "#;

    #[test]
    fn parses_nested_definitions() {
        let defs = parse(NESTED);
        assert_eq!(defs.len(), 2);
        assert_eq!(defs[0].kind(), ResourceKind::Elb);
        let web = &defs[0].resources[0];
        assert_eq!(web.kind(), ResourceKind::Server);
        let DefinitionSpec::Server(server) = &web.spec else {
            panic!("expected a server definition");
        };
        assert_eq!(server.plans[1].name, "large");
        assert_eq!(web.setup_grace_period(), DEFAULT_SERVER_SETUP_GRACE_PERIOD);
        assert_eq!(defs[0].setup_grace_period(), 0);
    }

    #[test]
    fn parses_server_group_with_parent() {
        let defs = parse(
            r#"
            [[resources]]
            type = "ServerGroup"
            name = "fleet"
            server_name_prefix = "web"
            zone = "is1a"
            min_size = 1
            max_size = 3
            template = { core = 1, memory = 2 }
            parent = { type = "ELB", selector = { names = ["elb"] } }
            setup_grace_period = 0
        "#,
        );
        let parent = defs[0].parent().unwrap();
        assert_eq!(parent.parent_type.kind(), ResourceKind::Elb);
        assert_eq!(defs[0].setup_grace_period(), 0);
        assert!(defs[0].selector().is_none());
    }

    #[test]
    fn finds_nested_targets() {
        let defs = parse(NESTED);
        let (group, def) = find_target(&defs, "web").unwrap();
        assert_eq!(group, 0);
        assert_eq!(def.name, "web");
        assert!(find_target(&defs, "missing").is_none());
        assert!(find_target(&defs, "default").is_none(), "two top-level definitions");
    }

    #[test]
    fn default_targets_sole_definition() {
        let mut defs = parse(NESTED);
        defs.truncate(1);
        let (_, def) = find_target(&defs, "default").unwrap();
        assert_eq!(def.name, "elb");
    }

    #[test]
    fn unnamed_definitions_get_positional_names() {
        let mut defs = parse(NESTED);
        defs[0].resources[0].name.clear();
        assign_names(&mut defs);
        assert_eq!(defs[0].resources[0].name, "server-0-0");
        assert_eq!(defs[1].name, "router-1");
    }
}
