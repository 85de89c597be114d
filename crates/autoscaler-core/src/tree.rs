//! Resource tree inspection.
//!
//! Read-only: definitions are looked up but nothing is tagged, planned
//! or handled.
//!
//! ```text
//! ELB elb
//! ├─ example-elb (id=113100000001, zone=global)
//! └─ Server web
//!    └─ web (id=113100000002, zone=is1a)
//! ```

use std::collections::HashMap;

use autoscaler_types::{CloudApi, CloudResource, ResourceKind};
use serde::Serialize;

use crate::definition::ResourceDefinition;
use crate::resource::lookup;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceTree {
    pub nodes: Vec<TreeNode>,
}

/// One definition and the cloud resources it currently resolves to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreeNode {
    pub definition: String,
    pub kind: ResourceKind,
    pub resources: Vec<TreeResource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub children: Vec<TreeNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreeResource {
    pub id: String,
    pub name: String,
    pub zone: Option<String>,
}

impl From<&CloudResource> for TreeResource {
    fn from(r: &CloudResource) -> Self {
        Self {
            id: r.id.clone(),
            name: r.name.clone(),
            zone: r.zone.clone(),
        }
    }
}

type Lookup = Result<Vec<TreeResource>, String>;

/// Look up every definition and arrange the results as a tree.
///
/// A failed lookup is recorded on its node instead of failing the tree.
pub async fn build_tree(cloud: &dyn CloudApi, definitions: &[ResourceDefinition]) -> ResourceTree {
    let mut all = Vec::new();
    for top in definitions {
        top.walk(&mut |def| all.push(def));
    }

    let mut found: HashMap<&str, Lookup> = HashMap::with_capacity(all.len());
    for def in all {
        let result = lookup(cloud, def)
            .await
            .map(|resources| resources.iter().map(TreeResource::from).collect())
            .map_err(|e| e.to_string());
        found.insert(def.name.as_str(), result);
    }

    ResourceTree {
        nodes: definitions.iter().map(|def| node(def, &mut found)).collect(),
    }
}

fn node(def: &ResourceDefinition, found: &mut HashMap<&str, Lookup>) -> TreeNode {
    let (resources, error) = match found.remove(def.name.as_str()) {
        Some(Ok(resources)) => (resources, None),
        Some(Err(e)) => (Vec::new(), Some(e)),
        None => (Vec::new(), None),
    };
    TreeNode {
        definition: def.name.clone(),
        kind: def.kind(),
        resources,
        error,
        children: def.resources.iter().map(|child| node(child, found)).collect(),
    }
}

impl ResourceTree {
    pub fn render(&self) -> String {
        let mut out = String::new();
        for node in &self.nodes {
            render_node(node, "", "", &mut out);
        }
        out
    }
}

fn render_node(node: &TreeNode, lead: &str, indent: &str, out: &mut String) {
    out.push_str(&format!("{lead}{} {}\n", node.kind, node.definition));

    let mut lines: Vec<String> = node
        .resources
        .iter()
        .map(|r| {
            format!(
                "{} (id={}, zone={})",
                r.name,
                r.id,
                r.zone.as_deref().unwrap_or("global")
            )
        })
        .collect();
    if let Some(error) = &node.error {
        lines.push(format!("error: {error}"));
    }

    let total = lines.len() + node.children.len();
    let mut i = 0;
    for line in lines {
        i += 1;
        let branch = if i == total { "└─ " } else { "├─ " };
        out.push_str(&format!("{indent}{branch}{line}\n"));
    }
    for child in &node.children {
        i += 1;
        let (branch, next) = if i == total { ("└─ ", "   ") } else { ("├─ ", "│  ") };
        render_node(child, &format!("{indent}{branch}"), &format!("{indent}{next}"), out);
    }
}

#[cfg(test)]
mod tests {
    use autoscaler_types::{ElbSpec, InMemoryCloud, ResourcePayload, ServerSpec};

    use super::*;
    use crate::config::Config;

    #[tokio::test]
    async fn renders_nested_definitions() {
        let config = Config::from_toml_str(
            r#"
            [[resources]]
            type = "ELB"
            name = "elb"
            selector = { names = ["example-elb"] }

              [[resources.resources]]
              type = "Server"
              name = "web"
              selector = { names = ["web"], zone = "is1a" }
        "#,
        )
        .unwrap();
        let mut elb = CloudResource::new("example-elb", None, ResourcePayload::Elb(ElbSpec::default()));
        elb.id = "1".into();
        let mut web = CloudResource::new("web", Some("is1a".into()), ResourcePayload::Server(ServerSpec::default()));
        web.id = "2".into();
        let cloud = InMemoryCloud::with_resources(vec![elb, web]);

        let tree = build_tree(&cloud, &config.resources).await;
        assert_eq!(tree.nodes[0].children[0].resources[0].name, "web");
        assert_eq!(
            tree.render(),
            "ELB elb\n\
             ├─ example-elb (id=1, zone=global)\n\
             └─ Server web\n   \
             └─ web (id=2, zone=is1a)\n"
        );
    }

    #[tokio::test]
    async fn missing_resources_render_empty() {
        let config = Config::from_toml_str(
            r#"
            [[resources]]
            type = "Router"
            name = "router"
            selector = { names = ["router"] }
        "#,
        )
        .unwrap();
        let tree = build_tree(&InMemoryCloud::new(), &config.resources).await;
        assert!(tree.nodes[0].resources.is_empty());
        assert_eq!(tree.render(), "Router router\n");
    }
}
