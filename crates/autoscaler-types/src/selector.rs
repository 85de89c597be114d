//! Resource selectors.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::resource::CloudResource;

/// Criteria used to look up resources through the cloud API.
///
/// Every populated criterion must match. Names match partially, tags
/// must all be present, and the zone is ignored for global resources.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ResourceSelector {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub names: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub zone: Option<String>,
}

impl ResourceSelector {
    pub fn by_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Default::default()
        }
    }

    pub fn by_name(name: impl Into<String>) -> Self {
        Self {
            names: vec![name.into()],
            ..Default::default()
        }
    }

    pub fn by_tag(tag: impl Into<String>) -> Self {
        Self {
            tags: vec![tag.into()],
            ..Default::default()
        }
    }

    pub fn in_zone(mut self, zone: Option<String>) -> Self {
        self.zone = zone;
        self
    }

    /// A selector must narrow the search by at least one criterion.
    pub fn validate(&self) -> Result<(), String> {
        if self.id.as_deref().unwrap_or_default().is_empty()
            && self.names.is_empty()
            && self.tags.is_empty()
        {
            return Err("selector requires at least one of id, names or tags".to_string());
        }
        Ok(())
    }

    pub fn matches(&self, resource: &CloudResource) -> bool {
        if let Some(id) = &self.id
            && !id.is_empty()
            && resource.id != *id
        {
            return false;
        }
        if !self.names.is_empty() && !self.names.iter().any(|n| resource.name.contains(n.as_str())) {
            return false;
        }
        if !self.tags.iter().all(|t| resource.has_tag(t)) {
            return false;
        }
        if !resource.kind().is_global()
            && let Some(zone) = &self.zone
            && resource.zone.as_ref() != Some(zone)
        {
            return false;
        }
        true
    }
}

impl fmt::Display for ResourceSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ID: {}, Names: {:?}, Tags: {:?}, Zone: {}",
            self.id.as_deref().unwrap_or(""),
            self.names,
            self.tags,
            self.zone.as_deref().unwrap_or(""),
        )
    }
}
