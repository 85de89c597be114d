//! In-memory cloud.
//!
//! Backs the daemon when no provider client is wired in and drives the
//! end-to-end tests. Behaves like a provider where it matters to the
//! autoscaler: IDs are assigned on create, `modified_at` moves on every
//! mutation, and changing a server's core/memory re-creates it under a
//! new ID.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::cloud::{CloudApi, CloudError, CloudResult};
use crate::resource::{CloudResource, ResourceKind, ResourcePayload};
use crate::selector::ResourceSelector;

const ID_BASE: u64 = 100_000_000_000;

pub struct InMemoryCloud {
    resources: RwLock<BTreeMap<String, CloudResource>>,
    next_id: AtomicU64,
}

impl Default for InMemoryCloud {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryCloud {
    pub fn new() -> Self {
        Self {
            resources: RwLock::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Seed the cloud. Records without an ID get one assigned.
    pub fn with_resources(resources: Vec<CloudResource>) -> Self {
        let next = resources
            .iter()
            .filter_map(|r| r.id.parse::<u64>().ok())
            .filter(|id| *id > ID_BASE)
            .map(|id| id - ID_BASE + 1)
            .max()
            .unwrap_or(1);
        let cloud = Self {
            resources: RwLock::new(BTreeMap::new()),
            next_id: AtomicU64::new(next),
        };

        let mut map = BTreeMap::new();
        for mut r in resources {
            if r.id.is_empty() {
                r.id = cloud.allocate_id();
            }
            map.insert(r.id.clone(), r);
        }
        Self {
            resources: RwLock::new(map),
            next_id: cloud.next_id,
        }
    }

    pub fn from_json(json: &str) -> CloudResult<Self> {
        let resources: Vec<CloudResource> = serde_json::from_str(json)?;
        Ok(Self::with_resources(resources))
    }

    /// Load a JSON array of [`CloudResource`] records.
    pub fn load(path: &Path) -> CloudResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// All stored records, ordered by ID.
    pub async fn snapshot(&self) -> Vec<CloudResource> {
        self.resources.read().await.values().cloned().collect()
    }

    fn allocate_id(&self) -> String {
        format!("{}", ID_BASE + self.next_id.fetch_add(1, Ordering::SeqCst))
    }
}

/// Address on the shared segment, derived from the server's ID.
fn shared_segment_ip(id: &str) -> String {
    let n = id.parse::<u64>().unwrap_or_default() % 65_024;
    format!("10.0.{}.{}", n / 254, n % 254 + 1)
}

/// Plan changes that force the provider to re-create a server.
fn rotates_id(old: &ResourcePayload, new: &ResourcePayload) -> bool {
    match (old, new) {
        (ResourcePayload::Server(a), ResourcePayload::Server(b)) => {
            a.core != b.core || a.memory != b.memory || a.dedicated_cpu != b.dedicated_cpu
        }
        _ => false,
    }
}

#[async_trait]
impl CloudApi for InMemoryCloud {
    async fn find(&self, kind: ResourceKind, selector: &ResourceSelector) -> CloudResult<Vec<CloudResource>> {
        let kind = kind.cloud_kind();
        let resources = self.resources.read().await;
        Ok(resources
            .values()
            .filter(|r| r.kind() == kind && selector.matches(r))
            .cloned()
            .collect())
    }

    async fn read(&self, kind: ResourceKind, id: &str) -> CloudResult<Option<CloudResource>> {
        let kind = kind.cloud_kind();
        let resources = self.resources.read().await;
        Ok(resources.get(id).filter(|r| r.kind() == kind).cloned())
    }

    async fn create(&self, mut resource: CloudResource) -> CloudResult<CloudResource> {
        if resource.name.is_empty() {
            return Err(CloudError::InvalidResource("name is required".to_string()));
        }
        resource.id = self.allocate_id();
        resource.modified_at = Utc::now();
        if let ResourcePayload::Server(server) = &mut resource.payload
            && server.ip_addresses.is_empty()
        {
            server.ip_addresses.push(shared_segment_ip(&resource.id));
        }
        debug!(id = %resource.id, name = %resource.name, kind = %resource.kind(), "created");
        self.resources
            .write()
            .await
            .insert(resource.id.clone(), resource.clone());
        Ok(resource)
    }

    async fn update(&self, mut resource: CloudResource) -> CloudResult<CloudResource> {
        let mut resources = self.resources.write().await;
        let existing = resources.get(&resource.id).ok_or_else(|| CloudError::NotFound {
            kind: resource.kind(),
            id: resource.id.clone(),
        })?;
        if existing.kind() != resource.kind() {
            return Err(CloudError::InvalidResource(format!(
                "cannot change kind of {} from {} to {}",
                resource.id,
                existing.kind(),
                resource.kind()
            )));
        }

        if rotates_id(&existing.payload, &resource.payload) {
            let old_id = resource.id.clone();
            resources.remove(&old_id);
            resource.id = self.allocate_id();
            debug!(%old_id, new_id = %resource.id, "server re-created with new id");
        }
        resource.modified_at = Utc::now();
        resources.insert(resource.id.clone(), resource.clone());
        Ok(resource)
    }

    async fn delete(&self, kind: ResourceKind, id: &str) -> CloudResult<()> {
        let kind = kind.cloud_kind();
        let mut resources = self.resources.write().await;
        match resources.get(id) {
            Some(r) if r.kind() == kind => {
                resources.remove(id);
                debug!(%id, %kind, "deleted");
                Ok(())
            }
            _ => Err(CloudError::NotFound {
                kind,
                id: id.to_string(),
            }),
        }
    }
}
