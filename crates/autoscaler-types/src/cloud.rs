//! The cloud API collaborator.
//!
//! The autoscaler never talks to a provider directly; it goes through an
//! already-authenticated [`CloudApi`] shared as `Arc<dyn CloudApi>`.

use async_trait::async_trait;
use thiserror::Error;

use crate::resource::{CloudResource, ResourceKind};
use crate::selector::ResourceSelector;

/// Result type alias for cloud API calls.
pub type CloudResult<T> = Result<T, CloudError>;

/// Errors returned by a [`CloudApi`] implementation.
#[derive(Debug, Error)]
pub enum CloudError {
    #[error("{kind} {id:?} not found")]
    NotFound { kind: ResourceKind, id: String },

    #[error("invalid resource: {0}")]
    InvalidResource(String),

    #[error("cloud api error: {0}")]
    Backend(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

#[async_trait]
pub trait CloudApi: Send + Sync {
    /// Return every resource of `kind` matching `selector`.
    async fn find(&self, kind: ResourceKind, selector: &ResourceSelector) -> CloudResult<Vec<CloudResource>>;

    /// Read one resource by ID; `None` if it does not exist.
    async fn read(&self, kind: ResourceKind, id: &str) -> CloudResult<Option<CloudResource>>;

    /// Create a resource. The returned record carries the assigned ID.
    async fn create(&self, resource: CloudResource) -> CloudResult<CloudResource>;

    /// Apply `resource` over the object with the same ID.
    ///
    /// The returned record may carry a different ID: some changes make
    /// the provider re-create the object.
    async fn update(&self, resource: CloudResource) -> CloudResult<CloudResource>;

    async fn delete(&self, kind: ResourceKind, id: &str) -> CloudResult<()>;
}
