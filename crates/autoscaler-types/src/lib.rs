//! autoscaler-types — shared data model for the autoscaler.
//!
//! Everything that crosses a crate or process boundary lives here:
//!
//! - [`CloudResource`] records and the [`CloudApi`] collaborator trait
//! - [`ResourceSelector`] lookups
//! - the [`Computed`] snapshot handed to handlers
//! - handler request/response messages
//! - request and job status enums
//!
//! [`InMemoryCloud`] implements [`CloudApi`] without a provider behind it.

pub mod cloud;
pub mod computed;
pub mod handler;
pub mod job;
pub mod memory;
pub mod resource;
pub mod selector;

pub use cloud::{CloudApi, CloudError, CloudResult};
pub use computed::{Computed, Instruction};
pub use handler::{
    HandleRequest, HandleResponse, HandleResult, HandleStatus, PostHandleRequest, ScalingRequest,
};
pub use job::{DEFAULT_NAME, JobState, RequestType};
pub use memory::InMemoryCloud;
pub use resource::*;
pub use selector::ResourceSelector;
