//! autoscaler-core — decides and drives scaling jobs.
//!
//! ```text
//!   ScaleRequest ──► Core ──► JobRegistry (cooldown gate)
//!                      │
//!                      ▼
//!               ResourceGraph ──► CloudApi
//!                      │
//!                      ▼ Computed (per resource, with lineage)
//!               handler pipeline: PreHandle ─► Handle ─► refresh ─► PostHandle
//! ```
//!
//! Plan selection lives in [`plan`], resolution in [`resource`], the
//! per-resource phases in [`pipeline`] and the request state machine in
//! [`orchestrator`].

pub mod config;
pub mod context;
pub mod definition;
pub mod error;
pub mod job;
pub mod metrics;
pub mod orchestrator;
pub mod pipeline;
pub mod plan;
pub mod resource;
pub mod tree;

pub use config::{AutoScalerConfig, Config, ConfigError, ExporterConfig, HandlerConfig, validate};
pub use context::{HandlingContext, RequestContext, compute_result};
pub use definition::{DefinitionSpec, ResourceDefinition, find_target};
pub use error::{CoreError, CoreResult};
pub use job::{CoolDown, JobRegistry, JobSnapshot, JobStatus};
pub use metrics::{Metrics, MetricsSnapshot, render_prometheus};
pub use orchestrator::{Core, ScaleRequest, ScalingResponse};
pub use plan::{PlanError, ResourcePlan, desired_plan};
pub use resource::ResourceGraph;
pub use tree::{ResourceTree, TreeNode, TreeResource};
