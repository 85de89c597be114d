//! autoscaler.toml configuration.
//!
//! ```toml
//! [autoscaler]
//! cooldown = { up = 300, down = 600 }
//! shutdown_grace_period = 600
//! disabled_handlers = ["dns-servers-handler"]
//!
//! [[handlers]]
//! name = "notify"
//! endpoint = "127.0.0.1:8081"
//!
//! [[resources]]
//! type = "Server"
//! name = "web"
//! selector = { tags = ["web"], zone = "is1a" }
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use autoscaler_handlers::{BUILTIN_HANDLER_NAMES, Handler, HandlerError, RemoteHandler, builtin_handlers, check_health};
use autoscaler_types::{CloudApi, ResourceSelector};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::definition::{DefinitionSpec, ResourceDefinition, assign_names};
use crate::job::CoolDown;
use crate::plan::ResourcePlan;
use crate::resource::lookup;

const DEFAULT_SHUTDOWN_GRACE_PERIOD: u64 = 600;
const DEFAULT_PROGRESS_LOG_INTERVAL: u64 = 10;
const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {}", .0.join("; "))]
    Invalid(Vec<String>),

    #[error("handler setup failed: {0}")]
    Handler(#[from] HandlerError),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub autoscaler: AutoScalerConfig,
    #[serde(default)]
    pub handlers: Vec<HandlerConfig>,
    #[serde(default)]
    pub resources: Vec<ResourceDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoScalerConfig {
    #[serde(default)]
    pub cooldown: CoolDown,
    /// Seconds `stop` waits for running jobs.
    #[serde(default = "default_shutdown_grace_period")]
    pub shutdown_grace_period: u64,
    /// Seconds between progress log lines of a running job. 0 disables.
    #[serde(default = "default_progress_log_interval")]
    pub progress_log_interval: u64,
    /// Builtin handlers to leave out.
    #[serde(default)]
    pub disabled_handlers: Vec<String>,
    #[serde(default)]
    pub exporter: ExporterConfig,
}

/// Prometheus exposition on `/metrics`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExporterConfig {
    #[serde(default = "default_exporter_enabled")]
    pub enabled: bool,
}

fn default_exporter_enabled() -> bool {
    true
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

fn default_shutdown_grace_period() -> u64 {
    DEFAULT_SHUTDOWN_GRACE_PERIOD
}

fn default_progress_log_interval() -> u64 {
    DEFAULT_PROGRESS_LOG_INTERVAL
}

impl Default for AutoScalerConfig {
    fn default() -> Self {
        Self {
            cooldown: CoolDown::default(),
            shutdown_grace_period: DEFAULT_SHUTDOWN_GRACE_PERIOD,
            progress_log_interval: DEFAULT_PROGRESS_LOG_INTERVAL,
            disabled_handlers: Vec::new(),
            exporter: ExporterConfig::default(),
        }
    }
}

impl AutoScalerConfig {
    pub fn shutdown_grace_period(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_period)
    }

    pub fn progress_log_interval(&self) -> Duration {
        Duration::from_secs(self.progress_log_interval)
    }
}

/// An external handler reached over gRPC.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandlerConfig {
    pub name: String,
    pub endpoint: String,
    #[serde(default)]
    pub disabled: bool,
    /// Per-call deadline in seconds.
    #[serde(default)]
    pub timeout: Option<u64>,
}

impl HandlerConfig {
    fn timeout(&self) -> Option<Duration> {
        self.timeout.map(Duration::from_secs)
    }
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let mut config: Config = toml::from_str(content)?;
        assign_names(&mut config.resources);
        Ok(config)
    }

    /// Static checks that need no network access.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut problems = Vec::new();

        if self.resources.is_empty() {
            problems.push("no resources defined".to_string());
        }

        let mut names = HashSet::new();
        for top in &self.resources {
            top.walk(&mut |def| {
                if !names.insert(def.name.clone()) {
                    problems.push(format!("duplicate resource name {:?}", def.name));
                }
                validate_definition(def, &mut problems);
            });
        }

        for name in &self.autoscaler.disabled_handlers {
            if !BUILTIN_HANDLER_NAMES.contains(&name.as_str()) {
                problems.push(format!("disabled_handlers: unknown builtin handler {name:?}"));
            }
        }

        let mut handler_names = HashSet::new();
        for handler in &self.handlers {
            if handler.name.is_empty() {
                problems.push(format!("handler with endpoint {:?} has no name", handler.endpoint));
            } else if BUILTIN_HANDLER_NAMES.contains(&handler.name.as_str()) {
                problems.push(format!("handler {:?} collides with a builtin handler", handler.name));
            } else if !handler_names.insert(handler.name.as_str()) {
                problems.push(format!("duplicate handler name {:?}", handler.name));
            }
            if let Err(e) = RemoteHandler::new(handler.endpoint.as_str()) {
                problems.push(format!("handler {:?}: {e}", handler.name));
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(problems))
        }
    }

    /// Enabled builtin handlers in their fixed order, then enabled
    /// external handlers in configured order.
    pub fn build_handlers(&self, cloud: Arc<dyn CloudApi>) -> Result<Vec<Handler>, ConfigError> {
        let mut handlers: Vec<Handler> = builtin_handlers(cloud)
            .into_iter()
            .filter(|h| !self.autoscaler.disabled_handlers.iter().any(|d| d == h.name()))
            .map(Handler::builtin)
            .collect();
        for config in self.handlers.iter().filter(|h| !h.disabled) {
            let remote = RemoteHandler::new(config.endpoint.as_str())?.with_timeout(config.timeout());
            handlers.push(Handler::remote(config.name.as_str(), remote));
        }
        debug!(
            handlers = ?handlers.iter().map(Handler::name).collect::<Vec<_>>(),
            "handlers registered"
        );
        Ok(handlers)
    }
}

fn validate_selector(def: &ResourceDefinition, what: &str, selector: &ResourceSelector, problems: &mut Vec<String>) {
    if let Err(e) = selector.validate() {
        problems.push(format!("{}: {what}: {e}", def.name));
    }
}

fn validate_plan_names<P: ResourcePlan>(def: &ResourceDefinition, plans: &[P], problems: &mut Vec<String>) {
    let mut seen = HashSet::new();
    for plan in plans {
        let name = plan.plan_name();
        if !name.is_empty() && !seen.insert(name) {
            problems.push(format!("{}: duplicate plan name {name:?}", def.name));
        }
    }
}

fn validate_definition(def: &ResourceDefinition, problems: &mut Vec<String>) {
    if let Some(selector) = def.selector() {
        validate_selector(def, "selector", selector, problems);
    }
    if let Some(parent) = def.parent() {
        validate_selector(def, "parent selector", &parent.selector, problems);
    }
    if !def.resources.is_empty() && !def.kind().can_be_parent() {
        problems.push(format!("{}: a {} cannot have child resources", def.name, def.kind()));
    }

    match &def.spec {
        DefinitionSpec::Server(d) => {
            validate_plan_names(def, &d.plans, problems);
            if d.plans.iter().any(|p| p.core == 0 || p.memory == 0) {
                problems.push(format!("{}: server plans need core and memory", def.name));
            }
        }
        DefinitionSpec::ServerGroup(d) => {
            validate_plan_names(def, &d.plans, problems);
            if d.server_name_prefix.is_empty() {
                problems.push(format!("{}: server_name_prefix is required", def.name));
            }
            if d.zone.is_empty() {
                problems.push(format!("{}: zone is required", def.name));
            }
            if d.max_size == 0 || d.min_size > d.max_size {
                problems.push(format!(
                    "{}: invalid size range min_size={} max_size={}",
                    def.name, d.min_size, d.max_size
                ));
            }
            if d.plans.iter().any(|p| p.size < d.min_size || p.size > d.max_size) {
                problems.push(format!("{}: plan sizes must be within min_size..=max_size", def.name));
            }
        }
        DefinitionSpec::Elb(d) => validate_plan_names(def, &d.plans, problems),
        DefinitionSpec::Router(d) => validate_plan_names(def, &d.plans, problems),
        DefinitionSpec::Gslb(_) | DefinitionSpec::Dns(_) | DefinitionSpec::LoadBalancer(_) => {}
    }
}

/// Static checks plus the ones that need the network: every enabled
/// external handler must answer its health check and every definition
/// must resolve against the cloud.
pub async fn validate(config: &Config, cloud: &dyn CloudApi) -> Result<(), ConfigError> {
    config.validate()?;
    let mut problems = Vec::new();

    for handler in config.handlers.iter().filter(|h| !h.disabled) {
        let timeout = handler.timeout().unwrap_or(HEALTH_CHECK_TIMEOUT);
        match check_health(&handler.endpoint, timeout).await {
            Ok(()) => info!(handler = %handler.name, endpoint = %handler.endpoint, "handler is serving"),
            Err(e) => problems.push(format!("handler {:?}: {e}", handler.name)),
        }
    }

    let mut defs = Vec::new();
    for top in &config.resources {
        top.walk(&mut |def| defs.push(def));
    }
    for def in defs {
        match lookup(cloud, def).await {
            Ok(found) if found.is_empty() && !matches!(def.spec, DefinitionSpec::ServerGroup(_)) => {
                problems.push(format!("{}: no resources found", def.name));
            }
            Ok(found) if found.len() > 1 && !def.resources.is_empty() => {
                problems.push(format!(
                    "{}: resolves to {} resources but has child resources",
                    def.name,
                    found.len()
                ));
            }
            Ok(_) => {}
            Err(e) => problems.push(format!("{}: {e}", def.name)),
        }
        if let Some(parent) = def.parent() {
            match cloud.find(parent.parent_type.kind(), &parent.selector).await {
                Ok(found) if found.len() == 1 => {}
                Ok(found) => problems.push(format!(
                    "{}: parent must resolve to exactly one resource, got {}",
                    def.name,
                    found.len()
                )),
                Err(e) => problems.push(format!("{}: parent: {e}", def.name)),
            }
        }
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::Invalid(problems))
    }
}
