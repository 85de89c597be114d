//! The scaling core.
//!
//! ```text
//!   up/down/keep
//!        │
//!        ▼
//!   find target ──► last_modified_at ──► try_accept ──┬── rejected: Unacceptable
//!                                                    │
//!                                                    ▼ ACCEPTED
//!                                 spawn; sync callers await the task
//!                                                    │
//!                                                    ▼ RUNNING
//!                  walk the target's top-level group, pipeline per resource
//!                                                    │
//!                                                    ▼
//!                                   DONE | DONE_NOOP | FAILED
//! ```
//!
//! Every request holds a running guard from admission to completion;
//! `stop` refuses new requests and waits for the guards to drain.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use autoscaler_handlers::Handler;
use autoscaler_types::{CloudApi, DEFAULT_NAME, JobState, RequestType, ScalingRequest};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::context::RequestContext;
use crate::definition::{ResourceDefinition, find_target};
use crate::error::{CoreError, CoreResult};
use crate::job::{JobRegistry, JobSnapshot, JobStatus};
use crate::metrics::{COMPONENT_CORE, COMPONENT_HANDLERS, Metrics, MetricsSnapshot};
use crate::pipeline::handle_resource;
use crate::resource::{ResourceGraph, last_modified_at};
use crate::tree::{ResourceTree, build_tree};

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

const STOP_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Input of Up, Down and Keep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScaleRequest {
    #[serde(default = "default_name")]
    pub source: String,
    #[serde(default = "default_name")]
    pub resource_name: String,
    #[serde(default = "default_name")]
    pub desired_state_name: String,
    /// Wait for the job to finish instead of running it in the background.
    #[serde(default)]
    pub sync: bool,
}

fn default_name() -> String {
    DEFAULT_NAME.to_string()
}

impl Default for ScaleRequest {
    fn default() -> Self {
        Self {
            source: default_name(),
            resource_name: default_name(),
            desired_state_name: default_name(),
            sync: false,
        }
    }
}

impl ScaleRequest {
    pub fn for_resource(resource_name: impl Into<String>) -> Self {
        Self {
            resource_name: resource_name.into(),
            ..Self::default()
        }
    }

    pub fn desired(mut self, desired_state_name: impl Into<String>) -> Self {
        self.desired_state_name = desired_state_name.into();
        self
    }

    pub fn sync(mut self) -> Self {
        self.sync = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScalingResponse {
    pub job_id: String,
    pub status: JobState,
    pub message: String,
}

#[derive(Debug, Default)]
struct RunState {
    /// Requests between admission and completion.
    running: usize,
    stopping: bool,
}

struct CoreInner {
    config: Config,
    cloud: Arc<dyn CloudApi>,
    handlers: Vec<Handler>,
    jobs: JobRegistry,
    metrics: Metrics,
    state: Mutex<RunState>,
}

impl CoreInner {
    fn state(&self) -> MutexGuard<'_, RunState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Decrements the running count when dropped.
struct RunningGuard {
    inner: Arc<CoreInner>,
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        let mut state = self.inner.state();
        state.running = state.running.saturating_sub(1);
    }
}

/// Periodic "still working" log line for one job.
struct ProgressLogger {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl ProgressLogger {
    fn start(job_id: String, interval: Duration) -> Option<Self> {
        if interval.is_zero() {
            return None;
        }
        let (shutdown, mut rx) = watch::channel(false);
        let handle = tokio::spawn(async move {
            let started = Instant::now();
            let mut ticker = tokio::time::interval_at(started + interval, interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        info!(job_id = %job_id, elapsed_secs = started.elapsed().as_secs(), "scaling job in progress");
                    }
                    _ = rx.changed() => break,
                }
            }
        });
        Some(Self { shutdown, handle })
    }
}

impl Drop for ProgressLogger {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
        self.handle.abort();
    }
}

#[derive(Clone)]
pub struct Core {
    inner: Arc<CoreInner>,
}

impl Core {
    /// Build a core with the handlers the configuration enables.
    pub fn new(config: Config, cloud: Arc<dyn CloudApi>) -> CoreResult<Self> {
        let handlers = config.build_handlers(cloud.clone())?;
        Ok(Self::with_handlers(config, cloud, handlers))
    }

    pub fn with_handlers(config: Config, cloud: Arc<dyn CloudApi>, handlers: Vec<Handler>) -> Self {
        Self {
            inner: Arc::new(CoreInner {
                config,
                cloud,
                handlers,
                jobs: JobRegistry::new(),
                metrics: Metrics::new(),
                state: Mutex::new(RunState::default()),
            }),
        }
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub async fn up(&self, req: ScaleRequest) -> CoreResult<ScalingResponse> {
        self.request(RequestType::Up, req).await
    }

    pub async fn down(&self, req: ScaleRequest) -> CoreResult<ScalingResponse> {
        self.request(RequestType::Down, req).await
    }

    pub async fn keep(&self, req: ScaleRequest) -> CoreResult<ScalingResponse> {
        self.request(RequestType::Keep, req).await
    }

    pub fn job(&self, name: &str) -> Option<JobSnapshot> {
        self.inner.jobs.get(name).map(|job| job.snapshot())
    }

    pub fn jobs(&self) -> Vec<JobSnapshot> {
        self.inner.jobs.snapshots()
    }

    /// Counters plus the current number of running requests.
    pub fn metrics(&self) -> MetricsSnapshot {
        let running = self.inner.state().running;
        self.inner.metrics.snapshot(running)
    }

    pub async fn resource_tree(&self) -> ResourceTree {
        build_tree(self.inner.cloud.as_ref(), &self.inner.config.resources).await
    }

    /// True while any request is between admission and completion.
    pub fn is_running(&self) -> bool {
        self.inner.state().running > 0
    }

    pub fn is_stopping(&self) -> bool {
        self.inner.state().stopping
    }

    /// Refuse new requests and wait up to `grace` for running ones.
    pub async fn stop(&self, grace: Duration) -> CoreResult<()> {
        self.inner.state().stopping = true;
        info!(grace_secs = grace.as_secs(), "stopping core");

        let started = Instant::now();
        loop {
            let running = self.inner.state().running;
            if running == 0 {
                info!("core stopped");
                return Ok(());
            }
            if started.elapsed() >= grace {
                warn!(running, "shutdown grace period elapsed with jobs still running");
                return Err(CoreError::ShutdownTimeout(grace));
            }
            tokio::time::sleep(STOP_POLL_INTERVAL).await;
        }
    }

    fn enter(&self) -> CoreResult<RunningGuard> {
        let mut state = self.inner.state();
        if state.stopping {
            return Err(CoreError::ShuttingDown);
        }
        state.running += 1;
        Ok(RunningGuard {
            inner: self.inner.clone(),
        })
    }

    async fn request(&self, request_type: RequestType, req: ScaleRequest) -> CoreResult<ScalingResponse> {
        self.inner.metrics.record_request(request_type);
        let result = self.admit(request_type, req).await;
        if result.is_err() {
            self.inner.metrics.record_error(COMPONENT_CORE);
        }
        result
    }

    async fn admit(&self, request_type: RequestType, req: ScaleRequest) -> CoreResult<ScalingResponse> {
        let guard = self.enter()?;
        let resource_name = if req.resource_name.is_empty() {
            DEFAULT_NAME.to_string()
        } else {
            req.resource_name.clone()
        };
        info!(
            request_type = %request_type,
            source = %req.source,
            resource_name = %resource_name,
            desired_state_name = %req.desired_state_name,
            sync = req.sync,
            "scaling request received"
        );

        let Some((group, def)) = find_target(&self.inner.config.resources, &resource_name) else {
            if let Some(job) = self.inner.jobs.get(&resource_name) {
                cancel(&job);
            }
            return Err(CoreError::ResourceNotFound(resource_name));
        };

        let cooldown = def.cooldown.unwrap_or(self.inner.config.autoscaler.cooldown);
        let job = self.inner.jobs.get_or_create(&def.name, cooldown);
        let last_modified = match last_modified_at(self.inner.cloud.as_ref(), def).await {
            Ok(at) => at,
            Err(e) => {
                cancel(&job);
                return Err(e);
            }
        };
        if !job.try_accept(request_type, last_modified) {
            let status = job.state();
            info!(job_id = %job.id(), %status, "scaling request not acceptable");
            return Err(CoreError::Unacceptable {
                job_id: job.id().to_string(),
                status,
            });
        }

        let ctx = RequestContext::new(
            ScalingRequest {
                request_type,
                source: req.source,
                resource_name,
                desired_state_name: req.desired_state_name,
                scaling_job_id: def.name.clone(),
            },
            def.name.clone(),
        );

        // The job runs on its own task so a dropped caller cannot strand
        // it in RUNNING.
        let core = self.clone();
        let task_job = job.clone();
        let task = tokio::spawn(async move {
            let _guard = guard;
            core.run(group, &ctx, &task_job).await
        });

        if !req.sync {
            return Ok(ScalingResponse {
                job_id: job.id().to_string(),
                status: JobState::Accepted,
                message: "accepted".to_string(),
            });
        }

        let result = match task.await {
            Ok(result) => result,
            Err(e) => {
                job.set_state(JobState::Failed);
                self.inner.metrics.record_job(JobState::Failed);
                error!(job_id = %job.id(), error = %e, "scaling job task aborted");
                Err(CoreError::TaskAborted(e.to_string()))
            }
        };
        match result {
            Ok(status) => Ok(ScalingResponse {
                job_id: job.id().to_string(),
                status,
                message: status.to_string(),
            }),
            Err(e) => Err(CoreError::JobFailed {
                job_id: job.id().to_string(),
                source: Box::new(e),
            }),
        }
    }

    async fn run(&self, group: usize, ctx: &RequestContext, job: &JobStatus) -> CoreResult<JobState> {
        job.set_state(JobState::Running);
        let progress = ProgressLogger::start(
            job.id().to_string(),
            self.inner.config.autoscaler.progress_log_interval(),
        );
        let result = self.handle_all(group, ctx).await;
        drop(progress);

        match result {
            Ok(()) => {
                let status = if ctx.handled() {
                    JobState::Done
                } else {
                    JobState::DoneNoop
                };
                job.set_state(status);
                self.inner.metrics.record_job(status);
                info!(job_id = %job.id(), %status, "scaling job finished");
                Ok(status)
            }
            Err(e) => {
                job.set_state(JobState::Failed);
                self.inner.metrics.record_job(JobState::Failed);
                if matches!(e, CoreError::Handler { .. }) {
                    self.inner.metrics.record_error(COMPONENT_HANDLERS);
                }
                error!(job_id = %job.id(), error = %e, "scaling job failed");
                Err(e)
            }
        }
    }

    async fn handle_all(&self, group: usize, ctx: &RequestContext) -> CoreResult<()> {
        let def = self
            .inner
            .config
            .resources
            .get(group)
            .ok_or_else(|| CoreError::ResourceNotFound(ctx.request().resource_name.clone()))?;
        let mut graph = ResourceGraph::new(self.inner.cloud.as_ref());
        walk(&self.inner.handlers, &mut graph, def, None, ctx).await
    }
}

fn cancel(job: &JobStatus) {
    if !job.state().is_in_flight() {
        job.set_state(JobState::Canceled);
    }
}

/// Resolve `def`, then for each of its resources handle the children
/// first and the resource itself last.
fn walk<'a, 'b>(
    handlers: &'b [Handler],
    graph: &'b mut ResourceGraph<'a>,
    def: &'a ResourceDefinition,
    parent: Option<usize>,
    ctx: &'b RequestContext,
) -> BoxFuture<'b, CoreResult<()>>
where
    'a: 'b,
{
    Box::pin(async move {
        let nodes = graph.resolve(def, parent, ctx).await?;
        if !def.resources.is_empty() && nodes.len() > 1 {
            return Err(CoreError::resolution(
                &def.name,
                format!(
                    "a resource with children must resolve to at most one resource, got {}",
                    nodes.len()
                ),
            ));
        }
        for idx in nodes {
            for child in &def.resources {
                walk(handlers, &mut *graph, child, Some(idx), ctx).await?;
            }
            handle_resource(handlers, graph, idx, ctx).await?;
        }
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use autoscaler_handlers::{BuiltinHandler, HandlerResult, ResponseSender};
    use autoscaler_types::{
        CloudResource, ElbSpec, HandleRequest, HandleStatus, InMemoryCloud, ResourceKind, ResourcePayload,
        ResourceSelector, ServerSpec,
    };

    use super::*;
    use crate::job::CoolDown;

    fn server(name: &str, core: u32, memory: u32) -> CloudResource {
        CloudResource::new(
            name,
            Some("is1a".into()),
            ResourcePayload::Server(ServerSpec {
                core,
                memory,
                ..Default::default()
            }),
        )
    }

    const WEB: &str = r#"
        [autoscaler]
        cooldown = 0
        progress_log_interval = 0

        [[resources]]
        type = "Server"
        name = "web"
        selector = { names = ["web"], zone = "is1a" }
        plans = [{ core = 2, memory = 4 }, { core = 4, memory = 8 }, { core = 4, memory = 16 }]
        setup_grace_period = 0
    "#;

    fn core_with(toml_str: &str, resources: Vec<CloudResource>) -> (Core, Arc<InMemoryCloud>) {
        let config = Config::from_toml_str(toml_str).unwrap();
        let cloud = Arc::new(InMemoryCloud::with_resources(resources));
        let core = Core::new(config, cloud.clone()).unwrap();
        (core, cloud)
    }

    async fn web_spec(cloud: &InMemoryCloud) -> (u32, u32) {
        let found = cloud
            .find(ResourceKind::Server, &ResourceSelector::by_name("web"))
            .await
            .unwrap();
        let spec = found[0].as_server().unwrap();
        (spec.core, spec.memory)
    }

    #[tokio::test]
    async fn up_then_down_walks_the_plans() {
        let (core, cloud) = core_with(WEB, vec![server("web", 2, 4)]);

        let res = core.up(ScaleRequest::for_resource("web").sync()).await.unwrap();
        assert_eq!(res.status, JobState::Done);
        assert_eq!(web_spec(&cloud).await, (4, 8));

        let res = core.down(ScaleRequest::for_resource("web").sync()).await.unwrap();
        assert_eq!(res.status, JobState::Done);
        assert_eq!(web_spec(&cloud).await, (2, 4));

        let res = core.down(ScaleRequest::for_resource("web").sync()).await.unwrap();
        assert_eq!(res.status, JobState::DoneNoop);
        assert_eq!(web_spec(&cloud).await, (2, 4));
        assert_eq!(core.job("web").unwrap().status, JobState::DoneNoop);
    }

    #[tokio::test]
    async fn named_plan_and_default_resource() {
        let toml_str = WEB.replace("{ core = 4, memory = 16 }", "{ name = \"large\", core = 4, memory = 16 }");
        let (core, cloud) = core_with(&toml_str, vec![server("web", 2, 4)]);

        let res = core
            .up(ScaleRequest::default().desired("large").sync())
            .await
            .unwrap();
        assert_eq!(res.job_id, "web");
        assert_eq!(web_spec(&cloud).await, (4, 16));

        let err = core
            .down(ScaleRequest::default().desired("missing").sync())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::JobFailed { .. }), "{err}");
        assert_eq!(core.job("web").unwrap().status, JobState::Failed);
    }

    #[tokio::test]
    async fn metrics_count_requests_jobs_and_errors() {
        let (core, _) = core_with(WEB, vec![server("web", 2, 4)]);
        core.up(ScaleRequest::for_resource("web").sync()).await.unwrap();
        core.down(ScaleRequest::for_resource("db")).await.unwrap_err();

        let metrics = core.metrics();
        assert_eq!(metrics.requests["up"], 1);
        assert_eq!(metrics.requests["down"], 1);
        assert_eq!(metrics.jobs["DONE"], 1);
        assert_eq!(metrics.errors["core"], 1);
        assert_eq!(metrics.errors["core_to_handlers"], 0);
        assert_eq!(metrics.running, 0);
    }

    #[tokio::test]
    async fn unknown_resource_is_rejected() {
        let (core, _) = core_with(WEB, vec![server("web", 2, 4)]);
        let err = core.up(ScaleRequest::for_resource("db")).await.unwrap_err();
        assert!(matches!(err, CoreError::ResourceNotFound(name) if name == "db"));
        assert!(core.job("db").is_none());
    }

    #[tokio::test]
    async fn missing_cloud_resource_cancels_the_job() {
        let (core, _) = core_with(WEB, Vec::new());
        let err = core.up(ScaleRequest::for_resource("web").sync()).await.unwrap_err();
        assert!(matches!(err, CoreError::ResourceNotFound(_)), "{err}");
        assert_eq!(core.job("web").unwrap().status, JobState::Canceled);
    }

    #[tokio::test]
    async fn cooldown_throttles_successful_jobs() {
        let toml_str = WEB.replace("cooldown = 0", "cooldown = { up = 600, down = 0 }");
        let (core, _) = core_with(&toml_str, vec![server("web", 2, 4)]);

        core.up(ScaleRequest::for_resource("web").sync()).await.unwrap();
        let err = core.up(ScaleRequest::for_resource("web").sync()).await.unwrap_err();
        assert!(
            matches!(err, CoreError::Unacceptable { status: JobState::Done, .. }),
            "{err}"
        );
        // Down has no cooldown.
        core.down(ScaleRequest::for_resource("web").sync()).await.unwrap();
    }

    #[tokio::test]
    async fn definition_cooldown_overrides_global() {
        let toml_str = format!("{WEB}\ncooldown = 600\n");
        let (core, _) = core_with(&toml_str, vec![server("web", 2, 4)]);
        core.up(ScaleRequest::for_resource("web").sync()).await.unwrap();
        assert_eq!(core.job("web").unwrap().cooldown, CoolDown::uniform(600));
        assert!(core.up(ScaleRequest::for_resource("web").sync()).await.is_err());
    }

    /// Blocks in Handle until released.
    struct Gate {
        release: tokio::sync::Notify,
    }

    #[async_trait::async_trait]
    impl BuiltinHandler for Gate {
        fn name(&self) -> &str {
            "gate"
        }

        async fn handle(&self, req: &HandleRequest, sender: &dyn ResponseSender) -> HandlerResult<()> {
            sender
                .report(&req.request.scaling_job_id, HandleStatus::Running, "waiting")
                .await?;
            self.release.notified().await;
            sender
                .report(&req.request.scaling_job_id, HandleStatus::Done, "")
                .await
        }
    }

    fn gated_core() -> (Core, Arc<Gate>) {
        let config = Config::from_toml_str(WEB).unwrap();
        let cloud: Arc<dyn CloudApi> = Arc::new(InMemoryCloud::with_resources(vec![server("web", 2, 4)]));
        let gate = Arc::new(Gate {
            release: tokio::sync::Notify::new(),
        });
        let core = Core::with_handlers(config, cloud, vec![Handler::builtin(gate.clone())]);
        (core, gate)
    }

    #[tokio::test]
    async fn dropped_sync_caller_does_not_strand_the_job() {
        let (core, gate) = gated_core();

        let dropped = tokio::time::timeout(
            Duration::from_millis(100),
            core.keep(ScaleRequest::for_resource("web").sync()),
        )
        .await;
        assert!(dropped.is_err());
        assert_eq!(core.job("web").unwrap().status, JobState::Running);
        assert!(core.is_running());

        gate.release.notify_one();
        wait_for(&core, JobState::Done).await;
        for _ in 0..200 {
            if !core.is_running() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(!core.is_running());

        gate.release.notify_one();
        let res = core.keep(ScaleRequest::for_resource("web").sync()).await.unwrap();
        assert_eq!(res.status, JobState::Done);
    }

    async fn wait_for(core: &Core, status: JobState) {
        for _ in 0..200 {
            if core.job("web").map(|j| j.status) == Some(status) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job never reached {status}");
    }

    #[tokio::test]
    async fn in_flight_job_rejects_second_request() {
        let (core, gate) = gated_core();

        let res = core.keep(ScaleRequest::for_resource("web")).await.unwrap();
        assert_eq!(res.status, JobState::Accepted);
        wait_for(&core, JobState::Running).await;
        assert!(core.is_running());

        let err = core.up(ScaleRequest::for_resource("web")).await.unwrap_err();
        assert!(
            matches!(err, CoreError::Unacceptable { status: JobState::Running, .. }),
            "{err}"
        );

        gate.release.notify_one();
        wait_for(&core, JobState::Done).await;
    }

    #[tokio::test]
    async fn stop_waits_for_running_jobs() {
        let (core, gate) = gated_core();
        core.keep(ScaleRequest::for_resource("web")).await.unwrap();
        wait_for(&core, JobState::Running).await;

        let stopping = tokio::spawn({
            let core = core.clone();
            async move { core.stop(Duration::from_secs(30)).await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(core.is_stopping());
        let err = core.up(ScaleRequest::for_resource("web")).await.unwrap_err();
        assert!(matches!(err, CoreError::ShuttingDown));

        gate.release.notify_one();
        stopping.await.unwrap().unwrap();
        assert!(!core.is_running());
        assert_eq!(core.job("web").unwrap().status, JobState::Done);
    }

    #[tokio::test]
    async fn stop_times_out() {
        let (core, gate) = gated_core();
        core.keep(ScaleRequest::for_resource("web")).await.unwrap();
        wait_for(&core, JobState::Running).await;

        let err = core.stop(Duration::ZERO).await.unwrap_err();
        assert!(matches!(err, CoreError::ShutdownTimeout(_)));
        gate.release.notify_one();
    }

    #[tokio::test]
    async fn stop_without_jobs_returns_immediately() {
        let (core, _) = core_with(WEB, vec![server("web", 2, 4)]);
        core.stop(Duration::ZERO).await.unwrap();
        let err = core.keep(ScaleRequest::default()).await.unwrap_err();
        assert!(matches!(err, CoreError::ShuttingDown));
    }

    #[tokio::test]
    async fn fleet_under_elb_is_registered_and_removed() {
        let toml_str = r#"
            [autoscaler]
            cooldown = 0
            progress_log_interval = 0

            [[resources]]
            type = "ELB"
            name = "elb"
            selector = { names = ["elb"] }

              [[resources.resources]]
              type = "ServerGroup"
              name = "fleet"
              server_name_prefix = "web"
              zone = "is1a"
              min_size = 0
              max_size = 2
              setup_grace_period = 0
              template = { core = 1, memory = 2 }
        "#;
        let elb = CloudResource::new(
            "elb",
            None,
            ResourcePayload::Elb(ElbSpec {
                cps: 100,
                virtual_ip: "198.51.100.1".into(),
                servers: Vec::new(),
            }),
        );
        let (core, cloud) = core_with(toml_str, vec![elb]);

        let res = core.up(ScaleRequest::for_resource("fleet").sync()).await.unwrap();
        assert_eq!(res.status, JobState::Done);
        let elb = cloud
            .find(ResourceKind::Elb, &ResourceSelector::by_name("elb"))
            .await
            .unwrap()
            .remove(0);
        let ResourcePayload::Elb(spec) = &elb.payload else {
            panic!("expected an ELB");
        };
        assert_eq!(spec.servers.len(), 1);
        assert!(spec.servers[0].enabled);

        let res = core.down(ScaleRequest::for_resource("fleet").sync()).await.unwrap();
        assert_eq!(res.status, JobState::Done);
        let instances = cloud
            .find(ResourceKind::Server, &ResourceSelector::by_name("web-"))
            .await
            .unwrap();
        assert!(instances.is_empty());
        let elb = cloud
            .find(ResourceKind::Elb, &ResourceSelector::by_name("elb"))
            .await
            .unwrap()
            .remove(0);
        let ResourcePayload::Elb(spec) = &elb.payload else {
            panic!("expected an ELB");
        };
        assert!(spec.servers.is_empty());
    }
}
