//! Scaling counters and their Prometheus text exposition.
//!
//! Counters live for the process lifetime, like the job registry. Error
//! counts are labelled by component: `core` for requests the core
//! answered with an error, `core_to_handlers` for failed handler calls.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use autoscaler_types::{JobState, RequestType};
use serde::Serialize;

pub const COMPONENT_CORE: &str = "core";
pub const COMPONENT_HANDLERS: &str = "core_to_handlers";

#[derive(Debug, Default)]
pub struct Metrics {
    counters: Mutex<MetricsSnapshot>,
}

/// Point-in-time copy of every counter, keyed by label value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub requests: BTreeMap<String, u64>,
    pub jobs: BTreeMap<String, u64>,
    pub errors: BTreeMap<String, u64>,
    pub running: u64,
}

impl Metrics {
    /// Counters with every error component present at zero.
    pub fn new() -> Self {
        let metrics = Self::default();
        {
            let mut counters = metrics.lock();
            for component in [COMPONENT_CORE, COMPONENT_HANDLERS] {
                counters.errors.insert(component.to_string(), 0);
            }
        }
        metrics
    }

    fn lock(&self) -> MutexGuard<'_, MetricsSnapshot> {
        self.counters.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn record_request(&self, request_type: RequestType) {
        let label = request_type.to_string().to_lowercase();
        *self.lock().requests.entry(label).or_default() += 1;
    }

    /// Count a job that reached `status`.
    pub fn record_job(&self, status: JobState) {
        *self.lock().jobs.entry(status.to_string()).or_default() += 1;
    }

    pub fn record_error(&self, component: &str) {
        *self.lock().errors.entry(component.to_string()).or_default() += 1;
    }

    /// Copy the counters; `running` is supplied by the caller.
    pub fn snapshot(&self, running: usize) -> MetricsSnapshot {
        let mut snapshot = self.lock().clone();
        snapshot.running = running as u64;
        snapshot
    }
}

fn render_counter(out: &mut String, name: &str, help: &str, label: &str, values: &BTreeMap<String, u64>) {
    out.push_str(&format!("# HELP {name} {help}\n"));
    out.push_str(&format!("# TYPE {name} counter\n"));
    for (value, count) in values {
        out.push_str(&format!("{name}{{{label}=\"{value}\"}} {count}\n"));
    }
}

/// Render a snapshot in the Prometheus text exposition format.
pub fn render_prometheus(snapshot: &MetricsSnapshot) -> String {
    let mut out = String::new();
    render_counter(
        &mut out,
        "autoscaler_requests_total",
        "Scaling requests received.",
        "request_type",
        &snapshot.requests,
    );
    render_counter(
        &mut out,
        "autoscaler_jobs_total",
        "Scaling jobs finished, by final status.",
        "status",
        &snapshot.jobs,
    );
    render_counter(
        &mut out,
        "autoscaler_errors_total",
        "The total number of errors.",
        "component",
        &snapshot.errors,
    );

    out.push_str("# HELP autoscaler_requests_running Requests between admission and completion.\n");
    out.push_str("# TYPE autoscaler_requests_running gauge\n");
    out.push_str(&format!("autoscaler_requests_running {}\n", snapshot.running));
    out
}
