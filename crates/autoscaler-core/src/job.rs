//! Job registry and cooldown gate.
//!
//! One [`JobStatus`] exists per resource name for the life of the
//! process. A new request is admitted only when no job for that name is
//! in flight and, after a successful change, the resource's last
//! modification is older than the cooldown for the request's direction.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use autoscaler_types::{JobState, RequestType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Cooldown applied when the configuration does not set one.
pub const DEFAULT_COOLDOWN_SECS: u64 = 600;

// ── CoolDown ───────────────────────────────────────────────────────

/// Per-direction cooldown in seconds. Zero disables the cooldown.
///
/// Accepts a scalar (`cooldown = 300`) or a table
/// (`cooldown = { up = 60, down = 600 }`); omitted directions use the
/// default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "CoolDownValue")]
pub struct CoolDown {
    pub up: u64,
    pub down: u64,
    pub keep: u64,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CoolDownValue {
    Seconds(u64),
    PerDirection {
        #[serde(default = "default_cooldown")]
        up: u64,
        #[serde(default = "default_cooldown")]
        down: u64,
        #[serde(default = "default_cooldown")]
        keep: u64,
    },
}

fn default_cooldown() -> u64 {
    DEFAULT_COOLDOWN_SECS
}

impl From<CoolDownValue> for CoolDown {
    fn from(value: CoolDownValue) -> Self {
        match value {
            CoolDownValue::Seconds(secs) => Self::uniform(secs),
            CoolDownValue::PerDirection { up, down, keep } => Self { up, down, keep },
        }
    }
}

impl Default for CoolDown {
    fn default() -> Self {
        Self::uniform(DEFAULT_COOLDOWN_SECS)
    }
}

impl CoolDown {
    pub fn uniform(secs: u64) -> Self {
        Self {
            up: secs,
            down: secs,
            keep: secs,
        }
    }

    pub fn for_request(&self, request_type: RequestType) -> Duration {
        Duration::from_secs(match request_type {
            RequestType::Up => self.up,
            RequestType::Down => self.down,
            RequestType::Keep => self.keep,
        })
    }
}

// ── JobStatus ──────────────────────────────────────────────────────

/// Point-in-time view of a [`JobStatus`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub id: String,
    pub status: JobState,
    pub cooldown: CoolDown,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug)]
struct JobInner {
    state: JobState,
    updated_at: DateTime<Utc>,
}

/// Status of the latest job for one resource name.
#[derive(Debug)]
pub struct JobStatus {
    id: String,
    cooldown: CoolDown,
    inner: Mutex<JobInner>,
}

impl JobStatus {
    pub fn new(id: impl Into<String>, cooldown: CoolDown) -> Self {
        Self {
            id: id.into(),
            cooldown,
            inner: Mutex::new(JobInner {
                state: JobState::Unknown,
                updated_at: Utc::now(),
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn cooldown(&self) -> CoolDown {
        self.cooldown
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, JobInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> JobState {
        self.lock().state
    }

    pub fn set_state(&self, state: JobState) {
        let mut inner = self.lock();
        debug!(job_id = %self.id, from = %inner.state, to = %state, "job status changed");
        inner.state = state;
        inner.updated_at = Utc::now();
    }

    pub fn snapshot(&self) -> JobSnapshot {
        let inner = self.lock();
        JobSnapshot {
            id: self.id.clone(),
            status: inner.state,
            cooldown: self.cooldown,
            updated_at: inner.updated_at,
        }
    }

    /// Whether a new request of `request_type` may start now.
    pub fn acceptable(&self, request_type: RequestType, last_modified_at: Option<DateTime<Utc>>) -> bool {
        let state = self.lock().state;
        self.acceptable_at(state, request_type, last_modified_at, Utc::now())
    }

    /// Check admission and mark the job ACCEPTED in one step.
    pub fn try_accept(&self, request_type: RequestType, last_modified_at: Option<DateTime<Utc>>) -> bool {
        let mut inner = self.lock();
        if !self.acceptable_at(inner.state, request_type, last_modified_at, Utc::now()) {
            return false;
        }
        inner.state = JobState::Accepted;
        inner.updated_at = Utc::now();
        true
    }

    fn acceptable_at(
        &self,
        state: JobState,
        request_type: RequestType,
        last_modified_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> bool {
        if state.is_in_flight() {
            return false;
        }
        if state != JobState::Done {
            return true;
        }
        let cooldown = self.cooldown.for_request(request_type);
        let (Some(last_modified_at), false) = (last_modified_at, cooldown.is_zero()) else {
            return true;
        };
        let secs = i64::try_from(cooldown.as_secs())
            .unwrap_or(i64::MAX)
            .min(i64::MAX / 1_000);
        let window = chrono::Duration::seconds(secs);
        match now.checked_sub_signed(window) {
            Some(threshold) => last_modified_at <= threshold,
            None => false,
        }
    }
}

// ── JobRegistry ────────────────────────────────────────────────────

/// All job statuses, keyed by resource name.
#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: Mutex<HashMap<String, Arc<JobStatus>>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the status for `id`, creating it on first sight.
    ///
    /// The cooldown of the first caller wins.
    pub fn get_or_create(&self, id: &str, cooldown: CoolDown) -> Arc<JobStatus> {
        let mut jobs = self.jobs.lock().unwrap_or_else(PoisonError::into_inner);
        jobs.entry(id.to_string())
            .or_insert_with(|| Arc::new(JobStatus::new(id, cooldown)))
            .clone()
    }

    pub fn get(&self, id: &str) -> Option<Arc<JobStatus>> {
        self.jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    pub fn snapshots(&self) -> Vec<JobSnapshot> {
        let jobs = self.jobs.lock().unwrap_or_else(PoisonError::into_inner);
        let mut snapshots: Vec<JobSnapshot> = jobs.values().map(|j| j.snapshot()).collect();
        snapshots.sort_by(|a, b| a.id.cmp(&b.id));
        snapshots
    }
}
