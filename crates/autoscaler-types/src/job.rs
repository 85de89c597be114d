//! Request and job status enums.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Name used when a request omits the resource, source or desired state.
pub const DEFAULT_NAME: &str = "default";

/// Direction of a scaling request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RequestType {
    Up,
    Down,
    /// Re-apply the named desired state without moving in either direction.
    Keep,
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Up => "Up",
            Self::Down => "Down",
            Self::Keep => "Keep",
        })
    }
}

/// Lifecycle state of the latest job for a resource name.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    #[default]
    Unknown,
    Accepted,
    Running,
    Done,
    /// Finished without any handler doing real work.
    DoneNoop,
    Failed,
    Canceled,
}

impl JobState {
    /// A job in these states blocks new admissions.
    pub fn is_in_flight(self) -> bool {
        matches!(self, Self::Accepted | Self::Running)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unknown => "UNKNOWN",
            Self::Accepted => "ACCEPTED",
            Self::Running => "RUNNING",
            Self::Done => "DONE",
            Self::DoneNoop => "DONE_NOOP",
            Self::Failed => "FAILED",
            Self::Canceled => "CANCELED",
        })
    }
}
