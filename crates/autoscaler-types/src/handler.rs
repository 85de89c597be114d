//! Messages exchanged between the pipeline and handlers.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::computed::Computed;
use crate::job::RequestType;

/// Progress reported by a handler on its response stream.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HandleStatus {
    Received,
    Accepted,
    Running,
    Done,
    /// The request does not apply to this handler.
    Ignored,
}

impl HandleStatus {
    pub fn as_i32(self) -> i32 {
        match self {
            Self::Received => 0,
            Self::Accepted => 1,
            Self::Running => 2,
            Self::Done => 3,
            Self::Ignored => 4,
        }
    }

    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(Self::Received),
            1 => Some(Self::Accepted),
            2 => Some(Self::Running),
            3 => Some(Self::Done),
            4 => Some(Self::Ignored),
            _ => None,
        }
    }

    /// Whether this status means the handler did real work.
    pub fn marks_handled(self) -> bool {
        matches!(self, Self::Running | Self::Done)
    }
}

impl fmt::Display for HandleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Received => "RECEIVED",
            Self::Accepted => "ACCEPTED",
            Self::Running => "RUNNING",
            Self::Done => "DONE",
            Self::Ignored => "IGNORED",
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HandleResponse {
    pub scaling_job_id: String,
    pub status: HandleStatus,
    #[serde(default)]
    pub log: String,
}

/// Net effect of the Handle phase, passed to PostHandle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HandleResult {
    #[default]
    Unknown,
    Created,
    Updated,
    Deleted,
}

impl fmt::Display for HandleResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unknown => "UNKNOWN",
            Self::Created => "CREATED",
            Self::Updated => "UPDATED",
            Self::Deleted => "DELETED",
        })
    }
}

/// The scaling request a handler call belongs to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScalingRequest {
    pub request_type: RequestType,
    pub source: String,
    pub resource_name: String,
    pub desired_state_name: String,
    pub scaling_job_id: String,
}

/// Input of PreHandle and Handle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HandleRequest {
    pub request: ScalingRequest,
    pub resource: Computed,
}

/// Input of PostHandle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PostHandleRequest {
    pub request: ScalingRequest,
    pub result: HandleResult,
    pub resource: Computed,
}
