//! Wire messages for remote handlers.
//!
//! Requests travel as a JSON document inside a bytes envelope and
//! responses are a stream of small status messages.
//!
//! ```text
//! service autoscaler.handler.HandleService {
//!   rpc PreHandle (HandlerPayload) returns (stream HandlerStatus);
//!   rpc Handle    (HandlerPayload) returns (stream HandlerStatus);
//!   rpc PostHandle(HandlerPayload) returns (stream HandlerStatus);
//! }
//! ```

use autoscaler_types::{HandleResponse, HandleStatus};

use crate::error::{HandlerError, HandlerResult};

pub const PRE_HANDLE_PATH: &str = "/autoscaler.handler.HandleService/PreHandle";
pub const HANDLE_PATH: &str = "/autoscaler.handler.HandleService/Handle";
pub const POST_HANDLE_PATH: &str = "/autoscaler.handler.HandleService/PostHandle";
pub const HEALTH_CHECK_PATH: &str = "/grpc.health.v1.Health/Check";

/// `grpc.health.v1.HealthCheckResponse.ServingStatus.SERVING`
pub const SERVING: i32 = 1;

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct HandlerPayload {
    #[prost(bytes = "vec", tag = "1")]
    pub data: Vec<u8>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct HandlerStatus {
    #[prost(string, tag = "1")]
    pub scaling_job_id: String,
    #[prost(int32, tag = "2")]
    pub status: i32,
    #[prost(string, tag = "3")]
    pub log: String,
}

impl HandlerStatus {
    pub fn into_response(self) -> HandlerResult<HandleResponse> {
        let status = HandleStatus::from_i32(self.status).ok_or(HandlerError::UnknownStatus(self.status))?;
        Ok(HandleResponse {
            scaling_job_id: self.scaling_job_id,
            status,
            log: self.log,
        })
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct HealthCheckRequest {
    #[prost(string, tag = "1")]
    pub service: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct HealthCheckResponse {
    #[prost(int32, tag = "1")]
    pub status: i32,
}
