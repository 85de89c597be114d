//! Reachability check for remote handlers.
//!
//! Uses the standard `grpc.health.v1.Health/Check` call. Run during
//! configuration validation, never on the request path.

use std::time::Duration;

use tonic::codec::ProstCodec;
use tonic::codegen::http::uri::PathAndQuery;
use tracing::debug;

use crate::error::{HandlerError, HandlerResult};
use crate::proto::{self, HealthCheckRequest, HealthCheckResponse};
use crate::remote::{connect, normalize_endpoint};

pub async fn check_health(endpoint: &str, timeout: Duration) -> HandlerResult<()> {
    let endpoint = normalize_endpoint(endpoint)?;
    let channel = connect(&endpoint).await?;
    let mut grpc = tonic::client::Grpc::new(channel);
    grpc.ready().await.map_err(|e| HandlerError::Connect {
        endpoint: endpoint.clone(),
        message: format!("service was not ready: {e}"),
    })?;

    let mut request = tonic::Request::new(HealthCheckRequest::default());
    request.set_timeout(timeout);
    let codec = ProstCodec::<HealthCheckRequest, HealthCheckResponse>::default();
    let response = grpc
        .unary(request, PathAndQuery::from_static(proto::HEALTH_CHECK_PATH), codec)
        .await?
        .into_inner();

    debug!(%endpoint, status = response.status, "handler health check");
    if response.status != proto::SERVING {
        return Err(HandlerError::NotServing {
            endpoint,
            status: response.status,
        });
    }
    Ok(())
}
