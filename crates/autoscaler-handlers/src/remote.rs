//! Remote handlers reached over gRPC.
//!
//! Each phase call opens its own channel, streams the handler's status
//! updates into the [`ResponseSender`], and drops the channel when the
//! stream ends or an error occurs.

use std::time::Duration;

use autoscaler_types::{HandleRequest, PostHandleRequest};
use serde::Serialize;
use tonic::codec::ProstCodec;
use tonic::codegen::http::uri::PathAndQuery;
use tonic::transport::{Channel, Endpoint};
use tracing::debug;

use crate::error::{HandlerError, HandlerResult};
use crate::proto::{self, HandlerPayload, HandlerStatus};
use crate::sender::ResponseSender;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct RemoteHandler {
    endpoint: String,
    timeout: Option<Duration>,
}

impl RemoteHandler {
    /// `endpoint` is either `host:port` or an `http://` URI.
    pub fn new(endpoint: impl Into<String>) -> HandlerResult<Self> {
        let endpoint = normalize_endpoint(&endpoint.into())?;
        Ok(Self {
            endpoint,
            timeout: None,
        })
    }

    /// Deadline applied to every call.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub async fn pre_handle(&self, req: &HandleRequest, sender: &dyn ResponseSender) -> HandlerResult<()> {
        self.call(proto::PRE_HANDLE_PATH, req, sender).await
    }

    pub async fn handle(&self, req: &HandleRequest, sender: &dyn ResponseSender) -> HandlerResult<()> {
        self.call(proto::HANDLE_PATH, req, sender).await
    }

    pub async fn post_handle(&self, req: &PostHandleRequest, sender: &dyn ResponseSender) -> HandlerResult<()> {
        self.call(proto::POST_HANDLE_PATH, req, sender).await
    }

    async fn call<T: Serialize>(
        &self,
        path: &'static str,
        req: &T,
        sender: &dyn ResponseSender,
    ) -> HandlerResult<()> {
        let data = serde_json::to_vec(req)?;
        let channel = connect(&self.endpoint).await?;
        let mut grpc = tonic::client::Grpc::new(channel);
        grpc.ready().await.map_err(|e| HandlerError::Connect {
            endpoint: self.endpoint.clone(),
            message: format!("service was not ready: {e}"),
        })?;

        let mut request = tonic::Request::new(HandlerPayload { data });
        if let Some(timeout) = self.timeout {
            request.set_timeout(timeout);
        }

        debug!(endpoint = %self.endpoint, %path, "calling remote handler");
        let codec = ProstCodec::<HandlerPayload, HandlerStatus>::default();
        let mut stream = grpc
            .server_streaming(request, PathAndQuery::from_static(path), codec)
            .await?
            .into_inner();

        while let Some(status) = stream.message().await? {
            sender.send(status.into_response()?).await?;
        }
        Ok(())
    }
}

/// Accept `host:port` shorthand; only plain TCP endpoints are supported.
pub(crate) fn normalize_endpoint(endpoint: &str) -> HandlerResult<String> {
    let invalid = |message: &str| HandlerError::InvalidEndpoint {
        endpoint: endpoint.to_string(),
        message: message.to_string(),
    };

    if endpoint.is_empty() {
        return Err(invalid("endpoint is empty"));
    }
    let uri = if endpoint.contains("://") {
        endpoint.to_string()
    } else {
        format!("http://{endpoint}")
    };
    if !uri.starts_with("http://") && !uri.starts_with("https://") {
        return Err(invalid("unsupported scheme"));
    }
    Endpoint::from_shared(uri.clone()).map_err(|e| invalid(&e.to_string()))?;
    Ok(uri)
}

pub(crate) async fn connect(endpoint: &str) -> HandlerResult<Channel> {
    let ep = Endpoint::from_shared(endpoint.to_string()).map_err(|e| HandlerError::InvalidEndpoint {
        endpoint: endpoint.to_string(),
        message: e.to_string(),
    })?;
    ep.connect_timeout(CONNECT_TIMEOUT)
        .connect()
        .await
        .map_err(|e| HandlerError::Connect {
            endpoint: endpoint.to_string(),
            message: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_port_gets_http_scheme() {
        assert_eq!(normalize_endpoint("localhost:8081").unwrap(), "http://localhost:8081");
        assert_eq!(normalize_endpoint("http://10.0.0.1:50051").unwrap(), "http://10.0.0.1:50051");
    }

    #[test]
    fn rejects_unsupported_endpoints() {
        assert!(normalize_endpoint("").is_err());
        assert!(normalize_endpoint("unix:///var/run/handler.sock").is_err());
    }

    #[tokio::test]
    async fn unreachable_endpoint_fails_to_connect() {
        // Bind and drop to get a port nothing listens on.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let remote = RemoteHandler::new(addr.to_string()).unwrap();
        let err = connect(remote.endpoint()).await.unwrap_err();
        assert!(matches!(err, HandlerError::Connect { .. }));
    }
}
