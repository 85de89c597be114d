//! The handler capability.
//!
//! Every handler answers the same three phases. Builtin handlers run
//! in-process; remote handlers are reached over gRPC with a fresh
//! connection per call.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use autoscaler_types::{HandleRequest, PostHandleRequest};

use crate::error::HandlerResult;
use crate::remote::RemoteHandler;
use crate::sender::ResponseSender;

/// In-process handler. Phases it does not override do nothing.
#[async_trait]
pub trait BuiltinHandler: Send + Sync {
    fn name(&self) -> &str;

    async fn pre_handle(&self, _req: &HandleRequest, _sender: &dyn ResponseSender) -> HandlerResult<()> {
        Ok(())
    }

    async fn handle(&self, _req: &HandleRequest, _sender: &dyn ResponseSender) -> HandlerResult<()> {
        Ok(())
    }

    async fn post_handle(&self, _req: &PostHandleRequest, _sender: &dyn ResponseSender) -> HandlerResult<()> {
        Ok(())
    }
}

pub enum HandlerKind {
    Builtin(Arc<dyn BuiltinHandler>),
    Remote(RemoteHandler),
}

pub struct Handler {
    name: String,
    kind: HandlerKind,
}

impl Handler {
    pub fn builtin(handler: Arc<dyn BuiltinHandler>) -> Self {
        Self {
            name: handler.name().to_string(),
            kind: HandlerKind::Builtin(handler),
        }
    }

    pub fn remote(name: impl Into<String>, remote: RemoteHandler) -> Self {
        Self {
            name: name.into(),
            kind: HandlerKind::Remote(remote),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &HandlerKind {
        &self.kind
    }

    pub fn is_builtin(&self) -> bool {
        matches!(self.kind, HandlerKind::Builtin(_))
    }

    pub async fn pre_handle(&self, req: &HandleRequest, sender: &dyn ResponseSender) -> HandlerResult<()> {
        match &self.kind {
            HandlerKind::Builtin(h) => h.pre_handle(req, sender).await,
            HandlerKind::Remote(r) => r.pre_handle(req, sender).await,
        }
    }

    pub async fn handle(&self, req: &HandleRequest, sender: &dyn ResponseSender) -> HandlerResult<()> {
        match &self.kind {
            HandlerKind::Builtin(h) => h.handle(req, sender).await,
            HandlerKind::Remote(r) => r.handle(req, sender).await,
        }
    }

    pub async fn post_handle(&self, req: &PostHandleRequest, sender: &dyn ResponseSender) -> HandlerResult<()> {
        match &self.kind {
            HandlerKind::Builtin(h) => h.post_handle(req, sender).await,
            HandlerKind::Remote(r) => r.post_handle(req, sender).await,
        }
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match &self.kind {
            HandlerKind::Builtin(_) => "builtin".to_string(),
            HandlerKind::Remote(r) => format!("remote({})", r.endpoint()),
        };
        f.debug_struct("Handler")
            .field("name", &self.name)
            .field("kind", &kind)
            .finish()
    }
}
