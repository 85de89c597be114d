//! autoscaler-handlers — the units of work driven by the handler pipeline.
//!
//! # Architecture
//!
//! ```text
//!                    ┌────────────────────┐
//!   pipeline ──────► │ Handler            │
//!                    │  ├─ Builtin ───────┼──► CloudApi
//!                    │  └─ Remote ────────┼──► gRPC HandleService
//!                    └─────────┬──────────┘
//!                              │ HandleResponse stream
//!                              ▼
//!                        ResponseSender
//! ```
//!
//! Every handler exposes PreHandle, Handle and PostHandle. Progress is
//! reported through a [`ResponseSender`] as RECEIVED → ACCEPTED →
//! RUNNING → DONE, or IGNORED when the request does not apply.

pub mod builtin;
pub mod error;
pub mod handler;
pub mod health;
pub mod proto;
pub mod remote;
pub mod sender;

pub use builtin::{BUILTIN_HANDLER_NAMES, builtin_handlers};
pub use error::{HandlerError, HandlerResult};
pub use handler::{BuiltinHandler, Handler, HandlerKind};
pub use health::check_health;
pub use remote::RemoteHandler;
pub use sender::ResponseSender;
