#![forbid(unsafe_code)]
//! Local command-monitor IPC server: JSON framing over a POSIX
//! filesystem socket (Windows named pipe stubbed), a permission policy
//! applied around endpoint creation, and handler dispatch under a fixed
//! error-code table.
//!
//! Kept in its own crate so the wire protocol (request/response shapes,
//! the fixed status codes) can be depended on independently of the
//! reconciliation core.

mod channel;
mod error;
mod framing;
mod permissions;
mod protocol;
mod registry;
mod server;

pub use channel::ValidatedChannelString;
pub use error::{CommandMonitorError, StatusCode};
pub use permissions::EndpointPermissions;
pub use protocol::{Request, Response};
pub use registry::{Handler, HandlerOutcome, Registry};
pub use server::{Server, ServerConfig};
