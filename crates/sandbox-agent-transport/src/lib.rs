//! Transport layer for streaming session events.
//!
//! Provides:
//! - Wire record for session events (`{type, payload, timestamp, seq}`)
//! - SSE endpoint over a `SessionManager` (feature: server)
//! - HTTP client consumer for that endpoint (feature: client)

pub mod protocol;

#[cfg(feature = "server")]
pub mod sse;

#[cfg(feature = "client")]
pub mod consumer;

pub use protocol::{ListSessionsQuery, StartSessionRequest, StartSessionResponse, WireEvent};

#[cfg(feature = "server")]
pub use sse::{DEFAULT_KEEP_ALIVE, create_router};

#[cfg(feature = "client")]
pub use consumer::{ConsumerError, EventStreamClient};
