//! Session orchestration and storage for sandboxed code agents.
//!
//! Provides:
//! - `StreamingSession` - One prompt driven to a final answer
//! - `SessionManager` - Start, subscribe to and interrupt sessions
//! - `Subscription` - Event stream that keeps its session alive
//! - Storage implementations (memory)

pub mod manager;
pub mod session;
pub mod storage;

pub use manager::{ManagerError, SessionManager, Subscription};
pub use session::{SessionOutcome, SessionPolicy, SessionState, StreamingSession};
