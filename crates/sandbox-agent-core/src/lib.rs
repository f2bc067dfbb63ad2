//! Core abstractions for sandboxed code-execution agents.
//!
//! This crate provides the fundamental building blocks:
//! - Data model: `ExecutionRequest`, `ExecutionResult`, `ToolInvocation`,
//!   `ToolResult`, `SessionEvent`
//! - `EventLog` - Ordered, append-only session log with live subscription
//! - `AgentConfig` - Explicit configuration passed to constructors
//! - Collaborator traits: `CodeExecutor`, `AgentRuntime`, `SessionStorage`

pub mod config;
pub mod event;
pub mod event_log;
pub mod execution;
pub mod tool;
pub mod traits;

#[cfg(feature = "test-utils")]
pub mod test_utils;

pub use config::{AgentConfig, AgentProfile, CredentialPair, SessionLimits};
pub use event::{EventKind, SessionEvent};
pub use event_log::{EventLog, EventLogError};
pub use execution::{ExecutionRequest, ExecutionResult, ExitStatus, Language, RequestError, RequestId};
pub use tool::{ErrorDescriptor, ErrorKind, ToolDeclaration, ToolInvocation, ToolOutcome, ToolResult};
pub use traits::{
    AgentRuntime, CodeExecutor, RuntimeAction, RuntimeError, RuntimeStep, SessionId, SessionStorage,
    Transcript, TranscriptEntry,
};
