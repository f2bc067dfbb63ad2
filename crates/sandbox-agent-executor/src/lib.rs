//! Sandbox execution client and the `run_code` tool.
//!
//! Provides:
//! - `SandboxClient` - Signed, deadline-bounded calls to the remote sandbox
//! - `RunCodeTool` - Tool adapter validating `run_code` arguments
//! - `ToolTable` - Name-keyed dispatch over declared tools
//! - `ChatCompletionsRuntime` - Agent runtime backed by a hosted model

pub mod run_code;
pub mod runtime;
pub mod sandbox;
pub mod tools;

pub use run_code::{RUN_CODE, RunCodeTool, ZeroTimeout};
pub use runtime::ChatCompletionsRuntime;
pub use sandbox::{NoopSigner, RequestSigner, SandboxClient, SandboxError, StaticKeySigner};
pub use tools::{ToolHandler, ToolTable};
