//! In-process fakes for testing.
//!
//! Available behind the `test-utils` feature flag.

mod recording_executor;
mod scripted_runtime;

pub use recording_executor::RecordingExecutor;
pub use scripted_runtime::ScriptedRuntime;
