//! Chat-completions agent runtime.

pub mod client;
pub mod protocol;

pub use client::ChatCompletionsRuntime;
