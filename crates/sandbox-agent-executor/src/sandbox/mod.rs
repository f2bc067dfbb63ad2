//! Sandbox client: signed execution requests to the remote sandbox.

pub mod client;
pub mod signer;
pub mod wire;

pub use client::{SandboxClient, SandboxError};
pub use signer::{NoopSigner, RequestSigner, SignError, SignableRequest, StaticKeySigner};
