//! HTTP client for the remote sandbox.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use sandbox_agent_core::{
    CodeExecutor, ExecutionRequest, ExecutionResult, ExitStatus, config::SandboxSettings,
};

use super::{
    signer::{RequestSigner, SignError, SignableRequest, StaticKeySigner},
    wire::{SandboxRequest, SandboxResponse},
};

/// Sandbox call error. Never escapes [`CodeExecutor::execute`]; it is
/// folded into a `transportError` or `timeout` result.
#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    #[error("signing failed: {0}")]
    Signing(#[from] SignError),
    #[error("request to sandbox failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("sandbox returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed sandbox response: {0}")]
    Decode(String),
}

impl SandboxError {
    fn is_timeout(&self) -> bool {
        matches!(self, Self::Http(e) if e.is_timeout())
    }
}

/// Stateless client for the sandbox execution endpoint.
///
/// Cheap to clone and safe to share across sessions; every call is
/// independent.
#[derive(Clone)]
pub struct SandboxClient {
    endpoint: String,
    region: String,
    tool_id: String,
    signer: Arc<dyn RequestSigner>,
    http: reqwest::Client,
}

impl SandboxClient {
    /// Build a client that signs with the configured key pair.
    #[must_use]
    pub fn new(settings: &SandboxSettings) -> Self {
        Self::with_signer(
            settings.endpoint.clone(),
            settings.region.clone(),
            settings.tool_id.clone(),
            Arc::new(StaticKeySigner::new(settings.credentials.clone())),
        )
    }

    /// Build a client with a custom signer.
    #[must_use]
    pub fn with_signer(
        endpoint: impl Into<String>,
        region: impl Into<String>,
        tool_id: impl Into<String>,
        signer: Arc<dyn RequestSigner>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            region: region.into(),
            tool_id: tool_id.into(),
            signer,
            http: reqwest::Client::new(),
        }
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn send(&self, request: &ExecutionRequest) -> Result<SandboxResponse, SandboxError> {
        let body = serde_json::to_vec(&SandboxRequest::new(request, &self.tool_id))
            .map_err(|e| SandboxError::Decode(e.to_string()))?;

        let headers = self
            .signer
            .sign(&SignableRequest {
                method: "POST",
                url: &self.endpoint,
                region: &self.region,
                body: &body,
            })
            .await?;

        tracing::debug!(
            endpoint = %self.endpoint,
            request_id = %request.request_id(),
            "sending execution request to sandbox"
        );

        let mut builder = self
            .http
            .post(&self.endpoint)
            .header("content-type", "application/json")
            .header("x-request-id", request.request_id().to_string());
        for (name, value) in headers {
            builder = builder.header(name, value);
        }

        let response = builder.body(body).send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(SandboxError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        serde_json::from_str(&text).map_err(|e| SandboxError::Decode(format!("{e}: {text}")))
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[async_trait]
impl CodeExecutor for SandboxClient {
    async fn execute(&self, request: &ExecutionRequest, timeout: Duration) -> ExecutionResult {
        let started = Instant::now();
        let request_id = request.request_id();
        let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);

        // Dropping the in-flight future at the deadline aborts the HTTP call.
        // The remote execution may still finish; its result is discarded.
        match tokio::time::timeout(timeout, self.send(request)).await {
            Err(_) => {
                tracing::warn!(%request_id, timeout_ms, "sandbox execution timed out");
                ExecutionResult::timed_out(request_id, timeout_ms)
            }
            Ok(Err(e)) if e.is_timeout() => ExecutionResult::timed_out(request_id, timeout_ms),
            Ok(Err(e)) => {
                tracing::warn!(%request_id, error = %e, "sandbox transport failure");
                ExecutionResult::transport_error(request_id, e.to_string(), elapsed_ms(started))
            }
            Ok(Ok(response)) => {
                let exit_status = if response.exit_code == 0 {
                    ExitStatus::Ok
                } else {
                    ExitStatus::RuntimeError
                };
                ExecutionResult::completed(
                    request_id,
                    response.stdout,
                    response.stderr,
                    exit_status,
                    elapsed_ms(started),
                )
            }
        }
    }
}
