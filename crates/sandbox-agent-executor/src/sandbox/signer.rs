//! Request signing seam for sandbox calls.

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use sandbox_agent_core::CredentialPair;
use secrecy::ExposeSecret;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// The parts of an outbound request a signer may cover.
#[derive(Debug, Clone, Copy)]
pub struct SignableRequest<'a> {
    pub method: &'a str,
    pub url: &'a str,
    pub region: &'a str,
    pub body: &'a [u8],
}

/// Signing error.
#[derive(Debug, Error)]
pub enum SignError {
    #[error("Credentials unavailable: {0}")]
    CredentialsUnavailable(String),
    #[error("Signing failed: {0}")]
    Failed(String),
}

/// Produces the authentication headers for a sandbox request.
///
/// Implement this trait to plug in a provider's signature scheme.
/// The client attaches whatever headers the signer returns.
#[async_trait]
pub trait RequestSigner: Send + Sync {
    /// Headers to attach to `request`.
    async fn sign(&self, request: &SignableRequest<'_>) -> Result<Vec<(String, String)>, SignError>;
}

/// Signer that attaches no headers. For local sandboxes without auth.
#[derive(Debug, Default, Clone)]
pub struct NoopSigner;

#[async_trait]
impl RequestSigner for NoopSigner {
    async fn sign(&self, _request: &SignableRequest<'_>) -> Result<Vec<(String, String)>, SignError> {
        Ok(Vec::new())
    }
}

/// Sends the key pair as static credentials alongside a body digest.
///
/// Only meaningful over TLS. Deployments with a provider signature scheme
/// supply their own [`RequestSigner`].
#[derive(Debug, Clone)]
pub struct StaticKeySigner {
    credentials: CredentialPair,
}

impl StaticKeySigner {
    #[must_use]
    pub const fn new(credentials: CredentialPair) -> Self {
        Self { credentials }
    }
}

/// Base64 SHA-256 digest of a request body.
#[must_use]
pub fn content_digest(body: &[u8]) -> String {
    BASE64.encode(Sha256::digest(body))
}

#[async_trait]
impl RequestSigner for StaticKeySigner {
    async fn sign(&self, request: &SignableRequest<'_>) -> Result<Vec<(String, String)>, SignError> {
        let secret = self.credentials.secret_key.expose_secret();
        if self.credentials.access_key.is_empty() || secret.is_empty() {
            return Err(SignError::CredentialsUnavailable(
                "access key and secret key must both be set".into(),
            ));
        }

        Ok(vec![
            ("X-Access-Key".into(), self.credentials.access_key.clone()),
            ("X-Region".into(), request.region.to_string()),
            ("X-Content-Sha256".into(), content_digest(request.body)),
            ("Authorization".into(), format!("Bearer {secret}")),
        ])
    }
}
