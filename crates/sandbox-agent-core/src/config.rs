//! Explicit configuration passed to constructors.
//!
//! Nothing in the core reads the environment. Binaries call
//! [`AgentConfig::load`] once and hand the pieces to the components.

use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use secrecy::Secret;
use serde::Deserialize;

/// Default model identifier.
pub const DEFAULT_MODEL: &str = "deepseek-v3-2-251201";

/// Access key / secret key pair used to sign sandbox requests.
#[derive(Debug, Clone, Deserialize)]
pub struct CredentialPair {
    pub access_key: String,
    pub secret_key: Secret<String>,
}

impl CredentialPair {
    #[must_use]
    pub fn new(access_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            access_key: access_key.into(),
            secret_key: Secret::new(secret_key.into()),
        }
    }
}

/// Identity and standing instruction of the agent.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentProfile {
    pub name: String,
    pub description: String,
    pub instruction: String,
}

impl Default for AgentProfile {
    fn default() -> Self {
        Self {
            name: "code_agent".into(),
            description: "A fun Python coding assistant".into(),
            instruction: "You are a playful Python code experimenter. Your task is to leverage \
                the sandbox environment to solve a variety of interesting problems. For example: \
                simulating probability problems using the Monte Carlo method, generating fun \
                ASCII art, or solving logic puzzles through algorithms. Please rely on the Python \
                standard library as much as possible. You must use the run_code tool to execute \
                your code and display the results to the user. Avoid installing complex external \
                dependencies"
                .into(),
        }
    }
}

/// Sandbox endpoint settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SandboxSettings {
    /// Full URL of the sandbox execution endpoint.
    pub endpoint: String,
    #[serde(default = "default_region")]
    pub region: String,
    pub tool_id: String,
    pub credentials: CredentialPair,
}

/// Model endpoint settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelSettings {
    /// Base URL of an OpenAI-compatible chat completions API.
    pub endpoint: String,
    pub key: Secret<String>,
    #[serde(default = "default_model")]
    pub name: String,
}

/// Session loop bounds.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct SessionLimits {
    /// Deadline for each sandbox execution, in seconds.
    pub execution_timeout_secs: u64,
    /// Consecutive failed tool results tolerated before the session fails.
    pub max_tool_failures: u32,
    /// Reasoning steps allowed per session.
    pub max_steps: u32,
}

impl SessionLimits {
    #[must_use]
    pub const fn execution_timeout(&self) -> Duration {
        Duration::from_secs(self.execution_timeout_secs)
    }

    /// Reject limits no session could run under.
    ///
    /// # Errors
    /// Returns error if the execution timeout or the step cap is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.execution_timeout_secs == 0 {
            return Err(ConfigError::Message(
                "limits.execution_timeout_secs must be greater than zero".into(),
            ));
        }
        if self.max_steps == 0 {
            return Err(ConfigError::Message("limits.max_steps must be greater than zero".into()));
        }
        Ok(())
    }
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self {
            execution_timeout_secs: 30,
            max_tool_failures: 3,
            max_steps: 16,
        }
    }
}

/// Complete agent configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    pub sandbox: SandboxSettings,
    pub model: ModelSettings,
    #[serde(default)]
    pub limits: SessionLimits,
    #[serde(default)]
    pub profile: AgentProfile,
}

fn default_region() -> String {
    "cn-beijing".into()
}

fn default_model() -> String {
    DEFAULT_MODEL.into()
}

fn default_listen_addr() -> String {
    "0.0.0.0:8000".into()
}

impl AgentConfig {
    /// Load from an optional TOML file, then `SANDBOX_AGENT__*` variables.
    ///
    /// `SANDBOX_AGENT__SANDBOX__ENDPOINT=https://...` maps to `sandbox.endpoint`.
    ///
    /// # Errors
    /// Returns error if a required key is missing or malformed, or a limit is zero.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let sources = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(Environment::with_prefix("SANDBOX_AGENT").separator("__"))
            .build()?;
        Self::from_sources(sources)
    }

    fn from_sources(sources: Config) -> Result<Self, ConfigError> {
        let config: Self = sources.try_deserialize()?;
        config.limits.validate()?;
        Ok(config)
    }
}
