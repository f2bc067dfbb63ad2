//! Code agent server: runs sessions and streams their events over SSE.
//!
//! Run with: cargo run -p agent-server -- [config.toml]
//!
//! Settings come from the optional TOML file and `SANDBOX_AGENT__*`
//! environment variables, e.g. `SANDBOX_AGENT__SANDBOX__ENDPOINT`.

use std::sync::Arc;

use anyhow::Context as _;
use sandbox_agent_core::{AgentConfig, AgentRuntime, CodeExecutor};
use sandbox_agent_executor::{ChatCompletionsRuntime, RunCodeTool, SandboxClient, ToolTable};
use sandbox_agent_session::{SessionManager, SessionPolicy, storage::MemoryStorage};
use sandbox_agent_transport::{DEFAULT_KEEP_ALIVE, create_router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let path = std::env::args().nth(1).unwrap_or_else(|| "agent.toml".into());
    let config = AgentConfig::load(&path).with_context(|| format!("loading configuration from {path}"))?;

    let sandbox: Arc<dyn CodeExecutor> = Arc::new(SandboxClient::new(&config.sandbox));
    let run_code = RunCodeTool::new(sandbox, config.limits.execution_timeout())?;
    let tools = ToolTable::new().with(run_code);
    let runtime: Arc<dyn AgentRuntime> =
        Arc::new(ChatCompletionsRuntime::new(&config.model, config.profile.clone()));

    let manager = Arc::new(SessionManager::new(
        MemoryStorage::new(),
        runtime,
        tools,
        SessionPolicy::from(&config.limits),
    ));

    let app = create_router(manager, DEFAULT_KEEP_ALIVE)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.listen_addr))?;
    tracing::info!(
        addr = %config.listen_addr,
        agent = %config.profile.name,
        model = %config.model.name,
        sandbox = %config.sandbox.endpoint,
        "server listening"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
