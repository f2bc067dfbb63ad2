//! Command-line consumer: opens a session and prints its events.
//!
//! Run with: cargo run -p agent-cli -- http://127.0.0.1:8000 "Estimate pi with Monte Carlo"
//!
//! Exits non-zero when the session ends with an `error` event.

use std::process::ExitCode;

use anyhow::{Context as _, bail};
use futures::StreamExt;
use sandbox_agent_core::{EventKind, SessionEvent, ToolOutcome};
use sandbox_agent_transport::EventStreamClient;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn render(event: &SessionEvent) {
    match &event.kind {
        EventKind::Thinking { text } => println!("[thinking] {text}"),
        EventKind::ToolCall(call) => {
            println!("[tool call {}] {}", call.invocation_id, call.tool_name);
            if let Some(code) = call.arguments.get("code").and_then(|c| c.as_str()) {
                for line in code.lines() {
                    println!("    {line}");
                }
            }
        }
        EventKind::ToolResult(result) => match &result.outcome {
            ToolOutcome::Ok { result: execution } => {
                println!(
                    "[tool result {}] {:?} in {} ms",
                    result.invocation_id, execution.exit_status, execution.duration_ms
                );
                if !execution.stdout.is_empty() {
                    println!("  stdout:\n{}", execution.stdout.trim_end());
                }
                if !execution.stderr.is_empty() {
                    println!("  stderr:\n{}", execution.stderr.trim_end());
                }
            }
            ToolOutcome::Error { error } => {
                println!(
                    "[tool result {}] rejected ({:?}): {}",
                    result.invocation_id, error.kind, error.message
                );
            }
        },
        EventKind::FinalAnswer { text } => println!("\n{text}"),
        EventKind::Error { kind, message } => eprintln!("[error {kind:?}] {message}"),
    }
}

async fn run(base_url: String, prompt: String) -> anyhow::Result<bool> {
    let client = EventStreamClient::new(base_url);
    let session_id = client
        .start_session(&prompt)
        .await
        .context("starting session")?;
    tracing::info!(%session_id, "session started");

    let mut events = client.subscribe(session_id).await.context("subscribing")?;
    while let Some(event) = events.next().await {
        let event = event.context("reading event stream")?;
        render(&event);
        if event.is_terminal() {
            return Ok(matches!(event.kind, EventKind::FinalAnswer { .. }));
        }
    }
    bail!("event stream ended without a terminal event")
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let (Some(base_url), Some(prompt)) = (args.next(), args.next()) else {
        bail!("usage: agent-cli <server-url> <prompt>");
    };

    let answered = run(base_url, prompt).await?;
    Ok(if answered {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
