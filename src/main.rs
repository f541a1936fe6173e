//! `mcp-conduit` command line client.
//!
//! Connects to one server from an `mcp.json` file and prints its manifest,
//! its tools, or the result of a tool call.

// Allow pedantic clippy warnings that don't add value for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::missing_fields_in_debug)]
#![allow(clippy::default_trait_access)]

use mimalloc::MiMalloc;

/// Global allocator for improved performance (M-MIMALLOC-APPS).
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use dotenvy::dotenv;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use mcp_conduit::config::{Cli, ClientSettings, Command, LogFormat};
use mcp_conduit::mcp::config::McpServersFile;
use mcp_conduit::mcp::{McpSession, ProgressCallback, ProgressUpdate, arguments_from_value};

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Text => registry
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env (if present) before clap reads env-backed flags
    let _ = dotenv();

    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let servers = McpServersFile::load(&cli.config)
        .with_context(|| format!("loading servers from {}", cli.config.display()))?;
    let settings = *ClientSettings::global();
    info!(
        file = %cli.config.display(),
        servers = servers.mcp_servers.len(),
        tool_timeout_ms = settings.tool_timeout.as_millis(),
        "MCP client configured"
    );

    let server = match &cli.command {
        Command::Manifest { server } | Command::Tools { server } | Command::Call { server, .. } => {
            server.as_str()
        }
    };
    let params = servers.connection_params(server).with_context(|| {
        let known = servers.server_names().collect::<Vec<_>>().join(", ");
        format!("resolving server `{server}` (known: {known})")
    })?;

    let on_progress: ProgressCallback = Arc::new(|update: ProgressUpdate| {
        tracing::debug!(
            progress = update.progress,
            total = ?update.total,
            message = ?update.message,
            "Connection progress"
        );
    });

    let mut session = McpSession::new(params, settings)?;
    session
        .initialize(Some(on_progress))
        .await
        .with_context(|| format!("connecting to `{server}`"))?;

    let outcome = run(&cli.command, &session, server).await;
    if let Err(e) = session.disconnect().await {
        tracing::warn!(server = %server, error = %e, "Disconnect failed");
    }
    outcome
}

async fn run(command: &Command, session: &McpSession, server: &str) -> Result<()> {
    match command {
        Command::Manifest { .. } => {
            let plugin = session.list_manifests().await.to_plugin(server, None);
            println!("{}", serde_json::to_string_pretty(&plugin)?);
        }
        Command::Tools { .. } => {
            let tools = session.list_tools().await?;
            println!("{}", serde_json::to_string_pretty(&tools)?);
        }
        Command::Call { tool, args, .. } => {
            let value = serde_json::from_str(args).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Tool arguments are not valid JSON; using {{}}");
                serde_json::Value::Null
            });
            let result = session
                .call_tool(tool, arguments_from_value(value))
                .await
                .with_context(|| format!("calling `{tool}` on `{server}`"))?;
            println!("{}", result.to_markdown());
            if result.is_error {
                bail!("tool `{tool}` reported an error");
            }
        }
    }
    Ok(())
}
