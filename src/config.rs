use clap::{Parser, Subcommand, ValueEnum};
use config::{Config, Environment};
use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;

/// Ceiling on a single tool call unless `MCP_TOOL_TIMEOUT` says otherwise.
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_millis(60_000);

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Server definitions file
    #[arg(short, long, env = "MCP_SERVERS_FILE", default_value = "mcp.json")]
    pub config: PathBuf,

    /// Log output format
    #[arg(long, env = "MCP_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Print the plugin manifest of a server
    Manifest { server: String },
    /// List the tools a server exposes
    Tools { server: String },
    /// Call a tool and print its result as Markdown
    Call {
        server: String,
        tool: String,
        /// Tool arguments as a JSON object
        #[arg(long, default_value = "{}")]
        args: String,
    },
}

/// Process-wide client settings, resolved once and handed to each session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientSettings {
    pub tool_timeout: Duration,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            tool_timeout: DEFAULT_TOOL_TIMEOUT,
        }
    }
}

impl ClientSettings {
    /// Read `MCP_*` variables from the environment.
    ///
    /// Never fails; unusable values fall back to defaults.
    pub fn from_env() -> Self {
        let raw = Config::builder()
            .set_default("tool_timeout", DEFAULT_TOOL_TIMEOUT.as_millis().to_string())
            .and_then(|builder| builder.add_source(Environment::with_prefix("MCP")).build())
            .and_then(|cfg| cfg.get_string("tool_timeout"));

        match raw {
            Ok(value) => Self {
                tool_timeout: parse_tool_timeout(Some(&value)),
            },
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read MCP settings; using defaults");
                Self::default()
            }
        }
    }

    /// Settings for this process, read from the environment on first use.
    pub fn global() -> &'static Self {
        static SETTINGS: OnceLock<ClientSettings> = OnceLock::new();
        SETTINGS.get_or_init(Self::from_env)
    }
}

/// Parse a millisecond timeout. Anything that is not a finite positive number
/// yields [`DEFAULT_TOOL_TIMEOUT`].
pub fn parse_tool_timeout(raw: Option<&str>) -> Duration {
    raw.and_then(|value| value.trim().parse::<f64>().ok())
        .filter(|ms| ms.is_finite() && *ms > 0.0)
        .map_or(DEFAULT_TOOL_TIMEOUT, |ms| Duration::from_secs_f64(ms / 1000.0))
}
