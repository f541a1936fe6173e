//! Model Context Protocol (MCP) client.
//!
//! [`McpSession`] connects to one MCP server, over streamable HTTP or a
//! spawned stdio process, and exposes discovery, manifest compilation and
//! tool invocation on top of the `rmcp` engine.
//!
//! Connection failures are reported as [`McpError`] values with a closed
//! [`ErrorKind`] taxonomy. When a stdio server fails to start, a separate
//! precheck run of the same command collects its stderr and exit status so
//! the error says why.
//!
//! ```no_run
//! # async fn run() -> Result<(), mcp_conduit::mcp::ClientError> {
//! use mcp_conduit::{config::ClientSettings, mcp::{ConnectionParams, McpSession}};
//!
//! let params = ConnectionParams::Stdio {
//!     name: "time".to_string(),
//!     command: "npx".to_string(),
//!     args: vec!["-y".to_string(), "@mcpcentral/mcp-time".to_string()],
//!     env: None,
//! };
//! let mut session = McpSession::new(params, *ClientSettings::global())?;
//! session.initialize(None).await?;
//! let manifest = session.list_manifests().await;
//! println!("{}", manifest.describe("time"));
//! session.disconnect().await?;
//! # Ok(())
//! # }
//! ```

pub mod classify;
pub mod config;
pub mod engine;
pub mod error;
pub mod manifest;
pub mod precheck;
pub mod session;
pub mod transport;
pub mod types;

pub use engine::{EngineConnector, McpEngine, ProgressCallback, ProgressUpdate, RmcpConnector};
pub use error::{ClientError, EngineError, ErrorKind, McpError};
pub use manifest::{Manifest, PluginManifest, PluginMetadata};
pub use precheck::{PrecheckOutcome, precheck_stdio};
pub use session::{McpSession, SessionState};
pub use transport::{TransportKind, TransportPlan};
pub use types::{
    AuthConfig, ConnectionParams, McpPrompt, McpResource, McpTool, OAuth2Credentials,
    ServerIdentity, ToolCallResult, arguments_from_value,
};
