//! Protocol engine seam.
//!
//! The session never talks to `rmcp` directly: it asks an [`EngineConnector`]
//! for a connected [`McpEngine`] and drives that. [`RmcpConnector`] is the
//! production implementation; tests plug in their own.

use super::error::EngineError;
use super::transport::TransportPlan;
use super::types::{McpPrompt, McpResource, McpTool, ServerIdentity, ToolCallResult};
use async_trait::async_trait;
use rmcp::{
    ClientHandler, RoleClient, ServiceExt,
    model::{CallToolRequestParam, ClientInfo, ProgressNotificationParam},
    service::{NotificationContext, RunningService},
    transport::{
        ConfigureCommandExt, StreamableHttpClientTransport, TokioChildProcess,
        streamable_http_client::StreamableHttpClientTransportConfig,
    },
};
use serde::{Serialize, de::DeserializeOwned};
use std::{fmt, sync::Arc};
use tokio::process::Command;

/// A progress notification forwarded from the server.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgressUpdate {
    pub progress: f64,
    pub total: Option<f64>,
    pub message: Option<String>,
}

/// Receives progress notifications while a session is connecting.
pub type ProgressCallback = Arc<dyn Fn(ProgressUpdate) + Send + Sync>;

/// A connected protocol engine.
#[async_trait]
pub trait McpEngine: Send + Sync + fmt::Debug {
    async fn list_tools(&self) -> Result<Vec<McpTool>, EngineError>;

    async fn list_resources(&self) -> Result<Vec<McpResource>, EngineError>;

    async fn list_prompts(&self) -> Result<Vec<McpPrompt>, EngineError>;

    async fn call_tool(
        &self,
        name: &str,
        arguments: serde_json::Map<String, serde_json::Value>,
    ) -> Result<ToolCallResult, EngineError>;

    /// Server identity from the handshake. In-memory, never fails.
    fn server_identity(&self) -> Option<ServerIdentity>;

    /// Server capability flags from the handshake. In-memory, never fails.
    fn server_capabilities(&self) -> Option<serde_json::Value>;

    /// Tear down the engine and its transport.
    async fn disconnect(self: Box<Self>) -> Result<(), EngineError>;
}

/// Opens engines over a [`TransportPlan`].
#[async_trait]
pub trait EngineConnector: Send + Sync + fmt::Debug {
    async fn connect(
        &self,
        plan: &TransportPlan,
        on_progress: Option<ProgressCallback>,
    ) -> Result<Box<dyn McpEngine>, EngineError>;
}

/// Client handler that relays progress notifications to a callback.
#[derive(Clone)]
pub struct ProgressRelay {
    info: ClientInfo,
    on_progress: Option<ProgressCallback>,
}

impl fmt::Debug for ProgressRelay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressRelay")
            .field("client", &self.info.client_info.name)
            .field("has_callback", &self.on_progress.is_some())
            .finish()
    }
}

impl ClientHandler for ProgressRelay {
    fn on_progress(
        &self,
        params: ProgressNotificationParam,
        _context: NotificationContext<RoleClient>,
    ) -> impl Future<Output = ()> + Send + '_ {
        if let Some(callback) = &self.on_progress {
            callback(progress_update(&params));
        }
        std::future::ready(())
    }

    fn get_info(&self) -> ClientInfo {
        self.info.clone()
    }
}

fn progress_update(params: &ProgressNotificationParam) -> ProgressUpdate {
    let raw = serde_json::to_value(params).unwrap_or_default();
    ProgressUpdate {
        progress: raw["progress"].as_f64().unwrap_or_default(),
        total: raw["total"].as_f64(),
        message: raw["message"].as_str().map(str::to_string),
    }
}

/// Convert engine model values into our descriptor snapshots.
fn snapshot<T: Serialize, U: DeserializeOwned>(items: Vec<T>) -> Result<Vec<U>, EngineError> {
    items
        .into_iter()
        .map(|item| {
            serde_json::to_value(item)
                .and_then(serde_json::from_value)
                .map_err(|e| EngineError::new(format!("Unexpected descriptor shape: {e}")))
        })
        .collect()
}

/// Connects through `rmcp`'s child-process and streamable HTTP transports.
#[derive(Debug, Clone)]
pub struct RmcpConnector {
    client_name: String,
    client_version: String,
}

impl Default for RmcpConnector {
    fn default() -> Self {
        Self {
            client_name: env!("CARGO_PKG_NAME").to_string(),
            client_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl RmcpConnector {
    pub fn new(client_name: impl Into<String>, client_version: impl Into<String>) -> Self {
        Self {
            client_name: client_name.into(),
            client_version: client_version.into(),
        }
    }

    fn client_info(&self) -> ClientInfo {
        let mut info = ClientInfo::default();
        info.client_info.name.clone_from(&self.client_name);
        info.client_info.version.clone_from(&self.client_version);
        info
    }
}

#[async_trait]
impl EngineConnector for RmcpConnector {
    async fn connect(
        &self,
        plan: &TransportPlan,
        on_progress: Option<ProgressCallback>,
    ) -> Result<Box<dyn McpEngine>, EngineError> {
        let relay = ProgressRelay {
            info: self.client_info(),
            on_progress,
        };

        let service = match plan {
            TransportPlan::Http(http) => {
                let client = reqwest::Client::builder()
                    .default_headers(http.headers.clone())
                    .build()
                    .map_err(|e| EngineError::new(format!("Failed to build HTTP client: {e}")))?;
                let transport = StreamableHttpClientTransport::with_client(
                    client,
                    StreamableHttpClientTransportConfig::with_uri(http.url.as_str()),
                );
                relay.serve(transport).await?
            }
            TransportPlan::Stdio(stdio) => {
                let transport = TokioChildProcess::new(Command::new(&stdio.command).configure(
                    |cmd| {
                        cmd.args(&stdio.args).env_clear().envs(&stdio.env);
                    },
                ))
                .map_err(|e| {
                    EngineError::new(format!("Failed to spawn `{}`: {e}", stdio.command))
                })?;
                relay.serve(transport).await?
            }
        };

        Ok(Box::new(RmcpEngine { service }))
    }
}

/// A running `rmcp` client service.
pub struct RmcpEngine {
    service: RunningService<RoleClient, ProgressRelay>,
}

impl fmt::Debug for RmcpEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RmcpEngine")
            .field("server", &self.server_identity())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl McpEngine for RmcpEngine {
    async fn list_tools(&self) -> Result<Vec<McpTool>, EngineError> {
        snapshot(self.service.peer().list_all_tools().await?)
    }

    async fn list_resources(&self) -> Result<Vec<McpResource>, EngineError> {
        snapshot(self.service.peer().list_all_resources().await?)
    }

    async fn list_prompts(&self) -> Result<Vec<McpPrompt>, EngineError> {
        snapshot(self.service.peer().list_all_prompts().await?)
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: serde_json::Map<String, serde_json::Value>,
    ) -> Result<ToolCallResult, EngineError> {
        let result = self
            .service
            .peer()
            .call_tool(CallToolRequestParam {
                name: name.to_string().into(),
                arguments: Some(arguments),
            })
            .await?;

        serde_json::to_value(result)
            .and_then(serde_json::from_value)
            .map_err(|e| EngineError::new(format!("Unexpected tool result shape: {e}")))
    }

    fn server_identity(&self) -> Option<ServerIdentity> {
        let info = self.service.peer().peer_info()?;
        serde_json::to_value(&info.server_info)
            .and_then(serde_json::from_value)
            .ok()
    }

    fn server_capabilities(&self) -> Option<serde_json::Value> {
        let info = self.service.peer().peer_info()?;
        serde_json::to_value(&info.capabilities).ok()
    }

    async fn disconnect(self: Box<Self>) -> Result<(), EngineError> {
        self.service
            .cancel()
            .await
            .map(|reason| tracing::debug!(?reason, "MCP service stopped"))
            .map_err(|e| EngineError::new(format!("Failed to stop MCP service: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_converts_tools() {
        let raw = vec![serde_json::json!({
            "name": "echo",
            "description": "Echo input",
            "inputSchema": { "type": "object", "properties": { "message": { "type": "string" } } }
        })];
        let tools: Vec<McpTool> = snapshot(raw).unwrap();
        assert_eq!(tools[0].name, "echo");
        assert_eq!(tools[0].description.as_deref(), Some("Echo input"));
        assert_eq!(tools[0].input_schema["properties"]["message"]["type"], "string");
    }

    #[test]
    fn test_snapshot_reports_bad_shape() {
        let raw = vec![serde_json::json!({ "description": "no name" })];
        let err = snapshot::<_, McpTool>(raw).unwrap_err();
        assert!(err.message.contains("name"));
    }

    #[test]
    fn test_client_info_uses_connector_identity() {
        let info = RmcpConnector::new("probe", "9.9.9").client_info();
        assert_eq!(info.client_info.name, "probe");
        assert_eq!(info.client_info.version, "9.9.9");
    }
}
