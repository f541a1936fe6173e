//! Connection session lifecycle.
//!
//! A session owns at most one engine. It moves through
//! `Unconnected -> Initializing -> Ready -> Disconnected`; a failed
//! `initialize` leaves it `Failed`. Neither end state can be left.

use super::classify::{self, ConnectDisposition};
use super::engine::{EngineConnector, McpEngine, ProgressCallback, RmcpConnector};
use super::error::{ClientError, EngineError, McpError};
use super::manifest::Manifest;
use super::precheck;
use super::transport::TransportPlan;
use super::types::{ConnectionParams, McpPrompt, McpResource, McpTool, ToolCallResult};
use crate::config::ClientSettings;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unconnected,
    Initializing,
    Ready,
    Disconnected,
    Failed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unconnected => "unconnected",
            Self::Initializing => "initializing",
            Self::Ready => "ready",
            Self::Disconnected => "disconnected",
            Self::Failed => "failed",
        })
    }
}

/// A client session against one MCP server.
pub struct McpSession {
    params: ConnectionParams,
    plan: TransportPlan,
    settings: ClientSettings,
    connector: Arc<dyn EngineConnector>,
    engine: Option<Box<dyn McpEngine>>,
    state: SessionState,
}

impl fmt::Debug for McpSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("McpSession")
            .field("server", &self.params.name())
            .field("type", &self.params.type_tag())
            .field("state", &self.state)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl McpSession {
    /// Build a session that connects through `rmcp`.
    pub fn new(params: ConnectionParams, settings: ClientSettings) -> Result<Self, McpError> {
        Self::with_connector(params, settings, Arc::new(RmcpConnector::default()))
    }

    /// Build a session from loosely typed parameters, e.g. a host message.
    pub fn from_value(value: Value, settings: ClientSettings) -> Result<Self, McpError> {
        Self::new(ConnectionParams::from_value(value)?, settings)
    }

    pub fn with_connector(
        params: ConnectionParams,
        settings: ClientSettings,
        connector: Arc<dyn EngineConnector>,
    ) -> Result<Self, McpError> {
        let plan = TransportPlan::build(&params)?;
        debug!(
            server = %params.name(),
            params = ?params.redacted(),
            "MCP session created"
        );
        Ok(Self {
            params,
            plan,
            settings,
            connector,
            engine: None,
            state: SessionState::Unconnected,
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn params(&self) -> &ConnectionParams {
        &self.params
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    /// Connect and run the protocol handshake.
    ///
    /// Progress notifications received while connecting are forwarded to
    /// `on_progress`. A session can be initialized once.
    pub async fn initialize(
        &mut self,
        on_progress: Option<ProgressCallback>,
    ) -> Result<(), ClientError> {
        if self.state != SessionState::Unconnected {
            return Err(McpError::validation(format!(
                "MCP session cannot be initialized from state `{}`",
                self.state
            ))
            .with_step("mcp_connect")
            .with_params(self.params.redacted())
            .into());
        }

        self.state = SessionState::Initializing;
        info!(
            name: "mcp.session.initializing",
            server = %self.params.name(),
            transport = %self.params.type_tag(),
            "Connecting to MCP server"
        );

        match self.connector.connect(&self.plan, on_progress).await {
            Ok(engine) => {
                let identity = engine.server_identity();
                self.engine = Some(engine);
                self.state = SessionState::Ready;
                info!(
                    name: "mcp.session.initialized",
                    server = %self.params.name(),
                    peer = ?identity.as_ref().map(|id| id.name.as_str()),
                    peer_version = ?identity.as_ref().and_then(|id| id.version.as_deref()),
                    "MCP session ready"
                );
                Ok(())
            }
            Err(err) => {
                self.state = SessionState::Failed;
                let err = self.classify_connect_failure(err).await;
                warn!(
                    name: "mcp.session.failed",
                    server = %self.params.name(),
                    kind = ?err.kind(),
                    error = %err,
                    "MCP session failed to initialize"
                );
                Err(err)
            }
        }
    }

    async fn classify_connect_failure(&self, err: EngineError) -> ClientError {
        match classify::connect_disposition(self.plan.kind(), &err) {
            ConnectDisposition::Unauthorized => classify::authorization_error(&err).into(),
            ConnectDisposition::PassThrough => err.into(),
            ConnectDisposition::Diagnose => {
                if let TransportPlan::Stdio(stdio) = &self.plan {
                    let outcome = precheck::precheck_stdio(stdio).await;
                    if let Some(diagnosed) = outcome.error {
                        return diagnosed.into();
                    }
                    debug!(
                        server = %self.params.name(),
                        "Precheck found no startup problem"
                    );
                }
                classify::fallback_error(&err, self.params.redacted()).into()
            }
        }
    }

    /// Shut the engine down. Only meaningful from `Ready`.
    pub async fn disconnect(&mut self) -> Result<(), ClientError> {
        let Some(engine) = self.engine.take() else {
            debug!(
                server = %self.params.name(),
                state = %self.state,
                "Disconnect ignored; MCP session is not connected"
            );
            return Ok(());
        };

        self.state = SessionState::Disconnected;
        let result = engine.disconnect().await;
        info!(
            name: "mcp.session.disconnected",
            server = %self.params.name(),
            clean = result.is_ok(),
            "MCP session closed"
        );
        result.map_err(ClientError::from)
    }

    fn engine(&self) -> Result<&dyn McpEngine, ClientError> {
        self.engine.as_deref().ok_or_else(|| {
            McpError::validation(format!(
                "MCP session is not connected (state `{}`)",
                self.state
            ))
            .with_params(self.params.redacted())
            .into()
        })
    }

    /// Tools offered by the server.
    ///
    /// Failures yield an empty list, except an expired session, which the
    /// caller must handle by reconnecting.
    pub async fn list_tools(&self) -> Result<Vec<McpTool>, ClientError> {
        let engine = match self.engine() {
            Ok(engine) => engine,
            Err(err) => {
                warn!(server = %self.params.name(), error = %err, "Cannot list MCP tools");
                return Ok(Vec::new());
            }
        };

        match engine.list_tools().await {
            Ok(tools) => {
                debug!(server = %self.params.name(), count = tools.len(), "Listed MCP tools");
                Ok(tools)
            }
            Err(err) if classify::is_session_expired(&err.message) => {
                warn!(
                    name: "mcp.session.expired",
                    server = %self.params.name(),
                    error = %err,
                    "MCP session expired"
                );
                Err(ClientError::SessionExpired(err.message))
            }
            Err(err) => {
                warn!(server = %self.params.name(), error = %err, "Failed to list MCP tools");
                Ok(Vec::new())
            }
        }
    }

    /// Resources offered by the server; empty on any failure.
    pub async fn list_resources(&self) -> Vec<McpResource> {
        let Ok(engine) = self.engine() else {
            warn!(server = %self.params.name(), "Cannot list MCP resources; not connected");
            return Vec::new();
        };
        engine.list_resources().await.unwrap_or_else(|err| {
            warn!(server = %self.params.name(), error = %err, "Failed to list MCP resources");
            Vec::new()
        })
    }

    /// Prompts offered by the server; empty on any failure.
    pub async fn list_prompts(&self) -> Vec<McpPrompt> {
        let Ok(engine) = self.engine() else {
            warn!(server = %self.params.name(), "Cannot list MCP prompts; not connected");
            return Vec::new();
        };
        engine.list_prompts().await.unwrap_or_else(|err| {
            warn!(server = %self.params.name(), error = %err, "Failed to list MCP prompts");
            Vec::new()
        })
    }

    /// Discover everything the server offers and compile a [`Manifest`].
    pub async fn list_manifests(&self) -> Manifest {
        let (tools, resources, prompts) =
            futures::join!(self.list_tools(), self.list_resources(), self.list_prompts());

        let tools = tools.unwrap_or_else(|err| {
            warn!(server = %self.params.name(), error = %err, "Omitting tools from manifest");
            Vec::new()
        });

        let engine = self.engine.as_deref();
        let identity = engine.and_then(|e| e.server_identity());
        if let Some(capabilities) = engine.and_then(|e| e.server_capabilities()) {
            debug!(server = %self.params.name(), %capabilities, "MCP server capabilities");
        }

        let manifest = Manifest::compile(tools, resources, prompts, identity.as_ref());
        info!(
            name: "mcp.manifest.compiled",
            server = %self.params.name(),
            tools = manifest.tools.as_ref().map_or(0, Vec::len),
            resources = manifest.resources.as_ref().map_or(0, Vec::len),
            prompts = manifest.prompts.as_ref().map_or(0, Vec::len),
            "MCP manifest compiled"
        );
        manifest
    }

    /// Invoke a tool, bounded by the configured tool timeout.
    ///
    /// Engine failures are returned as they are.
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> Result<ToolCallResult, ClientError> {
        let engine = self.engine()?;
        let limit = self.settings.tool_timeout;

        debug!(server = %self.params.name(), tool = %name, "Calling MCP tool");
        match tokio::time::timeout(limit, engine.call_tool(name, arguments)).await {
            Ok(Ok(result)) => {
                info!(
                    name: "mcp.tool.called",
                    server = %self.params.name(),
                    tool = %name,
                    is_error = result.is_error,
                    "MCP tool call finished"
                );
                Ok(result)
            }
            Ok(Err(err)) => {
                warn!(
                    server = %self.params.name(),
                    tool = %name,
                    error = %err,
                    "MCP tool call failed"
                );
                Err(err.into())
            }
            Err(_) => {
                warn!(
                    name: "mcp.tool.timeout",
                    server = %self.params.name(),
                    tool = %name,
                    limit_ms = limit.as_millis(),
                    "MCP tool call timed out"
                );
                Err(EngineError::timeout(limit).into())
            }
        }
    }
}
