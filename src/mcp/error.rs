//! Error taxonomy for MCP session failures.
//!
//! [`McpError`] is a plain value: it can be cloned, serialized and sent across
//! threads or processes. Connection-lifecycle failures are classified into one
//! of the [`ErrorKind`] variants; per-call failures travel as [`EngineError`]
//! and are never reclassified.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed set of classified failure kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// The peer could not be reached or the process exited abnormally.
    ConnectionFailed,
    /// The server executable could not be started at all.
    ProcessSpawnError,
    /// The server did not finish starting within the allotted time.
    InitializationTimeout,
    /// The connection parameters are malformed or unsupported.
    ValidationError,
    /// The remote endpoint rejected our credentials.
    AuthorizationError,
    /// Anything else.
    UnknownError,
}

impl ErrorKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ConnectionFailed => "CONNECTION_FAILED",
            Self::ProcessSpawnError => "PROCESS_SPAWN_ERROR",
            Self::InitializationTimeout => "INITIALIZATION_TIMEOUT",
            Self::ValidationError => "VALIDATION_ERROR",
            Self::AuthorizationError => "AUTHORIZATION_ERROR",
            Self::UnknownError => "UNKNOWN_ERROR",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Connection parameters as they may appear in error metadata.
///
/// Only the transport tag, display name and the command line are kept. URLs,
/// headers, environment and auth material are never copied here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedactedParams {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<String>>,
}

impl RedactedParams {
    /// Params carrying nothing but the transport tag.
    pub fn type_only(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            ..Self::default()
        }
    }
}

/// Exit details of a server process.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signal: Option<String>,
}

/// Structured context attached to every [`McpError`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorMetadata {
    /// When the error was created.
    pub timestamp: DateTime<Utc>,
    /// Free-text phase marker (e.g. `precheck_exit`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<String>,
    /// Display form of the underlying failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<RedactedParams>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process: Option<ProcessInfo>,
    /// Captured stderr of the server process.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_log: Option<String>,
}

impl Default for ErrorMetadata {
    fn default() -> Self {
        Self {
            timestamp: Utc::now(),
            step: None,
            original_error: None,
            params: None,
            process: None,
            error_log: None,
        }
    }
}

/// A classified MCP failure.
#[derive(Debug, Clone, PartialEq, thiserror::Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct McpError {
    #[serde(rename = "type")]
    pub kind: ErrorKind,
    pub message: String,
    pub metadata: ErrorMetadata,
}

impl McpError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            metadata: ErrorMetadata::default(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ValidationError, message)
    }

    #[must_use]
    pub fn with_step(mut self, step: impl Into<String>) -> Self {
        self.metadata.step = Some(step.into());
        self
    }

    #[must_use]
    pub fn with_original_error(mut self, error: impl fmt::Display) -> Self {
        self.metadata.original_error = Some(error.to_string());
        self
    }

    #[must_use]
    pub fn with_params(mut self, params: RedactedParams) -> Self {
        self.metadata.params = Some(params);
        self
    }

    #[must_use]
    pub fn with_process(mut self, process: ProcessInfo) -> Self {
        self.metadata.process = Some(process);
        self
    }

    #[must_use]
    pub fn with_error_log(mut self, log: impl Into<String>) -> Self {
        self.metadata.error_log = Some(log.into());
        self
    }
}

/// JSON-RPC code the engine reports when the connection closed under it.
pub const CONNECTION_CLOSED: i32 = -32000;
/// JSON-RPC code used when a request exceeded its deadline.
pub const REQUEST_TIMEOUT: i32 = -32001;

/// Normalized failure reported by the protocol engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct EngineError {
    pub message: String,
    pub code: Option<i32>,
}

impl EngineError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }

    pub fn with_code(code: i32, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: Some(code),
        }
    }

    pub fn timeout(limit: std::time::Duration) -> Self {
        Self::with_code(
            REQUEST_TIMEOUT,
            format!("Request timed out after {} ms", limit.as_millis()),
        )
    }
}

impl From<rmcp::service::ServiceError> for EngineError {
    fn from(err: rmcp::service::ServiceError) -> Self {
        let code = match &err {
            rmcp::service::ServiceError::McpError(data) => Some(data.code.0),
            _ => None,
        };
        Self {
            message: err.to_string(),
            code,
        }
    }
}

impl From<rmcp::service::ClientInitializeError> for EngineError {
    fn from(err: rmcp::service::ClientInitializeError) -> Self {
        use rmcp::service::ClientInitializeError as Init;

        let closed = match &err {
            Init::ConnectionClosed(_) => true,
            Init::TransportError { error, .. } => is_closed_pipe(error.error.as_ref()),
            _ => false,
        };
        Self {
            message: err.to_string(),
            code: closed.then_some(CONNECTION_CLOSED),
        }
    }
}

/// Whether an I/O failure anywhere in the chain means the peer hung up.
fn is_closed_pipe(err: &(dyn std::error::Error + 'static)) -> bool {
    use std::io::ErrorKind as Io;

    std::iter::successors(Some(err), |e| e.source()).any(|e| {
        e.downcast_ref::<std::io::Error>().is_some_and(|io| {
            matches!(
                io.kind(),
                Io::BrokenPipe
                    | Io::UnexpectedEof
                    | Io::ConnectionReset
                    | Io::ConnectionAborted
                    | Io::NotConnected
            )
        })
    })
}

/// Errors surfaced by [`McpSession`](crate::mcp::McpSession).
#[derive(Debug, Clone, thiserror::Error)]
pub enum ClientError {
    /// A lifecycle failure classified into the [`ErrorKind`] taxonomy.
    #[error(transparent)]
    Classified(#[from] McpError),

    /// An engine failure passed through unchanged.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// The peer no longer recognizes this session; re-initialize.
    #[error("MCP session expired: {0}")]
    SessionExpired(String),
}

impl ClientError {
    /// The taxonomy kind, when this error was classified.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Classified(err) => Some(err.kind),
            Self::Engine(_) | Self::SessionExpired(_) => None,
        }
    }

    pub fn as_mcp_error(&self) -> Option<&McpError> {
        match self {
            Self::Classified(err) => Some(err),
            Self::Engine(_) | Self::SessionExpired(_) => None,
        }
    }
}
