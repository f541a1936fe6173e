//! Best-effort reclassification of raw engine failures.
//!
//! The engine does not expose structured codes for every failure mode, so the
//! decisions below fall back to matching on error text. All of that matching
//! lives here.

use super::error::{CONNECTION_CLOSED, EngineError, ErrorKind, McpError, RedactedParams};
use super::transport::TransportKind;

/// Fragments that mark an HTTP connect failure as an authorization problem.
const UNAUTHORIZED_MARKERS: &[&str] = &["401", "unauthorized", "auth required"];

/// Fragments that mark a request failure as a stale or unknown session.
const SESSION_EXPIRED_MARKERS: &[&str] =
    &["no valid session id", "session not found", "invalid session"];

/// What `initialize` should do with a failed connect attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectDisposition {
    /// Raise `AUTHORIZATION_ERROR`.
    Unauthorized,
    /// Return the engine failure untouched.
    PassThrough,
    /// Run the stdio precheck, then fall back to [`fallback_error`].
    Diagnose,
}

fn contains_any(message: &str, markers: &[&str]) -> bool {
    let lowered = message.to_lowercase();
    markers.iter().any(|marker| lowered.contains(marker))
}

pub fn connect_disposition(kind: TransportKind, err: &EngineError) -> ConnectDisposition {
    match kind {
        TransportKind::Http if contains_any(&err.message, UNAUTHORIZED_MARKERS) => {
            ConnectDisposition::Unauthorized
        }
        TransportKind::Http => ConnectDisposition::PassThrough,
        TransportKind::Stdio => ConnectDisposition::Diagnose,
    }
}

pub fn authorization_error(err: &EngineError) -> McpError {
    McpError::new(ErrorKind::AuthorizationError, err.message.clone())
        .with_step("mcp_connect")
        .with_original_error(err)
}

/// Classification used when no precheck diagnostics are available.
pub fn fallback_error(err: &EngineError, params: RedactedParams) -> McpError {
    let classified = if err.code == Some(CONNECTION_CLOSED) {
        McpError::new(
            ErrorKind::ConnectionFailed,
            format!("MCP connection failed: {}", err.message),
        )
    } else {
        McpError::new(ErrorKind::UnknownError, err.message.clone())
    };
    classified
        .with_step("mcp_connect")
        .with_original_error(err)
        .with_params(params)
}

pub fn is_session_expired(message: &str) -> bool {
    contains_any(message, SESSION_EXPIRED_MARKERS)
}
