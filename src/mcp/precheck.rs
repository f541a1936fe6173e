//! Diagnostic precheck for stdio servers.
//!
//! When the engine fails to connect to a stdio server it usually only knows
//! that the pipe closed. The precheck runs the same command line again, on
//! its own, to find out why: whether the executable exists, what it printed
//! to stderr, and how it exited. The process is always killed or reaped
//! before the precheck returns.

use super::error::{ErrorKind, McpError, ProcessInfo, RedactedParams};
use super::transport::StdioPlan;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{ChildStderr, Command};

/// Hard bound on a single precheck run.
pub const PRECHECK_TIMEOUT: Duration = Duration::from_millis(5000);

/// How long to keep draining stderr after the process has exited.
const STDERR_DRAIN: Duration = Duration::from_millis(250);

/// Only the tail of stderr is kept; the last lines carry the failure.
const STDERR_LOG_LIMIT: usize = 64 * 1024;

const NO_ERROR_LOG: &str = "No error log available";

/// Synthetic first message; some servers stay silent until they receive one.
const PROBE_REQUEST: &str = concat!(
    r#"{"jsonrpc":"2.0","id":"precheck","method":"initialize","params":{"#,
    r#""protocolVersion":"2025-03-26","capabilities":{},"#,
    r#""clientInfo":{"name":"precheck","version":"1.0.0"}}}"#,
    "\n"
);

/// Result of a precheck run. `error` is set whenever `success` is false.
#[derive(Debug, Clone, PartialEq)]
pub struct PrecheckOutcome {
    pub success: bool,
    pub error: Option<McpError>,
}

impl PrecheckOutcome {
    fn passed() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    fn failed(error: McpError) -> Self {
        Self {
            success: false,
            error: Some(error),
        }
    }
}

pub async fn precheck_stdio(plan: &StdioPlan) -> PrecheckOutcome {
    run_precheck(plan, PRECHECK_TIMEOUT).await
}

/// Run the precheck with an explicit time limit.
pub async fn run_precheck(plan: &StdioPlan, limit: Duration) -> PrecheckOutcome {
    let params = RedactedParams {
        kind: "stdio".to_string(),
        name: None,
        command: Some(plan.command.clone()),
        args: Some(plan.args.clone()),
    };

    tracing::debug!(command = %plan.command, args = ?plan.args, "Running stdio precheck");

    let mut child = match Command::new(&plan.command)
        .args(&plan.args)
        .env_clear()
        .envs(&plan.env)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
    {
        Ok(child) => child,
        Err(e) => {
            tracing::warn!(command = %plan.command, error = %e, "Precheck spawn failed");
            return PrecheckOutcome::failed(
                McpError::new(
                    ErrorKind::ProcessSpawnError,
                    format!("Failed to start MCP server process: {e}"),
                )
                .with_step("precheck_spawn")
                .with_original_error(&e)
                .with_params(params),
            );
        }
    };

    if let Some(mut stdin) = child.stdin.take() {
        // The process may already be gone; a broken pipe here is expected.
        let _ = stdin.write_all(PROBE_REQUEST.as_bytes()).await;
        let _ = stdin.shutdown().await;
    }

    let mut stderr = child.stderr.take();
    let mut stdout = child.stdout.take();
    let mut stderr_log = Vec::new();
    let mut chunk = [0u8; 4096];
    let mut discard = [0u8; 4096];
    let deadline = tokio::time::sleep(limit);
    tokio::pin!(deadline);

    let exited = loop {
        tokio::select! {
            status = child.wait() => break Some(status),
            read = read_chunk(&mut stderr, &mut chunk) => match read {
                Ok(0) | Err(_) => stderr = None,
                Ok(n) => push_capped(&mut stderr_log, &chunk[..n]),
            },
            // Stdout is discarded, but a full pipe would stall the server.
            read = read_chunk(&mut stdout, &mut discard) => {
                if matches!(read, Ok(0) | Err(_)) {
                    stdout = None;
                }
            },
            () = &mut deadline => break None,
        }
    };

    match exited {
        Some(Ok(status)) => {
            drain_stderr(&mut stderr, &mut stderr_log).await;
            if status.success() {
                tracing::debug!(command = %plan.command, "Precheck process exited cleanly");
                return PrecheckOutcome::passed();
            }

            let log = String::from_utf8_lossy(&stderr_log).trim().to_string();
            tracing::warn!(command = %plan.command, %status, "Precheck process failed");
            PrecheckOutcome::failed(
                McpError::new(ErrorKind::ConnectionFailed, "MCP service startup failed")
                    .with_step("precheck_exit")
                    .with_error_log(log)
                    .with_process(process_info(status))
                    .with_params(params),
            )
        }
        Some(Err(e)) => PrecheckOutcome::failed(
            McpError::new(
                ErrorKind::ConnectionFailed,
                format!("Failed to wait for MCP server process: {e}"),
            )
            .with_step("precheck_wait")
            .with_original_error(&e)
            .with_params(params),
        ),
        None => {
            // `kill` also reaps the child.
            let _ = child.kill().await;
            let process = match child.try_wait() {
                Ok(Some(status)) => process_info(status),
                _ => ProcessInfo::default(),
            };

            let log = String::from_utf8_lossy(&stderr_log).trim().to_string();
            tracing::warn!(
                command = %plan.command,
                limit_ms = limit.as_millis(),
                "Precheck timed out; process killed"
            );
            PrecheckOutcome::failed(
                McpError::new(
                    ErrorKind::InitializationTimeout,
                    format!(
                        "MCP service initialization timed out after {} ms",
                        limit.as_millis()
                    ),
                )
                .with_step("precheck_timeout")
                .with_error_log(if log.is_empty() {
                    NO_ERROR_LOG.to_string()
                } else {
                    log
                })
                .with_process(process)
                .with_params(params),
            )
        }
    }
}

async fn read_chunk<R: AsyncRead + Unpin>(
    pipe: &mut Option<R>,
    buf: &mut [u8],
) -> std::io::Result<usize> {
    match pipe {
        Some(pipe) => pipe.read(buf).await,
        None => std::future::pending().await,
    }
}

/// Append to the stderr log, dropping the oldest bytes past the limit.
fn push_capped(log: &mut Vec<u8>, bytes: &[u8]) {
    log.extend_from_slice(bytes);
    if log.len() > STDERR_LOG_LIMIT {
        let excess = log.len() - STDERR_LOG_LIMIT;
        log.drain(..excess);
    }
}

/// Collect whatever stderr is still buffered after exit.
///
/// Bounded because a grandchild may keep the pipe open.
async fn drain_stderr(pipe: &mut Option<ChildStderr>, log: &mut Vec<u8>) {
    let Some(pipe) = pipe.as_mut() else {
        return;
    };
    let mut chunk = [0u8; 4096];
    let _ = tokio::time::timeout(STDERR_DRAIN, async {
        loop {
            match pipe.read(&mut chunk).await {
                Ok(0) | Err(_) => break,
                Ok(n) => push_capped(log, &chunk[..n]),
            }
        }
    })
    .await;
}

fn process_info(status: ExitStatus) -> ProcessInfo {
    ProcessInfo {
        exit_code: status.code(),
        signal: exit_signal(status),
    }
}

#[cfg(unix)]
fn exit_signal(status: ExitStatus) -> Option<String> {
    use std::os::unix::process::ExitStatusExt;

    let name = |signal: i32| match signal {
        1 => Some("SIGHUP"),
        2 => Some("SIGINT"),
        3 => Some("SIGQUIT"),
        6 => Some("SIGABRT"),
        9 => Some("SIGKILL"),
        11 => Some("SIGSEGV"),
        13 => Some("SIGPIPE"),
        15 => Some("SIGTERM"),
        _ => None,
    };
    status.signal().map(|signal| {
        name(signal).map_or_else(|| format!("signal {signal}"), str::to_string)
    })
}

#[cfg(not(unix))]
fn exit_signal(_status: ExitStatus) -> Option<String> {
    None
}
