#![cfg(unix)]

use mcp_conduit::mcp::ErrorKind;
use mcp_conduit::mcp::precheck::{precheck_stdio, run_precheck};
use mcp_conduit::mcp::transport::{StdioPlan, default_environment};
use std::time::{Duration, Instant};

fn sh(script: &str) -> StdioPlan {
    StdioPlan {
        command: "sh".to_string(),
        args: vec!["-c".to_string(), script.to_string()],
        env: default_environment(),
    }
}

#[tokio::test]
async fn test_clean_exit_passes() {
    let outcome = precheck_stdio(&sh("exit 0")).await;
    assert!(outcome.success);
    assert!(outcome.error.is_none());
}

#[tokio::test]
async fn test_nonzero_exit_reports_stderr() {
    let outcome = precheck_stdio(&sh("echo 'Error: cannot find module' >&2; exit 1")).await;
    assert!(!outcome.success);

    let err = outcome.error.expect("error on failure");
    assert_eq!(err.kind, ErrorKind::ConnectionFailed);
    assert_eq!(err.message, "MCP service startup failed");
    assert_eq!(err.metadata.step.as_deref(), Some("precheck_exit"));
    assert_eq!(
        err.metadata.error_log.as_deref(),
        Some("Error: cannot find module")
    );
    let process = err.metadata.process.expect("process info");
    assert_eq!(process.exit_code, Some(1));
    assert_eq!(process.signal, None);

    let params = err.metadata.params.expect("params");
    assert_eq!(params.kind, "stdio");
    assert_eq!(params.command.as_deref(), Some("sh"));
}

#[tokio::test]
async fn test_chatty_stdout_does_not_stall_exit() {
    let started = Instant::now();
    let outcome = precheck_stdio(&sh("head -c 200000 /dev/zero; echo boom >&2; exit 3")).await;
    assert!(started.elapsed() < Duration::from_secs(4));

    let err = outcome.error.expect("error on failure");
    assert_eq!(err.kind, ErrorKind::ConnectionFailed);
    assert_eq!(err.metadata.step.as_deref(), Some("precheck_exit"));
    assert_eq!(err.metadata.error_log.as_deref(), Some("boom"));
    assert_eq!(err.metadata.process.and_then(|p| p.exit_code), Some(3));
}

#[tokio::test]
async fn test_stderr_log_keeps_only_the_tail() {
    let outcome = precheck_stdio(&sh(
        "head -c 200000 /dev/zero | tr '\\0' x >&2; echo tail-marker >&2; exit 4",
    ))
    .await;

    let err = outcome.error.expect("error on failure");
    let log = err.metadata.error_log.expect("stderr log");
    assert!(log.len() <= 64 * 1024, "log is {} bytes", log.len());
    assert!(log.ends_with("tail-marker"));
    assert!(log.starts_with('x'));
    assert_eq!(err.metadata.process.and_then(|p| p.exit_code), Some(4));
}

#[tokio::test]
async fn test_signal_exit_is_recorded() {
    let outcome = precheck_stdio(&sh("kill -TERM $$")).await;
    let err = outcome.error.expect("error on failure");
    assert_eq!(err.kind, ErrorKind::ConnectionFailed);
    let process = err.metadata.process.expect("process info");
    assert_eq!(process.exit_code, None);
    assert_eq!(process.signal.as_deref(), Some("SIGTERM"));
}

#[tokio::test]
async fn test_hanging_server_times_out_and_is_killed() {
    let started = Instant::now();
    let outcome = run_precheck(
        &sh("echo 'waiting for input' >&2; exec sleep 30"),
        Duration::from_millis(500),
    )
    .await;
    assert!(started.elapsed() < Duration::from_secs(10));

    let err = outcome.error.expect("error on timeout");
    assert_eq!(err.kind, ErrorKind::InitializationTimeout);
    assert_eq!(
        err.message,
        "MCP service initialization timed out after 500 ms"
    );
    assert_eq!(err.metadata.step.as_deref(), Some("precheck_timeout"));
    assert_eq!(err.metadata.error_log.as_deref(), Some("waiting for input"));
    assert_eq!(
        err.metadata.process.and_then(|p| p.signal).as_deref(),
        Some("SIGKILL")
    );
}

#[tokio::test]
async fn test_silent_timeout_has_placeholder_log() {
    let outcome = run_precheck(&sh("exec sleep 30"), Duration::from_millis(200)).await;
    let err = outcome.error.expect("error on timeout");
    assert_eq!(err.kind, ErrorKind::InitializationTimeout);
    assert_eq!(
        err.metadata.error_log.as_deref(),
        Some("No error log available")
    );
}

#[tokio::test]
async fn test_missing_executable_is_spawn_error() {
    let plan = StdioPlan {
        command: "/nonexistent/mcp-server".to_string(),
        args: vec!["--port".to_string(), "0".to_string()],
        env: default_environment(),
    };
    let err = precheck_stdio(&plan).await.error.expect("spawn error");
    assert_eq!(err.kind, ErrorKind::ProcessSpawnError);
    assert_eq!(err.metadata.step.as_deref(), Some("precheck_spawn"));
    assert!(err.metadata.original_error.is_some());
    let params = err.metadata.params.expect("params");
    assert_eq!(params.command.as_deref(), Some("/nonexistent/mcp-server"));
    assert_eq!(params.args, Some(vec!["--port".to_string(), "0".to_string()]));
}

#[tokio::test]
async fn test_probe_request_reaches_stdin() {
    let script = r#"read line; case "$line" in *'"method":"initialize"'*) exit 0;; *) exit 7;; esac"#;
    let outcome = precheck_stdio(&sh(script)).await;
    assert!(outcome.success, "unexpected outcome: {outcome:?}");
}

#[tokio::test]
async fn test_only_planned_environment_is_visible() {
    let mut plan = sh(r#"test -z "$CARGO_MANIFEST_DIR" && test "$PLANNED" = yes"#);
    plan.env.insert("PLANNED".to_string(), "yes".to_string());
    let outcome = precheck_stdio(&plan).await;
    assert!(outcome.success, "unexpected outcome: {outcome:?}");
}
