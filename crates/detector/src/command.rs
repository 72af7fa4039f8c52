//! Scoped external command runner.
//!
//! Every subprocess probe in the crate (disk-capacity query, package
//! listing, extended macOS metrics, rocm-smi) goes through [`run`]:
//! spawn, capture output with a bounded wait, classify the outcome.
//! Callers treat every error as "value not available" — a hung or
//! missing binary never stalls sibling reads or surfaces to a client.

use std::process::Stdio;
use std::time::Duration;

use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

/// Errors produced by the command runner.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("{program} exited with {code:?}: {stderr}")]
    NonZeroExit {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("{program} did not finish within {timeout:?}")]
    Timeout { program: String, timeout: Duration },
}

/// Runs `program` with `args`, waiting at most `timeout`, and returns
/// trimmed stdout on success.
///
/// Stdout/stderr are captured; stdin is closed. On timeout the child is
/// killed by the dropped handle (`kill_on_drop`).
pub async fn run(
    program: &str,
    args: &[&str],
    timeout: Duration,
) -> Result<String, CommandError> {
    debug!(program, ?args, "running external command");

    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output();

    let output = match tokio::time::timeout(timeout, child).await {
        Ok(Ok(output)) => output,
        Ok(Err(source)) => {
            return Err(CommandError::Spawn {
                program: program.to_string(),
                source,
            });
        }
        Err(_) => {
            return Err(CommandError::Timeout {
                program: program.to_string(),
                timeout,
            });
        }
    };

    if !output.status.success() {
        return Err(CommandError::NonZeroExit {
            program: program.to_string(),
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[cfg(unix)]
    async fn captures_stdout() {
        let out = run("echo", &["hello"], Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(out, "hello");
    }

    #[tokio::test]
    async fn missing_binary_is_a_spawn_error() {
        let err = run(
            "borealis-test-no-such-binary",
            &[],
            Duration::from_secs(1),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, CommandError::Spawn { .. }));
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn nonzero_exit_is_classified() {
        let err = run("false", &[], Duration::from_secs(5)).await.unwrap_err();
        assert!(matches!(err, CommandError::NonZeroExit { .. }));
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn slow_command_times_out() {
        let err = run("sleep", &["5"], Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::Timeout { .. }));
    }
}
