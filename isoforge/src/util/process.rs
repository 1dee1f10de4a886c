//! Helpers for running external tools (vmrun, vdiskmanager, ssh).

use isoforge_shared::errors::{BuildError, BuildResult};
use std::process::Stdio;
use tokio::process::Command;

/// Trailing bytes of stderr kept in error messages.
const MAX_STDERR_BYTES: usize = 1024;

/// Captured output of a finished command.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Run a command to completion and capture its output, without judging the exit status.
pub async fn output(cmd: &mut Command) -> BuildResult<CommandOutput> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    tracing::trace!("exec: {:?}", cmd);

    let out = cmd.output().await.map_err(|e| {
        let err_msg = format!("Failed to execute {:?}: {}", cmd.as_std().get_program(), e);
        tracing::error!("{}", err_msg);
        BuildError::Driver(err_msg)
    })?;

    Ok(CommandOutput {
        exit_code: out.status.code(),
        stdout: String::from_utf8_lossy(&out.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&out.stderr).into_owned(),
    })
}

/// Run a command and fail with `BuildError::Driver` on a non-zero exit.
pub async fn run(cmd: &mut Command) -> BuildResult<CommandOutput> {
    let out = output(cmd).await?;
    if out.success() {
        return Ok(out);
    }
    Err(BuildError::Driver(format!(
        "{:?} exited with {}: {}",
        cmd.as_std().get_program(),
        out.exit_code
            .map(|c| c.to_string())
            .unwrap_or_else(|| "signal".into()),
        stderr_tail(&out.stderr).trim()
    )))
}

/// Last `MAX_STDERR_BYTES` of stderr, cut on a character boundary.
fn stderr_tail(stderr: &str) -> &str {
    if stderr.len() <= MAX_STDERR_BYTES {
        return stderr;
    }
    let mut start = stderr.len() - MAX_STDERR_BYTES;
    while !stderr.is_char_boundary(start) {
        start += 1;
    }
    &stderr[start..]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stderr_tail_truncates() {
        let long = "x".repeat(MAX_STDERR_BYTES * 2);
        assert_eq!(stderr_tail(&long).len(), MAX_STDERR_BYTES);
        assert_eq!(stderr_tail("short"), "short");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_captures_stdout() {
        let out = run(Command::new("sh").args(["-c", "echo hello"]))
            .await
            .unwrap();
        assert_eq!(out.stdout.trim(), "hello");
        assert!(out.success());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_reports_failure() {
        let err = run(Command::new("sh").args(["-c", "echo broken >&2; exit 3"]))
            .await
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("exited with 3"), "{}", message);
        assert!(message.contains("broken"), "{}", message);
    }

    #[tokio::test]
    async fn test_missing_binary() {
        let err = output(&mut Command::new("/nonexistent/isoforge-tool"))
            .await
            .unwrap_err();
        assert!(matches!(err, BuildError::Driver(_)));
    }
}
