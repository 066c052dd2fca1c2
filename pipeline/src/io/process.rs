//! Helpers for running external tools as blocking child processes.
//!
//! Every external effect (dataset tool, container runtime, `patch`, `tree`,
//! `rsync`) goes through here so failures are logged and reported the same
//! way: stderr is logged and the call returns [`PipelineError::Command`].

use std::ffi::OsStr;
use std::process::{Command, ExitStatus, Stdio};

use anyhow::{Context, Result};
use tracing::{debug, error, info, instrument};

use crate::error::PipelineError;

/// Captured child process output.
#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CommandOutput {
    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).to_string()
    }

    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).to_string()
    }

    pub fn success(&self) -> bool {
        self.status.success()
    }
}

/// Render a command for logs and error messages.
pub fn describe(cmd: &Command) -> String {
    let mut parts = vec![cmd.get_program().to_string_lossy().to_string()];
    parts.extend(cmd.get_args().map(|arg| arg.to_string_lossy().to_string()));
    parts.join(" ")
}

/// Run a command to completion, capturing stdout/stderr.
///
/// A non-zero exit status is not an error here; see [`run_checked`].
#[instrument(skip_all, fields(program = ?cmd.get_program()))]
pub fn run_command(mut cmd: Command) -> Result<CommandOutput> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    let description = describe(&cmd);
    debug!(cmd = %description, "spawning child process");
    let output = match cmd.output() {
        Ok(output) => output,
        Err(err) => {
            error!(cmd = %description, err = %err, "failed to spawn command");
            return Err(err).with_context(|| format!("spawn {description}"));
        }
    };
    debug!(exit_code = ?output.status.code(), "command finished");
    Ok(CommandOutput {
        status: output.status,
        stdout: output.stdout,
        stderr: output.stderr,
    })
}

/// Run a command and fail with [`PipelineError::Command`] on non-zero exit.
pub fn run_checked(cmd: Command) -> Result<CommandOutput> {
    let description = describe(&cmd);
    let program = program_name(cmd.get_program());
    let output = run_command(cmd)?;
    if output.success() {
        return Ok(output);
    }
    let stdout = output.stdout_lossy();
    if !stdout.trim().is_empty() {
        info!("{}", stdout.trim_end());
    }
    let stderr = output.stderr_lossy();
    error!(cmd = %description, exit_code = ?output.status.code(), "command failed: {}", stderr.trim());
    Err(PipelineError::Command {
        program,
        code: output.status.code(),
        stderr: stderr.trim().to_string(),
    })
    .with_context(|| format!("run {description}"))
}

/// Run a command and report only whether it succeeded.
///
/// For commands whose exit status is the answer (`git diff --exit-code`,
/// `git ls-files --error-unmatch`). Spawn failures are still errors.
pub fn check(cmd: Command) -> Result<bool> {
    Ok(run_command(cmd)?.success())
}

fn program_name(program: &OsStr) -> String {
    program.to_string_lossy().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describe_joins_program_and_args() {
        let mut cmd = Command::new("datalad");
        cmd.args(["save", "-m", "Reset studyspec file"]);
        assert_eq!(describe(&cmd), "datalad save -m Reset studyspec file");
    }

    #[test]
    fn run_checked_returns_stdout() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "printf hello"]);
        let out = run_checked(cmd).expect("run");
        assert_eq!(out.stdout_lossy(), "hello");
    }

    #[test]
    fn run_checked_reports_stderr_and_code() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "echo broken >&2; exit 3"]);
        let err = run_checked(cmd).unwrap_err();
        match crate::error::classify(&err) {
            Some(PipelineError::Command {
                program,
                code,
                stderr,
            }) => {
                assert_eq!(program, "sh");
                assert_eq!(*code, Some(3));
                assert_eq!(stderr, "broken");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn check_maps_exit_status_to_bool() {
        let mut ok = Command::new("sh");
        ok.args(["-c", "exit 0"]);
        let mut fail = Command::new("sh");
        fail.args(["-c", "exit 1"]);
        assert!(check(ok).expect("check"));
        assert!(!check(fail).expect("check"));
    }

    #[test]
    fn spawn_failure_is_an_error() {
        let cmd = Command::new("definitely-not-an-installed-tool-4711");
        let err = run_command(cmd).unwrap_err();
        assert!(err.to_string().contains("spawn definitely-not-an-installed-tool-4711"));
    }
}
