//! Shared helper for invoking external system commands (`update-ca-certificates`,
//! `update-ca-trust`, `nmcli`, `systemctl`, `pkill`, `hostnamectl`, ...).
//!
//! Managers and the trust-store installer all need the same shape: run a
//! command to completion, retry a transient "text file busy" spawn failure,
//! and get back stdout/stderr for logging on non-zero exit.

use std::{path::Path, process::ExitStatus, time::Duration};

use thiserror::Error;
use tokio::process::Command;

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("failed to spawn {binary}: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to wait for {binary}: {source}")]
    Wait {
        binary: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{binary} exited with {status}: {stderr}")]
    NonZeroExit {
        binary: String,
        status: ExitStatus,
        stderr: String,
    },
}

pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

/// Runs `command` to completion, returning its captured output regardless of
/// exit status. Retries a spawn failure caused by `ETXTBSY` (a package
/// manager mid-rewrite of the binary), which is the only spawn failure worth
/// retrying here.
pub async fn run(binary_label: &str, mut command: Command) -> Result<CommandOutput, ProcessError> {
    let child = spawn_with_retry(binary_label, &mut command)?;
    let output = child
        .wait_with_output()
        .await
        .map_err(|source| ProcessError::Wait {
            binary: binary_label.to_string(),
            source,
        })?;
    Ok(CommandOutput {
        status: output.status,
        stdout: output.stdout,
        stderr: output.stderr,
    })
}

/// Like [`run`], but turns a non-zero exit into `Err` carrying stderr, for
/// callers that treat the external tool's failure as their own.
pub async fn run_checked(binary_label: &str, command: Command) -> Result<CommandOutput, ProcessError> {
    let output = run(binary_label, command).await?;
    if !output.status.success() {
        return Err(ProcessError::NonZeroExit {
            binary: binary_label.to_string(),
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim_end().to_string(),
        });
    }
    Ok(output)
}

fn spawn_with_retry(binary_label: &str, command: &mut Command) -> Result<tokio::process::Child, ProcessError> {
    let mut backoff = Duration::from_millis(2);
    for attempt in 0..5 {
        match command.spawn() {
            Ok(child) => return Ok(child),
            Err(source) => {
                let is_busy = matches!(source.kind(), std::io::ErrorKind::ExecutableFileBusy)
                    || source.raw_os_error() == Some(26);
                if is_busy && attempt < 4 {
                    std::thread::sleep(backoff);
                    backoff = std::cmp::min(backoff * 2, Duration::from_millis(50));
                    continue;
                }
                return Err(ProcessError::Spawn {
                    binary: binary_label.to_string(),
                    source,
                });
            }
        }
    }
    unreachable!("spawn_with_retry should return before exhausting retries")
}

pub fn command_output_text(output: &CommandOutput) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = stdout.trim_end();
    let stderr = stderr.trim_end();
    if stdout.is_empty() {
        stderr.to_string()
    } else if stderr.is_empty() {
        stdout.to_string()
    } else {
        format!("{stdout}\n{stderr}")
    }
}

/// Builds a `Command` for `binary` located on `PATH`, used instead of a
/// hardcoded absolute path so tests can substitute a fake binary directory
/// by prepending to `PATH`.
pub fn command_on_path(binary: &str) -> Command {
    Command::new(binary)
}

#[allow(dead_code)]
pub(crate) fn binary_path_exists(path: &Path) -> bool {
    path.is_file()
}
