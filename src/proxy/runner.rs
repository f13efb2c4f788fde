//! Subprocess execution for one request.
//!
//! stdout is captured in full, stderr goes to the null device. The child is
//! spawned with kill_on_drop, so an abandoned handler cannot leak it.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("failed to run {} {args:?}: {source}", .program.display())]
    Spawn {
        program: PathBuf,
        args: Vec<String>,
        #[source]
        source: std::io::Error,
    },
    #[error("{} did not finish within {timeout:?}", .program.display())]
    TimedOut { program: PathBuf, timeout: Duration },
}

/// What the tool left behind. A non-zero `status` is not an error.
#[derive(Debug)]
pub struct Captured {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
}

/// Spawn `program` with `args`, wait for it to exit, return its stdout.
pub async fn run(
    program: &Path,
    args: &[String],
    timeout: Option<Duration>,
) -> Result<Captured, RunError> {
    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true);

    let spawn_err = |source| RunError::Spawn {
        program: program.to_path_buf(),
        args: args.to_vec(),
        source,
    };

    let output = match timeout {
        None => cmd.output().await.map_err(spawn_err)?,
        Some(limit) => match tokio::time::timeout(limit, cmd.output()).await {
            Ok(res) => res.map_err(spawn_err)?,
            // Dropping the output future drops the child, which kills it.
            Err(_) => {
                return Err(RunError::TimedOut {
                    program: program.to_path_buf(),
                    timeout: limit,
                });
            }
        },
    };

    Ok(Captured {
        status: output.status,
        stdout: output.stdout,
    })
}
