//! External program invocation shared by the ImageMagick and Tesseract backends.

use std::ffi::OsStr;
use std::process::{Output, Stdio};
use std::time::Duration;

use tokio::process::Command;
use tracing::debug;

use super::{OcrError, OcrResult};

/// Run `program` to completion and return its output
///
/// Fails on spawn errors, on timeout (the child is killed), and on a non-zero
/// exit status.
pub(crate) async fn run<I, S>(program: &str, args: I, timeout: Option<Duration>) -> OcrResult<Output>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = command
        .spawn()
        .map_err(|e| OcrError::spawn(program, e.to_string()))?;

    let output = match timeout {
        Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
            .await
            .map_err(|_| OcrError::Timeout {
                program: program.to_string(),
                seconds: limit.as_secs(),
            })?,
        None => child.wait_with_output().await,
    }
    .map_err(|e| OcrError::spawn(program, e.to_string()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        return Err(OcrError::ProcessFailed {
            program: program.to_string(),
            status: output.status.to_string(),
            stderr,
        });
    }

    debug!(
        program = %program,
        stdout_bytes = output.stdout.len(),
        "External program finished"
    );
    Ok(output)
}
