//! Build orchestration
//!
//! Turns a resolved repository plus base URL into a published static site:
//! - `build`: runs the site generator in a scratch copy of the checkout
//! - `inflight`: per-render-key registry so one build serves every waiter
//! - `orchestrator`: glues checkout, build and publish together
//!
//! Also hosts the process helpers shared by resolvers and fetchers.

mod build;
mod inflight;
mod orchestrator;

pub use build::{locate_build_root, BuildTool};
pub use inflight::{BuildOutcome, BuildSubscription};
pub use orchestrator::{BuildOrchestrator, BuildTicket, EnsuredArtifact};

use crate::error::{BookpubError, BookpubResult};
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};

/// Max number of output lines to include in build error messages.
const BUILD_ERROR_TAIL_LINES: usize = 50;

/// Extract the useful tail of build output for error diagnostics.
///
/// Returns the last `BUILD_ERROR_TAIL_LINES` lines so error messages are
/// actionable without being overwhelming.
pub(crate) fn build_error_output(lines: &[String]) -> String {
    let start = lines.len().saturating_sub(BUILD_ERROR_TAIL_LINES);
    lines[start..].join("\n")
}

/// Run a command to completion, capturing its output, killing it after
/// `timeout_secs`.
pub(crate) async fn output_with_timeout(
    mut cmd: Command,
    command_line: &str,
    timeout_secs: u64,
) -> BookpubResult<Output> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = cmd
        .spawn()
        .map_err(|e| BookpubError::command_failed(command_line, e))?;

    match tokio::time::timeout(Duration::from_secs(timeout_secs), child.wait_with_output()).await {
        Ok(result) => result.map_err(|e| BookpubError::command_failed(command_line, e)),
        Err(_) => Err(BookpubError::command_exec(
            command_line,
            format!("timed out after {}s", timeout_secs),
        )),
    }
}

/// Stream stdout+stderr from a child process, calling `on_output` for each line.
///
/// Lines are split on `\n` and decoded lossily, so non-UTF-8 output never
/// stops a pipe from being drained. Returns all collected output lines for
/// error reporting. This is a standalone async function (not behind
/// `async_trait`) to avoid lifetime issues with the `dyn Fn` callback.
pub(crate) async fn stream_child_output(
    child: &mut Child,
    on_output: &(dyn Fn(String) + Send + Sync),
) -> BookpubResult<Vec<String>> {
    let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
        return Err(BookpubError::Internal(
            "child output is not piped".to_string(),
        ));
    };

    let mut stderr_reader = BufReader::new(stderr).split(b'\n');
    let mut stdout_reader = BufReader::new(stdout).split(b'\n');

    let mut all_output = Vec::new();
    let mut stderr_done = false;
    let mut stdout_done = false;

    while !stderr_done || !stdout_done {
        let segment = tokio::select! {
            segment = stderr_reader.next_segment(), if !stderr_done => {
                let segment = segment.map_err(|e| BookpubError::io("reading child stderr", e))?;
                stderr_done = segment.is_none();
                segment
            }
            segment = stdout_reader.next_segment(), if !stdout_done => {
                let segment = segment.map_err(|e| BookpubError::io("reading child stdout", e))?;
                stdout_done = segment.is_none();
                segment
            }
        };

        if let Some(bytes) = segment {
            let line = decode_line(&bytes);
            on_output(line.clone());
            all_output.push(line);
        }
    }

    Ok(all_output)
}

/// Lossy UTF-8 decode of one output line, dropping a trailing `\r`
fn decode_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}
