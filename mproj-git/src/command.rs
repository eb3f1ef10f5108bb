//! Child-process execution with a bounded wait.

use std::ffi::OsStr;
use std::io::Read;
use std::path::Path;
use std::process::{Command, Output, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::GitError;

/// Default bound for a single git invocation in seconds.
const DEFAULT_GIT_TIMEOUT_SECS: u64 = 5 * 60;

/// Environment override for [`DEFAULT_GIT_TIMEOUT_SECS`].
pub const TIMEOUT_ENV: &str = "MPROJ_GIT_TIMEOUT_SECS";

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// The configured git timeout.
pub fn default_timeout() -> Duration {
    std::env::var(TIMEOUT_ENV)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(Duration::from_secs(DEFAULT_GIT_TIMEOUT_SECS))
}

/// Human-readable rendering of a command line for logs and errors.
pub(crate) fn describe<S: AsRef<OsStr>>(bin: &Path, args: &[S]) -> String {
    let name = bin
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| bin.display().to_string());
    let mut line = name;
    for arg in args {
        line.push(' ');
        line.push_str(&arg.as_ref().to_string_lossy());
    }
    line
}

/// Run `command` to completion or kill it after `timeout`.
///
/// Both pipes are drained on helper threads while waiting so a chatty child
/// (large diffs) cannot block on a full pipe buffer.
pub(crate) fn run_with_timeout(
    mut command: Command,
    description: &str,
    timeout: Duration,
) -> Result<Output, GitError> {
    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| GitError::Spawn {
            command: description.to_string(),
            source,
        })?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let stdout_reader = thread::spawn(move || drain(stdout));
    let stderr_reader = thread::spawn(move || drain(stderr));

    let start = Instant::now();
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {
                if start.elapsed() > timeout {
                    let _ = child.kill();
                    let _ = child.wait();
                    tracing::warn!("killed `{description}` after {timeout:?}");
                    return Err(GitError::Timeout {
                        command: description.to_string(),
                        timeout,
                    });
                }
                thread::sleep(POLL_INTERVAL);
            }
            Err(source) => {
                let _ = child.kill();
                return Err(GitError::Spawn {
                    command: description.to_string(),
                    source,
                });
            }
        }
    };

    Ok(Output {
        status,
        stdout: stdout_reader.join().unwrap_or_default(),
        stderr: stderr_reader.join().unwrap_or_default(),
    })
}

fn drain<R: Read>(pipe: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        let _ = pipe.read_to_end(&mut buf);
    }
    buf
}
