//! Error types for mproj-git.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// All errors that can arise from invoking `git`.
#[derive(Debug, Error)]
pub enum GitError {
    /// No `git` executable on `$PATH`.
    #[error("git executable not found in PATH")]
    BinaryNotFound,

    /// `path` is not inside a git work tree.
    #[error("{path} is not a git repository")]
    NotARepository { path: PathBuf },

    /// The child process could not be started.
    #[error("failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The command did not finish within the configured bound.
    #[error("`{command}` did not finish within {timeout:?}")]
    Timeout { command: String, timeout: Duration },

    /// The command exited unsuccessfully.
    #[error("`{command}` failed with exit code {code:?}: {stderr}")]
    CommandFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    /// The command succeeded but printed something unexpected.
    #[error("unexpected output from `{command}`: {detail}")]
    InvalidOutput { command: String, detail: String },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> GitError {
    GitError::Io {
        path: path.into(),
        source,
    }
}
