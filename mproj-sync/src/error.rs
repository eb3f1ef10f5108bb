//! Error types for mproj-sync.

use std::path::PathBuf;

use thiserror::Error;

use mproj_core::MetadataError;
use mproj_git::{GitError, StatusEntry};
use mproj_renderer::RenderError;

/// All errors that can arise from synchronization operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// An error from the template renderer.
    #[error("render error: {0}")]
    Render(#[from] RenderError),

    /// An error reading or writing the provenance record.
    #[error(transparent)]
    Metadata(#[from] MetadataError),

    #[error(transparent)]
    Git(#[from] GitError),

    /// The provenance record lacks a field this operation needs.
    #[error("missing '{field}' in {path}")]
    MissingField { field: &'static str, path: PathBuf },

    /// Overwrite mode refuses to touch uncommitted work.
    #[error("project {path} is not clean ({} pending change(s))", entries.len())]
    DirtyWorkingTree {
        path: PathBuf,
        entries: Vec<StatusEntry>,
    },

    /// The head and pinned renders came from different template repositories.
    #[error("renders came from different template repositories: {from} vs {to}")]
    SourceMismatch { from: PathBuf, to: PathBuf },

    /// Output destination is already there.
    #[error("destination {path} already exists")]
    DestinationExists { path: PathBuf },

    /// No `wiggle` executable on `$PATH`.
    #[error("wiggle executable not found in PATH (hint: apt install wiggle)")]
    WiggleNotFound,

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot write {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}
