//! Error types for mproj-renderer.

use std::path::PathBuf;

use thiserror::Error;

use mproj_core::ConfigError;
use mproj_git::GitError;

/// All errors that can arise while resolving or rendering a template.
#[derive(Debug, Error)]
pub enum RenderError {
    /// Tera failed on a name or file body.
    #[error("failed to render {what}: {source}")]
    Tera {
        what: String,
        #[source]
        source: tera::Error,
    },

    /// `cookiecutter.json` is not valid JSON or not an object.
    #[error("invalid context file {path}: {detail}")]
    InvalidContextFile { path: PathBuf, detail: String },

    /// The template location does not exist.
    #[error("template not found: {location}")]
    TemplateNotFound { location: String },

    /// The template has no `cookiecutter.json`.
    #[error("{path} has no cookiecutter.json")]
    MissingContextFile { path: PathBuf },

    /// No `{{ ... }}` directory below the template root.
    #[error("no templated directory found in {path}")]
    NoTemplateDir { path: PathBuf },

    /// More than one `{{ ... }}` directory below the template root.
    #[error("more than one templated directory in {path}: {candidates:?}")]
    AmbiguousTemplateDir {
        path: PathBuf,
        candidates: Vec<String>,
    },

    /// The rendered project directory already exists.
    #[error("output directory {path} already exists")]
    OutputExists { path: PathBuf },

    /// A revision pin was requested for a template that is not under git.
    #[error("cannot check out revision {revision}: {path} is not a git repository")]
    PinRequiresRepository { path: PathBuf, revision: String },

    /// `directory` tried to leave the template repository.
    #[error("invalid template directory '{directory}'")]
    InvalidDirectory { directory: String },

    #[error(transparent)]
    Git(#[from] GitError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("template io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> RenderError {
    RenderError::Io {
        path: path.into(),
        source,
    }
}

pub(crate) fn tera_err(what: impl Into<String>, source: tera::Error) -> RenderError {
    RenderError::Tera {
        what: what.into(),
        source,
    }
}
