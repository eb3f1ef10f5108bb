//! Error types for mproj-core.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while reading or editing the provenance record.
#[derive(Debug, Error)]
pub enum MetadataError {
    /// Underlying I/O failure, annotated with the file involved.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The config document is not valid TOML.
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml_edit::TomlError,
    },

    /// The document has no `manageprojects` record at all.
    #[error("no manageprojects record in {path}; was this project started with `mproj start`?")]
    RecordNotFound { path: PathBuf },

    /// A field required by the requested operation is absent.
    #[error("missing '{field}' in the manageprojects record of {path}")]
    MissingField { field: &'static str, path: PathBuf },

    /// `init` was called on a record that already has an initial revision.
    #[error("manageprojects record in {path} is already initialized at revision {revision}")]
    AlreadyInitialized { path: PathBuf, revision: String },

    /// A field exists but holds a value of the wrong shape.
    #[error("invalid '{field}' in {path}: {detail}")]
    InvalidField {
        field: String,
        path: PathBuf,
        detail: String,
    },
}

/// Errors raised while loading the user configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse user config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// `dirs::home_dir()` returned `None`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,
}

/// Convenience constructor for [`MetadataError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> MetadataError {
    MetadataError::Io {
        path: path.into(),
        source,
    }
}
