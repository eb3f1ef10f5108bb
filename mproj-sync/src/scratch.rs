//! Disposable working directories.

use std::path::Path;

use tempfile::TempDir;

use crate::error::{io_err, SyncError};

/// Options shared by every operation that renders into scratch space.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncOptions {
    /// Leave scratch directories on disk for inspection.
    pub keep_scratch: bool,
}

/// A temp directory owned by one operation.
///
/// Removed when dropped, whether the operation succeeded or failed, unless
/// `keep_scratch` disabled cleanup.
#[derive(Debug)]
pub struct ScratchDir {
    dir: TempDir,
}

impl ScratchDir {
    pub fn new(prefix: &str, options: &SyncOptions) -> Result<Self, SyncError> {
        let dir = tempfile::Builder::new()
            .prefix(prefix)
            .disable_cleanup(options.keep_scratch)
            .tempdir()
            .map_err(|e| io_err(std::env::temp_dir(), e))?;
        if options.keep_scratch {
            tracing::info!("keeping scratch directory {}", dir.path().display());
        } else {
            tracing::debug!("scratch directory {}", dir.path().display());
        }
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}
