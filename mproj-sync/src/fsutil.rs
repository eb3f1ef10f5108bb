//! Tree copy helpers that skip VCS metadata.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{io_err, SyncError};

const GIT_DIR: &str = ".git";

/// Relative paths of all regular files below `root`, `.git` excluded, sorted.
pub(crate) fn list_files(root: &Path) -> Result<Vec<PathBuf>, SyncError> {
    let mut files = Vec::new();
    let walker = WalkDir::new(root)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.file_name() != GIT_DIR);
    for entry in walker {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            io_err(path, e.into())
        })?;
        if entry.file_type().is_file() {
            let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
            files.push(relative.to_path_buf());
        }
    }
    Ok(files)
}

/// Copy every file below `src` into `dst`, keeping permissions.
pub(crate) fn copy_tree(src: &Path, dst: &Path) -> Result<(), SyncError> {
    for relative in list_files(src)? {
        copy_file(&src.join(&relative), &dst.join(&relative))?;
    }
    Ok(())
}

/// Copy one file, creating parent directories.
pub(crate) fn copy_file(src: &Path, dst: &Path) -> Result<(), SyncError> {
    if let Some(parent) = dst.parent() {
        std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }
    std::fs::copy(src, dst).map_err(|e| io_err(dst, e))?;
    Ok(())
}

/// Remove everything in `root` except `.git`.
pub(crate) fn clear_worktree(root: &Path) -> Result<(), SyncError> {
    let entries = std::fs::read_dir(root).map_err(|e| io_err(root, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| io_err(root, e))?;
        if entry.file_name() == GIT_DIR {
            continue;
        }
        let path = entry.path();
        let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
        let removed = if is_dir {
            std::fs::remove_dir_all(&path)
        } else {
            std::fs::remove_file(&path)
        };
        removed.map_err(|e| io_err(&path, e))?;
    }
    Ok(())
}
