//! Reject fragments (`*.rej`) and merging them with `wiggle`.

use std::path::{Path, PathBuf};
use std::process::Command;

use walkdir::WalkDir;

use crate::error::{io_err, SyncError};

const REJECT_EXTENSION: &str = "rej";

/// All `*.rej` files below `root`, `.git` excluded, sorted.
pub fn find_rejects(root: &Path) -> Result<Vec<PathBuf>, SyncError> {
    let mut rejects = Vec::new();
    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.file_name() != ".git");
    for entry in walker {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            io_err(path, e.into())
        })?;
        let is_reject = entry.file_type().is_file()
            && entry.path().extension().and_then(|e| e.to_str()) == Some(REJECT_EXTENSION);
        if is_reject {
            rejects.push(entry.into_path());
        }
    }
    Ok(rejects)
}

/// What happened to one reject fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WiggleOutcome {
    /// `wiggle` merged the fragment into its target.
    Merged { reject: PathBuf, target: PathBuf },
    /// `wiggle` exited non-zero; conflict markers may have been written.
    Failed {
        reject: PathBuf,
        target: PathBuf,
        code: Option<i32>,
        stderr: String,
    },
    /// The file the fragment belongs to does not exist.
    MissingTarget { reject: PathBuf, target: PathBuf },
}

/// Run `wiggle --merge [--words] --replace <file> <file.rej>` for every
/// reject fragment below `project_path`. Failures are reported, not raised.
pub fn wiggle(project_path: &Path, words: bool) -> Result<Vec<WiggleOutcome>, SyncError> {
    let bin = which::which("wiggle").map_err(|_| SyncError::WiggleNotFound)?;
    if !project_path.is_dir() {
        return Err(io_err(
            project_path,
            std::io::Error::new(std::io::ErrorKind::NotFound, "not a directory"),
        ));
    }

    let mut outcomes = Vec::new();
    for reject in find_rejects(project_path)? {
        let target = reject.with_extension("");
        if !target.is_file() {
            tracing::warn!(
                "skip {}: {} not found",
                reject.display(),
                target.display()
            );
            outcomes.push(WiggleOutcome::MissingTarget { reject, target });
            continue;
        }

        let mut command = Command::new(&bin);
        command.arg("--merge");
        if words {
            command.arg("--words");
        }
        command.arg("--replace").arg(&target).arg(&reject);
        tracing::info!("wiggle {}", target.display());
        let output = command.output().map_err(|e| io_err(&bin, e))?;

        if output.status.success() {
            outcomes.push(WiggleOutcome::Merged { reject, target });
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            tracing::warn!("wiggle failed on {}: {stderr}", target.display());
            outcomes.push(WiggleOutcome::Failed {
                reject,
                target,
                code: output.status.code(),
                stderr,
            });
        }
    }
    Ok(outcomes)
}
