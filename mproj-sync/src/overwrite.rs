//! Overwrite mode: copy the head render over a clean project.

use std::path::{Path, PathBuf};

use chrono::{DateTime, FixedOffset};
use similar::{ChangeTag, TextDiff};

use mproj_core::{ContextMap, Revision};
use mproj_git::Git;
use mproj_renderer::{RenderRequest, Renderer};

use crate::error::{io_err, SyncError};
use crate::fsutil::{copy_file, list_files};
use crate::patch::{extra_context, render_revision};
use crate::scratch::{ScratchDir, SyncOptions};

/// One file touched by an overwrite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileUpdate {
    /// File did not exist in the project.
    New { path: PathBuf },
    /// File existed with different content. Line counts are zero for
    /// non-text files.
    Updated {
        path: PathBuf,
        added: usize,
        removed: usize,
    },
}

impl FileUpdate {
    pub fn path(&self) -> &Path {
        match self {
            FileUpdate::New { path } | FileUpdate::Updated { path, .. } => path,
        }
    }
}

/// Result of an overwrite that changed at least one file.
#[derive(Debug, Clone, PartialEq)]
pub struct OverwriteResult {
    pub to_revision: Revision,
    pub to_commit_date: DateTime<FixedOffset>,
    /// Project-relative paths, in walk order.
    pub files: Vec<FileUpdate>,
    pub effective_context: ContextMap,
}

/// Overwrite what the current template renders onto `project_path`.
///
/// Refuses with [`SyncError::DirtyWorkingTree`] before touching anything if
/// the project has uncommitted changes. Files the template does not produce
/// are left alone. `Ok(None)` when every rendered file already matches.
pub fn overwrite_project(
    renderer: &Renderer,
    project_path: &Path,
    template: &str,
    directory: Option<&str>,
    replay_context: &ContextMap,
    options: &SyncOptions,
) -> Result<Option<OverwriteResult>, SyncError> {
    tracing::info!(
        "update by overwrite: {} from {}",
        project_path.display(),
        template
    );
    let entries = Git::open(project_path)?.status()?;
    if !entries.is_empty() {
        return Err(SyncError::DirtyWorkingTree {
            path: project_path.to_path_buf(),
            entries,
        });
    }

    let scratch = ScratchDir::new("mproj-overwrite-", options)?;
    let mut request = RenderRequest::new(template, scratch.path().to_path_buf())
        .extra_context(extra_context(replay_context));
    request.directory = directory.map(str::to_string);
    let render = renderer.render(&request)?;
    let (to_revision, to_commit_date) = render_revision(&render, None)?;

    let mut files = Vec::new();
    for relative in list_files(&render.project_path)? {
        let source = render.project_path.join(&relative);
        let target = project_path.join(&relative);
        let update = if target.exists() {
            let new = std::fs::read(&source).map_err(|e| io_err(&source, e))?;
            let old = std::fs::read(&target).map_err(|e| io_err(&target, e))?;
            if new == old {
                tracing::debug!("unchanged: {}", relative.display());
                continue;
            }
            let (added, removed) = line_stats(&old, &new);
            FileUpdate::Updated {
                path: relative,
                added,
                removed,
            }
        } else {
            FileUpdate::New { path: relative }
        };
        copy_file(&source, &project_path.join(update.path()))?;
        tracing::info!("{}: {}", label(&update), update.path().display());
        files.push(update);
    }

    tracing::info!("{} file(s) updated by overwriting", files.len());
    if files.is_empty() {
        return Ok(None);
    }
    Ok(Some(OverwriteResult {
        to_revision,
        to_commit_date,
        files,
        effective_context: render.context,
    }))
}

fn label(update: &FileUpdate) -> &'static str {
    match update {
        FileUpdate::New { .. } => "new",
        FileUpdate::Updated { .. } => "updated",
    }
}

/// Inserted and deleted line counts between two UTF-8 texts.
fn line_stats(old: &[u8], new: &[u8]) -> (usize, usize) {
    let (Ok(old), Ok(new)) = (std::str::from_utf8(old), std::str::from_utf8(new)) else {
        return (0, 0);
    };
    let diff = TextDiff::from_lines(old, new);
    diff.iter_all_changes()
        .fold((0, 0), |(added, removed), change| match change.tag() {
            ChangeTag::Insert => (added + 1, removed),
            ChangeTag::Delete => (added, removed + 1),
            ChangeTag::Equal => (added, removed),
        })
}
