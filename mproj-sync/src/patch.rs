//! Patch synthesis: what changed in a template between two revisions, as a
//! diff against the project tree.
//!
//! The template and the project share no history, so the change is replayed
//! in a throwaway repository:
//!
//! 1. render the template at head and at the recorded revision, both with the
//!    project's replay context;
//! 2. commit the old render, replace the work tree with the new render and
//!    commit again;
//! 3. `git diff HEAD~1 HEAD` is the patch.

use std::path::{Path, PathBuf};

use chrono::{DateTime, FixedOffset};

use mproj_core::{ContextMap, Revision};
use mproj_git::Git;
use mproj_renderer::{RenderOutput, RenderRequest, Renderer, CONTEXT_ROOT};

use crate::error::{io_err, SyncError};
use crate::fsutil::{clear_worktree, copy_tree};
use crate::scratch::{ScratchDir, SyncOptions};

/// Patches are kept below the project for later inspection.
pub const PATCH_DIR: &str = ".manageprojects/patches";

/// What [`synthesize`] needs to know about the project.
#[derive(Debug, Clone)]
pub struct PatchRequest<'a> {
    pub project_path: &'a Path,
    pub template: &'a str,
    pub directory: Option<&'a str>,
    pub from_revision: &'a Revision,
    /// The stored context, `{"cookiecutter": {...}}`.
    pub replay_context: &'a ContextMap,
}

/// A synthesized template patch.
#[derive(Debug, Clone, PartialEq)]
pub struct PatchResult {
    pub from_revision: Revision,
    pub to_revision: Revision,
    pub to_commit_date: DateTime<FixedOffset>,
    /// `<project>/.manageprojects/patches/<from>_<to>.patch`
    pub patch_path: PathBuf,
    /// Scratch renders; only present on disk with `keep_scratch`.
    pub rendered_from_path: PathBuf,
    pub rendered_to_path: PathBuf,
    /// Context of the head render, to be stored after a successful apply.
    pub effective_context: ContextMap,
}

/// The `cookiecutter` part of a stored context, used as extra context.
pub(crate) fn extra_context(replay_context: &ContextMap) -> ContextMap {
    match replay_context.get(CONTEXT_ROOT).and_then(|v| v.as_map()) {
        Some(map) => map.clone(),
        None => {
            tracing::warn!("no '{CONTEXT_ROOT}' in replay context");
            ContextMap::new()
        }
    }
}

/// Revision and commit date a render came from: `checkout` if it was pinned,
/// else the template repository's `HEAD`.
pub(crate) fn render_revision(
    output: &RenderOutput,
    checkout: Option<&str>,
) -> Result<(Revision, DateTime<FixedOffset>), SyncError> {
    let git = Git::open(&output.repo_path)?;
    let rev = checkout.unwrap_or("HEAD");
    let revision = git.resolve_revision(rev)?;
    let date = git.commit_date(rev)?;
    Ok((revision, date))
}

/// Build the patch from `from_revision` to the template's current head.
///
/// `Ok(None)` when the head is already `from_revision` or the renders do not
/// differ.
pub fn synthesize(
    renderer: &Renderer,
    request: &PatchRequest<'_>,
    options: &SyncOptions,
) -> Result<Option<PatchResult>, SyncError> {
    tracing::info!(
        "generate update patch for {} from {}",
        request.project_path.display(),
        request.template
    );
    let extra = extra_context(request.replay_context);
    let scratch = ScratchDir::new("mproj-patch-", options)?;

    let base_request = |output: PathBuf| {
        let mut r = RenderRequest::new(request.template, output)
            .extra_context(extra.clone())
            .overwrite_if_exists(true);
        r.directory = request.directory.map(str::to_string);
        r
    };

    let to_render = renderer.render(&base_request(scratch.path().join("to")))?;
    let (to_revision, to_commit_date) = render_revision(&to_render, None)?;
    tracing::info!(
        "update from rev. {} to rev. {} ({})",
        request.from_revision,
        to_revision,
        to_commit_date
    );
    // Short hashes may have grown since the record was written.
    let from_resolved = Git::open(&to_render.repo_path)?
        .resolve_revision(request.from_revision.as_str())
        .unwrap_or_else(|_| request.from_revision.clone());
    if to_revision == from_resolved {
        tracing::info!(
            "latest revision {} from {} is already applied",
            to_revision,
            to_commit_date
        );
        return Ok(None);
    }

    let from_render = renderer.render(
        &base_request(scratch.path().join("from")).checkout(request.from_revision.as_str()),
    )?;
    if from_render.repo_path != to_render.repo_path {
        return Err(SyncError::SourceMismatch {
            from: from_render.repo_path,
            to: to_render.repo_path,
        });
    }

    let repo_dir = scratch.path().join("repo");
    let Some(patch) = diff_renders(&from_render.project_path, &to_render.project_path, &repo_dir)?
    else {
        tracing::info!(
            "no differences between {} and {}",
            request.from_revision,
            to_revision
        );
        return Ok(None);
    };

    let patch_path = request
        .project_path
        .join(PATCH_DIR)
        .join(format!("{}_{}.patch", request.from_revision, to_revision));
    if let Some(parent) = patch_path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }
    std::fs::write(&patch_path, &patch).map_err(|e| io_err(&patch_path, e))?;
    tracing::info!("wrote patch {}", patch_path.display());

    Ok(Some(PatchResult {
        from_revision: request.from_revision.clone(),
        to_revision,
        to_commit_date,
        patch_path,
        rendered_from_path: from_render.project_path,
        rendered_to_path: to_render.project_path,
        effective_context: to_render.context,
    }))
}

/// Two-commit diff of `from` → `to`, staged in a fresh repository at
/// `repo_dir`. `None` when nothing changed.
///
/// The patch is kept as bytes so files in any text encoding apply cleanly.
pub(crate) fn diff_renders(
    from: &Path,
    to: &Path,
    repo_dir: &Path,
) -> Result<Option<Vec<u8>>, SyncError> {
    let git = Git::init(repo_dir)?;
    git.config("core.autocrlf", "false")?;

    copy_tree(from, repo_dir)?;
    git.add_all()?;
    git.commit("template at old revision")?;

    clear_worktree(repo_dir)?;
    copy_tree(to, repo_dir)?;
    git.add_all()?;
    git.commit("template at new revision")?;

    let patch = match git.diff("HEAD~1", "HEAD") {
        Ok(patch) => patch,
        Err(err) => {
            tracing::warn!("git diff failed, treating as no change: {err}");
            return Ok(None);
        }
    };
    if patch.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    Ok(Some(relativize_headers(patch, git.root())))
}

/// Strip any absolute scratch path that made it into `a/…` / `b/…` headers.
/// Patches without such paths are returned untouched.
fn relativize_headers(patch: Vec<u8>, root: &Path) -> Vec<u8> {
    let root = root.display().to_string();
    let root = root.trim_start_matches('/');
    let patch = replace_bytes(patch, format!("a/{root}/").as_bytes(), b"a/");
    replace_bytes(patch, format!("b/{root}/").as_bytes(), b"b/")
}

fn replace_bytes(haystack: Vec<u8>, needle: &[u8], replacement: &[u8]) -> Vec<u8> {
    if needle.is_empty() || !haystack.windows(needle.len()).any(|w| w == needle) {
        return haystack;
    }
    let mut out = Vec::with_capacity(haystack.len());
    let mut rest = haystack.as_slice();
    while !rest.is_empty() {
        if rest.starts_with(needle) {
            out.extend_from_slice(replacement);
            rest = &rest[needle.len()..];
        } else {
            out.push(rest[0]);
            rest = &rest[1..];
        }
    }
    out
}
