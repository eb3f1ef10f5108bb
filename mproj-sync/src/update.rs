//! Bring a managed project up to the template's current revision.

use std::path::{Path, PathBuf};

use chrono::{DateTime, FixedOffset};

use mproj_core::{ContextMap, MetadataStore, ProjectProvenance, Revision};
use mproj_git::{ApplyMode, ApplyOutcome, Git};
use mproj_renderer::Renderer;

use crate::error::SyncError;
use crate::overwrite::{overwrite_project, OverwriteResult};
use crate::patch::{synthesize, PatchRequest, PatchResult};
use crate::reject::find_rejects;
use crate::scratch::SyncOptions;

/// What a synchronization did.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncResult {
    /// A patch was generated and applied. `rejects` lists the `.rej`
    /// fragments the apply left behind.
    Patch {
        patch: PatchResult,
        apply: ApplyOutcome,
        rejects: Vec<PathBuf>,
    },
    /// Files were copied over a clean project.
    Overwrite(OverwriteResult),
}

impl SyncResult {
    pub fn to_revision(&self) -> &Revision {
        match self {
            SyncResult::Patch { patch, .. } => &patch.to_revision,
            SyncResult::Overwrite(result) => &result.to_revision,
        }
    }

    pub fn to_commit_date(&self) -> DateTime<FixedOffset> {
        match self {
            SyncResult::Patch { patch, .. } => patch.to_commit_date,
            SyncResult::Overwrite(result) => result.to_commit_date,
        }
    }

    pub fn effective_context(&self) -> &ContextMap {
        match self {
            SyncResult::Patch { patch, .. } => &patch.effective_context,
            SyncResult::Overwrite(result) => &result.effective_context,
        }
    }

    /// `true` when some hunks could not be applied.
    pub fn has_conflicts(&self) -> bool {
        matches!(self, SyncResult::Patch { rejects, apply, .. } if !rejects.is_empty() || !apply.is_clean())
    }
}

/// Fields an update needs from the provenance record.
pub(crate) struct Replay<'a> {
    pub template: &'a str,
    pub context: &'a ContextMap,
}

pub(crate) fn require_replay(provenance: &ProjectProvenance) -> Result<Replay<'_>, SyncError> {
    let template = provenance
        .template_reference
        .as_deref()
        .ok_or_else(|| SyncError::MissingField {
            field: "template",
            path: provenance.document.clone(),
        })?;
    let context = provenance
        .replay_context
        .as_ref()
        .ok_or_else(|| SyncError::MissingField {
            field: "cookiecutter_context",
            path: provenance.document.clone(),
        })?;
    Ok(Replay { template, context })
}

/// Update `project_path` from its template.
///
/// `Ok(None)` means the project is already at the template's head. Patch
/// conflicts do not fail the update: they are reported in the result and the
/// record still advances.
pub fn update(
    renderer: &Renderer,
    project_path: &Path,
    overwrite: bool,
    options: &SyncOptions,
) -> Result<Option<SyncResult>, SyncError> {
    let store = MetadataStore::open(project_path)?;
    let provenance = store.read()?;
    let from_revision = provenance
        .current_revision()
        .cloned()
        .ok_or_else(|| SyncError::MissingField {
            field: "initial_revision",
            path: provenance.document.clone(),
        })?;
    let replay = require_replay(&provenance)?;
    let directory = provenance.template_subdirectory.as_deref();

    let result = if overwrite {
        match overwrite_project(
            renderer,
            project_path,
            replay.template,
            directory,
            replay.context,
            options,
        )? {
            Some(result) => SyncResult::Overwrite(result),
            None => {
                tracing::info!("project is up to date, nothing to overwrite");
                return Ok(None);
            }
        }
    } else {
        let request = PatchRequest {
            project_path,
            template: replay.template,
            directory,
            from_revision: &from_revision,
            replay_context: replay.context,
        };
        let Some(patch) = synthesize(renderer, &request, options)? else {
            tracing::info!("no patch was created, nothing to apply");
            return Ok(None);
        };
        apply_patch(project_path, patch)?
    };

    // The patch may have touched the config document itself: re-read it
    // instead of saving the copy loaded above.
    let mut store = MetadataStore::open(project_path)?;
    store.append_migration(result.to_revision(), result.to_commit_date())?;
    store.set_replay_context(result.effective_context())?;
    store.save()?;
    tracing::info!(
        "recorded migration to {} in {}",
        result.to_revision(),
        store.path().display()
    );
    Ok(Some(result))
}

fn apply_patch(project_path: &Path, patch: PatchResult) -> Result<SyncResult, SyncError> {
    let git = Git::open(project_path)?;
    let before = find_rejects(project_path)?;
    let apply = git.apply(&patch.patch_path, ApplyMode::Tolerant)?;
    let rejects: Vec<PathBuf> = find_rejects(project_path)?
        .into_iter()
        .filter(|path| !before.contains(path))
        .collect();
    if !apply.is_clean() {
        tracing::warn!(
            "patch {} did not apply cleanly: {}",
            patch.patch_path.display(),
            apply.stderr.trim()
        );
    }
    Ok(SyncResult::Patch {
        patch,
        apply,
        rejects,
    })
}
