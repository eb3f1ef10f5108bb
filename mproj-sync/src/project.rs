//! Creating managed projects: `start` from a template, `clone` from an
//! existing managed project.

use std::path::{Path, PathBuf};

use chrono::{DateTime, FixedOffset};

use mproj_core::{read_provenance, ContextMap, MetadataStore, Revision};
use mproj_renderer::{RenderOutput, RenderRequest, Renderer};

use crate::error::SyncError;
use crate::patch::{extra_context, render_revision};
use crate::update::require_replay;

/// Inputs of [`start_project`].
#[derive(Debug, Clone, Default)]
pub struct StartRequest {
    pub template: String,
    pub directory: Option<String>,
    pub output_dir: PathBuf,
    /// Overrides for the template's variables.
    pub extra_context: ContextMap,
    pub checkout: Option<String>,
    pub overwrite_if_exists: bool,
}

/// A freshly created managed project.
#[derive(Debug, Clone, PartialEq)]
pub struct ManagedProject {
    pub project_path: PathBuf,
    pub template_repository: PathBuf,
    pub revision: Revision,
    pub commit_date: DateTime<FixedOffset>,
    pub context: ContextMap,
    /// Config document holding the provenance record.
    pub document: PathBuf,
}

/// Render a template and record where the result came from.
pub fn start_project(renderer: &Renderer, request: &StartRequest) -> Result<ManagedProject, SyncError> {
    let mut render_request =
        RenderRequest::new(request.template.clone(), request.output_dir.clone())
            .extra_context(request.extra_context.clone())
            .overwrite_if_exists(request.overwrite_if_exists);
    render_request.directory = request.directory.clone();
    render_request.checkout = request.checkout.clone();

    let output = renderer.render(&render_request)?;
    record(
        output,
        &request.template,
        request.directory.as_deref(),
        request.checkout.as_deref(),
    )
}

/// Replay the template and context of `project_path` into `destination`.
///
/// `destination` is the output directory and must not exist; the project
/// lands in `destination/<rendered name>`.
pub fn clone_project(
    renderer: &Renderer,
    project_path: &Path,
    destination: &Path,
    checkout: Option<&str>,
) -> Result<ManagedProject, SyncError> {
    tracing::info!(
        "clone {} to {}",
        project_path.display(),
        destination.display()
    );
    if destination.exists() {
        return Err(SyncError::DestinationExists {
            path: destination.to_path_buf(),
        });
    }
    let provenance = read_provenance(project_path)?;
    let replay = require_replay(&provenance)?;
    let directory = provenance.template_subdirectory.clone();

    let mut render_request = RenderRequest::new(replay.template, destination.to_path_buf())
        .extra_context(extra_context(replay.context));
    render_request.directory = directory.clone();
    render_request.checkout = checkout.map(str::to_string);

    let output = renderer.render(&render_request)?;
    record(output, replay.template, directory.as_deref(), checkout)
}

fn record(
    output: RenderOutput,
    template: &str,
    directory: Option<&str>,
    checkout: Option<&str>,
) -> Result<ManagedProject, SyncError> {
    let (revision, commit_date) = render_revision(&output, checkout)?;
    tracing::info!(
        "template {} at {} ({})",
        output.repo_path.display(),
        revision,
        commit_date
    );

    let mut store = MetadataStore::open(&output.project_path)?;
    store.init(&revision, commit_date, template, directory)?;
    store.set_replay_context(&output.context)?;
    store.save()?;

    Ok(ManagedProject {
        document: store.path().to_path_buf(),
        project_path: output.project_path,
        template_repository: output.repo_path,
        revision,
        commit_date,
        context: output.context,
    })
}
