//! `mproj clone`: replay a managed project's template into a new place.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use mproj_sync::clone_project;

use crate::GlobalArgs;

/// Arguments for `mproj clone`.
#[derive(Args, Debug)]
pub struct CloneArgs {
    /// Existing managed project.
    pub project: PathBuf,

    /// New output directory; must not exist.
    pub destination: PathBuf,

    /// Template revision to render instead of the head.
    #[arg(long)]
    pub checkout: Option<String>,
}

impl CloneArgs {
    pub fn run(self, global: &GlobalArgs) -> Result<()> {
        let renderer = global.renderer()?;
        let project = clone_project(
            &renderer,
            &self.project,
            &self.destination,
            self.checkout.as_deref(),
        )
        .with_context(|| format!("failed to clone {}", self.project.display()))?;

        println!(
            "{} cloned {} to {} at {}",
            "✓".green(),
            self.project.display(),
            project.project_path.display().to_string().bold(),
            project.revision,
        );
        Ok(())
    }
}
