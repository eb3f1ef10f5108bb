//! `mproj reverse`: turn a managed project back into a template.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use mproj_sync::reverse;

/// Arguments for `mproj reverse`.
#[derive(Args, Debug)]
pub struct ReverseArgs {
    /// Managed project to reverse.
    pub project: PathBuf,

    /// Where the template is written.
    pub destination: PathBuf,

    /// Write into an existing destination.
    #[arg(long)]
    pub overwrite: bool,
}

impl ReverseArgs {
    pub fn run(self) -> Result<()> {
        let report = reverse(&self.project, &self.destination, self.overwrite)
            .with_context(|| format!("failed to reverse {}", self.project.display()))?;

        for (value, placeholder) in report.table.entries() {
            println!("  {} -> {}", format!("{value:?}").yellow(), placeholder);
        }
        println!(
            "{} wrote {} file(s) to {}",
            "✓".green(),
            report.files.len(),
            report.template_dir.display().to_string().bold(),
        );
        Ok(())
    }
}
