//! `mproj wiggle`: merge reject fragments left by `mproj update`.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use mproj_sync::{wiggle, WiggleOutcome};

/// Arguments for `mproj wiggle`.
#[derive(Args, Debug)]
pub struct WiggleArgs {
    /// Project containing `*.rej` files.
    pub project: PathBuf,

    /// Merge word by word instead of line by line.
    #[arg(long)]
    pub words: bool,
}

impl WiggleArgs {
    pub fn run(self) -> Result<()> {
        let outcomes = wiggle(&self.project, self.words)
            .with_context(|| format!("failed to wiggle {}", self.project.display()))?;
        if outcomes.is_empty() {
            println!("No .rej files in {}.", self.project.display());
            return Ok(());
        }

        for outcome in &outcomes {
            match outcome {
                WiggleOutcome::Merged { target, .. } => {
                    println!("{} merged {}", "✓".green(), target.display())
                }
                WiggleOutcome::Failed {
                    target, code, stderr, ..
                } => println!(
                    "{} {} (exit {}): {}",
                    "✗".red(),
                    target.display(),
                    code.map(|c| c.to_string()).unwrap_or_else(|| "signal".into()),
                    stderr
                ),
                WiggleOutcome::MissingTarget { reject, .. } => {
                    println!("{} {}: no matching file", "-".yellow(), reject.display())
                }
            }
        }
        Ok(())
    }
}
