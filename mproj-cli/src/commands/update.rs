//! `mproj update`: apply template changes to a managed project.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use mproj_sync::{update, FileUpdate, SyncError, SyncResult};

use crate::GlobalArgs;

/// Arguments for `mproj update`.
#[derive(Args, Debug)]
pub struct UpdateArgs {
    /// Managed project to update.
    pub project: PathBuf,

    /// Copy rendered files over the project instead of applying a patch.
    /// Requires a clean working tree.
    #[arg(long)]
    pub overwrite: bool,
}

impl UpdateArgs {
    pub fn run(self, global: &GlobalArgs) -> Result<()> {
        let renderer = global.renderer()?;
        let result = match update(
            &renderer,
            &self.project,
            self.overwrite,
            &global.sync_options(),
        ) {
            Ok(result) => result,
            Err(SyncError::DirtyWorkingTree { path, entries }) => {
                eprintln!(
                    "{} {} has uncommitted changes:",
                    "✗".red(),
                    path.display()
                );
                for entry in &entries {
                    eprintln!("  {:>2} {}", entry.flag.yellow(), entry.path);
                }
                anyhow::bail!("commit or stash the changes before updating with --overwrite");
            }
            Err(err) => {
                return Err(anyhow::Error::new(err)
                    .context(format!("failed to update {}", self.project.display())))
            }
        };

        let Some(result) = result else {
            println!(
                "{} {} is up to date",
                "✓".green(),
                self.project.display()
            );
            return Ok(());
        };

        print_result(&result);
        if result.has_conflicts() {
            println!(
                "{} some changes could not be applied; resolve the .rej files or run `mproj wiggle {}`",
                "!".yellow().bold(),
                self.project.display()
            );
        }
        Ok(())
    }
}

fn print_result(result: &SyncResult) {
    match result {
        SyncResult::Patch { patch, rejects, .. } => {
            println!(
                "{} applied {} ({} -> {})",
                "✓".green(),
                patch.patch_path.display(),
                patch.from_revision,
                patch.to_revision.to_string().bold(),
            );
            for reject in rejects {
                println!("  {} {}", "rej".red(), reject.display());
            }
        }
        SyncResult::Overwrite(overwrite) => {
            println!(
                "{} overwrote {} file(s), now at {}",
                "✓".green(),
                overwrite.files.len(),
                overwrite.to_revision.to_string().bold(),
            );
            for file in &overwrite.files {
                match file {
                    FileUpdate::New { path } => println!("  {} {}", "new".green(), path.display()),
                    FileUpdate::Updated {
                        path,
                        added,
                        removed,
                    } => println!(
                        "  {} {} (+{added} -{removed})",
                        "upd".cyan(),
                        path.display()
                    ),
                }
            }
        }
    }
}
