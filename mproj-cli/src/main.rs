//! mproj: create projects from templates and keep them in sync.
//!
//! # Usage
//!
//! ```text
//! mproj start <template> <output-dir> [--directory <dir>] [--checkout <rev>] [-c key=value]...
//! mproj update <project> [--overwrite]
//! mproj clone <project> <destination> [--checkout <rev>]
//! mproj reverse <project> <destination> [--overwrite]
//! mproj info <project>
//! mproj wiggle <project> [--words]
//! ```
//!
//! Global flags: `-v/--verbose`, `--config-file <path>`, `--no-cleanup`.

mod commands;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use mproj_renderer::Renderer;
use mproj_sync::SyncOptions;

use commands::{
    clone::CloneArgs, info::InfoArgs, reverse::ReverseArgs, start::StartArgs,
    update::UpdateArgs, wiggle::WiggleArgs,
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "mproj",
    version,
    about = "Create projects from cookiecutter templates and apply template updates",
    long_about = None,
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Flags shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Log debug output (`RUST_LOG` takes precedence).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// User config file (default: `$MPROJ_CONFIG` or `~/.mproj/config.yaml`).
    #[arg(long, global = true, value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    /// Keep scratch directories for inspection.
    #[arg(long, global = true)]
    pub no_cleanup: bool,
}

impl GlobalArgs {
    pub fn renderer(&self) -> Result<Renderer> {
        Renderer::from_user_config(self.config_file.as_deref())
            .context("failed to load user configuration")
    }

    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            keep_scratch: self.no_cleanup,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Render a template into a new project and record its provenance.
    Start(StartArgs),

    /// Apply the template changes since the recorded revision.
    Update(UpdateArgs),

    /// Render a managed project's template again with its stored context.
    Clone(CloneArgs),

    /// Derive a template from a managed project.
    Reverse(ReverseArgs),

    /// Show a project's template provenance and applied migrations.
    Info(InfoArgs),

    /// Merge `*.rej` fragments left by an update with `wiggle`.
    Wiggle(WiggleArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.global.verbose);
    tracing::debug!("mproj {}", env!("CARGO_PKG_VERSION"));
    match cli.command {
        Commands::Start(args) => args.run(&cli.global),
        Commands::Update(args) => args.run(&cli.global),
        Commands::Clone(args) => args.run(&cli.global),
        Commands::Reverse(args) => args.run(),
        Commands::Info(args) => args.run(),
        Commands::Wiggle(args) => args.run(),
    }
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_work_after_subcommand() {
        let cli = Cli::try_parse_from(["mproj", "update", "proj", "--no-cleanup", "-v"]).unwrap();
        assert!(cli.global.no_cleanup);
        assert!(cli.global.verbose);
        assert!(cli.global.sync_options().keep_scratch);
    }
}
