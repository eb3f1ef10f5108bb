//! `mproj info`: show where a project came from.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use mproj_core::{read_provenance, ProjectProvenance};

/// Arguments for `mproj info`.
#[derive(Args, Debug)]
pub struct InfoArgs {
    /// Managed project.
    pub project: PathBuf,

    /// Print the record as JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Tabled)]
struct MigrationRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "REVISION")]
    revision: String,
    #[tabled(rename = "COMMIT DATE")]
    date: String,
}

impl InfoArgs {
    pub fn run(self) -> Result<()> {
        let provenance = read_provenance(&self.project)
            .with_context(|| format!("failed to read provenance of {}", self.project.display()))?;
        if self.json {
            let payload = to_json(&provenance);
            println!(
                "{}",
                serde_json::to_string_pretty(&payload).context("failed to serialize provenance")?
            );
        } else {
            print_text(&provenance);
        }
        Ok(())
    }
}

fn or_unknown(value: Option<String>) -> String {
    value.unwrap_or_else(|| "-".to_string())
}

fn print_text(provenance: &ProjectProvenance) {
    println!("{} {}", "record:".bold(), provenance.document.display());
    println!(
        "{} {}",
        "template:".bold(),
        or_unknown(provenance.template_reference.clone())
    );
    if let Some(directory) = &provenance.template_subdirectory {
        println!("{} {}", "directory:".bold(), directory);
    }
    println!(
        "{} {} ({})",
        "initial:".bold(),
        or_unknown(provenance.initial_revision.as_ref().map(|r| r.to_string())),
        or_unknown(provenance.initial_date.map(|d| d.to_rfc3339())),
    );
    println!(
        "{} {}",
        "current:".bold(),
        or_unknown(provenance.current_revision().map(|r| r.to_string())).green()
    );

    if provenance.applied_migrations.is_empty() {
        println!("No migrations applied.");
    } else {
        let rows: Vec<MigrationRow> = provenance
            .applied_migrations
            .iter()
            .enumerate()
            .map(|(i, m)| MigrationRow {
                index: i + 1,
                revision: m.revision.to_string(),
                date: or_unknown(m.date.map(|d| d.to_rfc3339())),
            })
            .collect();
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
    }

    if let Some(context) = &provenance.replay_context {
        println!("{}", "context:".bold());
        super::print_context(context);
    }
}

fn to_json(provenance: &ProjectProvenance) -> serde_json::Value {
    serde_json::json!({
        "document": provenance.document.display().to_string(),
        "template": provenance.template_reference,
        "directory": provenance.template_subdirectory,
        "initial_revision": provenance.initial_revision.as_ref().map(|r| r.as_str()),
        "initial_date": provenance.initial_date.map(|d| d.to_rfc3339()),
        "current_revision": provenance.current_revision().map(|r| r.as_str()),
        "applied_migrations": provenance
            .applied_migrations
            .iter()
            .map(|m| serde_json::json!({
                "revision": m.revision.as_str(),
                "date": m.date.map(|d| d.to_rfc3339()),
            }))
            .collect::<Vec<_>>(),
        "context": provenance
            .replay_context
            .as_ref()
            .map(mproj_core::context_to_json),
    })
}
