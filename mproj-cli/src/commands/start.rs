//! `mproj start`: render a template into a new managed project.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use mproj_core::{ContextMap, ContextValue};
use mproj_sync::{start_project, StartRequest};

use crate::GlobalArgs;

/// Arguments for `mproj start`.
#[derive(Args, Debug)]
pub struct StartArgs {
    /// Template path, git URL, or abbreviation (`gh:owner/repo`).
    pub template: String,

    /// Directory the project directory is created in.
    pub output_dir: PathBuf,

    /// Template subdirectory holding `cookiecutter.json`.
    #[arg(long)]
    pub directory: Option<String>,

    /// Template revision to render instead of the head.
    #[arg(long)]
    pub checkout: Option<String>,

    /// Override a template variable; may be repeated.
    #[arg(short = 'c', long = "context", value_name = "KEY=VALUE", value_parser = parse_context_pair)]
    pub context: Vec<(String, String)>,

    /// Render into an existing project directory.
    #[arg(long)]
    pub overwrite_if_exists: bool,
}

impl StartArgs {
    pub fn run(self, global: &GlobalArgs) -> Result<()> {
        let renderer = global.renderer()?;
        let extra_context: ContextMap = self
            .context
            .into_iter()
            .map(|(k, v)| (k, ContextValue::String(v)))
            .collect();
        let request = StartRequest {
            template: self.template.clone(),
            directory: self.directory,
            output_dir: self.output_dir,
            extra_context,
            checkout: self.checkout,
            overwrite_if_exists: self.overwrite_if_exists,
        };

        let project = start_project(&renderer, &request)
            .with_context(|| format!("failed to start a project from '{}'", self.template))?;

        println!(
            "{} created {} from {} at {} ({})",
            "✓".green(),
            project.project_path.display().to_string().bold(),
            project.template_repository.display(),
            project.revision,
            project.commit_date.to_rfc3339(),
        );
        println!("provenance recorded in {}", project.document.display());
        super::print_context(&project.context);
        Ok(())
    }
}

/// Parse `key=value`; the value may itself contain `=`.
pub(crate) fn parse_context_pair(raw: &str) -> std::result::Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got '{raw}'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_pairs_split_on_first_equals() {
        assert_eq!(
            parse_context_pair("value=a=b").unwrap(),
            ("value".to_string(), "a=b".to_string())
        );
        assert_eq!(
            parse_context_pair("empty=").unwrap(),
            ("empty".to_string(), String::new())
        );
        assert!(parse_context_pair("novalue").is_err());
        assert!(parse_context_pair("=x").is_err());
    }
}
