//! # mproj-renderer
//!
//! Cookiecutter-style project generation on top of Tera.
//!
//! A template is a directory holding `cookiecutter.json` (variables with
//! defaults) next to exactly one directory named by a template expression.
//! Rendering resolves the variables, then renders path names and file bodies
//! of that directory into the output directory.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::path::PathBuf;
//! use mproj_renderer::{Renderer, RenderRequest};
//!
//! fn render() -> Result<(), mproj_renderer::RenderError> {
//!     let renderer = Renderer::from_user_config(None)?;
//!     let output = renderer.render(&RenderRequest::new(
//!         "gh:jedie/cookiecutter_templates",
//!         PathBuf::from("/tmp/out"),
//!     ).directory("piptools-python"))?;
//!     println!("generated {}", output.project_path.display());
//!     Ok(())
//! }
//! ```

pub mod context;
pub mod error;
pub mod generate;
pub mod source;

use std::path::{Path, PathBuf};

use mproj_core::{user_config, ContextMap, ContextValue, UserConfig};

pub use context::{CONTEXT_FILE, CONTEXT_ROOT};
pub use error::RenderError;

/// Inputs of one render.
#[derive(Debug, Clone, Default)]
pub struct RenderRequest {
    /// Path, URL or abbreviation (`gh:user/repo`).
    pub template: String,
    /// Sub-directory of the template source holding `cookiecutter.json`.
    pub directory: Option<String>,
    /// Where the project directory is created.
    pub output_dir: PathBuf,
    /// Variable overrides (the inner `cookiecutter` map).
    pub extra_context: ContextMap,
    /// Revision to render instead of the checkout's current state.
    pub checkout: Option<String>,
    pub overwrite_if_exists: bool,
}

impl RenderRequest {
    pub fn new(template: impl Into<String>, output_dir: PathBuf) -> Self {
        Self {
            template: template.into(),
            output_dir,
            ..Self::default()
        }
    }

    pub fn directory(mut self, directory: impl Into<String>) -> Self {
        self.directory = Some(directory.into());
        self
    }

    pub fn extra_context(mut self, extra: ContextMap) -> Self {
        self.extra_context = extra;
        self
    }

    pub fn checkout(mut self, revision: impl Into<String>) -> Self {
        self.checkout = Some(revision.into());
        self
    }

    pub fn overwrite_if_exists(mut self, overwrite: bool) -> Self {
        self.overwrite_if_exists = overwrite;
        self
    }
}

/// What a render produced.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderOutput {
    /// Effective context: `{"cookiecutter": {...}}` including `_template`,
    /// `_output_dir`, `_repo_dir` and `_checkout`.
    pub context: ContextMap,
    /// The generated project directory.
    pub project_path: PathBuf,
    /// Top level of the template repository in the user's checkout.
    pub repo_path: PathBuf,
    /// Directory holding `cookiecutter.json` in the user's checkout.
    pub template_path: PathBuf,
}

/// Template renderer bound to one user configuration.
#[derive(Debug, Clone)]
pub struct Renderer {
    config: UserConfig,
    home: PathBuf,
}

impl Renderer {
    pub fn new(config: UserConfig, home: PathBuf) -> Self {
        Self { config, home }
    }

    /// Load the user configuration (see [`mproj_core::user_config::load`]).
    pub fn from_user_config(explicit: Option<&Path>) -> Result<Self, RenderError> {
        let home = user_config::home()?;
        let config = user_config::load_at(&home, explicit)?;
        Ok(Self::new(config, home))
    }

    pub fn config(&self) -> &UserConfig {
        &self.config
    }

    /// Resolve the template, build its context and generate the project.
    pub fn render(&self, request: &RenderRequest) -> Result<RenderOutput, RenderError> {
        let source = source::resolve(
            &self.config,
            &self.home,
            &request.template,
            request.directory.as_deref(),
            request.checkout.as_deref(),
        )?;

        let defaults = context::load_defaults(&source.template_dir)?;
        let mut variables =
            context::resolve(&defaults, &self.config.default_context, &request.extra_context)?;

        let project_template = generate::find_template_dir(&source.template_dir)?;
        let project_path = generate::generate_files(
            &project_template,
            &context::tera_context(&variables),
            &request.output_dir,
            request.overwrite_if_exists,
        )?;

        let mut annotate = |key: &str, value: String| {
            variables.insert(key.to_string(), ContextValue::String(value));
        };
        annotate("_template", request.template.clone());
        annotate("_output_dir", request.output_dir.display().to_string());
        annotate("_repo_dir", source.template_dir.display().to_string());
        annotate("_checkout", request.checkout.clone().unwrap_or_default());

        let mut context = ContextMap::new();
        context.insert(CONTEXT_ROOT.to_string(), ContextValue::Map(variables));

        tracing::info!(
            "rendered {} into {}",
            request.template,
            project_path.display()
        );
        Ok(RenderOutput {
            context,
            project_path,
            repo_path: source.repo_root.clone(),
            template_path: source.origin_dir.clone(),
        })
    }
}
