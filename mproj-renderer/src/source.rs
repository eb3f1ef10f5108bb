//! Template source resolution.
//!
//! A template reference is one of:
//!
//! | form                         | handling                                         |
//! |------------------------------|--------------------------------------------------|
//! | `gh:user/repo` (abbreviation) | expanded, then treated as a URL                  |
//! | `https://…`, `git@…`, `file://…` | cloned into `cookiecutters_dir/<name>`; fetched and hard-reset when cached |
//! | a local path                 | used in place                                    |
//!
//! A revision pin never touches the resolved checkout: the repository is
//! cloned with `--shared` into a private temp dir and checked out there.

use std::path::{Component, Path, PathBuf};

use tempfile::TempDir;

use mproj_core::UserConfig;
use mproj_git::Git;

use crate::error::{io_err, RenderError};

/// Where a template lives for one render.
#[derive(Debug)]
pub struct ResolvedSource {
    /// Top level of the template repository as the user sees it. For a local
    /// template outside git this is the template path itself.
    pub repo_root: PathBuf,
    /// Directory holding `cookiecutter.json` in the user's checkout.
    pub origin_dir: PathBuf,
    /// Directory holding `cookiecutter.json` in the tree that gets rendered.
    /// Differs from `origin_dir` only when pinned.
    pub template_dir: PathBuf,
    /// Owns the pinned clone; removed on drop.
    _pin: Option<TempDir>,
}

/// Resolve `template` (+ optional `directory`) to a renderable tree.
pub fn resolve(
    config: &UserConfig,
    home: &Path,
    template: &str,
    directory: Option<&str>,
    checkout: Option<&str>,
) -> Result<ResolvedSource, RenderError> {
    let expanded = config.expand_template(template);
    let base = if is_repo_url(&expanded) {
        clone_cached(&expanded, &config.cookiecutters_dir_at(home))?
    } else {
        expand_home(&expanded, home)
    };
    if !base.exists() {
        return Err(RenderError::TemplateNotFound {
            location: expanded,
        });
    }

    let mut origin_dir = base.clone();
    if let Some(directory) = directory {
        origin_dir.push(validate_directory(directory)?);
    }
    let origin_dir = origin_dir
        .canonicalize()
        .map_err(|_| RenderError::TemplateNotFound {
            location: origin_dir.display().to_string(),
        })?;

    let git = Git::open(&origin_dir).ok();
    let repo_root = match &git {
        Some(git) => git.root().to_path_buf(),
        None => origin_dir.clone(),
    };

    let Some(revision) = checkout else {
        tracing::debug!("template {} resolved to {}", template, origin_dir.display());
        return Ok(ResolvedSource {
            repo_root,
            template_dir: origin_dir.clone(),
            origin_dir,
            _pin: None,
        });
    };

    let git = git.ok_or_else(|| RenderError::PinRequiresRepository {
        path: origin_dir.clone(),
        revision: revision.to_string(),
    })?;
    let pin = tempfile::Builder::new()
        .prefix("mproj-pin-")
        .tempdir()
        .map_err(|e| io_err(std::env::temp_dir(), e))?;
    let clone = git.clone_shared(&pin.path().join("template"))?;
    clone.checkout(revision)?;

    let relative = origin_dir.strip_prefix(git.root()).unwrap_or(Path::new(""));
    let template_dir = clone.root().join(relative);
    tracing::debug!(
        "template {} pinned to {} in {}",
        template,
        revision,
        template_dir.display()
    );
    Ok(ResolvedSource {
        repo_root,
        origin_dir,
        template_dir,
        _pin: Some(pin),
    })
}

/// `true` for references git has to fetch.
pub fn is_repo_url(reference: &str) -> bool {
    reference.contains("://")
        || reference.starts_with("git@")
        || reference.starts_with("git+")
        || reference.starts_with("file:")
}

/// Directory name a URL is cloned to (`…/repo.git` → `repo`).
pub fn clone_dir_name(url: &str) -> &str {
    let trimmed = url.trim_end_matches('/');
    let last = trimmed
        .rsplit(|c: char| c == '/' || c == ':')
        .next()
        .unwrap_or(trimmed);
    last.strip_suffix(".git").unwrap_or(last)
}

fn clone_cached(url: &str, cache: &Path) -> Result<PathBuf, RenderError> {
    let dest = cache.join(clone_dir_name(url));
    if dest.join(".git").exists() {
        tracing::info!("update cached template {}", dest.display());
        let git = Git::open(&dest)?;
        git.fetch()?;
        git.reset_hard("@{upstream}")?;
    } else {
        std::fs::create_dir_all(cache).map_err(|e| io_err(cache, e))?;
        Git::clone_into(url, &dest, false)?;
    }
    Ok(dest)
}

fn validate_directory(directory: &str) -> Result<&Path, RenderError> {
    let path = Path::new(directory);
    let escapes = directory.contains("://")
        || path
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes {
        return Err(RenderError::InvalidDirectory {
            directory: directory.to_string(),
        });
    }
    Ok(path)
}

fn expand_home(reference: &str, home: &Path) -> PathBuf {
    match reference.strip_prefix("~/") {
        Some(rest) => home.join(rest),
        None => PathBuf::from(reference),
    }
}
