//! File-tree generation from a resolved template directory.

use std::path::{Path, PathBuf};

use tera::Context;
use walkdir::WalkDir;

use crate::context::render_str;
use crate::error::{io_err, RenderError};

/// The single directory below `template_dir` whose name is a template
/// expression, e.g. `{{ cookiecutter.package_name }}`.
pub fn find_template_dir(template_dir: &Path) -> Result<PathBuf, RenderError> {
    let entries = std::fs::read_dir(template_dir).map_err(|e| io_err(template_dir, e))?;
    let mut candidates = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| io_err(template_dir, e))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
        if is_dir && name.contains("{{") && name.contains("}}") {
            candidates.push(name);
        }
    }
    candidates.sort();
    match candidates.len() {
        0 => Err(RenderError::NoTemplateDir {
            path: template_dir.to_path_buf(),
        }),
        1 => Ok(template_dir.join(&candidates[0])),
        _ => Err(RenderError::AmbiguousTemplateDir {
            path: template_dir.to_path_buf(),
            candidates,
        }),
    }
}

/// Render the tree below `project_template` into `output_dir`.
///
/// Returns the generated project directory. Path components and UTF-8 file
/// bodies go through Tera; other files are copied byte for byte. Entries whose
/// rendered name is empty are skipped.
pub fn generate_files(
    project_template: &Path,
    context: &Context,
    output_dir: &Path,
    overwrite_if_exists: bool,
) -> Result<PathBuf, RenderError> {
    let raw_name = project_template
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let project_name = render_str("project directory name", &raw_name, context)?;
    let project_name = project_name.trim();
    if project_name.is_empty() {
        return Err(RenderError::NoTemplateDir {
            path: project_template.to_path_buf(),
        });
    }

    let project_dir = output_dir.join(project_name);
    if project_dir.exists() && !overwrite_if_exists {
        return Err(RenderError::OutputExists { path: project_dir });
    }
    std::fs::create_dir_all(&project_dir).map_err(|e| io_err(&project_dir, e))?;

    let walker = WalkDir::new(project_template)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.file_name() != ".git");
    for entry in walker {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(project_template).to_path_buf();
            io_err(path, e.into())
        })?;
        let relative = entry
            .path()
            .strip_prefix(project_template)
            .unwrap_or(entry.path());
        let Some(target_rel) = render_relative_path(relative, context)? else {
            tracing::debug!("skipping {}: rendered name is empty", relative.display());
            continue;
        };
        let target = project_dir.join(target_rel);

        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target).map_err(|e| io_err(&target, e))?;
        } else if entry.file_type().is_file() {
            write_rendered(entry.path(), &target, context)?;
        } else {
            tracing::debug!("skipping special file {}", entry.path().display());
        }
    }

    tracing::debug!("generated {}", project_dir.display());
    Ok(project_dir)
}

fn render_relative_path(relative: &Path, context: &Context) -> Result<Option<PathBuf>, RenderError> {
    let mut out = PathBuf::new();
    for component in relative.components() {
        let raw = component.as_os_str().to_string_lossy();
        let rendered = render_str(&format!("path '{}'", relative.display()), &raw, context)?;
        if rendered.trim().is_empty() {
            return Ok(None);
        }
        out.push(rendered);
    }
    Ok(Some(out))
}

fn write_rendered(source: &Path, target: &Path, context: &Context) -> Result<(), RenderError> {
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }
    let bytes = std::fs::read(source).map_err(|e| io_err(source, e))?;
    match String::from_utf8(bytes) {
        Ok(text) => {
            let rendered = render_str(&source.display().to_string(), &text, context)?;
            std::fs::write(target, rendered).map_err(|e| io_err(target, e))?;
        }
        Err(not_text) => {
            std::fs::write(target, not_text.into_bytes()).map_err(|e| io_err(target, e))?;
        }
    }
    let permissions = std::fs::metadata(source)
        .map_err(|e| io_err(source, e))?
        .permissions();
    std::fs::set_permissions(target, permissions).map_err(|e| io_err(target, e))?;
    Ok(())
}
