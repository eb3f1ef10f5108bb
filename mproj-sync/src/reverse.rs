//! Derive a template from a concrete project by substituting context values
//! back into placeholders.

use std::path::{Path, PathBuf};

use mproj_core::{context_to_json, read_provenance, ContextMap, ContextValue};
use mproj_git::Git;
use mproj_renderer::{CONTEXT_FILE, CONTEXT_ROOT};

use crate::error::{io_err, SyncError};
use crate::fsutil::copy_file;

/// Context key added when the project directory name is not derived from any
/// context value.
const PROJECT_DIR_KEY: &str = "project_dir_name";

/// Openers the renderer treats as template syntax.
const TEMPLATE_DELIMITERS: &[&str] = &["{{", "{%", "{#"];

/// Ordered `(concrete value, placeholder)` pairs, longest value first.
///
/// Only non-empty string leaves take part; keys starting with `_` are skipped
/// at every level. Nested maps produce dotted keys, so the placeholder for
/// `{"cookiecutter": {"name": "x"}}` is `{{ cookiecutter.name }}`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReverseSubstitutionTable {
    entries: Vec<(String, String)>,
}

impl ReverseSubstitutionTable {
    pub fn from_context(context: &ContextMap) -> Self {
        let mut flat = Vec::new();
        flatten(context, "", &mut flat);
        flat.sort_by(|(key_a, value_a), (key_b, value_b)| {
            value_b.len().cmp(&value_a.len()).then_with(|| key_a.cmp(key_b))
        });
        let entries = flat
            .into_iter()
            .map(|(key, value)| (value, format!("{{{{ {key} }}}}")))
            .collect();
        Self { entries }
    }

    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Replace every concrete value in `text` in a single left-to-right pass.
    ///
    /// At each position the longest matching value wins. Emitted placeholders
    /// are never scanned again, so a short value cannot land inside one.
    pub fn apply(&self, text: &str) -> String {
        self.substitute(text, false)
    }

    /// Like [`apply`](Self::apply), but template delimiters already present in
    /// `text` (`{{`, `{%`, `{#`) are escaped so they render back literally.
    pub fn apply_escaped(&self, text: &str) -> String {
        self.substitute(text, true)
    }

    /// `true` when `text` holds template syntax of its own.
    pub fn needs_escaping(text: &str) -> bool {
        TEMPLATE_DELIMITERS.iter().any(|d| text.contains(d))
    }

    fn substitute(&self, text: &str, escape: bool) -> String {
        let mut out = String::with_capacity(text.len());
        let mut rest = text;
        while let Some(c) = rest.chars().next() {
            if escape {
                if let Some(delimiter) = TEMPLATE_DELIMITERS.iter().find(|d| rest.starts_with(**d)) {
                    out.push_str(&format!("{{{{ \"{delimiter}\" }}}}"));
                    rest = &rest[delimiter.len()..];
                    continue;
                }
            }
            match self
                .entries
                .iter()
                .find(|(value, _)| rest.starts_with(value.as_str()))
            {
                Some((value, placeholder)) => {
                    out.push_str(placeholder);
                    rest = &rest[value.len()..];
                }
                None => {
                    out.push(c);
                    rest = &rest[c.len_utf8()..];
                }
            }
        }
        out
    }

    /// [`apply`](Self::apply) to each component of a relative path.
    pub fn apply_path(&self, path: &Path) -> PathBuf {
        path.components()
            .map(|c| self.apply(&c.as_os_str().to_string_lossy()))
            .collect()
    }
}

fn flatten(map: &ContextMap, prefix: &str, out: &mut Vec<(String, String)>) {
    for (key, value) in map {
        if key.starts_with('_') {
            continue;
        }
        let dotted = format!("{prefix}{key}");
        match value {
            ContextValue::Map(inner) => flatten(inner, &format!("{dotted}."), out),
            ContextValue::String(s) if !s.is_empty() => out.push((dotted, s.clone())),
            _ => {}
        }
    }
}

/// What [`reverse`] wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReverseReport {
    pub destination: PathBuf,
    /// `destination/<templated project dir>`
    pub template_dir: PathBuf,
    pub table: ReverseSubstitutionTable,
    /// `(project-relative source, template-relative target)` per file.
    pub files: Vec<(PathBuf, PathBuf)>,
}

/// Turn the tracked files of `project_path` into a template at `destination`.
///
/// The result is renderable: `destination/cookiecutter.json` holds the
/// project's variables and `destination/<templated dir name>/` its files.
/// Untracked and ignored files are not included.
pub fn reverse(
    project_path: &Path,
    destination: &Path,
    overwrite: bool,
) -> Result<ReverseReport, SyncError> {
    tracing::info!(
        "create template from {} in {}",
        project_path.display(),
        destination.display()
    );
    if destination.exists() && !overwrite {
        return Err(SyncError::DestinationExists {
            path: destination.to_path_buf(),
        });
    }

    let provenance = read_provenance(project_path)?;
    let context = provenance
        .replay_context
        .as_ref()
        .ok_or_else(|| SyncError::MissingField {
            field: "cookiecutter_context",
            path: provenance.document.clone(),
        })?;
    let table = ReverseSubstitutionTable::from_context(context);
    for (value, placeholder) in table.entries() {
        tracing::debug!("reverse {value:?} -> {placeholder}");
    }

    let mut variables: ContextMap = context
        .get(CONTEXT_ROOT)
        .and_then(ContextValue::as_map)
        .map(|m| {
            m.iter()
                .filter(|(k, _)| !k.starts_with('_'))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()
        })
        .unwrap_or_default();

    let project_name = project_path
        .canonicalize()
        .map_err(|e| io_err(project_path, e))?
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut dir_name = table.apply(&project_name);
    if !dir_name.contains("{{") {
        variables.insert(PROJECT_DIR_KEY.to_string(), ContextValue::String(project_name));
        dir_name = format!("{{{{ {CONTEXT_ROOT}.{PROJECT_DIR_KEY} }}}}");
    }
    let template_dir = destination.join(&dir_name);

    std::fs::create_dir_all(destination).map_err(|e| io_err(destination, e))?;
    let context_file = destination.join(CONTEXT_FILE);
    let json = serde_json::to_string_pretty(&context_to_json(&variables)).map_err(|source| {
        SyncError::Json {
            path: context_file.clone(),
            source,
        }
    })?;
    std::fs::write(&context_file, format!("{json}\n")).map_err(|e| io_err(&context_file, e))?;

    let git = Git::open(project_path)?;
    let mut files = Vec::new();
    for relative in git.list_tracked_files()? {
        let source = project_path.join(&relative);
        if !source.is_file() {
            continue;
        }
        let target_rel = table.apply_path(&relative);
        let target = template_dir.join(&target_rel);
        let bytes = std::fs::read(&source).map_err(|e| io_err(&source, e))?;
        match String::from_utf8(bytes) {
            Ok(text) => {
                if let Some(parent) = target.parent() {
                    std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
                }
                let content = if ReverseSubstitutionTable::needs_escaping(&text) {
                    tracing::warn!(
                        "{} contains template syntax, escaping it",
                        relative.display()
                    );
                    table.apply_escaped(&text)
                } else {
                    table.apply(&text)
                };
                std::fs::write(&target, content).map_err(|e| io_err(&target, e))?;
                let permissions = std::fs::metadata(&source)
                    .map_err(|e| io_err(&source, e))?
                    .permissions();
                std::fs::set_permissions(&target, permissions).map_err(|e| io_err(&target, e))?;
            }
            Err(_) => copy_file(&source, &target)?,
        }
        tracing::debug!("{} -> {}", relative.display(), target_rel.display());
        files.push((relative, target_rel));
    }

    tracing::info!("{} file(s) written to {}", files.len(), template_dir.display());
    Ok(ReverseReport {
        destination: destination.to_path_buf(),
        template_dir,
        table,
        files,
    })
}
