//! Format-preserving provenance store.
//!
//! # Where the record lives
//!
//! ```text
//! <project>/pyproject.toml   [manageprojects]
//! <project>/Cargo.toml       [package.metadata.manageprojects]
//!                            ([workspace.metadata.manageprojects] for a virtual manifest)
//! ```
//!
//! `pyproject.toml` wins when both exist. When neither exists a fresh
//! `pyproject.toml` is created on [`MetadataStore::save`].
//!
//! # Record layout
//!
//! ```toml
//! [manageprojects]
//! initial_revision = "a1b2c3d"
//! initial_date = 2024-01-02T10:00:00+01:00
//! template = "gh:someone/template"
//! directory = "python"
//! applied_migrations = [
//!     "e4f5a6b", # 2024-03-01T12:00:00+01:00
//! ]
//!
//! [manageprojects.cookiecutter_context.cookiecutter]
//! project_name = "Foo Bar"
//! ```
//!
//! The document is edited through `toml_edit`, so comments, key order and all
//! other sections survive a read/modify/write untouched.

use std::path::{Path, PathBuf};

use chrono::{DateTime, FixedOffset};
use toml_edit::{Array, DocumentMut, InlineTable, Item, Table, Value};

use crate::error::{io_err, MetadataError};
use crate::types::{
    strip_transient_keys, ContextMap, ContextValue, MigrationEntry, ProjectProvenance, Revision,
};

pub const RECORD_NAME: &str = "manageprojects";
pub const PYPROJECT_TOML: &str = "pyproject.toml";
pub const CARGO_TOML: &str = "Cargo.toml";

const INITIAL_REVISION: &str = "initial_revision";
const INITIAL_DATE: &str = "initial_date";
const TEMPLATE: &str = "template";
const DIRECTORY: &str = "directory";
const APPLIED_MIGRATIONS: &str = "applied_migrations";
const COOKIECUTTER_CONTEXT: &str = "cookiecutter_context";

// Key names written by older releases; still accepted on read.
const LEGACY_TEMPLATE: &str = "cookiecutter_template";
const LEGACY_DIRECTORY: &str = "cookiecutter_directory";

const CREATED_HEADER: &str = "# Created by mproj\n\n";

/// Which kind of config document hosts the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    PyProject,
    CargoManifest,
}

/// Read/modify/write access to one project's provenance record.
#[derive(Debug)]
pub struct MetadataStore {
    path: PathBuf,
    kind: DocumentKind,
    doc: DocumentMut,
    created: bool,
}

impl MetadataStore {
    /// Open the config document of `project_path`.
    pub fn open(project_path: &Path) -> Result<Self, MetadataError> {
        let pyproject = project_path.join(PYPROJECT_TOML);
        let cargo = project_path.join(CARGO_TOML);
        if pyproject.is_file() {
            Self::load(pyproject, DocumentKind::PyProject)
        } else if cargo.is_file() {
            Self::load(cargo, DocumentKind::CargoManifest)
        } else {
            tracing::debug!("no config document in {}, creating {PYPROJECT_TOML}", project_path.display());
            Ok(Self {
                path: pyproject,
                kind: DocumentKind::PyProject,
                doc: DocumentMut::new(),
                created: true,
            })
        }
    }

    fn load(path: PathBuf, kind: DocumentKind) -> Result<Self, MetadataError> {
        tracing::debug!("reading {}", path.display());
        let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
        let doc = contents
            .parse::<DocumentMut>()
            .map_err(|source| MetadataError::Parse { path: path.clone(), source })?;
        Ok(Self { path, kind, doc, created: false })
    }

    /// Path of the config document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn kind(&self) -> DocumentKind {
        self.kind
    }

    /// `true` when the document already carries a record.
    pub fn has_record(&self) -> bool {
        self.record().is_some()
    }

    /// Parse the record into a [`ProjectProvenance`].
    pub fn read(&self) -> Result<ProjectProvenance, MetadataError> {
        let record = self
            .record()
            .ok_or_else(|| MetadataError::RecordNotFound { path: self.path.clone() })?;

        let initial_revision = record
            .get(INITIAL_REVISION)
            .map(|item| self.string_field(INITIAL_REVISION, item))
            .transpose()?
            .map(Revision::from);
        let initial_date = record
            .get(INITIAL_DATE)
            .map(|item| self.date_field(INITIAL_DATE, item))
            .transpose()?;
        let template_reference = record
            .get(TEMPLATE)
            .or_else(|| record.get(LEGACY_TEMPLATE))
            .map(|item| self.string_field(TEMPLATE, item))
            .transpose()?;
        let template_subdirectory = record
            .get(DIRECTORY)
            .or_else(|| record.get(LEGACY_DIRECTORY))
            .map(|item| self.string_field(DIRECTORY, item))
            .transpose()?;
        let applied_migrations = match record.get(APPLIED_MIGRATIONS) {
            Some(item) => {
                let array = item.as_array().ok_or_else(|| MetadataError::InvalidField {
                    field: APPLIED_MIGRATIONS.to_string(),
                    path: self.path.clone(),
                    detail: "expected an array of revision strings".to_string(),
                })?;
                read_migrations(array, &self.path)?
            }
            None => Vec::new(),
        };
        let replay_context = match record.get(COOKIECUTTER_CONTEXT).and_then(item_to_context) {
            Some(ContextValue::Map(map)) => Some(map),
            Some(_) => {
                return Err(MetadataError::InvalidField {
                    field: COOKIECUTTER_CONTEXT.to_string(),
                    path: self.path.clone(),
                    detail: "expected a table".to_string(),
                })
            }
            None => None,
        };

        Ok(ProjectProvenance {
            document: self.path.clone(),
            initial_revision,
            initial_date,
            applied_migrations,
            template_reference,
            template_subdirectory,
            replay_context,
        })
    }

    /// Record where the project came from. Allowed exactly once per record.
    pub fn init(
        &mut self,
        revision: &Revision,
        date: DateTime<FixedOffset>,
        template: &str,
        directory: Option<&str>,
    ) -> Result<(), MetadataError> {
        let path = self.path.clone();
        let datetime = to_toml_datetime(INITIAL_DATE, date, &path)?;
        let record = self.record_mut()?;
        if let Some(existing) = record.get(INITIAL_REVISION) {
            return Err(MetadataError::AlreadyInitialized {
                path,
                revision: existing.as_str().unwrap_or("?").to_string(),
            });
        }
        record.insert(INITIAL_REVISION, toml_edit::value(revision.as_str()));
        record.insert(INITIAL_DATE, toml_edit::value(datetime));
        record.insert(TEMPLATE, toml_edit::value(template));
        if let Some(directory) = directory {
            record.insert(DIRECTORY, toml_edit::value(directory));
        }
        Ok(())
    }

    /// Replace the stored replay context as a whole.
    pub fn set_replay_context(&mut self, context: &ContextMap) -> Result<(), MetadataError> {
        let stripped = strip_transient_keys(context);
        let record = self.record_mut()?;
        record.insert(COOKIECUTTER_CONTEXT, Item::Table(context_table(&stripped)));
        Ok(())
    }

    /// Append one revision to `applied_migrations`, annotated with its date.
    pub fn append_migration(
        &mut self,
        revision: &Revision,
        date: DateTime<FixedOffset>,
    ) -> Result<(), MetadataError> {
        let path = self.path.clone();
        let record = self.record_mut()?;
        if !record.contains_key(APPLIED_MIGRATIONS) {
            record.insert(APPLIED_MIGRATIONS, toml_edit::value(Array::new()));
        }
        let array = record
            .get_mut(APPLIED_MIGRATIONS)
            .and_then(Item::as_array_mut)
            .ok_or_else(|| MetadataError::InvalidField {
                field: APPLIED_MIGRATIONS.to_string(),
                path,
                detail: "expected an array of revision strings".to_string(),
            })?;
        push_annotated(array, revision, date);
        Ok(())
    }

    /// Render the document as it would be saved.
    pub fn to_toml_string(&self) -> String {
        self.doc.to_string()
    }

    /// Write the document back (`.tmp` sibling + rename).
    pub fn save(&self) -> Result<(), MetadataError> {
        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| PYPROJECT_TOML.to_string());
        let tmp = self.path.with_file_name(format!("{file_name}.tmp"));
        std::fs::write(&tmp, self.to_toml_string()).map_err(|e| io_err(&tmp, e))?;
        if let Err(e) = std::fs::rename(&tmp, &self.path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(io_err(&self.path, e));
        }
        tracing::debug!("saved {}", self.path.display());
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Record navigation
    // -----------------------------------------------------------------------

    fn record_keys(&self) -> &'static [&'static str] {
        match self.kind {
            DocumentKind::PyProject => &[RECORD_NAME],
            DocumentKind::CargoManifest if self.doc.as_table().contains_key("package") => {
                &["package", "metadata", RECORD_NAME]
            }
            DocumentKind::CargoManifest => &["workspace", "metadata", RECORD_NAME],
        }
    }

    fn record(&self) -> Option<&Table> {
        let mut table = self.doc.as_table();
        for key in self.record_keys() {
            table = table.get(key)?.as_table()?;
        }
        Some(table)
    }

    fn record_mut(&mut self) -> Result<&mut Table, MetadataError> {
        let keys = self.record_keys();
        let last = keys.len() - 1;
        let prefix = if self.created {
            CREATED_HEADER
        } else if self.doc.as_table().is_empty() {
            ""
        } else {
            "\n"
        };
        let path = self.path.clone();

        let mut table = self.doc.as_table_mut();
        for (idx, key) in keys.iter().enumerate() {
            if !table.contains_key(key) {
                let mut new_table = Table::new();
                if idx < last {
                    new_table.set_implicit(true);
                } else {
                    new_table.decor_mut().set_prefix(prefix);
                }
                table.insert(key, Item::Table(new_table));
            }
            table = table
                .get_mut(key)
                .and_then(Item::as_table_mut)
                .ok_or_else(|| MetadataError::InvalidField {
                    field: (*key).to_string(),
                    path: path.clone(),
                    detail: "expected a table".to_string(),
                })?;
        }
        Ok(table)
    }

    fn string_field(&self, field: &str, item: &Item) -> Result<String, MetadataError> {
        item.as_str()
            .map(str::to_owned)
            .ok_or_else(|| MetadataError::InvalidField {
                field: field.to_string(),
                path: self.path.clone(),
                detail: "expected a string".to_string(),
            })
    }

    fn date_field(&self, field: &str, item: &Item) -> Result<DateTime<FixedOffset>, MetadataError> {
        let raw = match (item.as_datetime(), item.as_str()) {
            (Some(dt), _) => dt.to_string(),
            (None, Some(s)) => s.to_string(),
            (None, None) => {
                return Err(MetadataError::InvalidField {
                    field: field.to_string(),
                    path: self.path.clone(),
                    detail: "expected a datetime".to_string(),
                })
            }
        };
        DateTime::parse_from_rfc3339(&raw).map_err(|e| MetadataError::InvalidField {
            field: field.to_string(),
            path: self.path.clone(),
            detail: format!("'{raw}': {e}"),
        })
    }
}

/// Shortcut for `MetadataStore::open(project)?.read()`.
pub fn read_provenance(project_path: &Path) -> Result<ProjectProvenance, MetadataError> {
    MetadataStore::open(project_path)?.read()
}

// ---------------------------------------------------------------------------
// applied_migrations
// ---------------------------------------------------------------------------

// Each value is followed by `, # <date>`. In toml_edit terms the comment of
// entry N is the prefix of entry N+1, and the array trailing for the last one.
fn push_annotated(array: &mut Array, revision: &Revision, date: DateTime<FixedOffset>) {
    let carried = array.trailing().as_str().unwrap_or("").trim_end().to_owned();
    let mut item = Value::from(revision.as_str());
    item.decor_mut().set_prefix(format!("{carried}\n    "));
    item.decor_mut().set_suffix("");
    array.push_formatted(item);
    array.set_trailing_comma(true);
    array.set_trailing(format!(" # {}\n", date.to_rfc3339()));
}

fn read_migrations(array: &Array, path: &Path) -> Result<Vec<MigrationEntry>, MetadataError> {
    let values: Vec<&Value> = array.iter().collect();
    let mut entries = Vec::with_capacity(values.len());
    for (idx, value) in values.iter().enumerate() {
        let revision = value.as_str().ok_or_else(|| MetadataError::InvalidField {
            field: format!("{APPLIED_MIGRATIONS}[{idx}]"),
            path: path.to_path_buf(),
            detail: "expected a revision string".to_string(),
        })?;
        let annotation = match values.get(idx + 1) {
            Some(next) => next.decor().prefix().and_then(|p| p.as_str()),
            None => array.trailing().as_str(),
        };
        entries.push(MigrationEntry {
            revision: Revision::from(revision),
            date: annotation.and_then(parse_comment_date),
        });
    }
    Ok(entries)
}

fn parse_comment_date(raw: &str) -> Option<DateTime<FixedOffset>> {
    let comment = raw.split_once('#')?.1;
    let first_line = comment.lines().next()?.trim();
    DateTime::parse_from_rfc3339(first_line).ok()
}

fn to_toml_datetime(
    field: &str,
    date: DateTime<FixedOffset>,
    path: &Path,
) -> Result<toml_edit::Datetime, MetadataError> {
    date.to_rfc3339()
        .parse::<toml_edit::Datetime>()
        .map_err(|e| MetadataError::InvalidField {
            field: field.to_string(),
            path: path.to_path_buf(),
            detail: e.to_string(),
        })
}

// ---------------------------------------------------------------------------
// Context <-> TOML
// ---------------------------------------------------------------------------

fn context_table(map: &ContextMap) -> Table {
    let mut table = Table::new();
    table.set_implicit(true);
    for (key, value) in map {
        let item = match value {
            ContextValue::Map(inner) => Item::Table(context_table(inner)),
            other => Item::Value(context_value(other)),
        };
        table.insert(key, item);
    }
    table
}

fn context_value(value: &ContextValue) -> Value {
    match value {
        ContextValue::Bool(b) => Value::from(*b),
        ContextValue::Integer(i) => Value::from(*i),
        ContextValue::Float(f) => Value::from(*f),
        ContextValue::String(s) => Value::from(s.as_str()),
        ContextValue::List(items) => Value::Array(items.iter().map(context_value).collect()),
        ContextValue::Map(map) => {
            let mut inline = InlineTable::new();
            for (k, v) in map {
                inline.insert(k.as_str(), context_value(v));
            }
            Value::InlineTable(inline)
        }
    }
}

fn item_to_context(item: &Item) -> Option<ContextValue> {
    match item {
        Item::None => None,
        Item::Value(value) => Some(value_to_context(value)),
        Item::Table(table) => Some(ContextValue::Map(
            table
                .iter()
                .filter_map(|(k, v)| item_to_context(v).map(|v| (k.to_string(), v)))
                .collect(),
        )),
        Item::ArrayOfTables(tables) => Some(ContextValue::List(
            tables
                .iter()
                .map(|t| {
                    ContextValue::Map(
                        t.iter()
                            .filter_map(|(k, v)| item_to_context(v).map(|v| (k.to_string(), v)))
                            .collect(),
                    )
                })
                .collect(),
        )),
    }
}

fn value_to_context(value: &Value) -> ContextValue {
    match value {
        Value::String(s) => ContextValue::String(s.value().clone()),
        Value::Integer(i) => ContextValue::Integer(*i.value()),
        Value::Float(f) => ContextValue::Float(*f.value()),
        Value::Boolean(b) => ContextValue::Bool(*b.value()),
        Value::Datetime(d) => ContextValue::String(d.value().to_string()),
        Value::Array(items) => ContextValue::List(items.iter().map(value_to_context).collect()),
        Value::InlineTable(table) => ContextValue::Map(
            table
                .iter()
                .map(|(k, v)| (k.to_string(), value_to_context(v)))
                .collect(),
        ),
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn date(raw: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(raw).unwrap()
    }

    #[test]
    fn new_document_gets_header_comment() {
        let tmp = TempDir::new().unwrap();
        let mut store = MetadataStore::open(tmp.path()).unwrap();
        assert_eq!(store.kind(), DocumentKind::PyProject);
        store
            .init(&Revision::from("abc1234"), date("2024-01-02T10:00:00+01:00"), "/tpl", None)
            .unwrap();
        let text = store.to_toml_string();
        assert!(text.starts_with("# Created by mproj\n\n[manageprojects]\n"), "got:\n{text}");
        assert!(text.contains("initial_revision = \"abc1234\""));
        assert!(text.contains("initial_date = 2024-01-02T10:00:00+01:00"));
        assert!(!text.contains("directory"));
    }

    #[test]
    fn init_twice_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let mut store = MetadataStore::open(tmp.path()).unwrap();
        let d = date("2024-01-02T10:00:00+01:00");
        store.init(&Revision::from("abc1234"), d, "/tpl", None).unwrap();
        let err = store.init(&Revision::from("def5678"), d, "/tpl", None).unwrap_err();
        assert!(matches!(err, MetadataError::AlreadyInitialized { ref revision, .. } if revision == "abc1234"));
    }

    #[test]
    fn migrations_keep_comments_in_order() {
        let tmp = TempDir::new().unwrap();
        let mut store = MetadataStore::open(tmp.path()).unwrap();
        store
            .init(&Revision::from("r0"), date("2024-01-01T00:00:00+00:00"), "/tpl", None)
            .unwrap();
        store.append_migration(&Revision::from("r1"), date("2024-02-01T00:00:00+00:00")).unwrap();
        store.append_migration(&Revision::from("r2"), date("2024-03-01T00:00:00+00:00")).unwrap();

        let text = store.to_toml_string();
        assert!(
            text.contains(
                "applied_migrations = [\n    \"r1\", # 2024-02-01T00:00:00+00:00\n    \"r2\", # 2024-03-01T00:00:00+00:00\n]"
            ),
            "got:\n{text}"
        );

        let provenance = store.read().unwrap();
        let revisions: Vec<_> = provenance.applied_migrations.iter().map(|m| m.revision.0.as_str()).collect();
        assert_eq!(revisions, ["r1", "r2"]);
        assert_eq!(provenance.applied_migrations[0].date, Some(date("2024-02-01T00:00:00+00:00")));
        assert_eq!(provenance.applied_migrations[1].date, Some(date("2024-03-01T00:00:00+00:00")));
        assert_eq!(provenance.current_revision(), Some(&Revision::from("r2")));
    }

    #[test]
    fn replay_context_is_replaced_not_merged() {
        let tmp = TempDir::new().unwrap();
        let mut store = MetadataStore::open(tmp.path()).unwrap();
        let first = crate::types::context_from_json(&serde_json::json!({
            "cookiecutter": {"old_key": "x", "name": "a", "_output_dir": "/tmp/x"}
        }));
        let second = crate::types::context_from_json(&serde_json::json!({
            "cookiecutter": {"name": "b"}
        }));
        store.set_replay_context(&first).unwrap();
        store.set_replay_context(&second).unwrap();

        let ctx = store.read().unwrap().replay_context.unwrap();
        let inner = ctx["cookiecutter"].as_map().unwrap();
        assert_eq!(inner.len(), 1);
        assert_eq!(inner["name"], ContextValue::from("b"));
    }

    #[test]
    fn transient_keys_never_persisted() {
        let tmp = TempDir::new().unwrap();
        let mut store = MetadataStore::open(tmp.path()).unwrap();
        let ctx = crate::types::context_from_json(&serde_json::json!({
            "cookiecutter": {"name": "a", "_output_dir": "/tmp/x", "_repo_dir": "/r", "_checkout": null}
        }));
        store.set_replay_context(&ctx).unwrap();
        let text = store.to_toml_string();
        assert!(!text.contains("_output_dir"));
        assert!(!text.contains("_repo_dir"));
        assert!(!text.contains("_checkout"));
        assert!(text.contains("[manageprojects.cookiecutter_context.cookiecutter]"), "got:\n{text}");
    }

    #[test]
    fn cargo_manifest_uses_package_metadata() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join(CARGO_TOML),
            "[package]\nname = \"demo\"\nversion = \"0.1.0\"\n\n[dependencies]\nserde = \"1\"\n",
        )
        .unwrap();
        let mut store = MetadataStore::open(tmp.path()).unwrap();
        assert_eq!(store.kind(), DocumentKind::CargoManifest);
        store
            .init(&Revision::from("abc"), date("2024-01-01T00:00:00+00:00"), "/tpl", Some("rust"))
            .unwrap();
        let text = store.to_toml_string();
        assert!(text.contains("[package.metadata.manageprojects]"), "got:\n{text}");
        assert!(!text.contains("[package.metadata]\n"), "intermediate table must stay implicit:\n{text}");
        assert!(text.contains("[dependencies]\nserde = \"1\""));

        let provenance = store.read().unwrap();
        assert_eq!(provenance.template_subdirectory.as_deref(), Some("rust"));
    }

    #[test]
    fn legacy_keys_are_read() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join(PYPROJECT_TOML),
            "[manageprojects]\ninitial_revision = \"abc\"\ninitial_date = 2022-10-25T20:43:10+02:00\n\
             cookiecutter_template = \"https://example.invalid/tpl\"\ncookiecutter_directory = \"sub\"\n",
        )
        .unwrap();
        let provenance = read_provenance(tmp.path()).unwrap();
        assert_eq!(provenance.template_reference.as_deref(), Some("https://example.invalid/tpl"));
        assert_eq!(provenance.template_subdirectory.as_deref(), Some("sub"));
        assert_eq!(provenance.initial_date, Some(date("2022-10-25T20:43:10+02:00")));
    }

    #[test]
    fn missing_record_is_reported() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join(PYPROJECT_TOML), "[project]\nname = \"x\"\n").unwrap();
        let err = read_provenance(tmp.path()).unwrap_err();
        assert!(matches!(err, MetadataError::RecordNotFound { .. }));
    }

    #[test]
    fn save_cleans_up_tmp() {
        let tmp = TempDir::new().unwrap();
        let mut store = MetadataStore::open(tmp.path()).unwrap();
        store
            .init(&Revision::from("abc"), date("2024-01-01T00:00:00+00:00"), "/tpl", None)
            .unwrap();
        store.save().unwrap();
        assert!(tmp.path().join(PYPROJECT_TOML).is_file());
        assert!(!tmp.path().join("pyproject.toml.tmp").exists());
    }
}
