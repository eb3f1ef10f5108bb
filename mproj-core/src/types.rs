//! Domain types for managed projects.
//!
//! The renderer context is dynamic (whatever `cookiecutter.json` declares), so
//! it is modelled as the recursive [`ContextValue`] rather than a fixed struct.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, FixedOffset};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Context keys describing where a single render happened. They are never
/// persisted in the provenance record.
pub const TRANSIENT_CONTEXT_KEYS: &[&str] = &["_output_dir", "_repo_dir", "_checkout"];

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Opaque identifier of a template revision (a short commit hash in practice).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Revision(pub String);

impl Revision {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for Revision {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for Revision {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Context values
// ---------------------------------------------------------------------------

/// Insertion-ordered context mapping.
pub type ContextMap = IndexMap<String, ContextValue>;

/// One value of a renderer context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContextValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    List(Vec<ContextValue>),
    Map(ContextMap),
}

impl ContextValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ContextValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&ContextMap> {
        match self {
            ContextValue::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Convert from a JSON value. `null` becomes an empty string, which is what
    /// a template sees for an unset variable.
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => ContextValue::String(String::new()),
            serde_json::Value::Bool(b) => ContextValue::Bool(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => ContextValue::Integer(i),
                None => ContextValue::Float(n.as_f64().unwrap_or_default()),
            },
            serde_json::Value::String(s) => ContextValue::String(s.clone()),
            serde_json::Value::Array(items) => {
                ContextValue::List(items.iter().map(ContextValue::from_json).collect())
            }
            serde_json::Value::Object(map) => ContextValue::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), ContextValue::from_json(v)))
                    .collect(),
            ),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            ContextValue::Bool(b) => serde_json::Value::Bool(*b),
            ContextValue::Integer(i) => serde_json::Value::from(*i),
            ContextValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            ContextValue::String(s) => serde_json::Value::String(s.clone()),
            ContextValue::List(items) => {
                serde_json::Value::Array(items.iter().map(ContextValue::to_json).collect())
            }
            ContextValue::Map(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }
}

impl fmt::Display for ContextValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextValue::String(s) => f.write_str(s),
            other => write!(f, "{}", other.to_json()),
        }
    }
}

impl From<&str> for ContextValue {
    fn from(s: &str) -> Self {
        ContextValue::String(s.to_owned())
    }
}

impl From<String> for ContextValue {
    fn from(s: String) -> Self {
        ContextValue::String(s)
    }
}

impl From<bool> for ContextValue {
    fn from(b: bool) -> Self {
        ContextValue::Bool(b)
    }
}

impl From<i64> for ContextValue {
    fn from(i: i64) -> Self {
        ContextValue::Integer(i)
    }
}

impl From<ContextMap> for ContextValue {
    fn from(m: ContextMap) -> Self {
        ContextValue::Map(m)
    }
}

/// Convert a whole JSON object into a [`ContextMap`]; non-objects yield an empty map.
pub fn context_from_json(value: &serde_json::Value) -> ContextMap {
    match ContextValue::from_json(value) {
        ContextValue::Map(m) => m,
        _ => ContextMap::new(),
    }
}

/// Convert a [`ContextMap`] into a JSON object.
pub fn context_to_json(map: &ContextMap) -> serde_json::Value {
    serde_json::Value::Object(map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect())
}

/// Remove [`TRANSIENT_CONTEXT_KEYS`] at every nesting level.
pub fn strip_transient_keys(map: &ContextMap) -> ContextMap {
    map.iter()
        .filter(|(k, _)| !TRANSIENT_CONTEXT_KEYS.contains(&k.as_str()))
        .map(|(k, v)| {
            let v = match v {
                ContextValue::Map(inner) => ContextValue::Map(strip_transient_keys(inner)),
                other => other.clone(),
            };
            (k.clone(), v)
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Provenance
// ---------------------------------------------------------------------------

/// One entry of `applied_migrations`. The revision is authoritative; the date
/// is recovered from the trailing comment and may be absent in hand-edited files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationEntry {
    pub revision: Revision,
    pub date: Option<DateTime<FixedOffset>>,
}

/// Everything recorded about the template a project was created from.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectProvenance {
    /// Config document the record was read from.
    pub document: PathBuf,
    pub initial_revision: Option<Revision>,
    pub initial_date: Option<DateTime<FixedOffset>>,
    pub applied_migrations: Vec<MigrationEntry>,
    pub template_reference: Option<String>,
    pub template_subdirectory: Option<String>,
    pub replay_context: Option<ContextMap>,
}

impl ProjectProvenance {
    /// Last applied migration, or the initial revision when none was applied.
    pub fn current_revision(&self) -> Option<&Revision> {
        self.applied_migrations
            .last()
            .map(|m| &m.revision)
            .or(self.initial_revision.as_ref())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
