//! Optional per-user configuration (`~/.mproj/config.yaml`).
//!
//! ```yaml
//! cookiecutters_dir: ~/.cookiecutters
//! abbreviations:
//!   work: https://git.example.com/{0}.git
//! default_context:
//!   full_name: Jane Doe
//! ```
//!
//! Lookup order: explicit `--config-file`, `$MPROJ_CONFIG`, then the default
//! path under the home directory. A missing default file is not an error.
//!
//! Every lookup has an `_at(home, …)` form used
//! by tests and a convenience form that resolves `dirs::home_dir()`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::ContextMap;

pub const CONFIG_ENV: &str = "MPROJ_CONFIG";

/// Parsed user configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserConfig {
    /// Where remote templates are cloned to. Defaults to `~/.cookiecutters`.
    pub cookiecutters_dir: Option<PathBuf>,
    /// Extra template abbreviations; `{0}` is replaced by the part after `prefix:`.
    pub abbreviations: BTreeMap<String, String>,
    /// Values applied on top of a template's `cookiecutter.json` defaults.
    pub default_context: ContextMap,
}

impl UserConfig {
    /// Effective clone directory for remote templates.
    pub fn cookiecutters_dir_at(&self, home: &Path) -> PathBuf {
        match &self.cookiecutters_dir {
            Some(dir) => expand_home(dir, home),
            None => home.join(".cookiecutters"),
        }
    }

    /// Built-in abbreviations merged with the configured ones (configured win).
    pub fn abbreviations(&self) -> BTreeMap<String, String> {
        let mut all: BTreeMap<String, String> = [
            ("gh", "https://github.com/{0}.git"),
            ("gl", "https://gitlab.com/{0}.git"),
            ("bb", "https://bitbucket.org/{0}"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        all.extend(self.abbreviations.clone());
        all
    }

    /// Expand `gh:user/repo` style template references.
    pub fn expand_template(&self, template: &str) -> String {
        let abbreviations = self.abbreviations();
        if let Some(full) = abbreviations.get(template) {
            return full.clone();
        }
        if let Some((prefix, rest)) = template.split_once(':') {
            if let Some(pattern) = abbreviations.get(prefix) {
                return pattern.replace("{0}", rest);
            }
        }
        template.to_string()
    }
}

/// `<home>/.mproj/config.yaml`
pub fn default_path_at(home: &Path) -> PathBuf {
    home.join(".mproj").join("config.yaml")
}

/// Load a config file from an explicit path; the file must exist.
pub fn load_file(path: &Path) -> Result<UserConfig, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    if contents.trim().is_empty() {
        return Ok(UserConfig::default());
    }
    serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Resolve and load the user configuration relative to `home`.
pub fn load_at(home: &Path, explicit: Option<&Path>) -> Result<UserConfig, ConfigError> {
    if let Some(path) = explicit {
        tracing::debug!("user config from --config-file: {}", path.display());
        return load_file(path);
    }
    if let Some(path) = std::env::var_os(CONFIG_ENV).filter(|v| !v.is_empty()) {
        let path = PathBuf::from(path);
        tracing::debug!("user config from ${CONFIG_ENV}: {}", path.display());
        return load_file(&path);
    }
    let path = default_path_at(home);
    if path.is_file() {
        tracing::debug!("user config: {}", path.display());
        load_file(&path)
    } else {
        Ok(UserConfig::default())
    }
}

/// `load_at` convenience wrapper.
pub fn load(explicit: Option<&Path>) -> Result<UserConfig, ConfigError> {
    load_at(&home()?, explicit)
}

/// The current user's home directory.
pub fn home() -> Result<PathBuf, ConfigError> {
    dirs::home_dir().ok_or(ConfigError::HomeNotFound)
}

fn expand_home(path: &Path, home: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => home.join(rest),
        Err(_) => path.to_path_buf(),
    }
}
