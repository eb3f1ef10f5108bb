//! Render context: `cookiecutter.json` defaults resolved against overrides.

use std::path::Path;

use tera::{Context, Tera};

use mproj_core::{context_from_json, context_to_json, ContextMap, ContextValue};

use crate::error::{io_err, tera_err, RenderError};

/// File holding a template's variables and their defaults.
pub const CONTEXT_FILE: &str = "cookiecutter.json";

/// Top-level key all template variables live under.
pub const CONTEXT_ROOT: &str = "cookiecutter";

/// Read `cookiecutter.json` from `template_dir`, preserving key order.
pub fn load_defaults(template_dir: &Path) -> Result<ContextMap, RenderError> {
    let path = template_dir.join(CONTEXT_FILE);
    if !path.is_file() {
        return Err(RenderError::MissingContextFile {
            path: template_dir.to_path_buf(),
        });
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    let json: serde_json::Value =
        serde_json::from_str(&contents).map_err(|e| RenderError::InvalidContextFile {
            path: path.clone(),
            detail: e.to_string(),
        })?;
    if !json.is_object() {
        return Err(RenderError::InvalidContextFile {
            path,
            detail: "expected a JSON object".to_string(),
        });
    }
    Ok(context_from_json(&json))
}

/// Resolve the variables of one render.
///
/// Layering, lowest first: `defaults`, the user's `default_context`, then
/// `extra`. Keys absent from `defaults` are ignored. Choice lists collapse to
/// their first entry; string values are rendered in declaration order so a
/// default may refer to variables declared before it. Keys starting with `_`
/// are copied without rendering.
pub fn resolve(
    defaults: &ContextMap,
    user_defaults: &ContextMap,
    extra: &ContextMap,
) -> Result<ContextMap, RenderError> {
    let mut resolved = ContextMap::new();
    for (key, default) in defaults {
        let chosen = extra
            .get(key)
            .or_else(|| user_defaults.get(key))
            .unwrap_or(default);

        if key.starts_with('_') {
            resolved.insert(key.clone(), chosen.clone());
            continue;
        }

        let value = match chosen {
            ContextValue::List(choices) => match choices.first() {
                Some(first) => render_value(key, first, &resolved)?,
                None => ContextValue::String(String::new()),
            },
            other => render_value(key, other, &resolved)?,
        };
        resolved.insert(key.clone(), value);
    }

    for key in extra.keys().filter(|k| !defaults.contains_key(*k)) {
        if !key.starts_with('_') {
            tracing::debug!("ignoring context key '{key}' unknown to the template");
        }
    }
    Ok(resolved)
}

/// Tera context exposing `variables` as `cookiecutter.*`.
pub fn tera_context(variables: &ContextMap) -> Context {
    let mut context = Context::new();
    context.insert(CONTEXT_ROOT, &context_to_json(variables));
    context
}

/// Render a string with the `cookiecutter` namespace available.
pub fn render_str(what: &str, input: &str, context: &Context) -> Result<String, RenderError> {
    if !input.contains("{{") && !input.contains("{%") && !input.contains("{#") {
        return Ok(input.to_string());
    }
    let mut rendered = Tera::one_off(input, context, false).map_err(|e| tera_err(what, e))?;
    if input.ends_with('\n') && !rendered.ends_with('\n') {
        rendered.push('\n');
    }
    Ok(rendered)
}

fn render_value(
    key: &str,
    value: &ContextValue,
    resolved: &ContextMap,
) -> Result<ContextValue, RenderError> {
    match value {
        ContextValue::String(s) => {
            let context = tera_context(resolved);
            let what = format!("context variable '{key}'");
            Ok(ContextValue::String(render_str(&what, s, &context)?))
        }
        ContextValue::Map(map) => {
            let mut out = ContextMap::new();
            for (k, v) in map {
                out.insert(k.clone(), render_value(&format!("{key}.{k}"), v, resolved)?);
            }
            Ok(ContextValue::Map(out))
        }
        other => Ok(other.clone()),
    }
}
