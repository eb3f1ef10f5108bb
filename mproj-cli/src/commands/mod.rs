//! One module per `mproj` subcommand.

pub mod clone;
pub mod info;
pub mod reverse;
pub mod start;
pub mod update;
pub mod wiggle;

use colored::Colorize;

use mproj_core::ContextMap;
use mproj_renderer::CONTEXT_ROOT;

/// Print the template variables of a stored context, skipping `_` keys.
pub(crate) fn print_context(context: &ContextMap) {
    let vars = context
        .get(CONTEXT_ROOT)
        .and_then(|v| v.as_map())
        .unwrap_or(context);
    for (key, value) in vars.iter().filter(|(k, _)| !k.starts_with('_')) {
        println!("  {}: {}", key.bold(), value.to_json());
    }
}
