//! mproj core library: domain types, the provenance store and user config.
//!
//! - [`types`]: [`Revision`], [`ContextValue`], [`ProjectProvenance`]
//! - [`store`]: format-preserving [`MetadataStore`]
//! - [`user_config`]: optional `~/.mproj/config.yaml`
//! - [`error`]: [`MetadataError`], [`ConfigError`]

pub mod error;
pub mod store;
pub mod types;
pub mod user_config;

pub use error::{ConfigError, MetadataError};
pub use store::{read_provenance, DocumentKind, MetadataStore};
pub use types::{
    context_from_json, context_to_json, strip_transient_keys, ContextMap, ContextValue,
    MigrationEntry, ProjectProvenance, Revision,
};
pub use user_config::UserConfig;
