//! # mproj-sync
//!
//! Template synchronization for managed projects.
//!
//! - [`project`]: create a managed project ([`start_project`], [`clone_project`])
//! - [`update`]: bring a project to the template's head, by patch or overwrite
//! - [`patch`]: synthesize the template change between two revisions
//! - [`reverse`]: derive a template from a concrete project
//! - [`reject`]: locate `*.rej` fragments and merge them with `wiggle`

pub mod error;
mod fsutil;
pub mod overwrite;
pub mod patch;
pub mod project;
pub mod reject;
pub mod reverse;
pub mod scratch;
pub mod update;

pub use error::SyncError;
pub use overwrite::{overwrite_project, FileUpdate, OverwriteResult};
pub use patch::{synthesize, PatchRequest, PatchResult, PATCH_DIR};
pub use project::{clone_project, start_project, ManagedProject, StartRequest};
pub use reject::{find_rejects, wiggle, WiggleOutcome};
pub use reverse::{reverse, ReverseReport, ReverseSubstitutionTable};
pub use scratch::{ScratchDir, SyncOptions};
pub use update::{update, SyncResult};
