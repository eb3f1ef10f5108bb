//! Thin blocking wrapper around the `git` executable.
//!
//! Every call spawns `git` as a child process with a bounded wait. The binary
//! is located on `$PATH` at first use.

pub mod command;
pub mod error;
pub mod repo;

pub use command::{default_timeout, TIMEOUT_ENV};
pub use error::GitError;
pub use repo::{ApplyMode, ApplyOutcome, Git, StatusEntry};
