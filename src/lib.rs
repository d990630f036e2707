#![deny(clippy::mod_module_files)]
//! Archives hosted repository branches and keeps their update triggers in step.
//!
//! A branch lifecycle event is routed by [`EventRouter`]: creating a branch
//! registers its `trigger-<branch>-updates` trigger, creating or updating it
//! publishes a deterministic zip of the tree at the pushed commit and starts
//! the branch's pipeline, and deleting it removes the trigger again.

pub mod archive;
pub mod backend;
pub mod config;
pub mod error;
pub mod event;
pub mod repository;
pub mod router;
pub mod tree;
pub mod triggers;

pub use archive::{Archive, ArchiveBuilder, Compression, ExtraMembers};
pub use config::Config;
pub use error::{Error, Result};
pub use repository::RepositoryRef;
pub use router::{EventRouter, RefOutcome, RouterSettings};
pub use tree::TreeWalker;
pub use triggers::{TriggerRegistry, TriggerSet};
