//! Collaborator services the archiver talks to, and their implementations.

mod aws;
#[cfg(test)]
pub(crate) mod fake;
mod filesystem;
mod traits;

pub use aws::{AwsBackend, AwsCli};
pub use filesystem::FilesystemBackend;
pub use traits::{Backend, BlobStore, PipelineRunner, RepositorySource, TriggerStore};
