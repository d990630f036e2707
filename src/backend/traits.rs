use anyhow::Result;

use crate::{
    repository::{FileContent, FolderListing},
    triggers::Trigger,
};

/// Read access to a hosted repository's trees and commits
pub trait RepositorySource {
    /// List the immediate children of `folder_path` at `specifier`.
    fn list_folder(
        &self,
        repository: &str,
        specifier: &str,
        folder_path: &str,
    ) -> Result<FolderListing>;

    /// Fetch one file. The returned `file_path` is whatever the remote reports.
    fn get_file(&self, repository: &str, specifier: &str, file_path: &str) -> Result<FileContent>;

    /// Fetch commit metadata as the remote describes it (`{"commit": {...}}`).
    fn get_commit(&self, repository: &str, commit_id: &str) -> Result<serde_json::Value>;
}

/// Access to a repository's trigger list
///
/// The remote has no partial-update primitive: the list is always replaced whole.
pub trait TriggerStore {
    /// Read the current trigger list. Returns an empty list if none exists.
    fn get_triggers(&self, repository: &str) -> Result<Vec<Trigger>>;

    /// Replace the entire trigger list.
    fn put_triggers(&self, repository: &str, triggers: &[Trigger]) -> Result<()>;
}

/// Persists finished archives
pub trait BlobStore {
    /// Write `content` under `key` in `bucket`, replacing any previous object.
    fn put_blob(&self, bucket: &str, key: &str, content: &[u8]) -> Result<()>;
}

/// Kicks off downstream pipelines
pub trait PipelineRunner {
    /// Start an execution of the named pipeline and return its execution id.
    fn start_pipeline(&self, name: &str) -> Result<String>;
}

/// Combined collaborator backend trait
pub trait Backend: RepositorySource + TriggerStore + BlobStore + PipelineRunner {
    /// Prepare the backend (create directories, verify access, etc.)
    fn initialize(&self) -> Result<()>;
}
