//! In-memory backend for unit tests.

use std::{
    cell::{Cell, RefCell},
    collections::{BTreeMap, HashMap, HashSet},
};

use anyhow::Result;

use super::traits::{Backend, BlobStore, PipelineRunner, RepositorySource, TriggerStore};
use crate::{
    repository::{FileContent, FolderListing},
    triggers::Trigger,
};

type TreeKey = (String, String, String);

#[derive(Default)]
pub(crate) struct FakeBackend {
    folders: RefCell<HashMap<TreeKey, FolderListing>>,
    files: RefCell<HashMap<TreeKey, FileContent>>,
    commits: RefCell<HashMap<(String, String), serde_json::Value>>,
    triggers: RefCell<HashMap<String, Vec<Trigger>>>,
    blobs: RefCell<BTreeMap<(String, String), Vec<u8>>>,
    pipelines: RefCell<Vec<String>>,
    fetched: RefCell<Vec<String>>,
    failing: RefCell<HashSet<&'static str>>,
    put_trigger_calls: Cell<usize>,
}

fn key(repository: &str, specifier: &str, path: &str) -> TreeKey {
    (
        repository.to_string(),
        specifier.to_string(),
        path.to_string(),
    )
}

impl FakeBackend {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add_folder(
        &self,
        repository: &str,
        specifier: &str,
        path: &str,
        listing: FolderListing,
    ) {
        self.folders
            .borrow_mut()
            .insert(key(repository, specifier, path), listing);
    }

    /// Serve `content` for `requested`, reporting it back as `reported`
    pub(crate) fn add_file(
        &self,
        repository: &str,
        specifier: &str,
        requested: &str,
        reported: &str,
        content: &[u8],
    ) {
        self.files.borrow_mut().insert(
            key(repository, specifier, requested),
            FileContent {
                file_path: reported.to_string(),
                content: content.to_vec(),
            },
        );
    }

    pub(crate) fn add_commit(&self, repository: &str, commit_id: &str, commit: serde_json::Value) {
        self.commits
            .borrow_mut()
            .insert((repository.to_string(), commit_id.to_string()), commit);
    }

    pub(crate) fn set_triggers(&self, repository: &str, triggers: Vec<Trigger>) {
        self.triggers
            .borrow_mut()
            .insert(repository.to_string(), triggers);
    }

    pub(crate) fn triggers(&self, repository: &str) -> Vec<Trigger> {
        self.triggers
            .borrow()
            .get(repository)
            .cloned()
            .unwrap_or_default()
    }

    pub(crate) fn blob(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.blobs
            .borrow()
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    pub(crate) fn blob_count(&self) -> usize {
        self.blobs.borrow().len()
    }

    pub(crate) fn started_pipelines(&self) -> Vec<String> {
        self.pipelines.borrow().clone()
    }

    pub(crate) fn fetched_paths(&self) -> Vec<String> {
        self.fetched.borrow().clone()
    }

    pub(crate) fn put_trigger_calls(&self) -> usize {
        self.put_trigger_calls.get()
    }

    /// Make every later call of `operation` fail
    pub(crate) fn fail_on(&self, operation: &'static str) {
        self.failing.borrow_mut().insert(operation);
    }

    fn check(&self, operation: &'static str) -> Result<()> {
        if self.failing.borrow().contains(operation) {
            anyhow::bail!("injected failure in {}", operation);
        }
        Ok(())
    }
}

impl RepositorySource for FakeBackend {
    fn list_folder(
        &self,
        repository: &str,
        specifier: &str,
        folder_path: &str,
    ) -> Result<FolderListing> {
        self.check("list_folder")?;
        self.folders
            .borrow()
            .get(&key(repository, specifier, folder_path))
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("folder {} not found", folder_path))
    }

    fn get_file(&self, repository: &str, specifier: &str, file_path: &str) -> Result<FileContent> {
        self.check("get_file")?;
        self.fetched.borrow_mut().push(file_path.to_string());
        self.files
            .borrow()
            .get(&key(repository, specifier, file_path))
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("file {} not found", file_path))
    }

    fn get_commit(&self, repository: &str, commit_id: &str) -> Result<serde_json::Value> {
        self.check("get_commit")?;
        Ok(self
            .commits
            .borrow()
            .get(&(repository.to_string(), commit_id.to_string()))
            .cloned()
            .unwrap_or_else(|| serde_json::json!({ "commit": { "commitId": commit_id } })))
    }
}

impl TriggerStore for FakeBackend {
    fn get_triggers(&self, repository: &str) -> Result<Vec<Trigger>> {
        self.check("get_triggers")?;
        Ok(self.triggers(repository))
    }

    fn put_triggers(&self, repository: &str, triggers: &[Trigger]) -> Result<()> {
        self.check("put_triggers")?;
        self.put_trigger_calls.set(self.put_trigger_calls.get() + 1);
        self.set_triggers(repository, triggers.to_vec());
        Ok(())
    }
}

impl BlobStore for FakeBackend {
    fn put_blob(&self, bucket: &str, key: &str, content: &[u8]) -> Result<()> {
        self.check("put_blob")?;
        self.blobs
            .borrow_mut()
            .insert((bucket.to_string(), key.to_string()), content.to_vec());
        Ok(())
    }
}

impl PipelineRunner for FakeBackend {
    fn start_pipeline(&self, name: &str) -> Result<String> {
        self.check("start_pipeline")?;
        let mut pipelines = self.pipelines.borrow_mut();
        pipelines.push(name.to_string());
        Ok(format!("execution-{}", pipelines.len()))
    }
}

impl Backend for FakeBackend {
    fn initialize(&self) -> Result<()> {
        Ok(())
    }
}
