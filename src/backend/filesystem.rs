use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};

use super::traits::{Backend, BlobStore, PipelineRunner, RepositorySource, TriggerStore};
use crate::{
    repository::{FileContent, FileEntry, FolderEntry, FolderListing},
    triggers::Trigger,
};

/// Local directory standing in for the hosted services
///
/// ```text
/// <root>/repositories/<repo>/<specifier>/...     snapshot trees
/// <root>/repositories/<repo>/<commit>.commit.json optional commit metadata
/// <root>/triggers/<repo>.yaml                    trigger lists
/// <root>/buckets/<bucket>/<key>                  published blobs
/// <root>/pipelines/executions.log                started pipelines
/// ```
pub struct FilesystemBackend {
    base_path: PathBuf,
}

impl FilesystemBackend {
    pub fn new<P: AsRef<Path>>(base_path: P) -> Result<Self> {
        Ok(FilesystemBackend {
            base_path: base_path.as_ref().to_path_buf(),
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn repositories_dir(&self) -> PathBuf {
        self.base_path.join("repositories")
    }

    fn triggers_dir(&self) -> PathBuf {
        self.base_path.join("triggers")
    }

    fn buckets_dir(&self) -> PathBuf {
        self.base_path.join("buckets")
    }

    fn pipelines_dir(&self) -> PathBuf {
        self.base_path.join("pipelines")
    }

    fn executions_log(&self) -> PathBuf {
        self.pipelines_dir().join("executions.log")
    }

    fn snapshot_dir(&self, repository: &str, specifier: &str) -> Result<PathBuf> {
        Ok(self
            .repositories_dir()
            .join(checked_segment(repository)?)
            .join(checked_segment(specifier)?))
    }

    fn commit_path(&self, repository: &str, commit_id: &str) -> Result<PathBuf> {
        Ok(self
            .repositories_dir()
            .join(checked_segment(repository)?)
            .join(format!("{}.commit.json", checked_segment(commit_id)?)))
    }

    fn triggers_path(&self, repository: &str) -> Result<PathBuf> {
        Ok(self
            .triggers_dir()
            .join(format!("{}.yaml", checked_segment(repository)?)))
    }
}

/// Reject names that would escape their directory
fn checked_segment(name: &str) -> Result<&str> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
        anyhow::bail!("Invalid path segment: {:?}", name);
    }
    Ok(name)
}

/// Normalize a slash-separated repository path, with `/` meaning the root.
/// Returns the path without leading or trailing slashes.
fn relative_path(path: &str) -> Result<String> {
    let trimmed = path.trim_matches('/');
    for component in Path::new(trimmed).components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            _ => anyhow::bail!("Path escapes the snapshot: {}", path),
        }
    }
    Ok(trimmed.to_string())
}

fn join_relative(folder: &str, name: &str) -> String {
    if folder.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", folder, name)
    }
}

impl RepositorySource for FilesystemBackend {
    fn list_folder(
        &self,
        repository: &str,
        specifier: &str,
        folder_path: &str,
    ) -> Result<FolderListing> {
        let folder = relative_path(folder_path)?;
        let dir = self.snapshot_dir(repository, specifier)?.join(&folder);

        let mut entries = fs::read_dir(&dir)
            .with_context(|| format!("Failed to read folder {}", dir.display()))?
            .collect::<std::io::Result<Vec<_>>>()
            .with_context(|| format!("Failed to list folder {}", dir.display()))?;
        // read_dir order is platform dependent
        entries.sort_by_key(|e| e.file_name());

        let mut listing = FolderListing::default();
        for entry in entries {
            let name = entry.file_name();
            let name = name
                .to_str()
                .with_context(|| format!("Non UTF-8 file name in {}", dir.display()))?;
            let absolute_path = join_relative(&folder, name);

            if entry.file_type()?.is_dir() {
                listing.sub_folders.push(FolderEntry { absolute_path });
            } else {
                listing.files.push(FileEntry { absolute_path });
            }
        }

        tracing::debug!(
            "Listed {}: {} files, {} folders",
            dir.display(),
            listing.files.len(),
            listing.sub_folders.len()
        );
        Ok(listing)
    }

    fn get_file(&self, repository: &str, specifier: &str, file_path: &str) -> Result<FileContent> {
        let relative = relative_path(file_path)?;
        let path = self.snapshot_dir(repository, specifier)?.join(&relative);
        let content =
            fs::read(&path).with_context(|| format!("Failed to read file {}", path.display()))?;

        Ok(FileContent {
            file_path: relative,
            content,
        })
    }

    fn get_commit(&self, repository: &str, commit_id: &str) -> Result<serde_json::Value> {
        let path = self.commit_path(repository, commit_id)?;
        if !path.exists() {
            return Ok(serde_json::json!({ "commit": { "commitId": commit_id } }));
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read commit {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse commit {}", path.display()))
    }
}

impl TriggerStore for FilesystemBackend {
    fn get_triggers(&self, repository: &str) -> Result<Vec<Trigger>> {
        let path = self.triggers_path(repository)?;
        if !path.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read triggers {}", path.display()))?;
        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse triggers {}", path.display()))
    }

    fn put_triggers(&self, repository: &str, triggers: &[Trigger]) -> Result<()> {
        let path = self.triggers_path(repository)?;
        let temp_path = self
            .triggers_dir()
            .join(format!(".{}.yaml.tmp", checked_segment(repository)?));

        let yaml = serde_yaml::to_string(triggers).context("Failed to serialize triggers")?;
        fs::write(&temp_path, yaml)
            .with_context(|| format!("Failed to write {}", temp_path.display()))?;

        // Atomic on POSIX
        fs::rename(&temp_path, &path)
            .with_context(|| format!("Failed to replace {}", path.display()))?;

        Ok(())
    }
}

impl BlobStore for FilesystemBackend {
    fn put_blob(&self, bucket: &str, key: &str, content: &[u8]) -> Result<()> {
        let key = relative_path(key)?;
        if key.is_empty() {
            anyhow::bail!("Empty blob key");
        }
        let path = self.buckets_dir().join(checked_segment(bucket)?).join(&key);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(&path, content).with_context(|| format!("Failed to write {}", path.display()))?;

        tracing::debug!("Wrote {} bytes to {}", content.len(), path.display());
        Ok(())
    }
}

impl PipelineRunner for FilesystemBackend {
    fn start_pipeline(&self, name: &str) -> Result<String> {
        let log_path = self.executions_log();
        let previous = match fs::read_to_string(&log_path) {
            Ok(content) => content.lines().count(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => 0,
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", log_path.display()))
            }
        };
        let execution_id = format!("exec-{:06}", previous + 1);

        let mut log = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .with_context(|| format!("Failed to open {}", log_path.display()))?;
        writeln!(
            log,
            "{}\t{}\t{}",
            chrono::Utc::now().to_rfc3339(),
            execution_id,
            name
        )
        .with_context(|| format!("Failed to append to {}", log_path.display()))?;

        Ok(execution_id)
    }
}

impl Backend for FilesystemBackend {
    fn initialize(&self) -> Result<()> {
        for dir in [
            self.repositories_dir(),
            self.triggers_dir(),
            self.buckets_dir(),
            self.pipelines_dir(),
        ] {
            fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }
        Ok(())
    }
}
