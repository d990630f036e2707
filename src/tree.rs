//! Recursive enumeration of a repository's file tree.

use crate::{
    backend::RepositorySource,
    error::{CollaboratorContext, Error, Result},
    repository::RepositoryRef,
};

/// Folder path that addresses the repository root
pub const ROOT_FOLDER: &str = "/";

/// Guard against self-referential or malformed listings
pub const DEFAULT_MAX_DEPTH: usize = 1000;

/// Collects the absolute path of every file below a folder
///
/// Paths come out in the order the remote lists them: files of a folder
/// first, then each subfolder in turn. Nothing is sorted.
pub struct TreeWalker {
    files: Vec<String>,
    max_depth: usize,
}

impl TreeWalker {
    pub fn new() -> Self {
        Self::with_max_depth(DEFAULT_MAX_DEPTH)
    }

    pub fn with_max_depth(max_depth: usize) -> Self {
        Self {
            files: Vec::new(),
            max_depth,
        }
    }

    /// Walk `root_path` of `repo`, replacing anything collected by an earlier walk
    pub fn list_files<S: RepositorySource + ?Sized>(
        &mut self,
        source: &S,
        repo: &RepositoryRef,
        root_path: &str,
    ) -> Result<&[String]> {
        self.files.clear();
        tracing::debug!("Emptying files list, and retrieving files from {}", repo);

        if let Err(e) = self.walk(source, repo, root_path, 0) {
            self.files.clear();
            return Err(e);
        }

        tracing::debug!("Files path list: {:?}", self.files);
        Ok(&self.files)
    }

    /// Paths collected by the last successful walk
    pub fn files(&self) -> &[String] {
        &self.files
    }

    fn walk<S: RepositorySource + ?Sized>(
        &mut self,
        source: &S,
        repo: &RepositoryRef,
        folder_path: &str,
        depth: usize,
    ) -> Result<()> {
        if depth > self.max_depth {
            return Err(Error::TreeTooDeep {
                path: folder_path.to_string(),
                limit: self.max_depth,
            });
        }

        let listing = source
            .list_folder(&repo.name, &repo.specifier, folder_path)
            .collaborator("getFolder")?;

        self.files
            .extend(listing.files.into_iter().map(|f| f.absolute_path));

        for folder in listing.sub_folders {
            self.walk(source, repo, &folder.absolute_path, depth + 1)?;
        }

        Ok(())
    }
}

impl Default for TreeWalker {
    fn default() -> Self {
        Self::new()
    }
}
