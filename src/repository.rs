//! Value types describing a repository tree as the collaborators report it.

use serde::{Deserialize, Serialize};

/// Identifies which tree to read: a repository and a branch name or commit id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryRef {
    pub name: String,
    pub specifier: String,
}

impl RepositoryRef {
    pub fn new(name: impl Into<String>, specifier: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            specifier: specifier.into(),
        }
    }
}

impl std::fmt::Display for RepositoryRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.name, self.specifier)
    }
}

/// Leaf node of a folder listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    pub absolute_path: String,
}

/// Interior node of a folder listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderEntry {
    pub absolute_path: String,
}

/// Immediate children of one folder, in the order the remote returned them
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderListing {
    #[serde(default)]
    pub files: Vec<FileEntry>,
    #[serde(default)]
    pub sub_folders: Vec<FolderEntry>,
}

impl FolderListing {
    #[cfg(test)]
    pub(crate) fn of(files: &[&str], folders: &[&str]) -> Self {
        Self {
            files: files
                .iter()
                .map(|p| FileEntry {
                    absolute_path: p.to_string(),
                })
                .collect(),
            sub_folders: folders
                .iter()
                .map(|p| FolderEntry {
                    absolute_path: p.to_string(),
                })
                .collect(),
        }
    }
}

/// A fetched file; `file_path` is the path the remote reports, which may not
/// match the requested string byte for byte
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileContent {
    pub file_path: String,
    pub content: Vec<u8>,
}
