//! In-memory zip archives of a repository snapshot

mod builder;
pub(crate) mod zip;

use std::{
    io::Write,
    path::{Path, PathBuf},
};

use sha2::{Digest, Sha256};

use crate::error::Result;

pub use builder::ArchiveBuilder;
pub use zip::{Compression, ZipWriter};

/// Members appended after the tree, keyed by name
///
/// Iteration follows first insertion; inserting an existing name replaces its
/// content in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtraMembers {
    members: Vec<(String, Vec<u8>)>,
}

impl ExtraMembers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, content: impl Into<Vec<u8>>) {
        let name = name.into();
        let content = content.into();
        match self.members.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = content,
            None => self.members.push((name, content)),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.members.iter().any(|(n, _)| n == name)
    }

    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.members
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, c)| c.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.members
            .iter()
            .map(|(n, c)| (n.as_str(), c.as_slice()))
    }

    pub fn names(&self) -> Vec<&str> {
        self.members.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

impl<N: Into<String>, C: Into<Vec<u8>>> FromIterator<(N, C)> for ExtraMembers {
    fn from_iter<I: IntoIterator<Item = (N, C)>>(iter: I) -> Self {
        let mut members = Self::new();
        for (name, content) in iter {
            members.insert(name, content);
        }
        members
    }
}

/// A finished zip, held entirely in memory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Archive {
    bytes: Vec<u8>,
    members: Vec<String>,
}

impl Archive {
    pub(crate) fn new(bytes: Vec<u8>, members: Vec<String>) -> Self {
        Self { bytes, members }
    }

    /// Raw zip bytes
    pub fn content(&self) -> &[u8] {
        &self.bytes
    }

    /// Member names in write order
    pub fn members(&self) -> &[String] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Hex SHA-256 of the zip bytes
    pub fn digest(&self) -> String {
        hex::encode(Sha256::digest(&self.bytes))
    }

    /// Write the archive to `file_name`, or to a fresh temporary file that is
    /// kept on disk. Returns the path written.
    pub fn flush(&self, file_name: Option<&Path>) -> Result<PathBuf> {
        let path = match file_name {
            Some(path) => {
                std::fs::write(path, &self.bytes)?;
                path.to_path_buf()
            }
            None => {
                let temp = tempfile::Builder::new()
                    .prefix("branch-archive-")
                    .suffix(".zip")
                    .tempfile()?;
                let (mut file, path) = temp.keep().map_err(|e| e.error)?;
                file.write_all(&self.bytes)?;
                file.sync_all()?;
                path
            }
        };

        tracing::debug!("Flushed {} bytes of archive to {}", self.bytes.len(), path.display());
        Ok(path)
    }
}
