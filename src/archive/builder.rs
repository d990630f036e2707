use indicatif::{ProgressBar, ProgressStyle};

use crate::{
    backend::RepositorySource,
    error::{CollaboratorContext, Result},
    repository::RepositoryRef,
    tree::{TreeWalker, ROOT_FOLDER},
};

use super::{
    zip::{Compression, ZipWriter},
    Archive, ExtraMembers,
};

/// Show a progress bar only for builds fetching more files than this
const PROGRESS_THRESHOLD: usize = 10;

/// Builds a zip of a repository's whole tree at one reference
///
/// Acts like `git archive`, without a checkout: every file is fetched through
/// the [`RepositorySource`], one at a time, and written in listing order.
pub struct ArchiveBuilder<'a, S: RepositorySource + ?Sized> {
    source: &'a S,
    walker: TreeWalker,
    compression: Compression,
    show_progress: bool,
}

impl<'a, S: RepositorySource + ?Sized> ArchiveBuilder<'a, S> {
    pub fn new(source: &'a S) -> Self {
        Self {
            source,
            walker: TreeWalker::new(),
            compression: Compression::default(),
            show_progress: false,
        }
    }

    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.walker = TreeWalker::with_max_depth(max_depth);
        self
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Archive `repo`, then append `extra` members.
    ///
    /// A tree file whose reported path equals an extra member's name is left
    /// out so the extra member takes its place. Any fetch failure aborts the
    /// build and the partial archive is dropped.
    pub fn build(&mut self, repo: &RepositoryRef, extra: &ExtraMembers) -> Result<Archive> {
        let source = self.source;
        let show_progress = self.show_progress;
        let mut zip = ZipWriter::new(self.compression);

        let paths = self.walker.list_files(source, repo, ROOT_FOLDER)?;
        tracing::info!("Archiving {} files from {}", paths.len(), repo);

        let pb = if show_progress && paths.len() > PROGRESS_THRESHOLD {
            let bar = ProgressBar::new(paths.len() as u64);
            bar.set_style(
                ProgressStyle::default_bar()
                    .template("  {msg} [{bar:40.cyan/blue}] {pos}/{len} files ({eta})")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("█▓░"),
            );
            bar.set_message("Fetching files");
            Some(bar)
        } else {
            None
        };

        for path in paths {
            let file = source
                .get_file(&repo.name, &repo.specifier, path)
                .collaborator("getFile")?;

            if file.file_path != *path {
                tracing::debug!("Requested {} but remote reported {}", path, file.file_path);
            }

            if extra.contains(&file.file_path) {
                tracing::warn!(
                    "Tree file {} is replaced by an additional member of the same name",
                    file.file_path
                );
            } else {
                zip.add(&file.file_path, &file.content)?;
            }

            if let Some(ref bar) = pb {
                bar.inc(1);
            }
        }

        if let Some(ref bar) = pb {
            bar.finish_with_message("Fetch complete");
        }

        if !extra.is_empty() {
            tracing::debug!("Adding additional members to archive: {:?}", extra.names());
            for (name, content) in extra.iter() {
                zip.add(name, content)?;
            }
        }

        tracing::debug!("Finalizing archive with {} members", zip.names().len());
        zip.finish()?;
        let (bytes, members) = zip.into_parts()?;

        let archive = Archive::new(bytes, members);
        tracing::info!(
            "Built archive of {} members ({} bytes, sha256 {})",
            archive.members().len(),
            archive.content().len(),
            archive.digest()
        );
        Ok(archive)
    }
}
