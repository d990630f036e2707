use anyhow::{Context, Result};
use std::io::Write;
use std::path::{Path, PathBuf};

use branch_archiver::{
    backend::RepositorySource, ArchiveBuilder, Compression, ExtraMembers, RepositoryRef,
};

/// Options of the archive command
pub struct ArchiveOptions<'a> {
    pub repository: &'a str,
    pub specifier: &'a str,
    pub output: Option<&'a Path>,
    /// Extra members as (member name, local file)
    pub members: &'a [(String, PathBuf)],
    pub compression: Compression,
    pub max_tree_depth: usize,
    pub show_progress: bool,
}

/// Parse a `NAME=PATH` member argument
pub fn parse_member(arg: &str) -> std::result::Result<(String, PathBuf), String> {
    match arg.split_once('=') {
        Some((name, path)) if !name.is_empty() && !path.is_empty() => {
            Ok((name.to_string(), PathBuf::from(path)))
        }
        _ => Err(format!("expected NAME=PATH, got {:?}", arg)),
    }
}

/// Handle the archive command
/// Builds the archive, writes it out and prints path, member count and digest
pub fn handle<S: RepositorySource + ?Sized, W: Write>(
    source: &S,
    options: ArchiveOptions<'_>,
    output: &mut W,
) -> Result<()> {
    let mut extra = ExtraMembers::new();
    for (name, path) in options.members {
        let content = std::fs::read(path)
            .with_context(|| format!("Failed to read member {} from {:?}", name, path))?;
        extra.insert(name.clone(), content);
    }

    let archive = ArchiveBuilder::new(source)
        .with_compression(options.compression)
        .with_max_depth(options.max_tree_depth)
        .with_progress(options.show_progress)
        .build(
            &RepositoryRef::new(options.repository, options.specifier),
            &extra,
        )?;

    let path = archive.flush(options.output)?;
    writeln!(
        output,
        "{}\t{} members\tsha256:{}",
        path.display(),
        archive.members().len(),
        archive.digest()
    )?;

    Ok(())
}
