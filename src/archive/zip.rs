//! Deterministic in-memory Zip32 writer.
//!
//! Every entry carries the same metadata regardless of where the archive is
//! produced: a fixed 1980-01-01 00:00 timestamp, "made by" host 0 (MS-DOS) and
//! zero external attributes. Extractors on Unix then fall back to their
//! default permissions instead of inferring mode 0000 from the producer.
//! Sizes are written in the local headers (no data descriptors) and Zip64 is
//! not supported.

use std::{collections::HashSet, io::Write};

use flate2::write::DeflateEncoder;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const SIG_LFH: u32 = 0x0403_4b50;
const SIG_CDFH: u32 = 0x0201_4b50;
const SIG_EOCD: u32 = 0x0605_4b50;

/// Host system 0 (MS-DOS) in the high byte, zip format version 2.0 in the low byte.
const VERSION_MADE_BY: u16 = 20;
const VERSION_NEEDED_STORED: u16 = 10;
const VERSION_NEEDED_DEFLATED: u16 = 20;

/// 00:00:00
const DOS_TIME: u16 = 0;
/// 1980-01-01
const DOS_DATE: u16 = (1 << 5) | 1;

/// Name is UTF-8 (general purpose bit 11).
const FLAG_UTF8: u16 = 0x0800;

/// How member payloads are stored
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    Stored,
    #[default]
    Deflated,
}

impl Compression {
    fn method(self) -> u16 {
        match self {
            Compression::Stored => 0,
            Compression::Deflated => 8,
        }
    }

    fn version_needed(self) -> u16 {
        match self {
            Compression::Stored => VERSION_NEEDED_STORED,
            Compression::Deflated => VERSION_NEEDED_DEFLATED,
        }
    }
}

/// Two-phase zip writer: add members, then [`ZipWriter::finish`] once
pub struct ZipWriter {
    compression: Compression,
    out: Vec<u8>,
    central: Vec<u8>,
    names: Vec<String>,
    seen: HashSet<String>,
    finished: bool,
}

fn u16le(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn u32le(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn fit_u32(value: usize, what: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| Error::ArchiveLimit(format!("{} of {} bytes", what, value)))
}

impl ZipWriter {
    pub fn new(compression: Compression) -> Self {
        Self {
            compression,
            out: Vec::new(),
            central: Vec::new(),
            names: Vec::new(),
            seen: HashSet::new(),
            finished: false,
        }
    }

    /// Names added so far, in archive order
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Append one member
    pub fn add(&mut self, name: &str, content: &[u8]) -> Result<()> {
        if self.finished {
            return Err(Error::ArchiveState(format!(
                "cannot add '{}' to a finalized archive",
                name
            )));
        }
        if name.is_empty() {
            return Err(Error::ArchiveState("member name is empty".to_string()));
        }
        if self.seen.contains(name) {
            return Err(Error::DuplicateMember(name.to_string()));
        }
        if self.names.len() >= u16::MAX as usize {
            return Err(Error::ArchiveLimit(format!(
                "more than {} members",
                u16::MAX
            )));
        }
        let name_len = u16::try_from(name.len())
            .map_err(|_| Error::ArchiveLimit(format!("member name of {} bytes", name.len())))?;

        let data = match self.compression {
            Compression::Stored => content.to_vec(),
            Compression::Deflated => {
                let mut encoder = DeflateEncoder::new(Vec::new(), flate2::Compression::default());
                encoder.write_all(content)?;
                encoder.finish()?
            }
        };

        let crc = crc32fast::hash(content);
        let compressed_size = fit_u32(data.len(), "compressed member")?;
        let uncompressed_size = fit_u32(content.len(), "member")?;
        let local_offset = fit_u32(self.out.len(), "archive offset")?;
        let flags = if name.is_ascii() { 0 } else { FLAG_UTF8 };
        let method = self.compression.method();
        let version_needed = self.compression.version_needed();

        let out = &mut self.out;
        u32le(out, SIG_LFH);
        u16le(out, version_needed);
        u16le(out, flags);
        u16le(out, method);
        u16le(out, DOS_TIME);
        u16le(out, DOS_DATE);
        u32le(out, crc);
        u32le(out, compressed_size);
        u32le(out, uncompressed_size);
        u16le(out, name_len);
        u16le(out, 0);
        out.extend_from_slice(name.as_bytes());
        out.extend_from_slice(&data);
        fit_u32(out.len(), "archive")?;

        let cd = &mut self.central;
        u32le(cd, SIG_CDFH);
        u16le(cd, VERSION_MADE_BY);
        u16le(cd, version_needed);
        u16le(cd, flags);
        u16le(cd, method);
        u16le(cd, DOS_TIME);
        u16le(cd, DOS_DATE);
        u32le(cd, crc);
        u32le(cd, compressed_size);
        u32le(cd, uncompressed_size);
        u16le(cd, name_len);
        u16le(cd, 0); // extra
        u16le(cd, 0); // comment
        u16le(cd, 0); // disk
        u16le(cd, 0); // internal attributes
        u32le(cd, 0); // external attributes
        u32le(cd, local_offset);
        cd.extend_from_slice(name.as_bytes());

        self.seen.insert(name.to_string());
        self.names.push(name.to_string());
        Ok(())
    }

    /// Write the central directory. No member can be added afterwards.
    pub fn finish(&mut self) -> Result<()> {
        if self.finished {
            return Err(Error::ArchiveState("archive is already finalized".to_string()));
        }

        let cd_start = fit_u32(self.out.len(), "central directory offset")?;
        let cd_size = fit_u32(self.central.len(), "central directory")?;
        fit_u32(self.out.len() + self.central.len(), "archive")?;
        // Bounded by the member check in `add`.
        let count = self.names.len() as u16;

        let central = std::mem::take(&mut self.central);
        self.out.extend_from_slice(&central);

        let out = &mut self.out;
        u32le(out, SIG_EOCD);
        u16le(out, 0);
        u16le(out, 0);
        u16le(out, count);
        u16le(out, count);
        u32le(out, cd_size);
        u32le(out, cd_start);
        u16le(out, 0);

        self.finished = true;
        Ok(())
    }

    /// The finished archive bytes and member names
    pub fn into_parts(self) -> Result<(Vec<u8>, Vec<String>)> {
        if !self.finished {
            return Err(Error::ArchiveState("archive is not finalized".to_string()));
        }
        Ok((self.out, self.names))
    }
}
