//! Zip archive reading with an up-front integrity check.
//!
//! [`read_entries`] reads every member fully before returning anything, so
//! a CRC mismatch anywhere in the archive is reported before the caller
//! writes a single record.

use std::io::{Cursor, Read};
use thiserror::Error;
use zip::ZipArchive;
use zip::result::ZipError;

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("not a readable zip archive: {0}")]
    Unreadable(#[source] ZipError),
    #[error("archive member '{member}' is corrupt: {reason}")]
    Corrupt { member: String, reason: String },
}

/// One archive member, fully read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub name: String,
    pub data: Vec<u8>,
    pub is_dir: bool,
}

impl ArchiveEntry {
    /// Final path component of the member name.
    pub fn file_name(&self) -> &str {
        self.name
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or(&self.name)
    }

    /// Lowercased extension of the member name, if any.
    pub fn extension(&self) -> Option<String> {
        let name = self.file_name();
        let (stem, ext) = name.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() {
            return None;
        }
        Some(ext.to_ascii_lowercase())
    }
}

fn member_name(archive: &ZipArchive<Cursor<&[u8]>>, index: usize) -> String {
    archive
        .name_for_index(index)
        .map(str::to_string)
        .unwrap_or_else(|| format!("#{index}"))
}

/// Open `bytes` as a zip archive and read every member in archive order.
///
/// The first member whose data cannot be read or whose CRC does not match
/// yields [`ArchiveError::Corrupt`].
pub fn read_entries(bytes: &[u8]) -> Result<Vec<ArchiveEntry>, ArchiveError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).map_err(ArchiveError::Unreadable)?;
    let mut entries = Vec::with_capacity(archive.len());

    for index in 0..archive.len() {
        let member = member_name(&archive, index);
        let mut file = archive.by_index(index).map_err(|e| ArchiveError::Corrupt {
            member: member.clone(),
            reason: e.to_string(),
        })?;

        let is_dir = file.is_dir();
        // The declared size comes from the archive itself; never trust it
        // beyond the archive's own length
        let declared = usize::try_from(file.size()).unwrap_or(usize::MAX);
        let mut data = Vec::with_capacity(declared.min(bytes.len()));
        // The zip reader verifies the CRC when the member is read to the end
        file.read_to_end(&mut data)
            .map_err(|e| ArchiveError::Corrupt {
                member: member.clone(),
                reason: e.to_string(),
            })?;

        entries.push(ArchiveEntry {
            name: member,
            data,
            is_dir,
        });
    }

    Ok(entries)
}
