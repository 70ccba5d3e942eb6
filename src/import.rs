//! Bulk import of photos from an uploaded zip archive.
//!
//! ## Flow
//!
//! ```text
//! archive bytes
//!   │  read every member, verify CRCs ──► CorruptArchive (nothing written)
//!   ▼
//! resolve gallery (existing slug, or create from the title)
//!   │
//!   ▼
//! for each entry, in archive order:
//!   skip directories, reserved metadata names, empty files
//!   validate ──► invalid: skip, keep going
//!   claim next free "{title} {n}"
//!   create photo + attach to gallery (one catalog call)
//! ```
//!
//! Sequence numbers are shared by the whole run and only advance when a
//! title is claimed: an invalid entry does not use up a number. A number
//! whose slug is already taken (by an earlier import or by a photo with
//! that title) is passed over, so numbering continues after existing
//! photos instead of failing.
//!
//! Imports into the same gallery must be serialized by the caller; two
//! concurrent runs can both probe the same free number, in which case the
//! loser's catalog insert fails and it moves on to the next one.

use crate::archive::{self, ArchiveEntry, ArchiveError};
use crate::catalog::{Catalog, CatalogError};
use crate::imaging::Dimensions;
use crate::naming::{TitleSequence, slugify};
use crate::types::{CropAnchor, Gallery, ImportRequest, NewGallery, NewPhoto, Photo};
use crate::validate::{ValidatedImage, validate};
use image::ImageFormat;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("archive member '{member}' is corrupt: {reason}")]
    CorruptArchive { member: String, reason: String },
    #[error("could not read archive: {0}")]
    Archive(#[source] ArchiveError),
    #[error("gallery '{0}' already exists")]
    DuplicateGallery(String),
    #[error("gallery '{0}' not found")]
    GalleryNotFound(String),
    #[error("title {0:?} cannot be turned into a slug")]
    InvalidTitle(String),
    #[error("no free photo title found for prefix '{0}'")]
    TitleSpaceExhausted(String),
    #[error("import cancelled after {created} photos")]
    Cancelled { created: usize },
    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),
}

impl From<ArchiveError> for ImportError {
    fn from(e: ArchiveError) -> Self {
        match e {
            ArchiveError::Corrupt { member, reason } => ImportError::CorruptArchive { member, reason },
            other => ImportError::Archive(other),
        }
    }
}

/// Knobs for an import run.
#[derive(Debug, Clone)]
pub struct ImportOptions {
    /// Entries whose path or file name starts with this are archive
    /// metadata (`__MACOSX/`, ...) and are skipped.
    pub skip_prefix: String,
    /// Checked between entries; set it to stop the run.
    pub cancel: Option<Arc<AtomicBool>>,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            skip_prefix: "__".to_string(),
            cancel: None,
        }
    }
}

impl ImportOptions {
    fn cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }
}

/// Why an archive entry did not become a photo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    Directory,
    Metadata,
    Empty,
    Invalid(String),
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::Directory => write!(f, "directory"),
            SkipReason::Metadata => write!(f, "archive metadata"),
            SkipReason::Empty => write!(f, "empty file"),
            SkipReason::Invalid(reason) => write!(f, "{reason}"),
        }
    }
}

/// An entry that was passed over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedEntry {
    pub name: String,
    pub reason: SkipReason,
}

/// Result of a successful import.
#[derive(Debug, Clone)]
pub struct ImportOutcome {
    /// The target gallery as stored after the run.
    pub gallery: Gallery,
    /// Photos created by this run, in creation order.
    pub photos: Vec<Photo>,
    pub skipped: Vec<SkippedEntry>,
}

/// Verdict for one entry of [`inspect_archive`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryVerdict {
    Image {
        format: ImageFormat,
        dimensions: Dimensions,
    },
    Skipped(SkipReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryReport {
    pub name: String,
    pub verdict: EntryVerdict,
}

fn is_metadata(entry: &ArchiveEntry, prefix: &str) -> bool {
    !prefix.is_empty() && (entry.name.starts_with(prefix) || entry.file_name().starts_with(prefix))
}

/// Decide whether an entry is an importable image.
fn classify(entry: &ArchiveEntry, options: &ImportOptions) -> Result<ValidatedImage, SkipReason> {
    if entry.is_dir {
        return Err(SkipReason::Directory);
    }
    if is_metadata(entry, &options.skip_prefix) {
        return Err(SkipReason::Metadata);
    }
    if entry.data.is_empty() {
        return Err(SkipReason::Empty);
    }
    validate(&entry.data).map_err(|e| SkipReason::Invalid(e.to_string()))
}

/// Check an archive without writing anything: integrity first, then a
/// verdict per entry.
pub fn inspect_archive(bytes: &[u8], options: &ImportOptions) -> Result<Vec<EntryReport>, ImportError> {
    let entries = archive::read_entries(bytes)?;
    Ok(entries
        .iter()
        .map(|entry| EntryReport {
            name: entry.name.clone(),
            verdict: match classify(entry, options) {
                Ok(v) => EntryVerdict::Image {
                    format: v.format,
                    dimensions: v.dimensions,
                },
                Err(reason) => EntryVerdict::Skipped(reason),
            },
        })
        .collect())
}

fn resolve_gallery<C: Catalog>(catalog: &C, request: &ImportRequest) -> Result<Gallery, ImportError> {
    if let Some(slug) = &request.gallery {
        return catalog
            .gallery(slug)?
            .ok_or_else(|| ImportError::GalleryNotFound(slug.clone()));
    }

    let slug = slugify(&request.title);
    if slug.is_empty() {
        return Err(ImportError::InvalidTitle(request.title.clone()));
    }
    if catalog.gallery_slug_exists(&slug)? || catalog.gallery_title_exists(&request.title)? {
        return Err(ImportError::DuplicateGallery(slug));
    }
    let gallery = catalog
        .create_gallery(NewGallery {
            title: request.title.clone(),
            slug: Some(slug),
            description: request.description.clone(),
            is_public: request.is_public,
        })
        .map_err(|e| match e {
            CatalogError::DuplicateGallery(slug) => ImportError::DuplicateGallery(slug),
            other => other.into(),
        })?;
    info!(gallery = %gallery.slug, "created gallery");
    Ok(gallery)
}

/// Import every valid image in `request.archive` into a gallery.
///
/// The archive is fully integrity-checked before the gallery is resolved,
/// so a corrupt archive never leaves a half-created gallery behind. A
/// title that slugs to nothing is only rejected when it would name a new
/// gallery.
pub fn import_archive<C: Catalog>(
    catalog: &C,
    request: ImportRequest,
    options: &ImportOptions,
) -> Result<ImportOutcome, ImportError> {
    let entries = archive::read_entries(&request.archive)?;
    let gallery = resolve_gallery(catalog, &request)?;

    let max_probes = catalog.photo_count()? + entries.len() + 1;
    let mut sequence = TitleSequence::new(&request.title);
    let mut photos = Vec::new();
    let mut skipped = Vec::new();

    for entry in &entries {
        if options.cancelled() {
            info!(gallery = %gallery.slug, created = photos.len(), "import cancelled");
            return Err(ImportError::Cancelled {
                created: photos.len(),
            });
        }

        let validated = match classify(entry, options) {
            Ok(v) => v,
            Err(reason) => {
                debug!(entry = %entry.name, %reason, "skipping archive entry");
                skipped.push(SkippedEntry {
                    name: entry.name.clone(),
                    reason,
                });
                continue;
            }
        };
        let extension = entry
            .extension()
            .unwrap_or_else(|| validated.extension().to_string());

        let photo = loop {
            let claimed = sequence
                .claim(max_probes, |slug| catalog.photo_slug_exists(slug))?
                .ok_or_else(|| ImportError::TitleSpaceExhausted(request.title.clone()))?;

            let new = NewPhoto {
                title: claimed.title,
                slug: Some(claimed.slug),
                caption: request.caption.clone(),
                is_public: request.is_public,
                crop: CropAnchor::default(),
                filename: entry.file_name().to_string(),
                extension: extension.clone(),
                date_added: None,
            };
            match catalog.create_photo(new, &entry.data, Some(&gallery.slug)) {
                Ok(photo) => break photo,
                // Title or slug taken since the probe: try the next number
                Err(CatalogError::DuplicatePhoto(slug)) => {
                    debug!(%slug, "photo title collision, probing next number");
                }
                Err(e) => return Err(e.into()),
            }
        };
        debug!(entry = %entry.name, photo = %photo.slug, "imported");
        photos.push(photo);
    }

    let gallery = catalog
        .gallery(&gallery.slug)?
        .ok_or_else(|| ImportError::GalleryNotFound(gallery.slug.clone()))?;
    info!(
        gallery = %gallery.slug,
        imported = photos.len(),
        skipped = skipped.len(),
        "import finished"
    );
    Ok(ImportOutcome {
        gallery,
        photos,
        skipped,
    })
}
