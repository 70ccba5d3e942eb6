//! Storage collaborator: gallery and photo records, original blobs, and
//! the per-photo view counter.
//!
//! The [`Catalog`] trait is everything the importer and the pipeline need
//! from persistence. Two implementations share the record logic in
//! [`CatalogState`]:
//!
//! - [`MemoryCatalog`]: records and blobs in memory (tests, embedding).
//! - [`FileCatalog`]: a directory holding `catalog.json` and `originals/`.
//!
//! ## Consistency
//!
//! Every mutating call takes the catalog lock for its whole
//! read-modify-write, so uniqueness checks and counter increments are
//! serialized. For `FileCatalog` that lock is an advisory lock on
//! `catalog.lock`, so separate processes sharing a store serialize too. [`Catalog::create_photo`] stores the blob, the record and the
//! gallery membership together: if any part fails, none of it is visible.
//! `FileCatalog` writes both the blob and `catalog.json` through a temp file
//! in the target directory followed by a rename, so readers never observe
//! a partial file.

use crate::naming::slugify;
use crate::types::{Gallery, NewGallery, NewPhoto, OriginalImage, Photo};
use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;

/// Name of the record file within a [`FileCatalog`] root.
const CATALOG_FILENAME: &str = "catalog.json";

/// Advisory lock file within a [`FileCatalog`] root.
const LOCK_FILENAME: &str = "catalog.lock";

/// Directory holding original blobs within a [`FileCatalog`] root.
const ORIGINALS_DIR: &str = "originals";

/// Version of the on-disk record format.
const CATALOG_VERSION: u32 = 1;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("gallery '{0}' already exists")]
    DuplicateGallery(String),
    #[error("photo '{0}' already exists")]
    DuplicatePhoto(String),
    #[error("gallery '{0}' not found")]
    GalleryNotFound(String),
    #[error("photo '{0}' not found")]
    PhotoNotFound(String),
    #[error("title '{0}' produces an empty slug")]
    EmptySlug(String),
    #[error("unsupported catalog version {0}")]
    Version(u32),
}

/// SHA-256 of `bytes`, returned as a hex string.
pub fn content_hash(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Persistence interface used by the importer and the pipeline.
///
/// Listing methods return records newest first.
pub trait Catalog: Sync {
    fn galleries(&self) -> Result<Vec<Gallery>, CatalogError>;
    fn gallery(&self, slug: &str) -> Result<Option<Gallery>, CatalogError>;
    fn gallery_slug_exists(&self, slug: &str) -> Result<bool, CatalogError>;
    fn gallery_title_exists(&self, title: &str) -> Result<bool, CatalogError>;
    fn create_gallery(&self, new: NewGallery) -> Result<Gallery, CatalogError>;

    fn photos(&self) -> Result<Vec<Photo>, CatalogError>;
    fn photo(&self, slug: &str) -> Result<Option<Photo>, CatalogError>;
    fn photo_slug_exists(&self, slug: &str) -> Result<bool, CatalogError>;
    fn photo_count(&self) -> Result<usize, CatalogError>;

    /// Store `original` and create the photo record, attaching it to
    /// `gallery` when given. All or nothing.
    fn create_photo(
        &self,
        new: NewPhoto,
        original: &[u8],
        gallery: Option<&str>,
    ) -> Result<Photo, CatalogError>;

    /// Attach an existing photo to an existing gallery. Attaching twice is a no-op.
    fn add_photo_to_gallery(&self, photo: &str, gallery: &str) -> Result<(), CatalogError>;

    fn read_original(&self, photo: &Photo) -> Result<Vec<u8>, CatalogError>;

    /// Atomically add one to the photo's view counter and return the new value.
    fn increment_view_count(&self, photo: &str) -> Result<u64, CatalogError>;
}

// ============================================================================
// Shared record logic
// ============================================================================

/// All gallery and photo records, in insertion order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogState {
    pub version: u32,
    #[serde(default)]
    pub galleries: Vec<Gallery>,
    #[serde(default)]
    pub photos: Vec<Photo>,
}

impl Default for CatalogState {
    fn default() -> Self {
        Self {
            version: CATALOG_VERSION,
            galleries: Vec::new(),
            photos: Vec::new(),
        }
    }
}

fn newest_first<T: Clone>(items: &[T], date: impl Fn(&T) -> chrono::DateTime<Utc>) -> Vec<T> {
    let mut sorted = items.to_vec();
    // Stable: equal timestamps keep insertion order
    sorted.sort_by(|a, b| date(b).cmp(&date(a)));
    sorted
}

impl CatalogState {
    pub fn find_gallery(&self, slug: &str) -> Option<&Gallery> {
        self.galleries.iter().find(|g| g.slug == slug)
    }

    pub fn find_photo(&self, slug: &str) -> Option<&Photo> {
        self.photos.iter().find(|p| p.slug == slug)
    }

    fn galleries_newest_first(&self) -> Vec<Gallery> {
        newest_first(&self.galleries, |g| g.date_added)
    }

    fn photos_newest_first(&self) -> Vec<Photo> {
        newest_first(&self.photos, |p| p.date_added)
    }

    /// Check uniqueness and build a gallery record without inserting it.
    fn build_gallery(&self, new: NewGallery) -> Result<Gallery, CatalogError> {
        let slug = new.slug.unwrap_or_else(|| slugify(&new.title));
        if slug.is_empty() {
            return Err(CatalogError::EmptySlug(new.title));
        }
        if self.find_gallery(&slug).is_some() || self.galleries.iter().any(|g| g.title == new.title)
        {
            return Err(CatalogError::DuplicateGallery(slug));
        }
        Ok(Gallery {
            title: new.title,
            slug,
            description: new.description,
            is_public: new.is_public,
            date_added: Utc::now(),
            photos: Vec::new(),
        })
    }

    /// Check uniqueness and the target gallery, and build a photo record
    /// without inserting it.
    fn build_photo(
        &self,
        new: NewPhoto,
        original: &[u8],
        gallery: Option<&str>,
    ) -> Result<Photo, CatalogError> {
        if let Some(gallery) = gallery
            && self.find_gallery(gallery).is_none()
        {
            return Err(CatalogError::GalleryNotFound(gallery.to_string()));
        }
        let slug = new.slug.unwrap_or_else(|| slugify(&new.title));
        if slug.is_empty() {
            return Err(CatalogError::EmptySlug(new.title));
        }
        if self.find_photo(&slug).is_some() || self.photos.iter().any(|p| p.title == new.title) {
            return Err(CatalogError::DuplicatePhoto(slug));
        }

        let key = if new.extension.is_empty() {
            slug.clone()
        } else {
            format!("{slug}.{}", new.extension)
        };
        Ok(Photo {
            title: new.title,
            slug,
            caption: new.caption,
            is_public: new.is_public,
            date_added: new.date_added.unwrap_or_else(Utc::now),
            view_count: 0,
            crop: new.crop,
            original: OriginalImage {
                key,
                sha256: content_hash(original),
                filename: new.filename,
            },
        })
    }

    fn insert_photo(&mut self, photo: Photo, gallery: Option<&str>) -> Result<(), CatalogError> {
        let slug = photo.slug.clone();
        self.photos.push(photo);
        if let Some(gallery) = gallery {
            self.attach(&slug, gallery)?;
        }
        Ok(())
    }

    fn attach(&mut self, photo: &str, gallery: &str) -> Result<(), CatalogError> {
        if self.find_photo(photo).is_none() {
            return Err(CatalogError::PhotoNotFound(photo.to_string()));
        }
        let gallery = self
            .galleries
            .iter_mut()
            .find(|g| g.slug == gallery)
            .ok_or_else(|| CatalogError::GalleryNotFound(gallery.to_string()))?;
        if !gallery.photos.iter().any(|p| p == photo) {
            gallery.photos.push(photo.to_string());
        }
        Ok(())
    }

    fn increment(&mut self, photo: &str) -> Result<u64, CatalogError> {
        let record = self
            .photos
            .iter_mut()
            .find(|p| p.slug == photo)
            .ok_or_else(|| CatalogError::PhotoNotFound(photo.to_string()))?;
        record.view_count += 1;
        Ok(record.view_count)
    }
}

// ============================================================================
// MemoryCatalog
// ============================================================================

#[derive(Debug, Default)]
struct MemoryInner {
    state: CatalogState,
    blobs: HashMap<String, Vec<u8>>,
}

/// In-memory catalog. Cheap to create, nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    inner: Mutex<MemoryInner>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Catalog for MemoryCatalog {
    fn galleries(&self) -> Result<Vec<Gallery>, CatalogError> {
        Ok(self.inner.lock().state.galleries_newest_first())
    }

    fn gallery(&self, slug: &str) -> Result<Option<Gallery>, CatalogError> {
        Ok(self.inner.lock().state.find_gallery(slug).cloned())
    }

    fn gallery_slug_exists(&self, slug: &str) -> Result<bool, CatalogError> {
        Ok(self.inner.lock().state.find_gallery(slug).is_some())
    }

    fn gallery_title_exists(&self, title: &str) -> Result<bool, CatalogError> {
        Ok(self.inner.lock().state.galleries.iter().any(|g| g.title == title))
    }

    fn create_gallery(&self, new: NewGallery) -> Result<Gallery, CatalogError> {
        let mut inner = self.inner.lock();
        let gallery = inner.state.build_gallery(new)?;
        inner.state.galleries.push(gallery.clone());
        Ok(gallery)
    }

    fn photos(&self) -> Result<Vec<Photo>, CatalogError> {
        Ok(self.inner.lock().state.photos_newest_first())
    }

    fn photo(&self, slug: &str) -> Result<Option<Photo>, CatalogError> {
        Ok(self.inner.lock().state.find_photo(slug).cloned())
    }

    fn photo_slug_exists(&self, slug: &str) -> Result<bool, CatalogError> {
        Ok(self.inner.lock().state.find_photo(slug).is_some())
    }

    fn photo_count(&self) -> Result<usize, CatalogError> {
        Ok(self.inner.lock().state.photos.len())
    }

    fn create_photo(
        &self,
        new: NewPhoto,
        original: &[u8],
        gallery: Option<&str>,
    ) -> Result<Photo, CatalogError> {
        let mut inner = self.inner.lock();
        let photo = inner.state.build_photo(new, original, gallery)?;
        inner.state.insert_photo(photo.clone(), gallery)?;
        inner
            .blobs
            .insert(photo.original.key.clone(), original.to_vec());
        Ok(photo)
    }

    fn add_photo_to_gallery(&self, photo: &str, gallery: &str) -> Result<(), CatalogError> {
        self.inner.lock().state.attach(photo, gallery)
    }

    fn read_original(&self, photo: &Photo) -> Result<Vec<u8>, CatalogError> {
        self.inner
            .lock()
            .blobs
            .get(&photo.original.key)
            .cloned()
            .ok_or_else(|| CatalogError::PhotoNotFound(photo.slug.clone()))
    }

    fn increment_view_count(&self, photo: &str) -> Result<u64, CatalogError> {
        self.inner.lock().state.increment(photo)
    }
}

// ============================================================================
// FileCatalog
// ============================================================================

/// Catalog persisted under a root directory:
///
/// ```text
/// <root>/catalog.json     records (galleries, photos, counters)
/// <root>/catalog.lock     advisory lock serializing access
/// <root>/originals/<key>  original image bytes
/// ```
///
/// Several handles, in one process or many, may share a root. Every call
/// takes the lock file (shared for reads, exclusive for writes) and
/// re-reads `catalog.json` under it, so a mutation always applies to the
/// latest records.
#[derive(Debug)]
pub struct FileCatalog {
    root: PathBuf,
}

/// Write `bytes` to `path` via a temp file in the same directory + rename.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let dir = path.parent().unwrap_or(Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Held store lock. Released when dropped (closing the file unlocks it).
struct StoreLock {
    _file: File,
}

impl FileCatalog {
    /// Open (or initialize) the catalog under `root`.
    pub fn open(root: &Path) -> Result<Self, CatalogError> {
        std::fs::create_dir_all(root.join(ORIGINALS_DIR))?;
        let catalog = Self {
            root: root.to_path_buf(),
        };
        // Reject an unreadable or foreign catalog up front
        catalog.read(|_| ())?;
        Ok(catalog)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn original_path(&self, key: &str) -> PathBuf {
        self.root.join(ORIGINALS_DIR).join(key)
    }

    fn lock(&self, exclusive: bool) -> Result<StoreLock, CatalogError> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.root.join(LOCK_FILENAME))?;
        if exclusive {
            file.lock()?;
        } else {
            file.lock_shared()?;
        }
        Ok(StoreLock { _file: file })
    }

    /// Current records on disk. Caller holds the store lock.
    fn load(&self) -> Result<CatalogState, CatalogError> {
        match std::fs::read_to_string(self.root.join(CATALOG_FILENAME)) {
            Ok(content) => {
                let state: CatalogState = serde_json::from_str(&content)?;
                if state.version != CATALOG_VERSION {
                    return Err(CatalogError::Version(state.version));
                }
                Ok(state)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(CatalogState::default()),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, state: &CatalogState) -> Result<(), CatalogError> {
        let json = serde_json::to_vec_pretty(state)?;
        write_atomic(&self.root.join(CATALOG_FILENAME), &json)?;
        Ok(())
    }

    fn read<T>(&self, query: impl FnOnce(&CatalogState) -> T) -> Result<T, CatalogError> {
        let _lock = self.lock(false)?;
        Ok(query(&self.load()?))
    }

    /// Re-read the records, apply `change` and persist the result, all
    /// under the exclusive lock. Nothing is written if `change` fails.
    fn mutate<T>(
        &self,
        change: impl FnOnce(&mut CatalogState) -> Result<T, CatalogError>,
    ) -> Result<T, CatalogError> {
        let _lock = self.lock(true)?;
        let mut state = self.load()?;
        let result = change(&mut state)?;
        self.save(&state)?;
        Ok(result)
    }
}

impl Catalog for FileCatalog {
    fn galleries(&self) -> Result<Vec<Gallery>, CatalogError> {
        self.read(CatalogState::galleries_newest_first)
    }

    fn gallery(&self, slug: &str) -> Result<Option<Gallery>, CatalogError> {
        self.read(|state| state.find_gallery(slug).cloned())
    }

    fn gallery_slug_exists(&self, slug: &str) -> Result<bool, CatalogError> {
        self.read(|state| state.find_gallery(slug).is_some())
    }

    fn gallery_title_exists(&self, title: &str) -> Result<bool, CatalogError> {
        self.read(|state| state.galleries.iter().any(|g| g.title == title))
    }

    fn create_gallery(&self, new: NewGallery) -> Result<Gallery, CatalogError> {
        self.mutate(|state| {
            let gallery = state.build_gallery(new)?;
            state.galleries.push(gallery.clone());
            Ok(gallery)
        })
    }

    fn photos(&self) -> Result<Vec<Photo>, CatalogError> {
        self.read(CatalogState::photos_newest_first)
    }

    fn photo(&self, slug: &str) -> Result<Option<Photo>, CatalogError> {
        self.read(|state| state.find_photo(slug).cloned())
    }

    fn photo_slug_exists(&self, slug: &str) -> Result<bool, CatalogError> {
        self.read(|state| state.find_photo(slug).is_some())
    }

    fn photo_count(&self) -> Result<usize, CatalogError> {
        self.read(|state| state.photos.len())
    }

    fn create_photo(
        &self,
        new: NewPhoto,
        original: &[u8],
        gallery: Option<&str>,
    ) -> Result<Photo, CatalogError> {
        let _lock = self.lock(true)?;
        let mut state = self.load()?;
        let photo = state.build_photo(new, original, gallery)?;

        let blob = self.original_path(&photo.original.key);
        write_atomic(&blob, original)?;

        let saved = state
            .insert_photo(photo.clone(), gallery)
            .and_then(|()| self.save(&state));
        if let Err(e) = saved {
            // Record never became visible; drop the orphaned blob
            let _ = std::fs::remove_file(&blob);
            return Err(e);
        }
        Ok(photo)
    }

    fn add_photo_to_gallery(&self, photo: &str, gallery: &str) -> Result<(), CatalogError> {
        self.mutate(|state| state.attach(photo, gallery))
    }

    fn read_original(&self, photo: &Photo) -> Result<Vec<u8>, CatalogError> {
        match std::fs::read(self.original_path(&photo.original.key)) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(CatalogError::PhotoNotFound(photo.slug.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn increment_view_count(&self, photo: &str) -> Result<u64, CatalogError> {
        self.mutate(|state| state.increment(photo))
    }
}
