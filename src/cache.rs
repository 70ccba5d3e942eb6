//! Derived-image cache.
//!
//! Rendering a specification (decode, resize, enhance, encode) is the
//! expensive part of serving a photo. This module stores each rendered
//! variant on disk so later requests for the same (photo, spec) pair can
//! return the stored bytes directly.
//!
//! # Design
//!
//! ## Cache keys
//!
//! Entries are identified by (photo slug, spec name) and **versioned** by
//! two content hashes:
//!
//! - **`source_hash`**: SHA-256 of the photo's original bytes, recorded by
//!   the catalog at creation time ([`OriginalImage::sha256`](crate::types::OriginalImage)).
//!   Replacing an original therefore misses naturally.
//!
//! - **`params_hash`**: SHA-256 of the spec's stage chain, output format and
//!   quality. Editing a `[specs.*]` table in the config invalidates that
//!   spec's entries and nothing else.
//!
//! The two are folded into a 16-hex-digit digest in the file name, so a
//! lookup is a single `open` and needs no manifest.
//!
//! ## Storage
//!
//! ```text
//! <cache_root>/<photo_slug>/<spec>.<digest>.<ext>
//! ```
//!
//! Spec names cannot contain `.`, so `<spec>.` is an unambiguous prefix for
//! all versions of one spec. Writing a new version removes the older
//! siblings with that prefix; [`DerivedCache::purge`] removes a photo's
//! whole directory.
//!
//! ## Atomic publish
//!
//! Files are written to a temp file in the target directory and renamed
//! into place. Concurrent renders of the same entry race benignly: the last
//! rename wins and readers only ever see complete files.

use crate::catalog::write_atomic;
use crate::specs::ImageSpec;
use crate::types::Photo;
use sha2::{Digest, Sha256};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

/// Version of the cache key computation. Bump this to invalidate every
/// existing entry when the key or file layout changes.
const CACHE_VERSION: u32 = 1;

/// Hex digits of the combined digest kept in file names.
const DIGEST_LEN: usize = 16;

/// SHA-256 hash of a spec's rendering parameters.
///
/// Inputs: the ordered stage chain, output format and quality. Flags that
/// do not change the output bytes (`pre_cache`, `increment_count`,
/// `access_as`) are not hashed.
pub fn hash_spec_params(spec: &ImageSpec) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"spec\0");
    hasher.update(CACHE_VERSION.to_le_bytes());
    hasher.update(serde_json::to_vec(&spec.stages).unwrap_or_default());
    hasher.update(spec.format.extension().as_bytes());
    hasher.update(spec.quality.value().to_le_bytes());
    format!("{:x}", hasher.finalize())
}

/// Location of one derived image within the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKey {
    pub photo: String,
    pub spec: String,
    pub digest: String,
    pub extension: &'static str,
}

impl CacheKey {
    pub fn new(photo: &Photo, spec: &ImageSpec) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(photo.original.sha256.as_bytes());
        hasher.update(b":");
        hasher.update(hash_spec_params(spec).as_bytes());
        let digest = format!("{:x}", hasher.finalize());
        Self {
            photo: photo.slug.clone(),
            spec: spec.name.clone(),
            digest: digest[..DIGEST_LEN].to_string(),
            extension: spec.format.extension(),
        }
    }

    pub fn file_name(&self) -> String {
        format!("{}.{}.{}", self.spec, self.digest, self.extension)
    }

    /// Path relative to the cache root, `/`-separated. Suitable as a URL path.
    pub fn url_key(&self) -> String {
        format!("{}/{}", self.photo, self.file_name())
    }
}

/// Hit/miss/store counters, safe to update from many threads.
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    stored: AtomicU64,
}

impl CacheStats {
    pub fn hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn store(&self) {
        self.stored.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CacheSummary {
        CacheSummary {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            stored: self.stored.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`CacheStats`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheSummary {
    pub hits: u64,
    pub misses: u64,
    pub stored: u64,
}

impl CacheSummary {
    pub fn total(&self) -> u64 {
        self.hits + self.misses
    }
}

impl fmt::Display for CacheSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.hits > 0 {
            write!(
                f,
                "{} cached, {} rendered ({} total)",
                self.hits,
                self.misses,
                self.total()
            )
        } else {
            write!(f, "{} rendered", self.misses)
        }
    }
}

/// On-disk store of derived images.
#[derive(Debug)]
pub struct DerivedCache {
    root: PathBuf,
    stats: CacheStats,
}

impl DerivedCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            stats: CacheStats::default(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    pub fn path(&self, key: &CacheKey) -> PathBuf {
        self.root.join(&key.photo).join(key.file_name())
    }

    /// Read a stored entry. `Ok(None)` when it does not exist.
    pub fn load(&self, key: &CacheKey) -> io::Result<Option<Vec<u8>>> {
        match std::fs::read(self.path(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Publish `bytes` for `key` and drop older versions of the same spec.
    pub fn store(&self, key: &CacheKey, bytes: &[u8]) -> io::Result<PathBuf> {
        let path = self.path(key);
        let dir = self.root.join(&key.photo);
        std::fs::create_dir_all(&dir)?;
        write_atomic(&path, bytes)?;
        self.stats.store();

        let prefix = format!("{}.", key.spec);
        let current = key.file_name();
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if name.starts_with(&prefix) && name != current {
                // Another writer may have removed it already
                let _ = std::fs::remove_file(entry.path());
            }
        }
        Ok(path)
    }

    /// Remove every derived image of `photo`. Returns the number of files removed.
    pub fn purge(&self, photo: &str) -> io::Result<usize> {
        let dir = self.root.join(photo);
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e),
        };
        let count = entries
            .filter_map(Result::ok)
            .filter(|e| e.path().is_file())
            .count();
        std::fs::remove_dir_all(&dir)?;
        Ok(count)
    }
}
