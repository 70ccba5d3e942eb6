//! Domain records shared by the importer, the catalog and the pipeline.
//!
//! These are plain data: the catalog owns persistence and uniqueness, the
//! importer builds [`NewPhoto`]s, and the pipeline reads a [`Photo`]'s crop
//! anchor and original reference.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Horizontal part of a photo's crop anchor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HorizontalAnchor {
    Left,
    #[default]
    Center,
    Right,
}

/// Vertical part of a photo's crop anchor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerticalAnchor {
    Top,
    #[default]
    Center,
    Bottom,
}

/// Which region of a photo survives when a stage crops it.
///
/// Defaults to center/center.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropAnchor {
    #[serde(default)]
    pub horizontal: HorizontalAnchor,
    #[serde(default)]
    pub vertical: VerticalAnchor,
}

impl CropAnchor {
    pub fn new(horizontal: HorizontalAnchor, vertical: VerticalAnchor) -> Self {
        Self {
            horizontal,
            vertical,
        }
    }
}

/// Reference to a photo's stored original image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OriginalImage {
    /// Blob key in the catalog's original store (e.g. `trip-1.jpg`).
    pub key: String,
    /// SHA-256 of the original bytes, hex encoded. Derived-image cache
    /// entries are versioned by this value.
    pub sha256: String,
    /// Filename the image had in the uploaded archive.
    pub filename: String,
}

/// A named collection of photos.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gallery {
    pub title: String,
    pub slug: String,
    #[serde(default)]
    pub description: String,
    pub is_public: bool,
    pub date_added: DateTime<Utc>,
    /// Member photo slugs in the order they were added.
    #[serde(default)]
    pub photos: Vec<String>,
}

/// A single managed image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Photo {
    pub title: String,
    pub slug: String,
    #[serde(default)]
    pub caption: String,
    pub is_public: bool,
    pub date_added: DateTime<Utc>,
    /// Number of counted resolutions. Only the pipeline increments it.
    #[serde(default)]
    pub view_count: u64,
    #[serde(default)]
    pub crop: CropAnchor,
    pub original: OriginalImage,
}

/// Fields for creating a gallery. `slug` defaults to the slug of `title`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewGallery {
    pub title: String,
    pub slug: Option<String>,
    pub description: String,
    pub is_public: bool,
}

/// Fields for creating a photo. `slug` defaults to the slug of `title`,
/// `date_added` to now.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPhoto {
    pub title: String,
    pub slug: Option<String>,
    pub caption: String,
    pub is_public: bool,
    pub crop: CropAnchor,
    /// Filename as uploaded.
    pub filename: String,
    /// Extension of the stored blob key, without the dot.
    pub extension: String,
    pub date_added: Option<DateTime<Utc>>,
}

/// A bulk upload: consumed once by [`import_archive`](crate::import::import_archive)
/// and then dropped.
#[derive(Debug, Clone)]
pub struct ImportRequest {
    /// Raw zip archive bytes.
    pub archive: Vec<u8>,
    /// Slug of an existing gallery to add to. `None` creates a new gallery
    /// titled [`title`](Self::title).
    pub gallery: Option<String>,
    /// Gallery title and photo title prefix.
    pub title: String,
    pub caption: String,
    pub description: String,
    pub is_public: bool,
}
