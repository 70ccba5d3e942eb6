//! # Lightbox
//!
//! The core of a photo gallery: photos arrive in bulk as zip archives and
//! are served as derived images (thumbnails, display sizes) described by
//! named specifications in config.
//!
//! # Architecture: Two Flows Over One Catalog
//!
//! ```text
//! Import   archive.zip ─► entries ─► validate ─► "{title} {n}" ─► catalog + originals
//! Render   (photo, spec) ─► cache? ─► original ─► stage chain ─► encode ─► cache
//! ```
//!
//! The importer writes gallery and photo records through the [`Catalog`]
//! trait; the pipeline reads originals back through the same trait and
//! only ever writes to the derived-image cache (and the view counter).
//! Neither flow knows how the catalog is stored: tests run against
//! [`MemoryCatalog`], the CLI against [`FileCatalog`].
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`archive`] | Reads every zip member up front, verifying CRCs |
//! | [`validate`] | Decides whether a byte blob is a complete, decodable image |
//! | [`import`] | Archive → gallery + sequentially titled photos |
//! | [`naming`] | Slugs and the `"{prefix} {n}"` title sequence |
//! | [`catalog`] | Gallery/photo records, original blobs, the atomic view counter |
//! | [`gallery`] | Read-only queries: public photos, latest, sample, neighbours |
//! | [`specs`] | Named derived-image specifications and their stage chains |
//! | [`pipeline`] | Renders (photo, spec) to bytes; counting and pre-warming |
//! | [`cache`] | Content-addressed on-disk store for rendered images |
//! | [`imaging`] | Backend trait, pure geometry, pure-Rust image operations |
//! | [`config`] | `lightbox.toml` loading, merging over stock defaults, validation |
//! | [`types`] | Shared records: `Gallery`, `Photo`, `CropAnchor`, `ImportRequest` |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Validate Everything Before Writing Anything
//!
//! An archive is read completely, and every member's CRC checked, before a
//! gallery is created. A truncated upload fails with no trace in the
//! catalog. Individual entries that are not images are skipped instead:
//! one stray `.txt` file should not reject an archive of photos.
//!
//! ## Specs Are Data
//!
//! A spec is a row in a table (`[specs.<name>]`), and its stages form a
//! closed enum. Adding a thumbnail size is a config change; the registry is
//! validated once at startup so a typo fails loudly rather than on the
//! first request.
//!
//! ## Cache Keys Name Their Inputs
//!
//! A cached file's name carries a digest of the original's content hash and
//! the spec's parameters. Replacing an original or editing a spec changes
//! the key, so stale entries are never served; they are simply no longer
//! looked up, and [`cache::DerivedCache::store`] sweeps them away.
//!
//! ## Pure-Rust Imaging
//!
//! The [`imaging`] module uses the `image` crate for decoding, Lanczos3
//! resampling and encoding. No system libraries, no external processes.
//!
//! [`Catalog`]: catalog::Catalog
//! [`MemoryCatalog`]: catalog::MemoryCatalog
//! [`FileCatalog`]: catalog::FileCatalog

pub mod archive;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod gallery;
pub mod imaging;
pub mod import;
pub mod naming;
pub mod output;
pub mod pipeline;
pub mod specs;
pub mod types;
pub mod validate;

#[cfg(test)]
pub(crate) mod test_helpers;
