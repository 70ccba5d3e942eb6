//! Shared test utilities for the lightbox test suite.
//!
//! Provides fixture builders that produce real encoded images and zip
//! archives in memory, plus lookup helpers for catalog records.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let archive = ZipBuilder::new()
//!     .file("a.png", &png_bytes(40, 30))
//!     .file("__MACOSX/._a.png", b"junk")
//!     .finish();
//! ```

use image::{DynamicImage, ImageFormat, RgbImage};
use std::io::{Cursor, Write};
use zip::CompressionMethod;
use zip::write::SimpleFileOptions;

use crate::types::Photo;

// =========================================================================
// Image fixtures
// =========================================================================

fn gradient(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    }))
}

fn encode(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let mut cursor = Cursor::new(Vec::new());
    gradient(width, height).write_to(&mut cursor, format).unwrap();
    cursor.into_inner()
}

/// A valid PNG of the given size.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    encode(width, height, ImageFormat::Png)
}

/// A valid baseline JPEG of the given size.
pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    encode(width, height, ImageFormat::Jpeg)
}

// =========================================================================
// Archive fixtures
// =========================================================================

/// Builds an in-memory zip archive. Members are stored uncompressed so a
/// test can corrupt their data in place with [`corrupt_member`].
pub struct ZipBuilder {
    writer: zip::ZipWriter<Cursor<Vec<u8>>>,
}

impl ZipBuilder {
    pub fn new() -> Self {
        Self {
            writer: zip::ZipWriter::new(Cursor::new(Vec::new())),
        }
    }

    fn options() -> SimpleFileOptions {
        SimpleFileOptions::default().compression_method(CompressionMethod::Stored)
    }

    pub fn file(mut self, name: &str, data: &[u8]) -> Self {
        self.writer.start_file(name, Self::options()).unwrap();
        self.writer.write_all(data).unwrap();
        self
    }

    pub fn dir(mut self, name: &str) -> Self {
        self.writer.add_directory(name, Self::options()).unwrap();
        self
    }

    pub fn finish(self) -> Vec<u8> {
        self.writer.finish().unwrap().into_inner()
    }
}

/// Flip the first data byte of member `name` so its CRC no longer matches.
///
/// Panics if the member is missing or empty.
pub fn corrupt_member(archive: &mut [u8], name: &str) {
    const LOCAL_HEADER: &[u8] = b"PK\x03\x04";
    let mut pos = 0;
    while pos + 30 <= archive.len() {
        if &archive[pos..pos + 4] == LOCAL_HEADER {
            let name_len = u16::from_le_bytes([archive[pos + 26], archive[pos + 27]]) as usize;
            let extra_len = u16::from_le_bytes([archive[pos + 28], archive[pos + 29]]) as usize;
            let stored_name = &archive[pos + 30..pos + 30 + name_len];
            if stored_name == name.as_bytes() {
                let data = pos + 30 + name_len + extra_len;
                archive[data] ^= 0xFF;
                return;
            }
        }
        pos += 1;
    }
    panic!("member '{name}' not found in archive");
}

// =========================================================================
// Catalog lookups: panic with a clear message on miss
// =========================================================================

/// Titles of `photos` in order.
pub fn photo_titles(photos: &[Photo]) -> Vec<&str> {
    photos.iter().map(|p| p.title.as_str()).collect()
}

/// Find a photo by slug. Panics if not found.
pub fn find_photo<'a>(photos: &'a [Photo], slug: &str) -> &'a Photo {
    photos.iter().find(|p| p.slug == slug).unwrap_or_else(|| {
        let slugs: Vec<&str> = photos.iter().map(|p| p.slug.as_str()).collect();
        panic!("photo '{slug}' not found. Available: {slugs:?}")
    })
}
