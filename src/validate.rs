//! Decide whether raw bytes are a structurally valid image.
//!
//! Validation runs two independent passes over the bytes:
//!
//! 1. **Decode**: a full pixel decode, which catches truncated or garbled
//!    entropy data.
//! 2. **Re-parse**: starting from scratch, guess the format from magic
//!    bytes, walk the container with [`imaging::structure`](crate::imaging::structure),
//!    and read the header dimensions with a fresh decoder. They must agree
//!    with the first pass.
//!
//! Every failure becomes [`ValidationError::Invalid`]; nothing panics and
//! no decoder error escapes as anything else.

use crate::imaging::Dimensions;
use crate::imaging::structure;
use image::{GenericImageView, ImageFormat, ImageReader};
use std::io::Cursor;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("empty input")]
    Empty,
    #[error("invalid image: {0}")]
    Invalid(String),
}

/// A successfully validated image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidatedImage {
    pub format: ImageFormat,
    pub dimensions: Dimensions,
}

impl ValidatedImage {
    /// Canonical file extension for the detected format.
    pub fn extension(&self) -> &'static str {
        self.format.extensions_str().first().copied().unwrap_or("img")
    }
}

fn invalid(e: impl std::fmt::Display) -> ValidationError {
    ValidationError::Invalid(e.to_string())
}

/// Validate `bytes` as an image.
pub fn validate(bytes: &[u8]) -> Result<ValidatedImage, ValidationError> {
    if bytes.is_empty() {
        return Err(ValidationError::Empty);
    }

    // Pass 1: full decode
    let decoded = image::load_from_memory(bytes).map_err(invalid)?;
    let (width, height) = decoded.dimensions();
    drop(decoded);

    // Pass 2: fresh parse
    let format = image::guess_format(bytes).map_err(invalid)?;
    structure::verify(format, bytes).map_err(invalid)?;

    let header = ImageReader::with_format(Cursor::new(bytes), format)
        .into_dimensions()
        .map_err(invalid)?;
    if header != (width, height) {
        return Err(ValidationError::Invalid(format!(
            "header says {}x{}, pixel data is {width}x{height}",
            header.0, header.1
        )));
    }

    Ok(ValidatedImage {
        format,
        dimensions: Dimensions { width, height },
    })
}
