//! Pure geometry for resize and crop stages.
//!
//! All functions here are pure and testable without any I/O or images:
//! they turn a source size, stage parameters and a crop anchor into the
//! exact scale and crop box a backend should execute.

use super::backend::Dimensions;
use super::params::{Crop, Resize};
use crate::types::{CropAnchor, HorizontalAnchor, VerticalAnchor};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GeometryError {
    #[error("source image has no pixels ({width}x{height})")]
    EmptySource { width: u32, height: u32 },
    #[error("resize needs a width or height (crop needs both)")]
    MissingBound,
    #[error("computed size {width}x{height} has a zero dimension")]
    ZeroDimension { width: u32, height: u32 },
}

/// Region to keep, in source pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// What a resize stage will do to a particular image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizePlan {
    /// Leave the image as it is (already within bounds, no upscaling).
    Unchanged,
    /// Scale to exactly this size.
    Scale { width: u32, height: u32 },
    /// Scale to `width × height`, then keep `crop`.
    Fill {
        width: u32,
        height: u32,
        crop: CropBox,
    },
}

/// Offset of the kept region along one axis.
fn anchor_offset(excess: u32, start: bool, end: bool) -> u32 {
    if start {
        0
    } else if end {
        excess
    } else {
        excess / 2
    }
}

fn horizontal_offset(excess: u32, anchor: HorizontalAnchor) -> u32 {
    anchor_offset(
        excess,
        anchor == HorizontalAnchor::Left,
        anchor == HorizontalAnchor::Right,
    )
}

fn vertical_offset(excess: u32, anchor: VerticalAnchor) -> u32 {
    anchor_offset(
        excess,
        anchor == VerticalAnchor::Top,
        anchor == VerticalAnchor::Bottom,
    )
}

/// Place a `width × height` box inside `source` according to `anchor`.
///
/// The box is clamped to the source, so it never reaches outside it.
pub fn anchored_box(source: Dimensions, width: u32, height: u32, anchor: CropAnchor) -> CropBox {
    let width = width.min(source.width);
    let height = height.min(source.height);
    CropBox {
        x: horizontal_offset(source.width - width, anchor.horizontal),
        y: vertical_offset(source.height - height, anchor.vertical),
        width,
        height,
    }
}

/// Calculate dimensions needed to fill a target area (resize before crop).
///
/// Returns dimensions that completely cover the target area while
/// maintaining the source aspect ratio. One dimension matches exactly, the
/// other may exceed.
pub fn calculate_fill_dimensions(source: (u32, u32), target: (u32, u32)) -> (u32, u32) {
    let (src_w, src_h) = source;
    let (tgt_w, tgt_h) = target;

    let src_aspect = src_w as f64 / src_h as f64;
    let tgt_aspect = tgt_w as f64 / tgt_h as f64;

    if src_aspect > tgt_aspect {
        // Source is wider: height will match, width will exceed
        let h = tgt_h;
        let w = (h as f64 * src_aspect).round() as u32;
        (w.max(tgt_w), h)
    } else {
        // Source is taller: width will match, height will exceed
        let w = tgt_w;
        let h = (w as f64 / src_aspect).round() as u32;
        (w, h.max(tgt_h))
    }
}

/// Calculate dimensions that fit inside the given bound(s), preserving
/// aspect ratio.
pub fn calculate_fit_dimensions(
    source: (u32, u32),
    width: Option<u32>,
    height: Option<u32>,
) -> Option<(u32, u32)> {
    let (src_w, src_h) = source;
    let ratio = match (width, height) {
        (Some(w), Some(h)) => (w as f64 / src_w as f64).min(h as f64 / src_h as f64),
        (Some(w), None) => w as f64 / src_w as f64,
        (None, Some(h)) => h as f64 / src_h as f64,
        (None, None) => return None,
    };
    Some((
        (src_w as f64 * ratio).round() as u32,
        (src_h as f64 * ratio).round() as u32,
    ))
}

fn check_source(source: Dimensions) -> Result<(), GeometryError> {
    if source.width == 0 || source.height == 0 {
        return Err(GeometryError::EmptySource {
            width: source.width,
            height: source.height,
        });
    }
    Ok(())
}

fn check_nonzero(width: u32, height: u32) -> Result<(), GeometryError> {
    if width == 0 || height == 0 {
        return Err(GeometryError::ZeroDimension { width, height });
    }
    Ok(())
}

/// Plan a resize stage for a source of the given size.
pub fn plan_resize(
    source: Dimensions,
    resize: &Resize,
    anchor: CropAnchor,
) -> Result<ResizePlan, GeometryError> {
    check_source(source)?;
    let src = (source.width, source.height);

    if resize.crop {
        let (Some(tgt_w), Some(tgt_h)) = (resize.width, resize.height) else {
            return Err(GeometryError::MissingBound);
        };
        check_nonzero(tgt_w, tgt_h)?;
        if src == (tgt_w, tgt_h) {
            return Ok(ResizePlan::Unchanged);
        }
        let (fill_w, fill_h) = calculate_fill_dimensions(src, (tgt_w, tgt_h));
        let filled = Dimensions {
            width: fill_w,
            height: fill_h,
        };
        return Ok(ResizePlan::Fill {
            width: fill_w,
            height: fill_h,
            crop: anchored_box(filled, tgt_w, tgt_h, anchor),
        });
    }

    let (width, height) =
        calculate_fit_dimensions(src, resize.width, resize.height).ok_or(GeometryError::MissingBound)?;
    check_nonzero(width, height)?;

    let enlarges = width > source.width || height > source.height;
    if (width, height) == src || (enlarges && !resize.upscale) {
        return Ok(ResizePlan::Unchanged);
    }
    Ok(ResizePlan::Scale { width, height })
}

/// Plan a crop stage. Returns `None` when the source already fits.
pub fn plan_crop(
    source: Dimensions,
    crop: &Crop,
    anchor: CropAnchor,
) -> Result<Option<CropBox>, GeometryError> {
    check_source(source)?;
    check_nonzero(crop.width, crop.height)?;
    if source.width <= crop.width && source.height <= crop.height {
        return Ok(None);
    }
    Ok(Some(anchored_box(source, crop.width, crop.height, anchor)))
}

/// Height in pixels of a reflection covering `size` of the image.
pub fn reflection_height(image_height: u32, size: f64) -> u32 {
    (image_height as f64 * size.clamp(0.0, 1.0)).floor() as u32
}
