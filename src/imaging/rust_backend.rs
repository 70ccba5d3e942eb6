//! Pure Rust image processing backend.
//!
//! Everything is statically linked into the binary.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, GIF, TIFF, WebP) | `image::load_from_memory` |
//! | Probe | `ImageReader::with_guessed_format` + `into_dimensions` |
//! | Resize | `DynamicImage::resize_exact` with `Lanczos3` |
//! | Crop | `DynamicImage::crop_imm` |
//! | Adjust | per-pixel blend against a degenerate image (see below) |
//! | Sharpness | `imageops::filter3x3` smoothing kernel as the degenerate image |
//! | Reflect | `imageops::flip_vertical` + alpha gradient over the background |
//! | Encode | `JpegEncoder` (quality), `PngEncoder`, `WebPEncoder` (lossless) |
//!
//! ## Enhancement model
//!
//! Each adjustment factor blends the image with a degenerate version of
//! itself: `out = degenerate + factor × (image − degenerate)`, clamped to
//! `0..=255`. The degenerate image is grayscale for color, black for
//! brightness, flat mean-gray for contrast and a smoothed copy for
//! sharpness. Factors above 1 extrapolate away from the degenerate image.

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::calculations::{CropBox, reflection_height};
use super::params::{Adjustment, OutputFormat, Quality, Reflection, TransposeMethod};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, GenericImageView, ImageReader, Rgba, RgbaImage};
use std::io::Cursor;

/// PIL's SMOOTH kernel, normalized by `filter3x3`.
const SMOOTH_KERNEL: [f32; 9] = [1.0, 1.0, 1.0, 1.0, 5.0, 1.0, 1.0, 1.0, 1.0];

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn luma(p: &Rgba<u8>) -> f64 {
    0.299 * p[0] as f64 + 0.587 * p[1] as f64 + 0.114 * p[2] as f64
}

fn blend_channel(degenerate: f64, value: f64, factor: f64) -> u8 {
    (degenerate + factor * (value - degenerate)).round().clamp(0.0, 255.0) as u8
}

/// Blend every pixel of `image` with its degenerate counterpart. Alpha is kept.
fn blend_with(image: &mut RgbaImage, factor: f64, degenerate: impl Fn(u32, u32, &Rgba<u8>) -> [f64; 3]) {
    for (x, y, pixel) in image.enumerate_pixels_mut() {
        let d = degenerate(x, y, pixel);
        for c in 0..3 {
            pixel[c] = blend_channel(d[c], pixel[c] as f64, factor);
        }
    }
}

fn apply_factor(image: &mut RgbaImage, name: &str, factor: f64) {
    match name {
        "color" => blend_with(image, factor, |_, _, p| {
            let l = luma(p).round();
            [l, l, l]
        }),
        "brightness" => blend_with(image, factor, |_, _, _| [0.0, 0.0, 0.0]),
        "contrast" => {
            let count = (image.width() as f64 * image.height() as f64).max(1.0);
            let mean = (image.pixels().map(luma).sum::<f64>() / count + 0.5).floor();
            blend_with(image, factor, |_, _, _| [mean, mean, mean]);
        }
        "sharpness" => {
            let smoothed: RgbaImage = imageops::filter3x3(&*image, &SMOOTH_KERNEL);
            let (w, h) = image.dimensions();
            blend_with(image, factor, |x, y, p| {
                // Border pixels have no full neighbourhood and stay as they are
                let src = if x == 0 || y == 0 || x + 1 == w || y + 1 == h {
                    p
                } else {
                    smoothed.get_pixel(x, y)
                };
                [src[0] as f64, src[1] as f64, src[2] as f64]
            });
        }
        _ => {}
    }
}

fn encode_err(format: OutputFormat, e: image::ImageError) -> BackendError {
    BackendError::ProcessingFailed(format!("{} encode failed: {e}", format.extension()))
}

impl ImageBackend for RustBackend {
    type Image = DynamicImage;

    fn decode(&self, bytes: &[u8]) -> Result<DynamicImage, BackendError> {
        image::load_from_memory(bytes)
            .map_err(|e| BackendError::ProcessingFailed(format!("Failed to decode: {e}")))
    }

    fn dimensions(&self, image: &DynamicImage) -> Dimensions {
        let (width, height) = image.dimensions();
        Dimensions { width, height }
    }

    fn probe(&self, bytes: &[u8]) -> Result<Dimensions, BackendError> {
        let (width, height) = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()?
            .into_dimensions()
            .map_err(|e| BackendError::ProcessingFailed(format!("Failed to read dimensions: {e}")))?;
        Ok(Dimensions { width, height })
    }

    fn resize(&self, image: &DynamicImage, width: u32, height: u32) -> Result<DynamicImage, BackendError> {
        if width == 0 || height == 0 {
            return Err(BackendError::ProcessingFailed(format!(
                "cannot resize to {width}x{height}"
            )));
        }
        Ok(image.resize_exact(width, height, FilterType::Lanczos3))
    }

    fn crop(&self, image: &DynamicImage, region: CropBox) -> Result<DynamicImage, BackendError> {
        let (w, h) = image.dimensions();
        if region.width == 0
            || region.height == 0
            || region.x + region.width > w
            || region.y + region.height > h
        {
            return Err(BackendError::ProcessingFailed(format!(
                "crop {}x{}+{}+{} outside {w}x{h} image",
                region.width, region.height, region.x, region.y
            )));
        }
        Ok(image.crop_imm(region.x, region.y, region.width, region.height))
    }

    fn adjust(&self, image: &DynamicImage, adjustment: &Adjustment) -> Result<DynamicImage, BackendError> {
        let mut buffer = image.to_rgba8();
        for (name, factor) in adjustment.factors() {
            if factor != 1.0 {
                apply_factor(&mut buffer, name, factor);
            }
        }
        Ok(DynamicImage::ImageRgba8(buffer))
    }

    fn reflect(&self, image: &DynamicImage, reflection: &Reflection) -> Result<DynamicImage, BackendError> {
        let [br, bg, bb] = reflection.background_rgb().ok_or_else(|| {
            BackendError::ProcessingFailed(format!(
                "invalid reflection background {:?}",
                reflection.background
            ))
        })?;
        let source = image.to_rgba8();
        let (w, h) = source.dimensions();
        let extra = reflection_height(h, reflection.size);

        let background = Rgba([br, bg, bb, 255]);
        let mut canvas = RgbaImage::from_pixel(w, h + extra, background);
        imageops::overlay(&mut canvas, &source, 0, 0);

        let mirrored = imageops::flip_vertical(&source);
        for y in 0..extra {
            // Opacity fades linearly from `opacity` at the top to zero
            let alpha = reflection.opacity.clamp(0.0, 1.0) * (1.0 - y as f64 / extra as f64);
            for x in 0..w {
                let src = mirrored.get_pixel(x, y);
                let a = alpha * src[3] as f64 / 255.0;
                let out = canvas.get_pixel_mut(x, h + y);
                for c in 0..3 {
                    out[c] = (src[c] as f64 * a + out[c] as f64 * (1.0 - a)).round() as u8;
                }
            }
        }
        Ok(DynamicImage::ImageRgba8(canvas))
    }

    fn transpose(&self, image: &DynamicImage, method: TransposeMethod) -> Result<DynamicImage, BackendError> {
        Ok(match method {
            TransposeMethod::FlipHorizontal => image.fliph(),
            TransposeMethod::FlipVertical => image.flipv(),
            TransposeMethod::Rotate90 => image.rotate90(),
            TransposeMethod::Rotate180 => image.rotate180(),
            TransposeMethod::Rotate270 => image.rotate270(),
        })
    }

    fn encode(
        &self,
        image: &DynamicImage,
        format: OutputFormat,
        quality: Quality,
    ) -> Result<Vec<u8>, BackendError> {
        let mut buffer = Vec::new();
        match format {
            OutputFormat::Jpeg => {
                let encoder = JpegEncoder::new_with_quality(&mut buffer, quality.value() as u8);
                DynamicImage::ImageRgb8(image.to_rgb8())
                    .write_with_encoder(encoder)
                    .map_err(|e| encode_err(format, e))?;
            }
            OutputFormat::Png => {
                image
                    .write_with_encoder(PngEncoder::new(&mut buffer))
                    .map_err(|e| encode_err(format, e))?;
            }
            OutputFormat::Webp => {
                DynamicImage::ImageRgba8(image.to_rgba8())
                    .write_with_encoder(WebPEncoder::new_lossless(&mut buffer))
                    .map_err(|e| encode_err(format, e))?;
            }
        }
        Ok(buffer)
    }
}
