//! Parameter types for image stages.
//!
//! These structs describe *what* a stage does, not *how*. They are
//! deserialized straight from `[specs.*]` config tables, carried by
//! [`Stage`](crate::specs::Stage), turned into concrete geometry by
//! [`calculations`](super::calculations), and executed by a
//! [`backend`](super::backend).
//!
//! ## Types
//!
//! - [`Quality`]: Lossy encoding quality (1–100, default 70). Clamped on construction.
//! - [`OutputFormat`]: Encoding of derived images (JPEG, PNG, WebP).
//! - [`Resize`]: Bounded fit, or exact fill + anchored crop.
//! - [`Crop`]: Anchored crop without scaling.
//! - [`Adjustment`]: Multiplicative color/brightness/contrast/sharpness factors.
//! - [`Reflection`]: Fading mirror image appended below.
//! - [`TransposeMethod`]: Flips and quarter-turn rotations.

use serde::{Deserialize, Serialize};

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(70)
    }
}

/// Encoding used for derived images.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Jpeg,
    Png,
    Webp,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Png => "png",
            OutputFormat::Webp => "webp",
        }
    }
}

/// Scale an image.
///
/// Without `crop`, the image is fit inside whichever bounds are given,
/// preserving aspect ratio, and never enlarged unless `upscale` is set.
/// With `crop`, both bounds are required: the image is scaled to cover
/// `width × height` and the excess is cropped according to the photo's
/// crop anchor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Resize {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(default)]
    pub crop: bool,
    #[serde(default)]
    pub upscale: bool,
}

/// Crop to at most `width × height` around the photo's crop anchor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Crop {
    pub width: u32,
    pub height: u32,
}

/// Enhancement factors. `1.0` leaves a channel unchanged, `0.0` produces
/// the degenerate image (grayscale, black, flat gray, blurred).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Adjustment {
    pub color: f64,
    pub brightness: f64,
    pub contrast: f64,
    pub sharpness: f64,
}

impl Default for Adjustment {
    fn default() -> Self {
        Self {
            color: 1.0,
            brightness: 1.0,
            contrast: 1.0,
            sharpness: 1.0,
        }
    }
}

impl Adjustment {
    /// Factors in application order, paired with their names.
    pub fn factors(&self) -> [(&'static str, f64); 4] {
        [
            ("color", self.color),
            ("brightness", self.brightness),
            ("contrast", self.contrast),
            ("sharpness", self.sharpness),
        ]
    }

    pub fn is_identity(&self) -> bool {
        self.factors().iter().all(|(_, f)| *f == 1.0)
    }
}

/// Mirror the image below itself, fading into `background`.
///
/// - `size`: reflection height as a fraction of the image height (0 = none)
/// - `opacity`: opacity of the reflection's top row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Reflection {
    pub size: f64,
    pub opacity: f64,
    pub background: String,
}

impl Default for Reflection {
    fn default() -> Self {
        Self {
            size: 0.0,
            opacity: 0.6,
            background: "#ffffff".to_string(),
        }
    }
}

impl Reflection {
    /// Parse `background` as `#rrggbb` or `#rgb`.
    pub fn background_rgb(&self) -> Option<[u8; 3]> {
        parse_hex_color(&self.background)
    }
}

fn parse_hex_color(value: &str) -> Option<[u8; 3]> {
    let hex = value.strip_prefix('#').filter(|h| h.is_ascii())?;
    let channel = |s: &str| u8::from_str_radix(s, 16).ok();
    match hex.len() {
        6 => Some([
            channel(&hex[0..2])?,
            channel(&hex[2..4])?,
            channel(&hex[4..6])?,
        ]),
        3 => {
            let mut rgb = [0u8; 3];
            for (i, c) in hex.chars().enumerate() {
                let v = c.to_digit(16)? as u8;
                rgb[i] = v * 16 + v;
            }
            Some(rgb)
        }
        _ => None,
    }
}

/// Flip or rotate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransposeMethod {
    FlipHorizontal,
    FlipVertical,
    #[serde(rename = "rotate_90")]
    Rotate90,
    #[serde(rename = "rotate_180")]
    Rotate180,
    #[serde(rename = "rotate_270")]
    Rotate270,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_clamps_to_valid_range() {
        assert_eq!(Quality::new(0).value(), 1);
        assert_eq!(Quality::new(50).value(), 50);
        assert_eq!(Quality::new(150).value(), 100);
    }

    #[test]
    fn quality_default_is_70() {
        assert_eq!(Quality::default().value(), 70);
    }

    #[test]
    fn adjustment_default_is_identity() {
        assert!(Adjustment::default().is_identity());
        let a = Adjustment {
            contrast: 1.2,
            ..Adjustment::default()
        };
        assert!(!a.is_identity());
    }

    #[test]
    fn adjustment_factor_order() {
        let names: Vec<&str> = Adjustment::default()
            .factors()
            .iter()
            .map(|(n, _)| *n)
            .collect();
        assert_eq!(names, ["color", "brightness", "contrast", "sharpness"]);
    }

    #[test]
    fn reflection_background_parses_long_and_short_hex() {
        let mut r = Reflection::default();
        assert_eq!(r.background_rgb(), Some([255, 255, 255]));
        r.background = "#1a2b3c".into();
        assert_eq!(r.background_rgb(), Some([0x1a, 0x2b, 0x3c]));
        r.background = "#f00".into();
        assert_eq!(r.background_rgb(), Some([255, 0, 0]));
    }

    #[test]
    fn reflection_background_rejects_garbage() {
        let r = Reflection {
            background: "white".into(),
            ..Reflection::default()
        };
        assert_eq!(r.background_rgb(), None);
    }

    #[test]
    fn output_format_extensions() {
        assert_eq!(OutputFormat::Jpeg.extension(), "jpg");
        assert_eq!(OutputFormat::Png.extension(), "png");
        assert_eq!(OutputFormat::Webp.extension(), "webp");
    }

    #[test]
    fn transpose_method_parses_snake_case() {
        let m: TransposeMethod = serde_json::from_str(r#""rotate_90""#).unwrap();
        assert_eq!(m, TransposeMethod::Rotate90);
    }
}
