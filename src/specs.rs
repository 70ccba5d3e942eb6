//! Named derived-image specifications.
//!
//! A specification is a name plus an ordered chain of [`Stage`]s and a few
//! policy flags. The [`SpecRegistry`] is built once from the `[specs.*]`
//! config tables, validated up front, and read-only afterwards; the
//! pipeline only ever borrows it.
//!
//! ## Config Format
//!
//! ```toml
//! [specs.thumbnail]
//! pre_cache = true
//! format = "jpeg"
//! quality = 70
//! stages = [
//!     { kind = "resize", width = 100, height = 75, crop = true },
//!     { kind = "adjust", contrast = 1.2, sharpness = 1.1 },
//! ]
//! ```
//!
//! ## Stock Specs
//!
//! | Name | Stages | Flags |
//! |---|---|---|
//! | `admin_thumbnail` | resize 100×75 crop, adjust contrast 1.2 sharpness 1.1 | |
//! | `display` | resize width 600 | `increment_count` |
//! | `thumbnail` | resize 100×75 crop, adjust contrast 1.2 sharpness 1.1 | `pre_cache` |

use crate::imaging::{Adjustment, Crop, OutputFormat, Quality, Reflection, Resize, TransposeMethod};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SpecError {
    #[error("unknown image specification '{0}'")]
    Unknown(String),
    #[error("specification '{spec}': {reason}")]
    Invalid { spec: String, reason: String },
}

/// One transform in a specification's chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Stage {
    Resize(Resize),
    Crop(Crop),
    Adjust(Adjustment),
    Reflect(Reflection),
    Transpose { method: TransposeMethod },
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Resize(_) => "resize",
            Stage::Crop(_) => "crop",
            Stage::Adjust(_) => "adjust",
            Stage::Reflect(_) => "reflect",
            Stage::Transpose { .. } => "transpose",
        }
    }

    /// Short human-readable description for listings.
    pub fn describe(&self) -> String {
        match self {
            Stage::Resize(r) => {
                let bound = |v: Option<u32>| v.map_or("*".to_string(), |n| n.to_string());
                let mut s = format!("resize {}x{}", bound(r.width), bound(r.height));
                if r.crop {
                    s.push_str(" crop");
                }
                if r.upscale {
                    s.push_str(" upscale");
                }
                s
            }
            Stage::Crop(c) => format!("crop {}x{}", c.width, c.height),
            Stage::Adjust(a) => {
                let changed: Vec<String> = a
                    .factors()
                    .iter()
                    .filter(|(_, f)| *f != 1.0)
                    .map(|(n, f)| format!("{n} {f}"))
                    .collect();
                if changed.is_empty() {
                    "adjust".to_string()
                } else {
                    format!("adjust {}", changed.join(" "))
                }
            }
            Stage::Reflect(r) => format!("reflect {}", r.size),
            Stage::Transpose { method } => format!("transpose {method:?}"),
        }
    }

    fn validate(&self) -> Result<(), String> {
        match self {
            Stage::Resize(r) => {
                if r.width.is_none() && r.height.is_none() {
                    return Err("resize needs a width or a height".into());
                }
                if r.crop && (r.width.is_none() || r.height.is_none()) {
                    return Err("resize with crop needs both width and height".into());
                }
                if r.width == Some(0) || r.height == Some(0) {
                    return Err("resize bounds must be positive".into());
                }
            }
            Stage::Crop(c) => {
                if c.width == 0 || c.height == 0 {
                    return Err("crop bounds must be positive".into());
                }
            }
            Stage::Adjust(a) => {
                if let Some((name, f)) = a.factors().iter().find(|(_, f)| !f.is_finite() || *f < 0.0) {
                    return Err(format!("adjust {name} must be a non-negative number, got {f}"));
                }
            }
            Stage::Reflect(r) => {
                if !(0.0..=1.0).contains(&r.size) {
                    return Err(format!("reflect size must be within 0-1, got {}", r.size));
                }
                if !(0.0..=1.0).contains(&r.opacity) {
                    return Err(format!("reflect opacity must be within 0-1, got {}", r.opacity));
                }
                if r.background_rgb().is_none() {
                    return Err(format!("reflect background '{}' is not #rgb or #rrggbb", r.background));
                }
            }
            Stage::Transpose { .. } => {}
        }
        Ok(())
    }
}

fn default_true() -> bool {
    true
}

fn default_quality() -> u32 {
    Quality::default().value()
}

/// A `[specs.<name>]` config table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SpecConfig {
    /// Accessor name a display layer uses. Defaults to the spec name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_as: Option<String>,
    #[serde(default = "default_true")]
    pub cache: bool,
    #[serde(default)]
    pub pre_cache: bool,
    #[serde(default)]
    pub increment_count: bool,
    #[serde(default)]
    pub format: OutputFormat,
    #[serde(default = "default_quality")]
    pub quality: u32,
    #[serde(default)]
    pub stages: Vec<Stage>,
}

impl Default for SpecConfig {
    fn default() -> Self {
        Self {
            access_as: None,
            cache: true,
            pre_cache: false,
            increment_count: false,
            format: OutputFormat::default(),
            quality: default_quality(),
            stages: Vec::new(),
        }
    }
}

fn thumbnail_stages() -> Vec<Stage> {
    vec![
        Stage::Resize(Resize {
            width: Some(100),
            height: Some(75),
            crop: true,
            upscale: false,
        }),
        Stage::Adjust(Adjustment {
            contrast: 1.2,
            sharpness: 1.1,
            ..Adjustment::default()
        }),
    ]
}

/// The specifications every installation starts with.
pub fn stock_spec_configs() -> BTreeMap<String, SpecConfig> {
    let mut specs = BTreeMap::new();
    specs.insert(
        "admin_thumbnail".to_string(),
        SpecConfig {
            stages: thumbnail_stages(),
            ..SpecConfig::default()
        },
    );
    specs.insert(
        "display".to_string(),
        SpecConfig {
            increment_count: true,
            stages: vec![Stage::Resize(Resize {
                width: Some(600),
                ..Resize::default()
            })],
            ..SpecConfig::default()
        },
    );
    specs.insert(
        "thumbnail".to_string(),
        SpecConfig {
            pre_cache: true,
            stages: thumbnail_stages(),
            ..SpecConfig::default()
        },
    );
    specs
}

/// A validated, immutable specification.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageSpec {
    pub name: String,
    pub access_as: String,
    pub stages: Vec<Stage>,
    pub cache: bool,
    pub pre_cache: bool,
    pub increment_count: bool,
    pub format: OutputFormat,
    pub quality: Quality,
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_' || b == b'-')
}

impl ImageSpec {
    fn from_config(name: &str, config: &SpecConfig) -> Result<Self, SpecError> {
        let invalid = |reason: String| SpecError::Invalid {
            spec: name.to_string(),
            reason,
        };

        if !is_valid_name(name) {
            return Err(invalid("name must be lowercase letters, digits, '_' or '-'".into()));
        }
        let access_as = config.access_as.clone().unwrap_or_else(|| name.to_string());
        if !is_valid_name(&access_as) {
            return Err(invalid(format!("accessor '{access_as}' is not a valid name")));
        }
        if !(1..=100).contains(&config.quality) {
            return Err(invalid(format!("quality must be 1-100, got {}", config.quality)));
        }
        for (index, stage) in config.stages.iter().enumerate() {
            stage
                .validate()
                .map_err(|reason| invalid(format!("stage {index}: {reason}")))?;
        }

        Ok(Self {
            name: name.to_string(),
            access_as,
            stages: config.stages.clone(),
            cache: config.cache,
            pre_cache: config.pre_cache,
            increment_count: config.increment_count,
            format: config.format,
            quality: Quality::new(config.quality),
        })
    }
}

/// Name → specification table. Built once, read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct SpecRegistry {
    specs: BTreeMap<String, ImageSpec>,
}

impl SpecRegistry {
    /// Build and validate a registry from config tables.
    pub fn from_config(configs: &BTreeMap<String, SpecConfig>) -> Result<Self, SpecError> {
        let mut specs = BTreeMap::new();
        let mut accessors = HashSet::new();
        for (name, config) in configs {
            let spec = ImageSpec::from_config(name, config)?;
            if !accessors.insert(spec.access_as.clone()) {
                return Err(SpecError::Invalid {
                    spec: name.clone(),
                    reason: format!("accessor '{}' is used by another specification", spec.access_as),
                });
            }
            specs.insert(name.clone(), spec);
        }
        Ok(Self { specs })
    }

    /// Registry of the stock specifications.
    pub fn stock() -> Self {
        let specs = stock_spec_configs()
            .iter()
            .filter_map(|(name, config)| ImageSpec::from_config(name, config).ok())
            .map(|spec| (spec.name.clone(), spec))
            .collect();
        Self { specs }
    }

    pub fn resolve(&self, name: &str) -> Result<&ImageSpec, SpecError> {
        self.specs
            .get(name)
            .ok_or_else(|| SpecError::Unknown(name.to_string()))
    }

    /// Look a specification up by its accessor name.
    pub fn by_accessor(&self, access_as: &str) -> Option<&ImageSpec> {
        self.specs.values().find(|s| s.access_as == access_as)
    }

    /// All specifications in name order.
    pub fn iter(&self) -> impl Iterator<Item = &ImageSpec> {
        self.specs.values()
    }

    pub fn pre_cache_specs(&self) -> impl Iterator<Item = &ImageSpec> {
        self.specs.values().filter(|s| s.pre_cache)
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_str: &str) -> BTreeMap<String, SpecConfig> {
        #[derive(Deserialize)]
        struct Wrapper {
            specs: BTreeMap<String, SpecConfig>,
        }
        toml::from_str::<Wrapper>(toml_str).unwrap().specs
    }

    // =========================================================================
    // Stock specs
    // =========================================================================

    #[test]
    fn stock_registry_has_three_specs() {
        let registry = SpecRegistry::stock();
        let names: Vec<&str> = registry.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["admin_thumbnail", "display", "thumbnail"]);
    }

    #[test]
    fn stock_flags_match_roles() {
        let registry = SpecRegistry::stock();
        let display = registry.resolve("display").unwrap();
        assert!(display.increment_count);
        assert!(!display.pre_cache);
        assert!(display.cache);

        let thumb = registry.resolve("thumbnail").unwrap();
        assert!(thumb.pre_cache);
        assert!(!thumb.increment_count);
        assert_eq!(thumb.stages, thumbnail_stages());

        let admin = registry.resolve("admin_thumbnail").unwrap();
        assert_eq!(admin.access_as, "admin_thumbnail");
        assert!(!admin.pre_cache);
    }

    #[test]
    fn stock_pre_cache_is_only_thumbnail() {
        let registry = SpecRegistry::stock();
        let names: Vec<&str> = registry.pre_cache_specs().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["thumbnail"]);
    }

    #[test]
    fn stock_configs_pass_validation() {
        assert!(SpecRegistry::from_config(&stock_spec_configs()).is_ok());
    }

    // =========================================================================
    // Resolution
    // =========================================================================

    #[test]
    fn resolve_unknown_name_errors() {
        let registry = SpecRegistry::stock();
        assert_eq!(
            registry.resolve("poster").unwrap_err(),
            SpecError::Unknown("poster".into())
        );
    }

    #[test]
    fn by_accessor_uses_access_as() {
        let configs = parse(
            r#"
[specs.large]
access_as = "big"
stages = [{ kind = "resize", width = 1200 }]
"#,
        );
        let registry = SpecRegistry::from_config(&configs).unwrap();
        assert_eq!(registry.by_accessor("big").unwrap().name, "large");
        assert!(registry.by_accessor("large").is_none());
    }

    // =========================================================================
    // Parsing
    // =========================================================================

    #[test]
    fn parses_every_stage_kind() {
        let configs = parse(
            r##"
[specs.fancy]
format = "png"
quality = 90
cache = false
stages = [
    { kind = "resize", width = 300, height = 200, crop = true },
    { kind = "crop", width = 250, height = 150 },
    { kind = "adjust", color = 0.5 },
    { kind = "reflect", size = 0.3, background = "#000" },
    { kind = "transpose", method = "rotate_90" },
]
"##,
        );
        let registry = SpecRegistry::from_config(&configs).unwrap();
        let spec = registry.resolve("fancy").unwrap();
        assert_eq!(spec.format, OutputFormat::Png);
        assert_eq!(spec.quality.value(), 90);
        assert!(!spec.cache);
        let kinds: Vec<&str> = spec.stages.iter().map(Stage::name).collect();
        assert_eq!(kinds, ["resize", "crop", "adjust", "reflect", "transpose"]);

        match &spec.stages[2] {
            Stage::Adjust(a) => {
                assert_eq!(a.color, 0.5);
                assert_eq!(a.contrast, 1.0);
            }
            other => panic!("expected adjust, got {other:?}"),
        }
        match &spec.stages[3] {
            Stage::Reflect(r) => assert_eq!(r.opacity, 0.6),
            other => panic!("expected reflect, got {other:?}"),
        }
    }

    #[test]
    fn unknown_stage_kind_is_parse_error() {
        #[derive(Deserialize, Debug)]
        #[allow(dead_code)]
        struct Wrapper {
            specs: BTreeMap<String, SpecConfig>,
        }
        let result = toml::from_str::<Wrapper>(
            r#"
[specs.x]
stages = [{ kind = "sepia" }]
"#,
        );
        assert!(result.is_err());
    }

    // =========================================================================
    // Validation
    // =========================================================================

    fn invalid_reason(toml_str: &str) -> String {
        match SpecRegistry::from_config(&parse(toml_str)) {
            Err(SpecError::Invalid { reason, .. }) => reason,
            other => panic!("expected Invalid, got {other:?}"),
        }
    }

    #[test]
    fn resize_without_bounds_rejected() {
        let reason = invalid_reason(
            r#"
[specs.x]
stages = [{ kind = "resize" }]
"#,
        );
        assert!(reason.contains("width or a height"), "{reason}");
    }

    #[test]
    fn crop_resize_needs_both_bounds() {
        let reason = invalid_reason(
            r#"
[specs.x]
stages = [{ kind = "resize", width = 100, crop = true }]
"#,
        );
        assert!(reason.contains("both width and height"), "{reason}");
    }

    #[test]
    fn negative_factor_rejected() {
        let reason = invalid_reason(
            r#"
[specs.x]
stages = [{ kind = "adjust", sharpness = -1.0 }]
"#,
        );
        assert!(reason.contains("sharpness"), "{reason}");
    }

    #[test]
    fn quality_out_of_range_rejected() {
        let reason = invalid_reason(
            r#"
[specs.x]
quality = 0
"#,
        );
        assert!(reason.contains("quality"), "{reason}");
    }

    #[test]
    fn duplicate_accessor_rejected() {
        let reason = invalid_reason(
            r#"
[specs.a]
access_as = "same"
[specs.b]
access_as = "same"
"#,
        );
        assert!(reason.contains("accessor 'same'"), "{reason}");
    }

    #[test]
    fn uppercase_name_rejected() {
        let mut configs = BTreeMap::new();
        configs.insert("Big".to_string(), SpecConfig::default());
        assert!(matches!(
            SpecRegistry::from_config(&configs),
            Err(SpecError::Invalid { .. })
        ));
    }

    #[test]
    fn describe_lists_changed_factors() {
        let stages = thumbnail_stages();
        assert_eq!(stages[0].describe(), "resize 100x75 crop");
        assert_eq!(stages[1].describe(), "adjust contrast 1.2 sharpness 1.1");
    }
}
