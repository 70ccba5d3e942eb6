//! Configuration module.
//!
//! Handles loading, validating, and merging `lightbox.toml`. User values are
//! layered over stock defaults, so a config file only names what it changes.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [storage]
//! root = "lightbox-data"    # Catalog, originals and derived-image cache
//!
//! [import]
//! skip_prefix = "__"        # Archive entries starting with this are skipped
//!
//! [processing]
//! max_processes = 4         # Max parallel workers (omit for auto = CPU cores)
//!
//! [specs.thumbnail]
//! pre_cache = true
//! quality = 70
//! stages = [
//!     { kind = "resize", width = 100, height = 75, crop = true },
//!     { kind = "adjust", contrast = 1.2, sharpness = 1.1 },
//! ]
//! ```
//!
//! ## Partial Configuration
//!
//! Tables are merged key by key, arrays are replaced whole:
//!
//! ```toml
//! # Keep the stock thumbnail stages, just encode better
//! [specs.thumbnail]
//! quality = 90
//! ```
//!
//! Stock specs (`admin_thumbnail`, `display`, `thumbnail`) are always present;
//! new `[specs.<name>]` tables add to them. Unknown keys are rejected to
//! catch typos early.

use crate::specs::{SpecConfig, SpecRegistry, stock_spec_configs};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE: &str = "lightbox.toml";

/// Configuration loaded from `lightbox.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LightboxConfig {
    /// Where the catalog and caches live.
    pub storage: StorageConfig,
    /// Archive import settings.
    pub import: ImportConfig,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
    /// Derived-image specifications by name.
    pub specs: BTreeMap<String, SpecConfig>,
}

impl Default for LightboxConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            import: ImportConfig::default(),
            processing: ProcessingConfig::default(),
            specs: stock_spec_configs(),
        }
    }
}

impl LightboxConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage.root.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "storage.root must not be empty".into(),
            ));
        }
        if self.processing.max_processes == Some(0) {
            return Err(ConfigError::Validation(
                "processing.max_processes must be at least 1".into(),
            ));
        }
        self.registry().map(|_| ())
    }

    /// Build the spec registry from the `[specs]` tables.
    pub fn registry(&self) -> Result<SpecRegistry, ConfigError> {
        SpecRegistry::from_config(&self.specs).map_err(|e| ConfigError::Validation(e.to_string()))
    }

    pub fn catalog_dir(&self) -> PathBuf {
        self.storage.root.clone()
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.storage.root.join("cache")
    }
}

/// Storage location settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    /// Directory holding `catalog.json`, `originals/` and `cache/`.
    pub root: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("lightbox-data"),
        }
    }
}

/// Archive import settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImportConfig {
    /// Entries whose path or file name starts with this prefix are treated
    /// as archive metadata and skipped. Empty disables the check.
    pub skip_prefix: String,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            skip_prefix: "__".to_string(),
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel image processing workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_processes.map(|n| n.min(cores)).unwrap_or(cores)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    toml::Value::try_from(LightboxConfig::default())
        .map_err(|e| ConfigError::Validation(format!("stock defaults do not serialize: {e}")))
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
/// Returns `Err` if the file exists but contains invalid TOML.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<LightboxConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: LightboxConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `path`.
///
/// Merges user values on top of stock defaults, rejects unknown keys,
/// and validates the result. A missing file yields the stock config.
pub fn load_config(path: &Path) -> Result<LightboxConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let overlay = load_raw_config(path)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `lightbox.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Lightbox Configuration
# ======================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Only the keys you want to change are needed; tables are merged over the
# stock defaults, arrays (like spec stages) replace them.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Storage
# ---------------------------------------------------------------------------
[storage]
# Directory holding catalog.json, originals/ and the derived-image cache/.
root = "lightbox-data"

# ---------------------------------------------------------------------------
# Archive import
# ---------------------------------------------------------------------------
[import]
# Archive entries whose path or file name starts with this prefix are
# treated as metadata (e.g. __MACOSX/) and skipped. "" disables the check.
skip_prefix = "__"

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel image-processing workers for prewarm.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4

# ---------------------------------------------------------------------------
# Derived-image specifications
# ---------------------------------------------------------------------------
# Each [specs.<name>] table defines a named derived image. Names use
# lowercase letters, digits, '_' and '-'.
#
#   access_as        accessor name a display layer uses (defaults to <name>)
#   cache            keep rendered output on disk (default true)
#   pre_cache        render right after import (default false)
#   increment_count  count each resolution as a view (default false)
#   format           "jpeg", "png" or "webp" (default "jpeg")
#   quality          encoder quality 1-100, used by jpeg (default 70)
#   stages           ordered list, applied first to last:
#     { kind = "resize", width = W, height = H, crop = bool, upscale = bool }
#     { kind = "crop", width = W, height = H }   (around the photo's crop anchor)
#     { kind = "adjust", color = F, brightness = F, contrast = F, sharpness = F }
#     { kind = "reflect", size = 0.0-1.0, opacity = 0.0-1.0, background = "#rrggbb" }
#     { kind = "transpose", method = "flip_horizontal" | "flip_vertical"
#                                  | "rotate_90" | "rotate_180" | "rotate_270" }

[specs.admin_thumbnail]
stages = [
    { kind = "resize", width = 100, height = 75, crop = true },
    { kind = "adjust", contrast = 1.2, sharpness = 1.1 },
]

[specs.display]
increment_count = true
stages = [
    { kind = "resize", width = 600 },
]

[specs.thumbnail]
pre_cache = true
stages = [
    { kind = "resize", width = 100, height = 75, crop = true },
    { kind = "adjust", contrast = 1.2, sharpness = 1.1 },
]
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::specs::Stage;
    use tempfile::TempDir;

    fn write_config(tmp: &TempDir, body: &str) -> PathBuf {
        let path = tmp.path().join(CONFIG_FILE);
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn default_config_has_stock_specs() {
        let config = LightboxConfig::default();
        let names: Vec<&str> = config.specs.keys().map(String::as_str).collect();
        assert_eq!(names, ["admin_thumbnail", "display", "thumbnail"]);
        assert_eq!(config.storage.root, PathBuf::from("lightbox-data"));
        assert_eq!(config.import.skip_prefix, "__");
    }

    #[test]
    fn cache_dir_lives_under_root() {
        let config = LightboxConfig::default();
        assert_eq!(config.cache_dir(), PathBuf::from("lightbox-data/cache"));
    }

    // =========================================================================
    // load_config tests
    // =========================================================================

    #[test]
    fn load_config_returns_default_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(&tmp.path().join(CONFIG_FILE)).unwrap();
        assert_eq!(config.import.skip_prefix, "__");
        assert_eq!(config.specs.len(), 3);
    }

    #[test]
    fn load_config_reads_file() {
        let tmp = TempDir::new().unwrap();
        let path = write_config(
            &tmp,
            r#"
[storage]
root = "/srv/photos"

[import]
skip_prefix = "."
"#,
        );

        let config = load_config(&path).unwrap();
        assert_eq!(config.storage.root, PathBuf::from("/srv/photos"));
        assert_eq!(config.import.skip_prefix, ".");
        // Unspecified values should be defaults
        assert_eq!(config.specs.len(), 3);
    }

    #[test]
    fn partial_spec_override_keeps_stock_stages() {
        let tmp = TempDir::new().unwrap();
        let path = write_config(
            &tmp,
            r#"
[specs.thumbnail]
quality = 90
"#,
        );

        let config = load_config(&path).unwrap();
        let thumb = &config.specs["thumbnail"];
        assert_eq!(thumb.quality, 90);
        assert!(thumb.pre_cache);
        assert_eq!(thumb.stages.len(), 2);
    }

    #[test]
    fn new_spec_is_added_alongside_stock() {
        let tmp = TempDir::new().unwrap();
        let path = write_config(
            &tmp,
            r##"
[specs.poster]
format = "png"
stages = [
    { kind = "resize", width = 1200, height = 800, crop = true },
    { kind = "reflect", size = 0.2, background = "#000000" },
]
"##,
        );

        let config = load_config(&path).unwrap();
        assert_eq!(config.specs.len(), 4);
        let registry = config.registry().unwrap();
        let poster = registry.resolve("poster").unwrap();
        assert_eq!(poster.access_as, "poster");
        assert!(matches!(poster.stages[1], Stage::Reflect(_)));
    }

    #[test]
    fn spec_stages_array_replaces_stock() {
        let tmp = TempDir::new().unwrap();
        let path = write_config(
            &tmp,
            r#"
[specs.display]
stages = [{ kind = "transpose", method = "rotate_90" }]
"#,
        );
        let config = load_config(&path).unwrap();
        assert_eq!(config.specs["display"].stages.len(), 1);
        assert!(config.specs["display"].increment_count);
    }

    #[test]
    fn load_config_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        let path = write_config(&tmp, "this is not valid toml [[[");
        assert!(matches!(load_config(&path), Err(ConfigError::Toml(_))));
    }

    // =========================================================================
    // Processing config
    // =========================================================================

    #[test]
    fn default_processing_config() {
        let config = ProcessingConfig::default();
        assert!(config.max_processes.is_none());
    }

    #[test]
    fn effective_threads_auto() {
        let config = ProcessingConfig {
            max_processes: None,
        };
        let threads = effective_threads(&config);
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        assert_eq!(threads, cores);
    }

    #[test]
    fn effective_threads_clamped_to_cores() {
        let config = ProcessingConfig {
            max_processes: Some(99999),
        };
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        assert_eq!(effective_threads(&config), cores);
    }

    #[test]
    fn effective_threads_user_constrains_down() {
        let config = ProcessingConfig {
            max_processes: Some(1),
        };
        assert_eq!(effective_threads(&config), 1);
    }

    // =========================================================================
    // merge_toml tests
    // =========================================================================

    #[test]
    fn merge_toml_scalar_override() {
        let base: toml::Value = toml::from_str("a = 1").unwrap();
        let overlay: toml::Value = toml::from_str("a = 2").unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged["a"].as_integer(), Some(2));
    }

    #[test]
    fn merge_toml_table_merge() {
        let base: toml::Value = toml::from_str(
            r#"
[t]
x = 1
y = 2
"#,
        )
        .unwrap();
        let overlay: toml::Value = toml::from_str(
            r#"
[t]
y = 3
z = 4
"#,
        )
        .unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged["t"]["x"].as_integer(), Some(1));
        assert_eq!(merged["t"]["y"].as_integer(), Some(3));
        assert_eq!(merged["t"]["z"].as_integer(), Some(4));
    }

    #[test]
    fn merge_toml_arrays_replace() {
        let base: toml::Value = toml::from_str("a = [1, 2, 3]").unwrap();
        let overlay: toml::Value = toml::from_str("a = [9]").unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged["a"].as_array().map(Vec::len), Some(1));
    }

    // =========================================================================
    // Validation and unknown keys
    // =========================================================================

    #[test]
    fn unknown_key_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = write_config(
            &tmp,
            r#"
[import]
skip_prefx = "__"
"#,
        );
        assert!(matches!(load_config(&path), Err(ConfigError::Toml(_))));
    }

    #[test]
    fn unknown_section_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = write_config(&tmp, "[colors]\nbackground = \"#fff\"\n");
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn unknown_spec_key_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = write_config(
            &tmp,
            r#"
[specs.thumbnail]
precache = true
"#,
        );
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn invalid_spec_name_fails_validation() {
        let tmp = TempDir::new().unwrap();
        let path = write_config(
            &tmp,
            r#"
[specs."Big Poster"]
stages = []
"#,
        );
        assert!(matches!(load_config(&path), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn validate_zero_processes() {
        let mut config = LightboxConfig::default();
        config.processing.max_processes = Some(0);
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn validate_empty_root() {
        let mut config = LightboxConfig::default();
        config.storage.root = PathBuf::new();
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn validate_default_config_passes() {
        assert!(LightboxConfig::default().validate().is_ok());
    }

    #[test]
    fn resolve_config_with_no_overlay() {
        let base = stock_defaults_value().unwrap();
        let config = resolve_config(base, None).unwrap();
        assert_eq!(config.specs.len(), 3);
    }

    // =========================================================================
    // Stock config
    // =========================================================================

    #[test]
    fn stock_config_toml_is_valid_toml() {
        let _: toml::Value = toml::from_str(stock_config_toml()).unwrap();
    }

    #[test]
    fn stock_config_toml_roundtrips_to_defaults() {
        let parsed: LightboxConfig = toml::from_str(stock_config_toml()).unwrap();
        let defaults = LightboxConfig::default();
        assert_eq!(parsed.specs, defaults.specs);
        assert_eq!(parsed.storage.root, defaults.storage.root);
        assert_eq!(parsed.import.skip_prefix, defaults.import.skip_prefix);
        assert!(parsed.processing.max_processes.is_none());
    }

    #[test]
    fn stock_defaults_value_has_all_sections() {
        let value = stock_defaults_value().unwrap();
        let table = value.as_table().unwrap();
        for key in ["storage", "import", "processing", "specs"] {
            assert!(table.contains_key(key), "missing {key}");
        }
    }
}
