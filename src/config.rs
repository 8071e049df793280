//! Build configuration.
//!
//! Handles loading, validating, and merging `picture-cache.toml`. Stock
//! defaults are overridden by the values in the user's file; everything the
//! generator needs (destination, cache root, fast-build flag, quality table)
//! travels in one [`BuildConfig`] passed explicitly to
//! [`Generator`](crate::generated::Generator). Nothing is read from ambient
//! process state.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! dest_dir = "_site/generated"  # Where generated images are written
//! cache_dir = ".picture-cache"  # Where metadata records are written
//! base_url = "/generated"       # Prefix of generated image URIs
//! fast_build = false            # Trust any existing file with a matching name
//! strip_metadata = true         # Auto-orient before cropping
//!
//! [quality]
//! default = 75                  # Quality for formats without an entry (1-100)
//!
//! [quality.formats]
//! webp = 50                     # Fixed quality for one format
//! jpg = [[400, 85], [1600, 65]] # Width → quality curve, linear in between
//!
//! [processing]
//! max_processes = 4             # Max parallel workers (omit for auto = CPU cores)
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default config filename looked up by the CLI.
pub const CONFIG_FILENAME: &str = "picture-cache.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Generator configuration loaded from `picture-cache.toml`.
///
/// All fields have defaults. User config files need only specify the values
/// they want to override. Unknown keys are rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BuildConfig {
    /// Destination root for generated images.
    pub dest_dir: PathBuf,
    /// Root for source and generated metadata records.
    pub cache_dir: PathBuf,
    /// Public prefix joined with artifact names to form URIs.
    pub base_url: String,
    /// Accept any existing `{base}-{width}-?????????.{format}` file instead
    /// of hashing the source.
    pub fast_build: bool,
    /// Auto-orient and strip metadata before cropping.
    pub strip_metadata: bool,
    /// Encoding quality table.
    pub quality: QualityConfig,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            dest_dir: PathBuf::from("_site/generated"),
            cache_dir: PathBuf::from(".picture-cache"),
            base_url: "/generated".to_string(),
            fast_build: false,
            strip_metadata: true,
            quality: QualityConfig::default(),
            processing: ProcessingConfig::default(),
        }
    }
}

impl BuildConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dest_dir.as_os_str().is_empty() {
            return Err(ConfigError::Validation("dest_dir must not be empty".into()));
        }
        if self.cache_dir.as_os_str().is_empty() {
            return Err(ConfigError::Validation("cache_dir must not be empty".into()));
        }
        check_quality("quality.default", self.quality.default)?;
        for (format, setting) in &self.quality.formats {
            let key = format!("quality.formats.{}", format);
            match setting {
                QualitySetting::Fixed(q) => check_quality(&key, *q)?,
                QualitySetting::Curve(points) => {
                    if points.is_empty() {
                        return Err(ConfigError::Validation(format!(
                            "{} must have at least one [width, quality] point",
                            key
                        )));
                    }
                    let mut widths: Vec<u32> = points.iter().map(|[w, _]| *w).collect();
                    widths.sort_unstable();
                    widths.dedup();
                    if widths.len() != points.len() {
                        return Err(ConfigError::Validation(format!(
                            "{} has duplicate widths",
                            key
                        )));
                    }
                    for [_, q] in points {
                        check_quality(&key, *q)?;
                    }
                }
            }
        }
        Ok(())
    }
}

fn check_quality(key: &str, value: u32) -> Result<(), ConfigError> {
    if (1..=100).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::Validation(format!("{} must be 1-100", key)))
    }
}

/// Encoding quality settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QualityConfig {
    /// Quality for formats without an entry in `formats`.
    pub default: u32,
    /// Per-format overrides, keyed by resolved format (`jpg`, `webp`, ...).
    pub formats: BTreeMap<String, QualitySetting>,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            default: 75,
            formats: BTreeMap::new(),
        }
    }
}

/// Quality for one format: a fixed value or a width-dependent curve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QualitySetting {
    Fixed(u32),
    /// `[width, quality]` points.
    Curve(Vec<[u32; 2]>),
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel image processing workers.
    /// When absent or null, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
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
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(BuildConfig::default())?)
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

/// Merge an optional overlay onto the stock defaults, then deserialize and
/// validate.
pub fn resolve_config(overlay: Option<toml::Value>) -> Result<BuildConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: BuildConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from the file at `path`.
///
/// A missing file yields the stock defaults.
pub fn load_config(path: &Path) -> Result<BuildConfig, ConfigError> {
    resolve_config(load_raw_config(path)?)
}

/// Returns a fully-commented stock `picture-cache.toml` with all keys and
/// explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# picture-cache configuration
# ===========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
# Unknown keys will cause an error.

# Destination root for generated images. Files are named
# {source-name}-{width}-{id}.{format}; the name is the cache.
dest_dir = "_site/generated"

# Root for metadata records (source and generated image dimensions).
cache_dir = ".picture-cache"

# Prefix joined with generated file names to form their URIs.
base_url = "/generated"

# Skip hashing sources: any existing file matching
# {source-name}-{width}-?????????.{format} is accepted as current.
# Faster on large sites, but edits to a source that keeps its name are
# not picked up until the old files are deleted.
fast_build = false

# Apply EXIF orientation before cropping. Generated files never carry
# source metadata.
strip_metadata = true

# ---------------------------------------------------------------------------
# Encoding quality
# ---------------------------------------------------------------------------
[quality]
# Quality for formats without an entry below (1-100).
default = 75

# Per-format quality. Either a fixed value or a list of [width, quality]
# points; between points quality is interpolated linearly, outside them the
# nearest point applies.
[quality.formats]
# webp = 50
# jpg = [[400, 85], [1600, 65]]

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel image-processing workers.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_has_expected_values() {
        let config = BuildConfig::default();
        assert_eq!(config.dest_dir, PathBuf::from("_site/generated"));
        assert_eq!(config.cache_dir, PathBuf::from(".picture-cache"));
        assert!(!config.fast_build);
        assert!(config.strip_metadata);
        assert_eq!(config.quality.default, 75);
        assert!(config.quality.formats.is_empty());
    }

    #[test]
    fn parse_partial_config() {
        let toml = r#"
fast_build = true

[quality]
default = 80
"#;
        let config = resolve_config(Some(toml::from_str(toml).unwrap())).unwrap();
        assert!(config.fast_build);
        assert_eq!(config.quality.default, 80);
        // Unspecified values keep defaults
        assert_eq!(config.base_url, "/generated");
    }

    #[test]
    fn parse_quality_settings() {
        let toml = r#"
[quality.formats]
webp = 50
jpg = [[400, 85], [1600, 65]]
"#;
        let config: BuildConfig = toml::from_str(toml).unwrap();
        assert_eq!(
            config.quality.formats.get("webp"),
            Some(&QualitySetting::Fixed(50))
        );
        assert_eq!(
            config.quality.formats.get("jpg"),
            Some(&QualitySetting::Curve(vec![[400, 85], [1600, 65]]))
        );
    }

    #[test]
    fn effective_threads_auto() {
        let config = ProcessingConfig {
            max_processes: None,
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

    #[test]
    fn effective_threads_zero_means_one() {
        let config = ProcessingConfig {
            max_processes: Some(0),
        };
        assert_eq!(effective_threads(&config), 1);
    }

    #[test]
    fn merge_toml_scalar_override() {
        let base: toml::Value = toml::from_str("a = 1\nb = 2").unwrap();
        let overlay: toml::Value = toml::from_str("b = 3").unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged["a"].as_integer(), Some(1));
        assert_eq!(merged["b"].as_integer(), Some(3));
    }

    #[test]
    fn merge_toml_table_merge() {
        let base: toml::Value = toml::from_str("[quality]\ndefault = 75").unwrap();
        let overlay: toml::Value = toml::from_str("[quality.formats]\nwebp = 50").unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged["quality"]["default"].as_integer(), Some(75));
        assert_eq!(merged["quality"]["formats"]["webp"].as_integer(), Some(50));
    }

    #[test]
    fn unknown_key_rejected() {
        let overlay: toml::Value = toml::from_str("fastbuild = true").unwrap();
        assert!(resolve_config(Some(overlay)).is_err());
    }

    #[test]
    fn unknown_nested_key_rejected() {
        let overlay: toml::Value = toml::from_str("[quality]\ndefualt = 10").unwrap();
        assert!(resolve_config(Some(overlay)).is_err());
    }

    #[test]
    fn validate_default_config_passes() {
        assert!(BuildConfig::default().validate().is_ok());
    }

    #[test]
    fn validate_quality_boundaries() {
        let mut config = BuildConfig::default();
        config.quality.default = 100;
        assert!(config.validate().is_ok());
        config.quality.default = 0;
        assert!(config.validate().is_err());
        config.quality.default = 101;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_format_quality_out_of_range() {
        let mut config = BuildConfig::default();
        config
            .quality
            .formats
            .insert("webp".into(), QualitySetting::Fixed(150));
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn validate_empty_curve() {
        let mut config = BuildConfig::default();
        config
            .quality
            .formats
            .insert("jpg".into(), QualitySetting::Curve(vec![]));
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_curve_duplicate_widths() {
        let mut config = BuildConfig::default();
        config.quality.formats.insert(
            "jpg".into(),
            QualitySetting::Curve(vec![[400, 80], [400, 60]]),
        );
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_empty_dest_dir() {
        let config = BuildConfig {
            dest_dir: PathBuf::new(),
            ..BuildConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_config_missing_file_uses_defaults() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(&tmp.path().join(CONFIG_FILENAME)).unwrap();
        assert_eq!(config.quality.default, 75);
    }

    #[test]
    fn load_config_reads_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILENAME);
        fs::write(&path, "dest_dir = \"out\"\n[quality.formats]\nwebp = 40\n").unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.dest_dir, PathBuf::from("out"));
        assert_eq!(
            config.quality.formats.get("webp"),
            Some(&QualitySetting::Fixed(40))
        );
    }

    #[test]
    fn load_config_invalid_toml_errors() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILENAME);
        fs::write(&path, "this is not toml [[[").unwrap();
        assert!(matches!(load_config(&path), Err(ConfigError::Toml(_))));
    }

    #[test]
    fn load_config_validates_values() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILENAME);
        fs::write(&path, "[quality]\ndefault = 0\n").unwrap();
        assert!(matches!(
            load_config(&path),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn stock_config_toml_roundtrips_to_defaults() {
        let value: toml::Value = toml::from_str(stock_config_toml()).unwrap();
        let config = resolve_config(Some(value)).unwrap();
        let defaults = BuildConfig::default();
        assert_eq!(config.dest_dir, defaults.dest_dir);
        assert_eq!(config.cache_dir, defaults.cache_dir);
        assert_eq!(config.base_url, defaults.base_url);
        assert_eq!(config.fast_build, defaults.fast_build);
        assert_eq!(config.quality.default, defaults.quality.default);
        assert!(config.quality.formats.is_empty());
    }

    #[test]
    fn stock_defaults_value_is_table() {
        let value = stock_defaults_value().unwrap();
        assert!(value.is_table());
        assert!(value.get("quality").is_some());
        assert!(value.get("processing").is_some());
    }
}
