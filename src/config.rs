//! Compressor configuration module.
//!
//! Handles loading, validating, and merging `compressor.toml`. The user file
//! is sparse: stock defaults are the base layer and only the keys present in
//! the file override them.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! # cache_dir = "/var/tmp"  # Root for working copies (default: system cache dir)
//!
//! [defaults]
//! width = 612               # Bounds for the default constraint
//! height = 816
//! format = "jpeg"           # jpeg | png | webp
//! quality = 80              # 0-100
//!
//! [size]
//! step_size = 10            # Quality lost per size-constraint attempt
//! max_iteration = 10        # Attempts before giving up on the size target
//! min_quality = 10          # Quality floor for size-constraint attempts
//!
//! [processing]
//! max_processes = 4         # Max parallel workers (omit for auto = CPU cores)
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::imaging::CompressFormat;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File name looked up in the working directory when no `--config` is given.
pub const CONFIG_FILENAME: &str = "compressor.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Compressor configuration loaded from `compressor.toml`.
///
/// All fields have sensible defaults. User config files need only specify
/// the values they want to override. Unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompressorConfig {
    /// Root directory for working copies. `None` uses the system cache dir.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,
    /// Settings for the default constraint (bounds, format, quality).
    pub defaults: DefaultsConfig,
    /// Size-constraint stepping.
    pub size: SizeConfig,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
}

impl CompressorConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.defaults.quality > 100 {
            return Err(ConfigError::Validation(
                "defaults.quality must be 0-100".into(),
            ));
        }
        if self.defaults.width == 0 || self.defaults.height == 0 {
            return Err(ConfigError::Validation(
                "defaults.width and defaults.height must be non-zero".into(),
            ));
        }
        if self.size.step_size == 0 {
            return Err(ConfigError::Validation(
                "size.step_size must be non-zero".into(),
            ));
        }
        if self.size.min_quality > 100 {
            return Err(ConfigError::Validation(
                "size.min_quality must be 0-100".into(),
            ));
        }
        Ok(())
    }
}

/// Settings for the constraint applied when none is requested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DefaultsConfig {
    pub width: u32,
    pub height: u32,
    pub format: CompressFormat,
    pub quality: u32,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            width: 612,
            height: 816,
            format: CompressFormat::Jpeg,
            quality: 80,
        }
    }
}

/// Size-constraint stepping: attempt `n` encodes at
/// `max(100 - n * step_size, min_quality)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SizeConfig {
    pub step_size: u32,
    pub max_iteration: u32,
    pub min_quality: u32,
}

impl Default for SizeConfig {
    fn default() -> Self {
        Self {
            step_size: 10,
            max_iteration: 10,
            min_quality: 10,
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel compression workers.
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
    Ok(toml::Value::try_from(CompressorConfig::default())?)
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

/// Load config from `path`.
///
/// Merges user values on top of stock defaults, rejects unknown keys,
/// and validates the result. A missing file yields the defaults.
pub fn load_config(path: &Path) -> Result<CompressorConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let merged = match load_raw_config(path)? {
        Some(overlay) => merge_toml(base, overlay),
        None => base,
    };
    let config: CompressorConfig = merged.try_into()?;
    config.validate()?;
    tracing::debug!(path = %path.display(), ?config, "Loaded configuration");
    Ok(config)
}

/// Returns a fully-commented stock `compressor.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Compressor Configuration
# ========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
# Unknown keys will cause an error.

# Root directory for working copies. Copies go to <cache_dir>/compressor/.
# Omit to use the system cache directory.
# cache_dir = "/var/tmp"

# ---------------------------------------------------------------------------
# Default constraint (used when no other constraint is requested)
# ---------------------------------------------------------------------------
[defaults]
# Decode bound: the image is downsampled by powers of two while it still
# covers width x height.
width = 612
height = 816

# Output format: "jpeg", "png" or "webp".
format = "jpeg"

# Encoding quality (0 = worst, 100 = best). Ignored by lossless encoders.
quality = 80

# ---------------------------------------------------------------------------
# Size constraint stepping
# ---------------------------------------------------------------------------
[size]
# Quality lost per attempt: attempt n encodes at 100 - n * step_size.
step_size = 10

# Attempts before giving up on reaching the size target.
max_iteration = 10

# Quality never drops below this.
min_quality = 10

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel workers. Omit to use all CPU cores.
# max_processes = 4
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_values() {
        let config = CompressorConfig::default();
        assert_eq!(config.cache_dir, None);
        assert_eq!(config.defaults.width, 612);
        assert_eq!(config.defaults.height, 816);
        assert_eq!(config.defaults.format, CompressFormat::Jpeg);
        assert_eq!(config.defaults.quality, 80);
        assert_eq!(config.size.step_size, 10);
        assert_eq!(config.size.max_iteration, 10);
        assert_eq!(config.size.min_quality, 10);
        assert_eq!(config.processing.max_processes, None);
    }

    #[test]
    fn parse_partial_config() {
        let toml = r##"
[defaults]
format = "webp"
"##;
        let config: CompressorConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.defaults.format, CompressFormat::Webp);
        assert_eq!(config.defaults.quality, 80);
        assert_eq!(config.size, SizeConfig::default());
    }

    #[test]
    fn load_config_returns_default_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(&tmp.path().join(CONFIG_FILENAME)).unwrap();
        assert_eq!(config, CompressorConfig::default());
    }

    #[test]
    fn load_config_reads_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILENAME);
        fs::write(
            &path,
            r##"
cache_dir = "/tmp/scratch"

[defaults]
width = 1024
quality = 65

[processing]
max_processes = 2
"##,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.cache_dir, Some(PathBuf::from("/tmp/scratch")));
        assert_eq!(config.defaults.width, 1024);
        assert_eq!(config.defaults.height, 816);
        assert_eq!(config.defaults.quality, 65);
        assert_eq!(config.processing.max_processes, Some(2));
    }

    #[test]
    fn load_config_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILENAME);
        fs::write(&path, "this is not valid toml [[[").unwrap();

        let result = load_config(&path);
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    #[test]
    fn unknown_key_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILENAME);
        fs::write(&path, "[defaults]\nwidht = 100\n").unwrap();

        assert!(load_config(&path).is_err());
    }

    #[test]
    fn unknown_format_rejected() {
        let result: Result<CompressorConfig, _> = toml::from_str("[defaults]\nformat = \"gif\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn validate_quality_boundary_ok() {
        let mut config = CompressorConfig::default();
        config.defaults.quality = 100;
        assert!(config.validate().is_ok());
        config.defaults.quality = 0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_quality_too_high() {
        let mut config = CompressorConfig::default();
        config.defaults.quality = 101;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn validate_zero_bounds() {
        let mut config = CompressorConfig::default();
        config.defaults.height = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_zero_step_size() {
        let mut config = CompressorConfig::default();
        config.size.step_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_config_validates_values() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILENAME);
        fs::write(&path, "[size]\nmin_quality = 250\n").unwrap();

        assert!(matches!(
            load_config(&path),
            Err(ConfigError::Validation(_))
        ));
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
        let base: toml::Value = toml::from_str("[t]\nx = 1\ny = 2").unwrap();
        let overlay: toml::Value = toml::from_str("[t]\ny = 5").unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged["t"]["x"].as_integer(), Some(1));
        assert_eq!(merged["t"]["y"].as_integer(), Some(5));
    }

    #[test]
    fn effective_threads_auto() {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        assert_eq!(effective_threads(&ProcessingConfig::default()), cores);
    }

    #[test]
    fn effective_threads_user_constrains_down() {
        let config = ProcessingConfig {
            max_processes: Some(1),
        };
        assert_eq!(effective_threads(&config), 1);
    }

    #[test]
    fn effective_threads_clamped_to_cores() {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let config = ProcessingConfig {
            max_processes: Some(99999),
        };
        assert_eq!(effective_threads(&config), cores);
    }

    #[test]
    fn stock_config_toml_roundtrips_to_defaults() {
        let config: CompressorConfig = toml::from_str(stock_config_toml()).unwrap();
        assert_eq!(config, CompressorConfig::default());
    }

    #[test]
    fn stock_defaults_value_is_table() {
        let value = stock_defaults_value().unwrap();
        assert!(value.is_table());
        assert!(value.get("defaults").is_some());
        assert!(value.get("cache_dir").is_none());
    }
}
