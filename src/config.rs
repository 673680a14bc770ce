//! Service configuration.
//!
//! Loads an optional `imgbundle.toml`, merges it over the stock defaults and
//! validates the result once at startup. Nothing is re-read per request.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [pipeline]
//! max_upload_bytes = 10485760   # Largest accepted upload (10 MiB)
//! max_dimension = 16384         # Largest accepted width or height
//! thumb_bound = 256             # Longest side of the thumbnail
//! medium_bound = 1024           # Longest side of the medium rendition
//! preferred_format = "avif"     # avif | webp | original
//! quality = 80                  # Quality of the bounded renditions (1-100)
//! optimized_quality = 85        # Quality of the full-size rendition (1-100)
//! avif_speed = 6                # AVIF encoder speed (1 = slowest/best, 10 = fastest)
//! sharpen_thumbnails = true     # Light unsharp mask after downscaling
//!
//! [server]
//! bind = "127.0.0.1:8080"
//!
//! [processing]
//! max_threads = 4               # Rayon workers (omit for auto = CPU cores)
//!
//! [logging]
//! level = "info"                # error | warn | info | debug | trace
//! format = "plain"              # plain | json
//! ```
//!
//! ## Partial Configuration
//!
//! Config files are sparse: override just the values you want:
//!
//! ```toml
//! [pipeline]
//! preferred_format = "webp"
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::imaging::{PreferredFormat, Quality, RenderConfig, RustCodec, Sharpening};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

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

/// Service configuration loaded from a TOML file.
///
/// All fields have sensible defaults. User config files need only specify
/// the values they want to override. Unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Upload limits and rendition settings.
    pub pipeline: PipelineConfig,
    /// HTTP listener settings.
    pub server: ServerConfig,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
    /// Log level and output format.
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.pipeline.validate()?;
        self.logging.validate()?;
        if self.processing.max_threads == Some(0) {
            return Err(ConfigError::Validation(
                "processing.max_threads must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Settings consumed by the request pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub max_upload_bytes: usize,
    pub max_dimension: u32,
    pub thumb_bound: u32,
    pub medium_bound: u32,
    pub preferred_format: PreferredFormat,
    pub quality: u32,
    pub optimized_quality: u32,
    pub avif_speed: u8,
    pub sharpen_thumbnails: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: 10 * 1024 * 1024,
            max_dimension: crate::imaging::rust_codec::DEFAULT_MAX_DIMENSION,
            thumb_bound: 256,
            medium_bound: 1024,
            preferred_format: PreferredFormat::Avif,
            quality: 80,
            optimized_quality: 85,
            avif_speed: 6,
            sharpen_thumbnails: true,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let non_zero = [
            ("pipeline.max_upload_bytes", self.max_upload_bytes as u64),
            ("pipeline.max_dimension", self.max_dimension as u64),
            ("pipeline.thumb_bound", self.thumb_bound as u64),
            ("pipeline.medium_bound", self.medium_bound as u64),
        ];
        for (key, value) in non_zero {
            if value == 0 {
                return Err(ConfigError::Validation(format!("{key} must be non-zero")));
            }
        }
        for (key, value) in [
            ("pipeline.quality", self.quality),
            ("pipeline.optimized_quality", self.optimized_quality),
        ] {
            if !(1..=100).contains(&value) {
                return Err(ConfigError::Validation(format!("{key} must be 1-100")));
            }
        }
        if !(1..=10).contains(&self.avif_speed) {
            return Err(ConfigError::Validation(
                "pipeline.avif_speed must be 1-10".into(),
            ));
        }
        Ok(())
    }

    /// The renderer's view of these settings.
    pub fn render_config(&self) -> RenderConfig {
        RenderConfig {
            thumb_bound: self.thumb_bound,
            medium_bound: self.medium_bound,
            preferred_format: self.preferred_format,
            quality: Quality::new(self.quality),
            optimized_quality: Quality::new(self.optimized_quality),
            avif_speed: self.avif_speed,
            thumb_sharpening: self.sharpen_thumbnails.then(Sharpening::light),
        }
    }

    /// A codec enforcing the configured dimension limit.
    pub fn codec(&self) -> RustCodec {
        RustCodec::with_max_dimension(self.max_dimension)
    }

    /// Copy with a per-request output format override.
    pub fn with_preferred_format(&self, preferred_format: PreferredFormat) -> Self {
        Self {
            preferred_format,
            ..self.clone()
        }
    }
}

/// HTTP listener settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub bind: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 8080)),
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of rayon worker threads.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_threads: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_threads.map(|n| n.min(cores)).unwrap_or(cores)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Plain,
    Json,
}

/// Log output settings. `RUST_LOG`, when set, overrides `level`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Plain,
        }
    }
}

impl LoggingConfig {
    pub fn level_filter(&self) -> Result<LevelFilter, ConfigError> {
        self.level.parse::<LevelFilter>().map_err(|_| {
            ConfigError::Validation(format!(
                "logging.level '{}' is not one of off, error, warn, info, debug, trace",
                self.level
            ))
        })
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.level_filter().map(|_| ())
    }
}

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the base layer user overrides are merged onto.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(AppConfig::default())?)
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

/// Merge an optional overlay onto the stock defaults, then deserialize and
/// validate.
pub fn resolve_config(overlay: Option<toml::Value>) -> Result<AppConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: AppConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load and validate a config file. With no path, the stock defaults apply.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let overlay = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            Some(toml::from_str::<toml::Value>(&content)?)
        }
        None => None,
    };
    resolve_config(overlay)
}

/// Returns a fully-commented stock config file with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# imgbundle configuration
# =======================
#
# All options are optional. Remove or comment out anything you do not
# need to change; unknown keys are rejected.

# ---------------------------------------------------------------------------
# Pipeline
# ---------------------------------------------------------------------------
[pipeline]
# Largest accepted upload in bytes. Larger uploads are rejected with 413.
max_upload_bytes = 10485760

# Largest accepted width or height in pixels.
max_dimension = 16384

# Longest side of the thumbnail and medium renditions. Smaller images are
# never upscaled.
thumb_bound = 256
medium_bound = 1024

# Output encoding for all three renditions: "avif", "webp" or "original".
# When the preferred encoder is unavailable, renditions stay in the source
# format family (PNG stays PNG, everything else becomes JPEG unless it has
# an alpha channel).
preferred_format = "avif"

# Encoder quality (1-100) for the bounded renditions and for the full-size
# optimized rendition.
quality = 80
optimized_quality = 85

# AVIF encoder speed: 1 is slowest with the smallest files, 10 is fastest.
avif_speed = 6

# Apply a light unsharp mask to downscaled thumbnails.
sharpen_thumbnails = true

# ---------------------------------------------------------------------------
# HTTP server
# ---------------------------------------------------------------------------
[server]
bind = "127.0.0.1:8080"

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum rayon worker threads. Omit to use every CPU core. Values above the
# core count are clamped down.
# max_threads = 4

# ---------------------------------------------------------------------------
# Logging
# ---------------------------------------------------------------------------
[logging]
# One of off, error, warn, info, debug, trace. RUST_LOG takes precedence.
level = "info"

# "plain" for human-readable lines, "json" for one JSON object per line.
format = "plain"
"##
}
