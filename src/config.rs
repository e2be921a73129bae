//! Job and settings configuration.
//!
//! Two layers feed a run:
//!
//! - [`JobConfig`]: what to scale and where to put it. Built by the CLI,
//!   validated once, immutable afterwards.
//! - [`ScalerConfig`]: tool settings loaded from `scaler.toml`: default
//!   widths, worker count, network behaviour. Stock defaults are overridden
//!   by the settings file, which is overridden by CLI flags.
//!
//! ## Settings File
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [widths]
//! thumb = 150               # Thumbnail width in pixels
//! full = 400                # Full-size width in pixels
//!
//! [processing]
//! max_workers = 4           # Parallel transforms (omit for auto = CPU cores)
//!
//! [network]
//! staging_dir = "net"       # Where downloaded manifest entries are kept
//! timeout_secs = 30         # Per-request timeout
//! user_agent = "image-scaler"
//! ```
//!
//! Files are sparse: override just the values you want. Unknown keys are
//! rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_THUMB_WIDTH: u32 = 150;
pub const DEFAULT_FULL_WIDTH: u32 = 400;
pub const DEFAULT_OVERWRITE: bool = false;

/// File name looked up in the working directory when `--config` is absent.
pub const SETTINGS_FILENAME: &str = "scaler.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
    #[error("Cannot create output directory {path}: {source}")]
    OutputDir {
        path: PathBuf,
        source: std::io::Error,
    },
}

// =============================================================================
// JobConfig
// =============================================================================

/// Where the source images come from. Exactly one per job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// Paths taken verbatim; existence is checked per item at transform time.
    Files(Vec<PathBuf>),
    /// Every supported image in a directory, optionally descending into subdirectories.
    Directory { path: PathBuf, recursive: bool },
    /// A newline-separated list of paths and URLs. URLs are only fetched when `online`.
    Manifest { path: PathBuf, online: bool },
}

/// A validated description of one scaling run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobConfig {
    pub thumb_width: u32,
    pub full_width: u32,
    pub thumb_dir: PathBuf,
    pub full_dir: PathBuf,
    pub overwrite: bool,
    pub source: Source,
}

impl JobConfig {
    /// A job with default widths and overwrite disabled.
    pub fn new(thumb_dir: impl Into<PathBuf>, full_dir: impl Into<PathBuf>, source: Source) -> Self {
        Self {
            thumb_width: DEFAULT_THUMB_WIDTH,
            full_width: DEFAULT_FULL_WIDTH,
            thumb_dir: thumb_dir.into(),
            full_dir: full_dir.into(),
            overwrite: DEFAULT_OVERWRITE,
            source,
        }
    }

    /// Check field values without touching the filesystem.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.thumb_width == 0 {
            return Err(ConfigError::Validation(
                "thumb-width must be an integer greater than 0".into(),
            ));
        }
        if self.full_width == 0 {
            return Err(ConfigError::Validation(
                "full-width must be an integer greater than 0".into(),
            ));
        }
        if let Source::Files(files) = &self.source
            && files.is_empty()
        {
            return Err(ConfigError::Validation(
                "a list of files, an input directory, or an input file must be given".into(),
            ));
        }
        if std::path::absolute(&self.thumb_dir)? == std::path::absolute(&self.full_dir)? {
            return Err(ConfigError::Validation(
                "thumb-out and full-out cannot be the same directory".into(),
            ));
        }
        Ok(())
    }

    /// Create both output directories if needed.
    ///
    /// Idempotent. After creation the canonical paths are compared again so
    /// two spellings of one directory (symlinks, `..`) are still rejected.
    pub fn prepare_output_dirs(&self) -> Result<(), ConfigError> {
        for dir in [&self.thumb_dir, &self.full_dir] {
            if dir.exists() && !dir.is_dir() {
                return Err(ConfigError::Validation(format!(
                    "{} exists and is not a directory",
                    dir.display()
                )));
            }
            fs::create_dir_all(dir).map_err(|source| ConfigError::OutputDir {
                path: dir.clone(),
                source,
            })?;
        }
        if fs::canonicalize(&self.thumb_dir)? == fs::canonicalize(&self.full_dir)? {
            return Err(ConfigError::Validation(
                "thumb-out and full-out resolve to the same directory".into(),
            ));
        }
        Ok(())
    }

    /// Whether resolving this job may touch the network.
    pub fn needs_network(&self) -> bool {
        matches!(self.source, Source::Manifest { online: true, .. })
    }
}

// =============================================================================
// ScalerConfig (settings file)
// =============================================================================

/// Tool settings loaded from `scaler.toml`.
///
/// All fields have defaults. Settings files need only specify the values
/// they want to override. Unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScalerConfig {
    /// Default derivative widths, used when the CLI does not pass any.
    pub widths: WidthsConfig,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
    /// Remote manifest entry settings.
    pub network: NetworkConfig,
}

impl ScalerConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.widths.thumb == 0 || self.widths.full == 0 {
            return Err(ConfigError::Validation(
                "widths.thumb and widths.full must be greater than 0".into(),
            ));
        }
        if self.processing.max_workers == Some(0) {
            return Err(ConfigError::Validation(
                "processing.max_workers must be greater than 0".into(),
            ));
        }
        if self.network.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "network.timeout_secs must be greater than 0".into(),
            ));
        }
        if self.network.staging_dir.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "network.staging_dir must not be empty".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WidthsConfig {
    pub thumb: u32,
    pub full: u32,
}

impl Default for WidthsConfig {
    fn default() -> Self {
        Self {
            thumb: DEFAULT_THUMB_WIDTH,
            full: DEFAULT_FULL_WIDTH,
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of concurrent transforms.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_workers: Option<usize>,
}

/// Resolve the effective worker count.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)`, never less than one
///
/// Each worker holds at most one decoded source plus its derivatives, so
/// this bound also caps peak pixel-buffer memory.
pub fn effective_workers(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_workers
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

/// Settings for fetching remote manifest entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NetworkConfig {
    /// Staging directory, relative to the working directory. Persists across runs.
    pub staging_dir: PathBuf,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            staging_dir: PathBuf::from("net"),
            timeout_secs: 30,
            user_agent: concat!("image-scaler/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

// =============================================================================
// Settings loading and merging
// =============================================================================

/// Returns the stock default settings as a `toml::Value::Table`.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(ScalerConfig::default()).expect("default config must serialize")
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

/// Load settings from `path`, or from `scaler.toml` in the working directory.
///
/// An explicit path must exist. The implicit file is optional: when it is
/// missing the stock defaults are returned.
pub fn load_settings(path: Option<&Path>) -> Result<ScalerConfig, ConfigError> {
    let (path, required) = match path {
        Some(p) => (p.to_path_buf(), true),
        None => (PathBuf::from(SETTINGS_FILENAME), false),
    };
    if !required && !path.exists() {
        return Ok(ScalerConfig::default());
    }
    let content = fs::read_to_string(&path)?;
    let overlay: toml::Value = toml::from_str(&content)?;
    resolve_settings(stock_defaults_value(), Some(overlay))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_settings(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<ScalerConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: ScalerConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Returns a fully-commented stock `scaler.toml` with all keys and explanations.
///
/// Printed by `--print-config`.
pub fn stock_config_toml() -> &'static str {
    r##"# image-scaler settings
# =====================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Command-line flags override them.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Derivative widths
# ---------------------------------------------------------------------------
[widths]
# Thumbnail width in pixels. Height follows the source aspect ratio.
thumb = 150
# Full-size width in pixels.
full = 400

# ---------------------------------------------------------------------------
# Parallel processing
# ---------------------------------------------------------------------------
[processing]
# Maximum number of images transformed at once. Each worker holds one
# decoded image in memory. Omit to use every CPU core; larger values are
# clamped to the core count.
# max_workers = 4

# ---------------------------------------------------------------------------
# Remote manifest entries (only used with --online)
# ---------------------------------------------------------------------------
[network]
# Downloads land here and are reused on later runs instead of re-fetched.
staging_dir = "net"
# Seconds before a single download is abandoned.
timeout_secs = 30
# User-Agent header sent with each request.
# user_agent = "image-scaler/<version>"
"##
}
