//! High-level image operations.
//!
//! These functions combine calculations with backend execution. They take
//! configuration, compute parameters, and call the backend.

use super::backend::{BackendError, ImageBackend};
use super::calculations::scaled_dimensions;
use super::params::{OutputFormat, ResizeParams, ResizeTarget};
use std::path::{Path, PathBuf};

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, BackendError>;

/// Get image dimensions using the backend.
pub fn get_dimensions(backend: &impl ImageBackend, path: &Path) -> Result<(u32, u32)> {
    let dims = backend.identify(path)?;
    Ok((dims.width, dims.height))
}

/// A derivative requested by the caller: where it goes and how wide it is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantRequest {
    pub output: PathBuf,
    pub width: u32,
}

/// What happened to one derivative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VariantStatus {
    /// Encoded and written by this run.
    Written,
    /// Destination already existed and overwriting was disabled.
    Kept,
}

/// A derivative after planning, with its derived height.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedVariant {
    pub output: PathBuf,
    pub width: u32,
    pub height: u32,
    pub status: VariantStatus,
}

/// Plan the derivatives of one source without executing anything.
///
/// Heights are derived from the original aspect ratio. A destination that
/// already exists is marked [`VariantStatus::Kept`] unless `overwrite` is set.
pub fn plan_variants(
    original_dims: (u32, u32),
    requests: &[VariantRequest],
    overwrite: bool,
) -> Vec<PlannedVariant> {
    requests
        .iter()
        .map(|req| {
            let (width, height) = scaled_dimensions(req.width, original_dims);
            let status = if !overwrite && req.output.exists() {
                VariantStatus::Kept
            } else {
                VariantStatus::Written
            };
            PlannedVariant {
                output: req.output.clone(),
                width,
                height,
                status,
            }
        })
        .collect()
}

/// Decode `source` and write every planned variant whose status is `Written`.
///
/// The source is decoded even when all variants are kept, so unreadable
/// inputs never pass silently.
pub fn create_variants(
    backend: &impl ImageBackend,
    source: &Path,
    format: OutputFormat,
    plan: &[PlannedVariant],
) -> Result<()> {
    let targets = plan
        .iter()
        .filter(|v| v.status == VariantStatus::Written)
        .map(|v| ResizeTarget {
            output: v.output.clone(),
            width: v.width,
            height: v.height,
        })
        .collect();

    backend.resize(&ResizeParams {
        source: source.to_path_buf(),
        format,
        targets,
    })
}
