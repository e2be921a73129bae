//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait is the opaque codec capability the rest of the
//! crate relies on: read dimensions, and decode → resize → encode one source
//! into any number of targets.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), built on the `image`
//! crate plus the in-crate WBMP codec.

use super::params::ResizeParams;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(String),
    #[error("Failed to decode {path}: {reason}")]
    Decode { path: PathBuf, reason: String },
    #[error("Failed to write {path}: {reason}")]
    Encode { path: PathBuf, reason: String },
}

impl BackendError {
    /// Whether the error happened while producing an output rather than reading the source.
    pub fn is_write_side(&self) -> bool {
        matches!(self, BackendError::Encode { .. })
    }
}

/// Result of an identify operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Trait for image processing backends.
///
/// Implementations must be `Sync`: one backend instance is shared by every
/// worker in the pool, and invocations for different sources must not
/// interact except through the filesystem.
pub trait ImageBackend: Sync {
    /// Get image dimensions.
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError>;

    /// Decode the source once and write one resized copy per target.
    fn resize(&self, params: &ResizeParams) -> Result<(), BackendError>;
}
