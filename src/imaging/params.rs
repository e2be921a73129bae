//! Parameter types for image operations.
//!
//! These structs describe *what* to do, not *how* to do it. They are the
//! interface between the [`operations`](super::operations) module (which
//! decides which derivatives to write) and the [`backend`](super::backend)
//! (which does the actual pixel work). Swapping the backend for a mock in
//! tests leaves the planning logic untouched.
//!
//! ## Types
//!
//! - [`OutputFormat`]: Encoding format, always the source file's own format.
//! - [`ResizeTarget`]: One output file with its exact pixel dimensions.
//! - [`ResizeParams`]: A decode of one source followed by one encode per target.

use std::fmt;
use std::path::{Path, PathBuf};

/// Image formats the scaler reads and writes, keyed by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Jpeg,
    Png,
    Bmp,
    Gif,
    Wbmp,
}

/// Extension allow-list, lowercase. `jpg` and `jpeg` share a codec.
const EXTENSIONS: &[(&str, OutputFormat)] = &[
    ("jpg", OutputFormat::Jpeg),
    ("jpeg", OutputFormat::Jpeg),
    ("png", OutputFormat::Png),
    ("bmp", OutputFormat::Bmp),
    ("gif", OutputFormat::Gif),
    ("wbmp", OutputFormat::Wbmp),
];

impl OutputFormat {
    /// Match an extension case-insensitively.
    pub fn from_extension(ext: &str) -> Option<Self> {
        EXTENSIONS
            .iter()
            .find(|(candidate, _)| candidate.eq_ignore_ascii_case(ext))
            .map(|(_, format)| *format)
    }

    /// Format implied by a path's extension. `None` for unknown or missing extensions.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OutputFormat::Jpeg => "jpeg",
            OutputFormat::Png => "png",
            OutputFormat::Bmp => "bmp",
            OutputFormat::Gif => "gif",
            OutputFormat::Wbmp => "wbmp",
        };
        f.write_str(name)
    }
}

/// A single derivative to produce from a decoded source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResizeTarget {
    pub output: PathBuf,
    pub width: u32,
    pub height: u32,
}

/// Decode `source` once, then resize and encode it for every target.
///
/// An empty `targets` list still decodes the source, so a corrupt input is
/// reported even when every output is being kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResizeParams {
    pub source: PathBuf,
    pub format: OutputFormat,
    pub targets: Vec<ResizeTarget>,
}
