//! Shared types that flow between pipeline stages.
//!
//! ```text
//! resolve  →  SourceItem  →  transform  →  ItemOutcome  →  report
//! ```
//!
//! Items are immutable once created. Each one is consumed by exactly one
//! transform invocation and yields exactly one [`ItemOutcome`].

use crate::imaging::VariantStatus;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

/// Where a source item came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Origin {
    /// A path given directly, found in a directory, or listed in a manifest.
    Local,
    /// A manifest URL fetched into the staging directory.
    Downloaded { url: String },
}

/// One resolved, locally-addressable input image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceItem {
    pub local_path: PathBuf,
    pub origin: Origin,
}

impl SourceItem {
    pub fn local(path: impl Into<PathBuf>) -> Self {
        Self {
            local_path: path.into(),
            origin: Origin::Local,
        }
    }

    pub fn downloaded(path: impl Into<PathBuf>, url: impl Into<String>) -> Self {
        Self {
            local_path: path.into(),
            origin: Origin::Downloaded { url: url.into() },
        }
    }

    /// Base name used for both destination files and report lines.
    pub fn file_name(&self) -> String {
        self.local_path
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.local_path.display().to_string())
    }

    pub fn path(&self) -> &Path {
        &self.local_path
    }
}

/// One derivative of a successfully transformed item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VariantOutcome {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub size_bytes: u64,
    pub status: VariantStatus,
}

/// Metrics for an item whose thumbnail and full derivatives both exist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransformResult {
    pub item: SourceItem,
    pub started_at: SystemTime,
    pub finished_at: SystemTime,
    /// Measured on a monotonic clock, independent of wall-clock adjustments.
    pub elapsed: Duration,
    pub original_dimensions: (u32, u32),
    pub original_size_bytes: u64,
    pub thumb: VariantOutcome,
    pub full: VariantOutcome,
}

impl TransformResult {
    pub fn thumb_size_bytes(&self) -> u64 {
        self.thumb.size_bytes
    }

    pub fn full_size_bytes(&self) -> u64 {
        self.full.size_bytes
    }
}

/// Why an item failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Source missing, unreadable, corrupt, or in an unsupported format.
    DecodeFailed,
    /// A derivative could not be encoded or written.
    WriteFailed,
    /// The transform panicked; caught at the task boundary.
    Panicked,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FailureKind::DecodeFailed => "decode failed",
            FailureKind::WriteFailed => "write failed",
            FailureKind::Panicked => "panicked",
        })
    }
}

/// An isolated per-item failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransformFailure {
    pub item: SourceItem,
    pub kind: FailureKind,
    pub detail: String,
}

/// Result of one item, tagged with its position in the resolved list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemOutcome {
    pub index: usize,
    #[serde(flatten)]
    pub result: OutcomeResult,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum OutcomeResult {
    Success(TransformResult),
    Failure(TransformFailure),
}

impl ItemOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self.result, OutcomeResult::Success(_))
    }

    pub fn item(&self) -> &SourceItem {
        match &self.result {
            OutcomeResult::Success(r) => &r.item,
            OutcomeResult::Failure(f) => &f.item,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_name_is_base_name() {
        let item = SourceItem::local("/photos/2024/IMG_001.JPG");
        assert_eq!(item.file_name(), "IMG_001.JPG");
    }

    #[test]
    fn file_name_falls_back_to_display() {
        let item = SourceItem::local("/");
        assert_eq!(item.file_name(), "/");
    }

    #[test]
    fn downloaded_origin_keeps_url() {
        let item = SourceItem::downloaded("net/cat.png", "https://example.com/cat.png");
        assert_eq!(
            item.origin,
            Origin::Downloaded {
                url: "https://example.com/cat.png".to_string()
            }
        );
    }

    #[test]
    fn outcome_exposes_item() {
        let outcome = ItemOutcome {
            index: 3,
            result: OutcomeResult::Failure(TransformFailure {
                item: SourceItem::local("a.jpg"),
                kind: FailureKind::DecodeFailed,
                detail: "corrupt".to_string(),
            }),
        };
        assert!(!outcome.is_success());
        assert_eq!(outcome.item().file_name(), "a.jpg");
    }

    #[test]
    fn failure_kind_serializes_snake_case() {
        let json = serde_json::to_string(&FailureKind::WriteFailed).unwrap();
        assert_eq!(json, "\"write_failed\"");
    }
}
