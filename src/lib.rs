//! # Image Scaler
//!
//! Batch-resize images into a thumbnail and a full-size derivative each.
//! Sources come from an explicit file list, a directory scan, or a manifest
//! of local paths and URLs.
//!
//! # Architecture: Resolve, Transform, Report
//!
//! ```text
//! JobConfig ─▶ resolve ─▶ [SourceItem] ─▶ Orchestrator ─▶ transform × N ─▶ ResultAggregator ─▶ BatchReport
//!                 │                            (bounded rayon pool)
//!                 └─▶ fetch (remote manifest entries → net/)
//! ```
//!
//! Errors split into two classes:
//!
//! - **Batch-fatal**: invalid configuration, unreadable input directory or
//!   manifest. Raised before any work starts; no partial report.
//! - **Isolated**: one download or one transform failing. Converted to data,
//!   recorded in the report, and never seen by sibling items.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`config`] | `JobConfig` validation, output directory creation, layered `scaler.toml` settings |
//! | [`resolve`] | Turns a job source into an order-stable list of items |
//! | [`fetch`] | Downloads remote manifest entries into the staging directory, skipping existing files |
//! | [`imaging`] | Codec/resize capability: `image` crate plus an in-crate WBMP codec |
//! | [`transform`] | One item → two aspect-preserving derivatives |
//! | [`process`] | Bounded concurrent dispatch with per-task failure isolation |
//! | [`report`] | Single-consumer aggregation into a deterministic `BatchReport` |
//! | [`types`] | Items and outcomes passed between stages |
//! | [`output`] | Human-readable stdout lines |
//! | [`logging`] | `tracing` subscriber setup for stderr diagnostics |
//!
//! # Design Decisions
//!
//! ## Same Format In, Same Format Out
//!
//! Each derivative keeps its source's extension and format. Only the width is
//! a control; height always follows the original aspect ratio.
//!
//! ## Owned Worker Pool
//!
//! The [`process::Orchestrator`] builds its own rayon pool of an explicit
//! size instead of using the global one. The size bounds how many decoded
//! images are in memory at once.
//!
//! ## Staging Directory as Cache
//!
//! Downloaded manifest entries stay in `net/` between runs. A URL whose file
//! is already staged is not fetched again.

pub mod config;
pub mod fetch;
pub mod imaging;
pub mod logging;
pub mod output;
pub mod process;
pub mod report;
pub mod resolve;
pub mod transform;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
