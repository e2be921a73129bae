//! Source resolution: turn a job's input into a flat list of local images.
//!
//! ## Inputs
//!
//! | Source | Items |
//! |---|---|
//! | Explicit files | each path verbatim, existence not checked |
//! | Directory | supported images only, sorted by path, optionally recursive |
//! | Manifest | one entry per non-blank line; URLs fetched when online |
//!
//! ## Failure policy
//!
//! Failures that leave nothing to iterate (unreadable directory or manifest)
//! are batch-fatal and returned as [`ResolveError`]. Failures of a single
//! manifest URL are collected in [`Resolution::download_failures`] and the
//! entry is dropped; the remaining entries still resolve. A missing or corrupt
//! local file is not detected here at all; it surfaces later as a per-item
//! transform failure.

use crate::config::{JobConfig, Source};
use crate::fetch::{DownloadError, Fetch};
use crate::imaging::OutputFormat;
use crate::types::SourceItem;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("Cannot read input directory {path}: {source}")]
    DirectoryUnreadable {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Input path is not a directory: {0}")]
    NotADirectory(PathBuf),
    #[error("Cannot read input file {path}: {source}")]
    ManifestUnreadable {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// A manifest URL that could not be fetched.
#[derive(Debug)]
pub struct DownloadFailure {
    pub entry: String,
    pub error: DownloadError,
}

/// Progress of manifest downloads, for live output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchEvent {
    Started { count: usize },
    Downloaded { url: String, path: PathBuf },
    Reused { url: String, path: PathBuf },
    Failed { url: String, reason: String },
}

/// Resolved items plus the manifest entries that were dropped.
#[derive(Debug, Default)]
pub struct Resolution {
    pub items: Vec<SourceItem>,
    pub download_failures: Vec<DownloadFailure>,
}

/// Resolve a job's source into items.
///
/// `fetcher` is only consulted for URL entries of an online manifest; when it
/// is `None` those entries fail with [`DownloadError::Offline`].
pub fn resolve(
    job: &JobConfig,
    fetcher: Option<&dyn Fetch>,
    events: Option<&dyn Fn(FetchEvent)>,
) -> Result<Resolution, ResolveError> {
    match &job.source {
        Source::Files(paths) => Ok(Resolution {
            items: paths.iter().cloned().map(SourceItem::local).collect(),
            download_failures: Vec::new(),
        }),
        Source::Directory { path, recursive } => Ok(Resolution {
            items: scan_directory(path, *recursive)?
                .into_iter()
                .map(SourceItem::local)
                .collect(),
            download_failures: Vec::new(),
        }),
        Source::Manifest { path, online } => {
            let content =
                fs::read_to_string(path).map_err(|source| ResolveError::ManifestUnreadable {
                    path: path.clone(),
                    source,
                })?;
            let entries = parse_manifest(&content);
            Ok(resolve_entries(&entries, *online, fetcher, events))
        }
    }
}

/// Whether a path has one of the supported image extensions (case-insensitive).
pub fn is_supported_image(path: &Path) -> bool {
    OutputFormat::from_path(path).is_some()
}

/// List supported images in `dir`, sorted by path.
///
/// Non-recursive scans look at direct children only. Symlinks are followed,
/// so a linked image counts like a regular file. Entries that vanish or
/// cannot be read mid-walk are skipped with a warning; only the root itself
/// being unreadable is fatal.
pub fn scan_directory(dir: &Path, recursive: bool) -> Result<Vec<PathBuf>, ResolveError> {
    let meta = fs::metadata(dir).map_err(|source| ResolveError::DirectoryUnreadable {
        path: dir.to_path_buf(),
        source,
    })?;
    if !meta.is_dir() {
        return Err(ResolveError::NotADirectory(dir.to_path_buf()));
    }
    // Surfaces permission errors on the root before walking.
    fs::read_dir(dir).map_err(|source| ResolveError::DirectoryUnreadable {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut walker = WalkDir::new(dir)
        .follow_links(true)
        .min_depth(1)
        .sort_by_file_name();
    if !recursive {
        walker = walker.max_depth(1);
    }

    let mut files = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!(error = %e, "skipping unreadable directory entry");
                continue;
            }
        };
        if entry.file_type().is_file() && is_supported_image(entry.path()) {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}

/// Split manifest text into entries: trimmed, blank lines dropped.
pub fn parse_manifest(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Whether an entry has a `scheme://` prefix.
///
/// The scheme must start with a letter and contain only letters, digits,
/// `+`, `-`, or `.`. Windows drive paths (`C:\...`) do not qualify.
pub fn is_url(entry: &str) -> bool {
    let Some((scheme, _)) = entry.split_once("://") else {
        return false;
    };
    let mut chars = scheme.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

fn resolve_entries(
    entries: &[String],
    online: bool,
    fetcher: Option<&dyn Fetch>,
    events: Option<&dyn Fn(FetchEvent)>,
) -> Resolution {
    let emit = |event: FetchEvent| {
        if let Some(cb) = events {
            cb(event);
        }
    };

    let url_count = if online {
        entries.iter().filter(|e| is_url(e)).count()
    } else {
        0
    };
    if url_count > 0 {
        emit(FetchEvent::Started { count: url_count });
    }

    let mut resolution = Resolution::default();
    for entry in entries {
        if !(online && is_url(entry)) {
            resolution.items.push(SourceItem::local(entry));
            continue;
        }

        let fetched = match fetcher {
            Some(f) => f.fetch(entry),
            None => Err(DownloadError::Offline),
        };
        match fetched {
            Ok(fetched) => {
                emit(if fetched.reused {
                    FetchEvent::Reused {
                        url: entry.clone(),
                        path: fetched.path.clone(),
                    }
                } else {
                    FetchEvent::Downloaded {
                        url: entry.clone(),
                        path: fetched.path.clone(),
                    }
                });
                resolution
                    .items
                    .push(SourceItem::downloaded(fetched.path, entry.clone()));
            }
            Err(error) => {
                tracing::warn!(url = %entry, error = %error, "download failed, entry skipped");
                emit(FetchEvent::Failed {
                    url: entry.clone(),
                    reason: error.to_string(),
                });
                resolution.download_failures.push(DownloadFailure {
                    entry: entry.clone(),
                    error,
                });
            }
        }
    }
    resolution
}
