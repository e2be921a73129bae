//! CLI output formatting.
//!
//! Every `format_*` function is pure and returns display lines; the matching
//! `print_*` wrapper writes them to stdout. Diagnostics go through `tracing`
//! to stderr instead, so stdout stays a clean, line-per-item record.
//!
//! # Output Format
//!
//! ```text
//! Resolved 3 images
//! a.jpg	 Original: 48211 bytes	 Thumbnail: 5120 bytes	 Full: 20480 bytes. Time: 41ms
//! b.png	 Original: 9001 bytes	 Thumbnail: 700 bytes	 Full: 3100 bytes. Time: 12ms (thumbnail kept)
//! c.gif	 FAILED (decode failed): Failed to decode c.gif: ...
//! 2 succeeded, 1 failed
//! ```
//!
//! Item lines follow arrival order, which varies between runs. The summary
//! line is exact and order-independent.

use crate::imaging::VariantStatus;
use crate::report::BatchReport;
use crate::resolve::FetchEvent;
use crate::types::{ItemOutcome, OutcomeResult, TransformFailure, TransformResult};

/// One line for a successfully transformed item.
pub fn format_success(result: &TransformResult) -> String {
    let mut line = format!(
        "{}\t Original: {} bytes\t Thumbnail: {} bytes\t Full: {} bytes. Time: {}ms",
        result.item.file_name(),
        result.original_size_bytes,
        result.thumb_size_bytes(),
        result.full_size_bytes(),
        result.elapsed.as_millis()
    );
    let kept: Vec<&str> = [("thumbnail", &result.thumb), ("full", &result.full)]
        .into_iter()
        .filter(|(_, v)| v.status == VariantStatus::Kept)
        .map(|(label, _)| label)
        .collect();
    if !kept.is_empty() {
        line.push_str(&format!(" ({} kept)", kept.join(", ")));
    }
    line
}

/// One line naming a failed item and why it failed.
pub fn format_failure(failure: &TransformFailure) -> String {
    format!(
        "{}\t FAILED ({}): {}",
        failure.item.file_name(),
        failure.kind,
        failure.detail
    )
}

pub fn format_outcome(outcome: &ItemOutcome) -> String {
    match &outcome.result {
        OutcomeResult::Success(result) => format_success(result),
        OutcomeResult::Failure(failure) => format_failure(failure),
    }
}

pub fn format_fetch_event(event: &FetchEvent) -> String {
    match event {
        FetchEvent::Started { count } => format!("Fetching {count} remote entries"),
        FetchEvent::Downloaded { path, .. } => format!("Downloaded {}", path.display()),
        FetchEvent::Reused { path, .. } => format!("{} already exists. Skipping.", path.display()),
        FetchEvent::Failed { url, reason } => {
            format!("Failed to download a file, ignoring \"{url}\": {reason}")
        }
    }
}

pub fn format_resolved(count: usize) -> String {
    match count {
        1 => "Resolved 1 image".to_string(),
        n => format!("Resolved {n} images"),
    }
}

/// Closing lines: download failures (if any) then the count summary.
pub fn format_summary(report: &BatchReport) -> Vec<String> {
    let mut lines = Vec::new();
    if !report.download_failures.is_empty() {
        lines.push(format!(
            "{} download(s) failed:",
            report.download_failures.len()
        ));
        for failure in &report.download_failures {
            lines.push(format!("    {}: {}", failure.entry, failure.reason));
        }
    }
    lines.push(format!(
        "{} succeeded, {} failed",
        report.succeeded, report.failed
    ));
    lines
}

pub fn print_outcome(outcome: &ItemOutcome) {
    println!("{}", format_outcome(outcome));
}

pub fn print_fetch_event(event: &FetchEvent) {
    println!("{}", format_fetch_event(event));
}

pub fn print_resolved(count: usize) {
    println!("{}", format_resolved(count));
}

pub fn print_summary(report: &BatchReport) {
    for line in format_summary(report) {
        println!("{}", line);
    }
}
