//! Transform one source image into its thumbnail and full-size derivatives.
//!
//! ## Algorithm
//!
//! 1. Pick the output format from the source extension (no conversion).
//! 2. Read the original dimensions.
//! 3. Derive both heights from the aspect ratio; width is the only control.
//! 4. Destinations are `<thumb_dir>/<name>` and `<full_dir>/<name>`.
//! 5. An existing destination is kept unless `overwrite` is set; keeping one
//!    or both outputs is still a success.
//! 6. Decode once, resize and encode every destination that is not kept.
//! 7. Stat the original and both destinations for the result.
//!
//! Invocations share nothing but the filesystem. Two sources with the same
//! base name write to the same destinations; the last writer wins.

use crate::config::JobConfig;
use crate::imaging::{
    BackendError, ImageBackend, OutputFormat, PlannedVariant, VariantRequest, create_variants,
    get_dimensions, plan_variants,
};
use crate::types::{FailureKind, SourceItem, TransformFailure, TransformResult, VariantOutcome};
use std::fs;
use std::path::Path;
use std::time::{Instant, SystemTime};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScaleError {
    #[error("{0}")]
    DecodeFailed(String),
    #[error("{0}")]
    WriteFailed(String),
}

impl ScaleError {
    pub fn kind(&self) -> FailureKind {
        match self {
            ScaleError::DecodeFailed(_) => FailureKind::DecodeFailed,
            ScaleError::WriteFailed(_) => FailureKind::WriteFailed,
        }
    }

    /// Convert into report data for `item`.
    pub fn into_failure(self, item: SourceItem) -> TransformFailure {
        let kind = self.kind();
        let detail = match self {
            ScaleError::DecodeFailed(d) | ScaleError::WriteFailed(d) => d,
        };
        TransformFailure { item, kind, detail }
    }
}

impl From<BackendError> for ScaleError {
    fn from(err: BackendError) -> Self {
        if err.is_write_side() {
            ScaleError::WriteFailed(err.to_string())
        } else {
            ScaleError::DecodeFailed(err.to_string())
        }
    }
}

fn file_size(path: &Path) -> Option<u64> {
    fs::metadata(path).ok().map(|m| m.len())
}

fn variant_outcome(variant: &PlannedVariant) -> Result<VariantOutcome, ScaleError> {
    let size_bytes = file_size(&variant.output).ok_or_else(|| {
        ScaleError::WriteFailed(format!("{} missing after write", variant.output.display()))
    })?;
    Ok(VariantOutcome {
        path: variant.output.clone(),
        width: variant.width,
        height: variant.height,
        size_bytes,
        status: variant.status,
    })
}

/// Transform one item. See the [module docs](self) for the steps.
pub fn transform(
    backend: &impl ImageBackend,
    item: &SourceItem,
    job: &JobConfig,
) -> Result<TransformResult, ScaleError> {
    let started_at = SystemTime::now();
    let clock = Instant::now();
    let source = item.path();

    let format = OutputFormat::from_path(source).ok_or_else(|| {
        ScaleError::DecodeFailed(format!(
            "Unsupported image format: {}",
            source.display()
        ))
    })?;
    let original_size_bytes = fs::metadata(source)
        .map_err(|e| ScaleError::DecodeFailed(format!("Cannot read {}: {e}", source.display())))?
        .len();
    let original_dims = get_dimensions(backend, source)?;

    let name = item.file_name();
    let requests = [
        VariantRequest {
            output: job.thumb_dir.join(&name),
            width: job.thumb_width,
        },
        VariantRequest {
            output: job.full_dir.join(&name),
            width: job.full_width,
        },
    ];
    let plan = plan_variants(original_dims, &requests, job.overwrite);
    create_variants(backend, source, format, &plan)?;

    let thumb = variant_outcome(&plan[0])?;
    let full = variant_outcome(&plan[1])?;

    tracing::debug!(
        source = %source.display(),
        thumb = ?thumb.status,
        full = ?full.status,
        "transformed"
    );

    Ok(TransformResult {
        item: item.clone(),
        started_at,
        finished_at: SystemTime::now(),
        elapsed: clock.elapsed(),
        original_dimensions: original_dims,
        original_size_bytes,
        thumb,
        full,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Source;
    use crate::imaging::VariantStatus;
    use crate::imaging::backend::tests::{MockBackend, RecordedOp};
    use crate::imaging::RustBackend;
    use crate::test_helpers::{create_test_image, image_dimensions_of};
    use tempfile::TempDir;

    fn job_in(tmp: &Path) -> JobConfig {
        let job = JobConfig::new(
            tmp.join("thumbs"),
            tmp.join("full"),
            Source::Files(vec![]),
        );
        job.prepare_output_dirs().unwrap();
        job
    }

    #[test]
    fn transform_writes_both_derivatives() {
        let tmp = TempDir::new().unwrap();
        let job = job_in(tmp.path());
        let source = tmp.path().join("photo.jpg");
        create_test_image(&source, 800, 600);

        let result = transform(&RustBackend::new(), &SourceItem::local(&source), &job).unwrap();

        assert_eq!(image_dimensions_of(&tmp.path().join("thumbs/photo.jpg")), (150, 113));
        assert_eq!(image_dimensions_of(&tmp.path().join("full/photo.jpg")), (400, 300));
        assert_eq!(result.original_dimensions, (800, 600));
        assert_eq!(
            result.original_size_bytes,
            fs::metadata(&source).unwrap().len()
        );
        assert_eq!(
            result.thumb_size_bytes(),
            fs::metadata(tmp.path().join("thumbs/photo.jpg")).unwrap().len()
        );
        assert_eq!(result.thumb.status, VariantStatus::Written);
        assert_eq!(result.full.status, VariantStatus::Written);
        assert!(result.finished_at >= result.started_at);
    }

    #[test]
    fn transform_uses_mock_backend_dimensions() {
        let tmp = TempDir::new().unwrap();
        let mut job = job_in(tmp.path());
        job.thumb_width = 100;
        job.full_width = 300;
        let source = tmp.path().join("tall.png");
        fs::write(&source, "placeholder").unwrap();
        let backend = MockBackend::with_dimensions(600, 900);

        let result = transform(&backend, &SourceItem::local(&source), &job).unwrap();

        assert_eq!((result.thumb.width, result.thumb.height), (100, 150));
        assert_eq!((result.full.width, result.full.height), (300, 450));
        let ops = backend.get_operations();
        assert_eq!(ops.len(), 2);
        assert!(matches!(&ops[0], RecordedOp::Identify(_)));
        assert!(matches!(
            &ops[1],
            RecordedOp::Resize { format: OutputFormat::Png, targets, .. } if targets.len() == 2
        ));
    }

    #[test]
    fn missing_source_is_decode_failure() {
        let tmp = TempDir::new().unwrap();
        let job = job_in(tmp.path());
        let item = SourceItem::local(tmp.path().join("ghost.jpg"));

        let err = transform(&RustBackend::new(), &item, &job).unwrap_err();
        assert_eq!(err.kind(), FailureKind::DecodeFailed);
    }

    #[test]
    fn corrupt_source_is_decode_failure() {
        let tmp = TempDir::new().unwrap();
        let job = job_in(tmp.path());
        let source = tmp.path().join("broken.png");
        fs::write(&source, b"\x89PNG but not really").unwrap();

        let err = transform(&RustBackend::new(), &SourceItem::local(&source), &job).unwrap_err();
        assert_eq!(err.kind(), FailureKind::DecodeFailed);
        assert!(!tmp.path().join("thumbs/broken.png").exists());
    }

    #[test]
    fn unsupported_extension_is_decode_failure() {
        let tmp = TempDir::new().unwrap();
        let job = job_in(tmp.path());
        let source = tmp.path().join("notes.txt");
        fs::write(&source, "hello").unwrap();

        let failure = transform(&RustBackend::new(), &SourceItem::local(&source), &job)
            .unwrap_err()
            .into_failure(SourceItem::local(&source));
        assert_eq!(failure.kind, FailureKind::DecodeFailed);
        assert!(failure.detail.contains("Unsupported image format"));
    }

    #[test]
    fn unwritable_destination_is_write_failure() {
        let tmp = TempDir::new().unwrap();
        let mut job = job_in(tmp.path());
        job.overwrite = true;
        // A directory squatting on the destination name makes the final rename fail.
        fs::create_dir_all(tmp.path().join("full/photo.png")).unwrap();
        let source = tmp.path().join("photo.png");
        create_test_image(&source, 40, 30);

        let err = transform(&RustBackend::new(), &SourceItem::local(&source), &job).unwrap_err();
        assert_eq!(err.kind(), FailureKind::WriteFailed);
    }

    #[test]
    fn existing_destination_is_kept_without_overwrite() {
        let tmp = TempDir::new().unwrap();
        let job = job_in(tmp.path());
        let source = tmp.path().join("photo.png");
        create_test_image(&source, 80, 40);
        fs::write(tmp.path().join("thumbs/photo.png"), b"keep me").unwrap();

        let result = transform(&RustBackend::new(), &SourceItem::local(&source), &job).unwrap();

        assert_eq!(result.thumb.status, VariantStatus::Kept);
        assert_eq!(result.full.status, VariantStatus::Written);
        assert_eq!(fs::read(tmp.path().join("thumbs/photo.png")).unwrap(), b"keep me");
        assert_eq!(result.thumb_size_bytes(), 7);
    }

    #[test]
    fn existing_destination_is_replaced_with_overwrite() {
        let tmp = TempDir::new().unwrap();
        let mut job = job_in(tmp.path());
        job.overwrite = true;
        let source = tmp.path().join("photo.png");
        create_test_image(&source, 80, 40);
        fs::write(tmp.path().join("thumbs/photo.png"), b"replace me").unwrap();

        let result = transform(&RustBackend::new(), &SourceItem::local(&source), &job).unwrap();

        assert_eq!(result.thumb.status, VariantStatus::Written);
        assert_eq!(image_dimensions_of(&tmp.path().join("thumbs/photo.png")), (150, 75));
    }
}
