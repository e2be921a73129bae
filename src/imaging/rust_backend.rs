//! Pure Rust image processing backend.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, BMP, GIF) | `image::ImageReader` with content sniffing |
//! | Decode / encode (WBMP) | in-crate [`wbmp`](super::wbmp) codec |
//! | Resize | `DynamicImage::resize_exact` with `Lanczos3` |
//! | Encode | `DynamicImage::write_to` in the source's own format |
//! | Write | sibling `tempfile::NamedTempFile`, persisted over the destination |

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::params::{OutputFormat, ResizeParams, ResizeTarget};
use super::wbmp;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, ImageReader};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn image_format(format: OutputFormat) -> Option<ImageFormat> {
    match format {
        OutputFormat::Jpeg => Some(ImageFormat::Jpeg),
        OutputFormat::Png => Some(ImageFormat::Png),
        OutputFormat::Bmp => Some(ImageFormat::Bmp),
        OutputFormat::Gif => Some(ImageFormat::Gif),
        OutputFormat::Wbmp => None,
    }
}

fn decode_error(path: &Path, reason: impl ToString) -> BackendError {
    BackendError::Decode {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

fn encode_error(path: &Path, reason: impl ToString) -> BackendError {
    BackendError::Encode {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

/// Load and decode an image from disk.
///
/// Non-WBMP inputs are sniffed by content, so a PNG saved as `.jpg` still
/// decodes; the output keeps the extension's format.
fn load_image(path: &Path, format: OutputFormat) -> Result<DynamicImage, BackendError> {
    if format == OutputFormat::Wbmp {
        let file = File::open(path)?;
        return wbmp::decode(BufReader::new(file)).map_err(|e| decode_error(path, e));
    }
    ImageReader::open(path)?
        .with_guessed_format()?
        .decode()
        .map_err(|e| decode_error(path, e))
}

/// Run `encode` against a temp file next to `path`, then rename it into place.
///
/// The destination is either untouched or complete. A failed encode drops
/// the temp file, and concurrent writers to one name never interleave bytes.
fn write_atomically(
    path: &Path,
    encode: impl FnOnce(&mut BufWriter<&mut NamedTempFile>) -> Result<(), BackendError>,
) -> Result<(), BackendError> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut temp = NamedTempFile::new_in(dir).map_err(|e| encode_error(path, e))?;
    {
        let mut writer = BufWriter::new(&mut temp);
        encode(&mut writer)?;
        writer.flush().map_err(|e| encode_error(path, e))?;
    }
    // Temp files start owner-only; outputs should read like ordinary files.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        temp.as_file()
            .set_permissions(std::fs::Permissions::from_mode(0o644))
            .map_err(|e| encode_error(path, e))?;
    }
    temp.persist(path).map_err(|e| encode_error(path, e.error))?;
    Ok(())
}

/// Encode `img` into `path` using `format`.
fn save_image(img: &DynamicImage, path: &Path, format: OutputFormat) -> Result<(), BackendError> {
    write_atomically(path, |writer| match image_format(format) {
        None => wbmp::encode(img, writer).map_err(|e| encode_error(path, e)),
        Some(ImageFormat::Jpeg) => {
            // The JPEG encoder rejects alpha channels.
            DynamicImage::ImageRgb8(img.to_rgb8())
                .write_to(writer, ImageFormat::Jpeg)
                .map_err(|e| encode_error(path, e))
        }
        Some(fmt) => img.write_to(writer, fmt).map_err(|e| encode_error(path, e)),
    })
}

impl ImageBackend for RustBackend {
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError> {
        let format = OutputFormat::from_path(path)
            .ok_or_else(|| BackendError::UnsupportedFormat(path.display().to_string()))?;
        if format == OutputFormat::Wbmp {
            let img = load_image(path, format)?;
            return Ok(Dimensions {
                width: img.width(),
                height: img.height(),
            });
        }
        let (width, height) = ImageReader::open(path)?
            .with_guessed_format()?
            .into_dimensions()
            .map_err(|e| decode_error(path, e))?;
        Ok(Dimensions { width, height })
    }

    fn resize(&self, params: &ResizeParams) -> Result<(), BackendError> {
        let img = load_image(&params.source, params.format)?;
        for ResizeTarget {
            output,
            width,
            height,
        } in &params.targets
        {
            let resized = img.resize_exact(*width, *height, FilterType::Lanczos3);
            save_image(&resized, output, params.format)?;
        }
        Ok(())
    }
}
