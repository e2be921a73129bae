//! Shared test utilities: synthetic images on disk.
//!
//! ```ignore
//! use crate::test_helpers::*;
//!
//! let tmp = tempfile::TempDir::new().unwrap();
//! let path = tmp.path().join("photo.jpg");
//! create_test_image(&path, 800, 600);
//! assert_eq!(image_dimensions_of(&path), (800, 600));
//! ```

use crate::imaging::{OutputFormat, wbmp};
use image::{DynamicImage, ImageFormat, RgbImage};
use std::path::Path;

/// Gradient pattern so resizes have real content to chew on.
fn gradient(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([
            (x * 255 / width.max(1)) as u8,
            (y * 255 / height.max(1)) as u8,
            128,
        ])
    })
}

/// Write a `width`×`height` image in the format named by `path`'s extension.
///
/// Panics on unsupported extensions.
pub fn create_test_image(path: &Path, width: u32, height: u32) {
    let img = DynamicImage::ImageRgb8(gradient(width, height));
    let format = OutputFormat::from_path(path)
        .unwrap_or_else(|| panic!("no test image format for {}", path.display()));
    match format {
        OutputFormat::Wbmp => {
            let file = std::fs::File::create(path).unwrap();
            wbmp::encode(&img, std::io::BufWriter::new(file)).unwrap();
        }
        OutputFormat::Jpeg => img.save_with_format(path, ImageFormat::Jpeg).unwrap(),
        OutputFormat::Png => img.save_with_format(path, ImageFormat::Png).unwrap(),
        OutputFormat::Bmp => img.save_with_format(path, ImageFormat::Bmp).unwrap(),
        OutputFormat::Gif => img.to_rgba8().save_with_format(path, ImageFormat::Gif).unwrap(),
    }
}

/// Dimensions read from disk. WBMP goes through the in-crate decoder.
pub fn image_dimensions_of(path: &Path) -> (u32, u32) {
    if OutputFormat::from_path(path) == Some(OutputFormat::Wbmp) {
        let file = std::fs::File::open(path).unwrap();
        let img = wbmp::decode(std::io::BufReader::new(file)).unwrap();
        return (img.width(), img.height());
    }
    image::image_dimensions(path).unwrap()
}
