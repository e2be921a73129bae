//! Minimal WBMP (Wireless Bitmap, type 0) codec.
//!
//! The `image` crate has no WBMP support, so this module handles the one
//! variant that exists in practice: uncompressed monochrome, one bit per
//! pixel.
//!
//! ## Layout
//!
//! ```text
//! TypeField      multi-byte int, must be 0
//! FixHeader      1 byte, extension headers are not supported (must be 0)
//! Width          multi-byte int
//! Height         multi-byte int
//! Data           Height rows of ceil(Width / 8) bytes, MSB first, 1 = white
//! ```
//!
//! Multi-byte ints carry 7 bits per byte, most significant group first, with
//! the high bit set on every byte except the last.

use image::{DynamicImage, GrayImage, Luma};
use std::io::{self, Read, Write};

/// Largest accepted dimension. Guards against absurd allocations from corrupt headers.
const MAX_DIMENSION: u32 = 1 << 16;

/// Luma at or above this value encodes as a white pixel.
const WHITE_THRESHOLD: u8 = 128;

fn invalid(msg: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.into())
}

fn read_byte(reader: &mut impl Read) -> io::Result<u8> {
    let mut buf = [0u8; 1];
    reader.read_exact(&mut buf)?;
    Ok(buf[0])
}

fn read_multibyte(reader: &mut impl Read) -> io::Result<u32> {
    let mut value: u32 = 0;
    for _ in 0..5 {
        let byte = read_byte(reader)?;
        value = (value << 7) | u32::from(byte & 0x7f);
        if byte & 0x80 == 0 {
            return Ok(value);
        }
    }
    Err(invalid("WBMP multi-byte integer too long"))
}

fn write_multibyte(writer: &mut impl Write, value: u32) -> io::Result<()> {
    let mut groups = vec![(value & 0x7f) as u8];
    let mut rest = value >> 7;
    while rest > 0 {
        groups.push(((rest & 0x7f) as u8) | 0x80);
        rest >>= 7;
    }
    groups.reverse();
    writer.write_all(&groups)
}

/// Decode a type 0 WBMP stream into an 8-bit grayscale image (0 or 255).
pub fn decode(mut reader: impl Read) -> io::Result<DynamicImage> {
    let type_field = read_multibyte(&mut reader)?;
    if type_field != 0 {
        return Err(invalid(format!("unsupported WBMP type {type_field}")));
    }
    let fix_header = read_byte(&mut reader)?;
    if fix_header != 0 {
        return Err(invalid("WBMP extension headers are not supported"));
    }
    let width = read_multibyte(&mut reader)?;
    let height = read_multibyte(&mut reader)?;
    if width == 0 || height == 0 || width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(invalid(format!("invalid WBMP dimensions {width}x{height}")));
    }

    let row_bytes = width.div_ceil(8) as usize;
    let mut row = vec![0u8; row_bytes];
    let mut img = GrayImage::new(width, height);
    for y in 0..height {
        reader.read_exact(&mut row)?;
        for x in 0..width {
            let bit = row[(x / 8) as usize] & (0x80 >> (x % 8));
            img.put_pixel(x, y, Luma([if bit != 0 { 255 } else { 0 }]));
        }
    }
    Ok(DynamicImage::ImageLuma8(img))
}

/// Encode any image as a type 0 WBMP by thresholding its luma channel.
pub fn encode(img: &DynamicImage, mut writer: impl Write) -> io::Result<()> {
    let gray = img.to_luma8();
    let (width, height) = gray.dimensions();

    write_multibyte(&mut writer, 0)?;
    writer.write_all(&[0])?;
    write_multibyte(&mut writer, width)?;
    write_multibyte(&mut writer, height)?;

    let row_bytes = width.div_ceil(8) as usize;
    let mut row = vec![0u8; row_bytes];
    for y in 0..height {
        row.fill(0);
        for x in 0..width {
            if gray.get_pixel(x, y).0[0] >= WHITE_THRESHOLD {
                row[(x / 8) as usize] |= 0x80 >> (x % 8);
            }
        }
        writer.write_all(&row)?;
    }
    writer.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn multibyte_encoding_matches_format() {
        let mut buf = Vec::new();
        write_multibyte(&mut buf, 0).unwrap();
        assert_eq!(buf, vec![0x00]);

        buf.clear();
        write_multibyte(&mut buf, 127).unwrap();
        assert_eq!(buf, vec![0x7f]);

        buf.clear();
        write_multibyte(&mut buf, 128).unwrap();
        assert_eq!(buf, vec![0x81, 0x00]);

        buf.clear();
        write_multibyte(&mut buf, 300).unwrap();
        assert_eq!(buf, vec![0x82, 0x2c]);
        assert_eq!(read_multibyte(&mut Cursor::new(&buf)).unwrap(), 300);
    }

    #[test]
    fn decode_known_bytes() {
        // 10x2: row 0 all white, row 1 only the first and last pixel white
        let bytes = [0x00, 0x00, 0x0a, 0x02, 0xff, 0xc0, 0x80, 0x40];
        let img = decode(Cursor::new(&bytes)).unwrap().to_luma8();
        assert_eq!(img.dimensions(), (10, 2));
        assert!((0..10).all(|x| img.get_pixel(x, 0).0[0] == 255));
        assert_eq!(img.get_pixel(0, 1).0[0], 255);
        assert_eq!(img.get_pixel(1, 1).0[0], 0);
        assert_eq!(img.get_pixel(9, 1).0[0], 255);
    }

    #[test]
    fn encode_thresholds_gray_levels() {
        let img = GrayImage::from_fn(9, 1, |x, _| Luma([if x % 2 == 0 { 200 } else { 20 }]));
        let mut buf = Vec::new();
        encode(&DynamicImage::ImageLuma8(img), &mut buf).unwrap();
        // header (4 bytes) + 2 data bytes: 1010_1010 1000_0000
        assert_eq!(buf, vec![0x00, 0x00, 0x09, 0x01, 0xaa, 0x80]);
    }

    #[test]
    fn decode_rejects_nonzero_type() {
        let bytes = [0x01, 0x00, 0x01, 0x01, 0x00];
        assert!(decode(Cursor::new(&bytes)).is_err());
    }

    #[test]
    fn decode_rejects_truncated_data() {
        let bytes = [0x00, 0x00, 0x10, 0x04, 0xff];
        let err = decode(Cursor::new(&bytes)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn decode_rejects_zero_dimensions() {
        let bytes = [0x00, 0x00, 0x00, 0x04];
        assert!(decode(Cursor::new(&bytes)).is_err());
    }

    #[test]
    fn decode_rejects_text_file() {
        assert!(decode(Cursor::new(b"not an image at all")).is_err());
    }
}
