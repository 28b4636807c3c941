use std::fmt;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg,
    Gif,
    WebP,
    Bmp,
}

impl ImageFormat {
    /// Identifies the container from its leading magic bytes.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
            Some(ImageFormat::Png)
        } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(ImageFormat::Jpeg)
        } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
            Some(ImageFormat::Gif)
        } else if bytes.len() >= 12 && bytes.starts_with(b"RIFF") && bytes[8..12] == *b"WEBP" {
            Some(ImageFormat::WebP)
        } else if bytes.starts_with(b"BM") {
            Some(ImageFormat::Bmp)
        } else {
            None
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Gif => "image/gif",
            ImageFormat::WebP => "image/webp",
            ImageFormat::Bmp => "image/bmp",
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime_type())
    }
}

/// Image bytes whose container and pixel dimensions have been verified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
    pub bytes: Vec<u8>,
}

impl DecodedImage {
    /// Reads the header of a PNG, JPEG, GIF, WebP or BMP image.
    ///
    /// Anything unrecognised, truncated, or with a zero dimension is an
    /// [`Error::ImageDecode`].
    pub fn decode(bytes: Vec<u8>) -> Result<Self> {
        let format = ImageFormat::sniff(&bytes)
            .ok_or_else(|| Error::ImageDecode("Unrecognised image format".to_string()))?;

        let dimensions = match format {
            ImageFormat::Png => png_dimensions(&bytes),
            ImageFormat::Jpeg => jpeg_dimensions(&bytes),
            ImageFormat::Gif => gif_dimensions(&bytes),
            ImageFormat::WebP => webp_dimensions(&bytes),
            ImageFormat::Bmp => bmp_dimensions(&bytes),
        };

        match dimensions {
            Some((width, height)) if width > 0 && height > 0 => Ok(Self {
                format,
                width,
                height,
                bytes,
            }),
            _ => Err(Error::ImageDecode(format!("Truncated or corrupt {} header", format))),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

fn be_u16(bytes: &[u8], at: usize) -> Option<u32> {
    let b = bytes.get(at..at + 2)?;
    Some(u16::from_be_bytes([b[0], b[1]]) as u32)
}

fn le_u16(bytes: &[u8], at: usize) -> Option<u32> {
    let b = bytes.get(at..at + 2)?;
    Some(u16::from_le_bytes([b[0], b[1]]) as u32)
}

fn be_u32(bytes: &[u8], at: usize) -> Option<u32> {
    let b = bytes.get(at..at + 4)?;
    Some(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
}

fn le_i32(bytes: &[u8], at: usize) -> Option<i32> {
    let b = bytes.get(at..at + 4)?;
    Some(i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

fn le_u24(bytes: &[u8], at: usize) -> Option<u32> {
    let b = bytes.get(at..at + 3)?;
    Some(b[0] as u32 | (b[1] as u32) << 8 | (b[2] as u32) << 16)
}

fn png_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    if bytes.get(12..16)? != &b"IHDR"[..] {
        return None;
    }
    Some((be_u32(bytes, 16)?, be_u32(bytes, 20)?))
}

fn gif_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    Some((le_u16(bytes, 6)?, le_u16(bytes, 8)?))
}

fn bmp_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    let width = le_i32(bytes, 18)?;
    // Negative height marks a top-down bitmap.
    let height = le_i32(bytes, 22)?;
    Some((width.unsigned_abs(), height.unsigned_abs()))
}

/// Walks the marker segments until a start-of-frame.
fn jpeg_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    let mut pos = 2;
    loop {
        while *bytes.get(pos)? != 0xFF {
            pos += 1;
        }
        while *bytes.get(pos)? == 0xFF {
            pos += 1;
        }

        let marker = *bytes.get(pos)?;
        pos += 1;

        match marker {
            0xD8 | 0x01 | 0xD0..=0xD7 => continue,
            0xD9 | 0xDA => return None,
            0xC0..=0xCF if !matches!(marker, 0xC4 | 0xC8 | 0xCC) => {
                let height = be_u16(bytes, pos + 3)?;
                let width = be_u16(bytes, pos + 5)?;
                return Some((width, height));
            }
            _ => {
                let len = be_u16(bytes, pos)? as usize;
                if len < 2 {
                    return None;
                }
                pos += len;
            }
        }
    }
}

fn webp_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    match bytes.get(12..16)? {
        b"VP8X" => Some((le_u24(bytes, 24)? + 1, le_u24(bytes, 27)? + 1)),
        b"VP8L" => {
            if *bytes.get(20)? != 0x2F {
                return None;
            }
            let b = bytes.get(21..25)?;
            let (b0, b1, b2, b3) = (b[0] as u32, b[1] as u32, b[2] as u32, b[3] as u32);
            let width = 1 + (b0 | (b1 & 0x3F) << 8);
            let height = 1 + (b1 >> 6 | b2 << 2 | (b3 & 0x0F) << 10);
            Some((width, height))
        }
        b"VP8 " => {
            if bytes.get(23..26)? != &[0x9D, 0x01, 0x2A][..] {
                return None;
            }
            Some((le_u16(bytes, 26)? & 0x3FFF, le_u16(bytes, 28)? & 0x3FFF))
        }
        _ => None,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn png(width: u32, height: u32) -> Vec<u8> {
        let mut bytes = b"\x89PNG\r\n\x1a\n".to_vec();
        bytes.extend_from_slice(&13u32.to_be_bytes());
        bytes.extend_from_slice(b"IHDR");
        bytes.extend_from_slice(&width.to_be_bytes());
        bytes.extend_from_slice(&height.to_be_bytes());
        bytes.extend_from_slice(&[8, 6, 0, 0, 0]);
        bytes
    }

    #[test]
    fn test_png() {
        let image = DecodedImage::decode(png(225, 318)).unwrap();
        assert_eq!(image.format, ImageFormat::Png);
        assert_eq!((image.width, image.height), (225, 318));
    }

    #[test]
    fn test_jpeg_skips_to_frame_header() {
        let mut bytes = vec![0xFF, 0xD8];
        // APP0 segment of 16 bytes.
        bytes.extend_from_slice(&[0xFF, 0xE0, 0x00, 0x10]);
        bytes.extend_from_slice(b"JFIF\0\x01\x01\0\0\x01\0\x01\0\0");
        // SOF0: length, precision, height 318, width 225.
        bytes.extend_from_slice(&[0xFF, 0xC0, 0x00, 0x11, 0x08, 0x01, 0x3E, 0x00, 0xE1, 0x03]);

        let image = DecodedImage::decode(bytes).unwrap();
        assert_eq!(image.format, ImageFormat::Jpeg);
        assert_eq!((image.width, image.height), (225, 318));
    }

    #[test]
    fn test_gif_and_bmp() {
        let mut gif = b"GIF89a".to_vec();
        gif.extend_from_slice(&[0x40, 0x01, 0xF0, 0x00]);
        let image = DecodedImage::decode(gif).unwrap();
        assert_eq!((image.width, image.height), (320, 240));

        let mut bmp = b"BM".to_vec();
        bmp.resize(18, 0);
        bmp.extend_from_slice(&64i32.to_le_bytes());
        bmp.extend_from_slice(&(-32i32).to_le_bytes());
        let image = DecodedImage::decode(bmp).unwrap();
        assert_eq!(image.format, ImageFormat::Bmp);
        assert_eq!((image.width, image.height), (64, 32));
    }

    #[test]
    fn test_webp_extended() {
        let mut webp = b"RIFF\0\0\0\0WEBPVP8X".to_vec();
        webp.extend_from_slice(&[0; 8]);
        webp.extend_from_slice(&[0xE0, 0x00, 0x00, 0x3D, 0x01, 0x00]);
        let image = DecodedImage::decode(webp).unwrap();
        assert_eq!(image.format, ImageFormat::WebP);
        assert_eq!((image.width, image.height), (225, 318));
    }

    #[test]
    fn test_rejects_unknown_and_truncated() {
        assert!(matches!(
            DecodedImage::decode(b"<html>not an image</html>".to_vec()),
            Err(Error::ImageDecode(_))
        ));
        assert!(matches!(
            DecodedImage::decode(b"\x89PNG\r\n\x1a\n".to_vec()),
            Err(Error::ImageDecode(_))
        ));
        assert!(DecodedImage::decode(png(0, 10)).is_err());
        assert!(DecodedImage::decode(Vec::new()).is_err());
    }
}
