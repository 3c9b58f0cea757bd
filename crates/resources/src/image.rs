//! Image data and format detection

use crate::{ResourceError, Result};
use std::rc::Rc;

/// Supported image formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    Png,
    Jpeg,
    Gif,
    Bmp,
    Unknown,
}

impl ImageFormat {
    /// Detect format from magic bytes
    pub fn from_bytes(data: &[u8]) -> Self {
        if data.starts_with(&[0x89, 0x50, 0x4E, 0x47]) {
            Self::Png
        } else if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Self::Jpeg
        } else if data.starts_with(b"GIF8") {
            Self::Gif
        } else if data.starts_with(b"BM") {
            Self::Bmp
        } else {
            Self::Unknown
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Gif => "image/gif",
            Self::Bmp => "image/bmp",
            Self::Unknown => "application/octet-stream",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpeg",
            Self::Gif => "gif",
            Self::Bmp => "bmp",
            Self::Unknown => "unknown",
        }
    }
}

/// A decoded-enough image: format, pixel size and the raw bytes
#[derive(Debug, Clone, PartialEq)]
pub struct ImageData {
    source: String,
    format: ImageFormat,
    width: u32,
    height: u32,
    components: u8,
    bytes: Rc<Vec<u8>>,
}

impl ImageData {
    /// Inspect raw bytes. Only JPEG and PNG headers are understood.
    pub fn from_bytes(source: impl Into<String>, bytes: Rc<Vec<u8>>) -> Result<Self> {
        let source = source.into();
        let format = ImageFormat::from_bytes(&bytes);
        let (width, height, components) = match format {
            ImageFormat::Jpeg => jpeg_dimensions(&bytes)
                .ok_or_else(|| ResourceError::InvalidImage(format!("{}: no JPEG frame header", source)))?,
            ImageFormat::Png => png_dimensions(&bytes)
                .ok_or_else(|| ResourceError::InvalidImage(format!("{}: truncated PNG header", source)))?,
            other => {
                return Err(ResourceError::UnsupportedImage {
                    format: other.name().to_string(),
                    source_path: source,
                })
            }
        };

        Ok(Self {
            source,
            format,
            width,
            height,
            components,
            bytes,
        })
    }

    /// An empty stand-in drawn as a box when a missing image is allowed
    pub fn placeholder(source: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            source: source.into(),
            format: ImageFormat::Unknown,
            width,
            height,
            components: 0,
            bytes: Rc::new(Vec::new()),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Colour components per pixel (1 grey, 3 RGB, 4 CMYK)
    pub fn components(&self) -> u8 {
        self.components
    }

    pub fn bytes(&self) -> &Rc<Vec<u8>> {
        &self.bytes
    }

    pub fn is_placeholder(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Width, height and component count from the first SOFn marker
fn jpeg_dimensions(data: &[u8]) -> Option<(u32, u32, u8)> {
    let mut pos = 2;
    while pos + 4 <= data.len() {
        if data[pos] != 0xFF {
            return None;
        }
        let marker = data[pos + 1];
        if marker == 0xFF {
            pos += 1;
            continue;
        }
        let length = u16::from_be_bytes([data[pos + 2], data[pos + 3]]) as usize;
        let is_frame = matches!(marker, 0xC0..=0xCF) && !matches!(marker, 0xC4 | 0xC8 | 0xCC);
        if is_frame {
            let segment = data.get(pos + 4..pos + 4 + 6)?;
            let height = u16::from_be_bytes([segment[1], segment[2]]) as u32;
            let width = u16::from_be_bytes([segment[3], segment[4]]) as u32;
            return Some((width, height, segment[5]));
        }
        pos += 2 + length;
    }
    None
}

fn png_dimensions(data: &[u8]) -> Option<(u32, u32, u8)> {
    let header = data.get(16..26)?;
    let width = u32::from_be_bytes([header[0], header[1], header[2], header[3]]);
    let height = u32::from_be_bytes([header[4], header[5], header[6], header[7]]);
    let components = match header[9] {
        0 => 1,
        2 => 3,
        3 => 1,
        4 => 2,
        6 => 4,
        _ => return None,
    };
    Some((width, height, components))
}
