//! Image decoding with format detection and EXIF orientation correction.

use exif::{In, Reader, Tag, Value};
use image::{DynamicImage, GenericImageView, ImageFormat};
use std::io::Cursor;

use crate::config::LimitsConfig;
use crate::error::PipelineError;

/// Decodes raw image bytes into upright pixel data.
#[derive(Debug, Clone)]
pub struct ImageDecoder {
    limits: LimitsConfig,
}

/// Result of decoding an image.
#[derive(Debug)]
pub struct DecodedImage {
    /// Pixel data, already rotated/flipped into canonical orientation
    pub image: DynamicImage,
    /// Detected image format
    pub format: ImageFormat,
    /// EXIF orientation that was applied (1 when absent)
    pub orientation: u32,
}

impl ImageDecoder {
    /// Create a new decoder with the given limits.
    pub fn new(limits: LimitsConfig) -> Self {
        Self { limits }
    }

    /// Decode bytes, detect the format from content, and apply the stored
    /// EXIF orientation before anything else touches the pixels.
    ///
    /// `id` is only used for error messages.
    pub fn decode(&self, bytes: &[u8], id: &str) -> Result<DecodedImage, PipelineError> {
        let reader = image::ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| PipelineError::Decode {
                id: id.to_string(),
                message: format!("Cannot detect image format: {e}"),
            })?;
        let format = reader.format().ok_or_else(|| PipelineError::Decode {
            id: id.to_string(),
            message: "Unrecognized image format".to_string(),
        })?;
        let image = reader.decode().map_err(|e| PipelineError::Decode {
            id: id.to_string(),
            message: e.to_string(),
        })?;

        let (width, height) = image.dimensions();
        let max_dim = self.limits.max_image_dimension;
        if width > max_dim || height > max_dim {
            return Err(PipelineError::Decode {
                id: id.to_string(),
                message: format!("Image too large: {width}x{height} > {max_dim}"),
            });
        }

        let orientation = read_orientation(bytes).unwrap_or(1);
        let image = apply_orientation(image, orientation);

        Ok(DecodedImage {
            image,
            format,
            orientation,
        })
    }
}

/// Read the EXIF orientation tag (1-8) from an encoded image, if present.
pub fn read_orientation(bytes: &[u8]) -> Option<u32> {
    let exif = Reader::new()
        .read_from_container(&mut Cursor::new(bytes))
        .ok()?;
    exif.get_field(Tag::Orientation, In::PRIMARY)
        .and_then(|f| match &f.value {
            Value::Short(v) => v.first().map(|&x| x as u32),
            Value::Long(v) => v.first().copied(),
            _ => None,
        })
        .filter(|o| (1..=8).contains(o))
}

/// Rotate/flip pixel data so an image with the given EXIF orientation is
/// displayed upright. Unknown values are treated as 1 (no-op).
pub fn apply_orientation(image: DynamicImage, orientation: u32) -> DynamicImage {
    match orientation {
        2 => image.fliph(),
        3 => image.rotate180(),
        4 => image.flipv(),
        // Transpose: mirror across the main diagonal
        5 => image.rotate90().fliph(),
        6 => image.rotate90(),
        // Transverse: mirror across the anti-diagonal
        7 => image.rotate270().fliph(),
        8 => image.rotate270(),
        _ => image,
    }
}
