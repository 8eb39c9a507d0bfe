//! Image preprocessing into encoder-ready tensors.
//!
//! CLIP-family vision towers expect:
//! - Center-cropped to a square on the shorter side, then resized (bicubic)
//! - Channel order: RGB
//! - Per-channel normalization: (pixel/255 - mean) / std
//! - Tensor layout: CHW (batched to NCHW by the encoder)

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};
use ndarray::Array3;

use crate::config::LimitsConfig;
use crate::encoder::InputSpec;
use crate::error::PipelineError;

use super::decode::ImageDecoder;

/// A single preprocessed image: `[3, size, size]`, normalized.
pub type ModelInput = Array3<f32>;

/// Number of color channels (RGB).
const CHANNELS: usize = 3;

/// Turns raw image bytes into [`ModelInput`] tensors for one encoder.
#[derive(Debug, Clone)]
pub struct Preprocessor {
    decoder: ImageDecoder,
    spec: InputSpec,
}

impl Preprocessor {
    pub fn new(spec: InputSpec, limits: LimitsConfig) -> Self {
        Self {
            decoder: ImageDecoder::new(limits),
            spec,
        }
    }

    pub fn spec(&self) -> &InputSpec {
        &self.spec
    }

    /// Decode, orient, resize, crop, and normalize one image.
    pub fn preprocess(&self, bytes: &[u8], id: &str) -> Result<ModelInput, PipelineError> {
        let decoded = self.decoder.decode(bytes, id)?;
        if decoded.orientation != 1 {
            tracing::trace!("Applied EXIF orientation {} to {}", decoded.orientation, id);
        }
        Ok(to_tensor(&decoded.image, &self.spec))
    }
}

/// Center-crop to a square on the shorter side, resize it to
/// `spec.image_size`, and normalize into a CHW tensor.
///
/// Cropping first keeps extreme aspect ratios from being upscaled in full.
pub fn to_tensor(image: &DynamicImage, spec: &InputSpec) -> ModelInput {
    let size = spec.image_size;
    let (width, height) = image.dimensions();

    let short = width.min(height).max(1);
    let x = width.saturating_sub(short) / 2;
    let y = height.saturating_sub(short) / 2;
    let rgb = image
        .crop_imm(x, y, short, short)
        .resize_exact(size, size, FilterType::CatmullRom)
        .to_rgb8();

    let side = size as usize;
    let mut tensor = Array3::<f32>::zeros((CHANNELS, side, side));

    for (px, py, pixel) in rgb.enumerate_pixels() {
        for c in 0..CHANNELS {
            let val = pixel[c] as f32 / 255.0;
            tensor[[c, py as usize, px as usize]] = (val - spec.mean[c]) / spec.std[c];
        }
    }

    tensor
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    fn spec(size: u32) -> InputSpec {
        InputSpec {
            image_size: size,
            mean: [0.5, 0.5, 0.5],
            std: [0.5, 0.5, 0.5],
        }
    }

    #[test]
    fn test_tensor_shape_for_landscape_input() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(640, 480));
        let tensor = to_tensor(&img, &spec(224));
        assert_eq!(tensor.shape(), &[3, 224, 224]);
    }

    #[test]
    fn test_tensor_shape_for_tiny_input() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(3, 1));
        let tensor = to_tensor(&img, &spec(16));
        assert_eq!(tensor.shape(), &[3, 16, 16]);
    }

    #[test]
    fn test_extreme_aspect_ratio_stays_small() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(10_000, 1, Rgb([255, 0, 0])));
        let tensor = to_tensor(&img, &spec(16));
        assert_eq!(tensor.shape(), &[3, 16, 16]);
        assert!((tensor[[0, 8, 8]] - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_crop_keeps_the_center() {
        // Left third red, middle third green, right third blue.
        let img = DynamicImage::ImageRgb8(RgbImage::from_fn(30, 10, |x, _| match x / 10 {
            0 => Rgb([255, 0, 0]),
            1 => Rgb([0, 255, 0]),
            _ => Rgb([0, 0, 255]),
        }));
        let tensor = to_tensor(&img, &spec(4));
        assert!((tensor[[1, 2, 2]] - 1.0).abs() < 0.01);
        assert!((tensor[[0, 2, 2]] + 1.0).abs() < 0.01);
    }

    #[test]
    fn test_normalization_range() {
        // White -> (1.0 - 0.5) / 0.5 = 1.0
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(10, 10, Rgb([255, 255, 255])));
        let tensor = to_tensor(&img, &spec(8));
        let max_val = tensor.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
        assert!((max_val - 1.0).abs() < 0.01);

        // Black -> (0.0 - 0.5) / 0.5 = -1.0
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(10, 10, Rgb([0, 0, 0])));
        let tensor = to_tensor(&img, &spec(8));
        let min_val = tensor.iter().cloned().fold(f32::INFINITY, f32::min);
        assert!((min_val + 1.0).abs() < 0.01);
    }

    #[test]
    fn test_channels_are_not_mixed() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 4, Rgb([255, 0, 0])));
        let tensor = to_tensor(&img, &spec(4));
        assert!((tensor[[0, 2, 2]] - 1.0).abs() < 0.01);
        assert!((tensor[[1, 2, 2]] + 1.0).abs() < 0.01);
        assert!((tensor[[2, 2, 2]] + 1.0).abs() < 0.01);
    }

    #[test]
    fn test_preprocess_from_bytes() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(20, 10, Rgb([10, 20, 30])));
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Png).unwrap();

        let pre = Preprocessor::new(spec(8), LimitsConfig::default());
        let tensor = pre.preprocess(buf.get_ref(), "a.png").unwrap();
        assert_eq!(tensor.shape(), &[3, 8, 8]);
    }

    #[test]
    fn test_preprocess_invalid_bytes_is_decode_error() {
        let pre = Preprocessor::new(spec(8), LimitsConfig::default());
        let err = pre.preprocess(&[0, 1, 2, 3], "broken.jpg").unwrap_err();
        assert!(matches!(err, PipelineError::Decode { .. }));
    }
}
