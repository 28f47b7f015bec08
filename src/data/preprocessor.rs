// ============================================================
// Layer 4 — Image Preprocessor
// ============================================================
// Turns uploaded bytes into the tensor the network was trained
// on. Every step is fixed, so identical bytes always give an
// identical tensor:
//
//   1. Decode (PNG, JPEG, ...) and convert to RGB8
//   2. Resize to size x size with a bilinear filter
//   3. Scale each channel to [0, 1]
//   4. Normalise per channel: (x - mean) / std
//   5. Lay out as CHW and add a batch dimension → [1, 3, S, S]
//
// The mean/std constants are the ImageNet statistics used by
// the training notebooks.

use burn::{prelude::*, tensor::TensorData};
use image::{imageops::FilterType, RgbImage};

use crate::domain::error::{ClassifierError, ClassifierResult};

/// Spatial resolution the classifier was trained at
pub const DEFAULT_IMAGE_SIZE: usize = 224;

/// Per-channel mean, RGB order
pub const CHANNEL_MEAN: [f32; 3] = [0.485, 0.456, 0.406];

/// Per-channel standard deviation, RGB order
pub const CHANNEL_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Decode raw upload bytes into an RGB image.
pub fn decode_image(bytes: &[u8]) -> ClassifierResult<RgbImage> {
    let image = image::load_from_memory(bytes)
        .map_err(|e| ClassifierError::InvalidInput(e.to_string()))?;
    Ok(image.to_rgb8())
}

/// Deterministic resize + normalise pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageTransform {
    size: usize,
    mean: [f32; 3],
    std:  [f32; 3],
}

impl ImageTransform {
    /// A transform with the training constants at `size` x `size`
    pub fn new(size: usize) -> Self {
        Self { size, mean: CHANNEL_MEAN, std: CHANNEL_STD }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Normalised pixel values in CHW order, length 3 * size * size.
    pub fn to_values(&self, image: &RgbImage) -> Vec<f32> {
        let side    = self.size as u32;
        let resized = image::imageops::resize(image, side, side, FilterType::Triangle);

        let plane  = self.size * self.size;
        let mut values = vec![0.0f32; 3 * plane];

        for (i, pixel) in resized.pixels().enumerate() {
            for c in 0..3 {
                let scaled = pixel.0[c] as f32 / 255.0;
                values[c * plane + i] = (scaled - self.mean[c]) / self.std[c];
            }
        }
        values
    }

    /// The network input for one image: [1, 3, size, size]
    pub fn to_tensor<B: Backend>(&self, image: &RgbImage, device: &B::Device) -> Tensor<B, 4> {
        let data = TensorData::new(self.to_values(image), vec![1, 3, self.size, self.size]);
        Tensor::from_data(data, device)
    }

    /// Decode and transform in one step.
    pub fn preprocess<B: Backend>(&self, bytes: &[u8], device: &B::Device) -> ClassifierResult<Tensor<B, 4>> {
        let image = decode_image(bytes)?;
        Ok(self.to_tensor(&image, device))
    }
}

impl Default for ImageTransform {
    fn default() -> Self {
        Self::new(DEFAULT_IMAGE_SIZE)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use image::{DynamicImage, ImageFormat, Rgb};
    use std::io::Cursor;

    fn png_bytes(image: RgbImage) -> Vec<u8> {
        let mut buf = Vec::new();
        DynamicImage::ImageRgb8(image)
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn test_solid_colour_is_normalised_per_channel() {
        let image  = RgbImage::from_pixel(10, 7, Rgb([255, 0, 128]));
        let values = ImageTransform::new(4).to_values(&image);

        assert_eq!(values.len(), 3 * 16);
        let red   = (1.0 - 0.485) / 0.229;
        let green = (0.0 - 0.456) / 0.224;
        let blue  = (128.0 / 255.0 - 0.406) / 0.225;
        assert!((values[0]  - red).abs()   < 1e-5);
        assert!((values[16] - green).abs() < 1e-5);
        assert!((values[32] - blue).abs()  < 1e-5);
    }

    #[test]
    fn test_identical_bytes_give_identical_values() {
        let image = RgbImage::from_fn(50, 30, |x, y| Rgb([(x * 5) as u8, (y * 8) as u8, 77]));
        let bytes = png_bytes(image);
        let t = ImageTransform::new(16);

        let a = t.to_values(&decode_image(&bytes).unwrap());
        let b = t.to_values(&decode_image(&bytes).unwrap());
        assert_eq!(a, b);
    }

    #[test]
    fn test_tensor_shape() {
        let image  = RgbImage::from_pixel(3, 9, Rgb([1, 2, 3]));
        let tensor = ImageTransform::new(8).to_tensor::<NdArray<f32>>(&image, &Default::default());
        assert_eq!(tensor.dims(), [1, 3, 8, 8]);
    }

    #[test]
    fn test_garbage_bytes_are_invalid_input() {
        let err = decode_image(b"definitely not an image").unwrap_err();
        assert_eq!(err.kind(), "invalid_input");
    }

    #[test]
    fn test_default_size_is_224() {
        assert_eq!(ImageTransform::default().size(), 224);
    }

    #[test]
    fn test_preprocess_decodes_then_transforms() {
        let bytes = png_bytes(RgbImage::from_pixel(13, 5, Rgb([255, 0, 128])));
        let t = ImageTransform::new(4);

        let tensor = t.preprocess::<NdArray<f32>>(&bytes, &Default::default()).unwrap();
        assert_eq!(tensor.dims(), [1, 3, 4, 4]);

        let expected = t.to_values(&decode_image(&bytes).unwrap());
        assert_eq!(tensor.into_data().to_vec::<f32>().unwrap(), expected);
    }

    #[test]
    fn test_preprocess_rejects_garbage() {
        let err = ImageTransform::new(4)
            .preprocess::<NdArray<f32>>(b"\x89PNG but truncated", &Default::default())
            .unwrap_err();
        assert_eq!(err.kind(), "invalid_input");
    }
}
