// ============================================================
// Layer 4 — Sample Converter
// ============================================================
// Converts raw arrays from disk into the layout the model wants.
//
// Images arrive channel-last (height × width × channels), the
// way cameras and numpy write them. Convolutions want
// channel-first, so every image is transposed to
// (channels × height × width) and cast to f32.
//
// Labels are cast to i64 and kept as-is: the ignore value 255
// must survive the conversion untouched.
//
// Reference: ndarray docs (permuted_axes)

use anyhow::{bail, Result};
use ndarray::{Array2, Array3};

use crate::domain::labeled_image::LabeledImage;

pub struct SampleConverter {
    /// Multiplied into every pixel after the cast (1.0 = raw values)
    scale: f32,
}

impl SampleConverter {
    pub fn new() -> Self {
        Self { scale: 1.0 }
    }

    pub fn with_scale(scale: f32) -> Self {
        Self { scale }
    }

    /// Build a LabeledImage from an HWC image and an HW label map.
    pub fn convert(
        &self,
        id:    impl Into<String>,
        image: Array3<f32>,
        label: Array2<i64>,
    ) -> Result<LabeledImage> {
        let id = id.into();
        let (height, width, channels) = image.dim();
        if label.dim() != (height, width) {
            bail!(
                "sample '{}': image is {}x{} but label map is {}x{}",
                id, height, width, label.dim().0, label.dim().1
            );
        }

        // Iterating a permuted view walks it in logical (C, H, W) order
        let chw: Vec<f32> = image
            .permuted_axes([2, 0, 1])
            .iter()
            .map(|&v| v * self.scale)
            .collect();
        let labels: Vec<i64> = label.iter().copied().collect();

        Ok(LabeledImage::new(id, [channels, height, width], chw, labels))
    }
}

impl Default for SampleConverter {
    fn default() -> Self {
        Self::new()
    }
}
