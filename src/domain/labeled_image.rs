// ============================================================
// Layer 3 — LabeledImage Domain Type
// ============================================================
// One training/validation example after conversion:
//   image: channel-first f32 values, shape [channels, height, width]
//   label: one class id per pixel (or 255 = ignore), shape [height, width]

use crate::domain::error::MetricError;
use crate::domain::pixel_batch::IGNORE_LABEL;

#[derive(Debug, Clone)]
pub struct LabeledImage {
    /// Sample identifier (file stem), kept for traceability
    pub id:       String,
    pub channels: usize,
    pub height:   usize,
    pub width:    usize,
    pub image:    Vec<f32>,
    pub label:    Vec<i64>,
}

impl LabeledImage {
    pub fn new(
        id:       impl Into<String>,
        [channels, height, width]: [usize; 3],
        image:    Vec<f32>,
        label:    Vec<i64>,
    ) -> Self {
        Self { id: id.into(), channels, height, width, image, label }
    }

    pub fn dims(&self) -> [usize; 3] {
        [self.channels, self.height, self.width]
    }

    /// Every label must be a class index in [0, num_classes) or the ignore value.
    pub fn check_labels(&self, num_classes: usize) -> Result<(), MetricError> {
        let classes = 0..num_classes as i64;
        match self.label.iter().find(|&&l| l != IGNORE_LABEL && !classes.contains(&l)) {
            Some(&label) => Err(MetricError::LabelOutOfRange { side: "target", label, num_classes }),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ignore_label_passes_range_check() {
        let img = LabeledImage::new("a", [1, 1, 3], vec![0.0; 3], vec![0, 255, 1]);
        assert_eq!(img.check_labels(2), Ok(()));
    }

    #[test]
    fn test_label_past_class_count_rejected() {
        let img = LabeledImage::new("a", [1, 1, 3], vec![0.0; 3], vec![0, 7, -1]);
        assert_eq!(
            img.check_labels(2),
            Err(MetricError::LabelOutOfRange { side: "target", label: 7, num_classes: 2 })
        );
    }
}
