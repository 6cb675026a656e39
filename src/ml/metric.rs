// ============================================================
// Layer 5 — Segmentation Metric Accumulator
// ============================================================
// Accumulates pixel accuracy and per-class IoU across a whole
// validation pass, one batch at a time.
//
// State (all integer counts, so accumulation is associative:
// any grouping of the same pixels gives the same totals):
//   correct        non-ignored pixels with predicted == target
//   labeled        non-ignored pixels
//   intersection[c] pixels with predicted == c AND target == c
//   union[c]        pixels with predicted == c OR  target == c
//
// Pixels whose target is 255 are skipped entirely.
//
// mIoU averages only classes seen this pass (union > 0); a class
// that never appears is left out instead of counted as zero.

use crate::domain::error::MetricError;
use crate::domain::pixel_batch::{PixelBatch, IGNORE_LABEL};

#[derive(Debug, Clone, PartialEq)]
pub struct SegmentationMetric {
    num_classes:  usize,
    correct:      u64,
    labeled:      u64,
    intersection: Vec<u64>,
    union:        Vec<u64>,
}

impl SegmentationMetric {
    pub fn new(num_classes: usize) -> Self {
        Self {
            num_classes,
            correct:      0,
            labeled:      0,
            intersection: vec![0; num_classes],
            union:        vec![0; num_classes],
        }
    }

    /// Clear all counts. Marks the start of a validation pass.
    pub fn reset(&mut self) {
        self.correct = 0;
        self.labeled = 0;
        self.intersection.iter_mut().for_each(|v| *v = 0);
        self.union.iter_mut().for_each(|v| *v = 0);
    }

    /// Fold one batch into the running counts.
    ///
    /// The whole batch is validated before any count changes, so a
    /// rejected batch leaves the accumulator untouched.
    pub fn update(&mut self, batch: &PixelBatch) -> Result<(), MetricError> {
        if batch.predicted.len() != batch.target.len() {
            return Err(MetricError::ShapeMismatch {
                predicted: batch.predicted.len(),
                target:    batch.target.len(),
            });
        }
        if batch.target.len() != batch.shape.iter().product::<usize>() {
            return Err(MetricError::PixelCount { shape: batch.shape, pixels: batch.target.len() });
        }
        for (&pred, &target) in batch.predicted.iter().zip(&batch.target) {
            if target == IGNORE_LABEL {
                continue;
            }
            self.check_range("target", target)?;
            self.check_range("predicted", pred)?;
        }

        for (&pred, &target) in batch.predicted.iter().zip(&batch.target) {
            if target == IGNORE_LABEL {
                continue;
            }
            let (p, t) = (pred as usize, target as usize);
            self.labeled += 1;
            if p == t {
                self.correct += 1;
                self.intersection[t] += 1;
                self.union[t] += 1;
            } else {
                self.union[p] += 1;
                self.union[t] += 1;
            }
        }
        Ok(())
    }

    /// (pixel_accuracy, mean_iou) for everything seen since the last reset.
    pub fn get(&self) -> (f64, f64) {
        let pix_acc = self.correct as f64 / self.labeled.max(1) as f64;

        let observed: Vec<f64> = self.per_class_iou().into_iter().flatten().collect();
        let miou = if observed.is_empty() {
            0.0
        } else {
            observed.iter().sum::<f64>() / observed.len() as f64
        };
        (pix_acc, miou)
    }

    /// IoU per class; `None` for classes with no pixels this pass.
    pub fn per_class_iou(&self) -> Vec<Option<f64>> {
        self.intersection
            .iter()
            .zip(&self.union)
            .map(|(&i, &u)| (u > 0).then(|| i as f64 / u as f64))
            .collect()
    }

    pub fn labeled_pixels(&self) -> u64 {
        self.labeled
    }

    fn check_range(&self, side: &'static str, label: i64) -> Result<(), MetricError> {
        if label < 0 || label as usize >= self.num_classes {
            return Err(MetricError::LabelOutOfRange {
                side,
                label,
                num_classes: self.num_classes,
            });
        }
        Ok(())
    }
}
