// ============================================================
// Layer 4 — Segmentation Dataset
// ============================================================
// In-memory samples behind Burn's Dataset trait. Both splits
// drop the trailing incomplete batch before the loader sees them.

use burn::data::dataset::Dataset;

use crate::domain::labeled_image::LabeledImage;

/// In-memory segmentation dataset backing Burn's DataLoader.
pub struct SegDataset {
    samples: Vec<LabeledImage>,
}

impl SegDataset {
    pub fn new(samples: Vec<LabeledImage>) -> Self {
        Self { samples }
    }

    /// Drop the trailing samples that would form an incomplete batch.
    pub fn drop_last(mut self, batch_size: usize) -> Self {
        let keep = (self.samples.len() / batch_size.max(1)) * batch_size.max(1);
        if keep < self.samples.len() {
            tracing::debug!("Dropping {} samples of an incomplete batch", self.samples.len() - keep);
        }
        self.samples.truncate(keep);
        self
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }
}

impl Dataset<LabeledImage> for SegDataset {
    fn get(&self, index: usize) -> Option<LabeledImage> {
        self.samples.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn samples(n: usize) -> Vec<LabeledImage> {
        (0..n)
            .map(|i| LabeledImage::new(i.to_string(), [1, 1, 1], vec![0.0], vec![0]))
            .collect()
    }

    #[test]
    fn test_drop_last_keeps_full_batches() {
        assert_eq!(SegDataset::new(samples(23)).drop_last(10).sample_count(), 20);
        assert_eq!(SegDataset::new(samples(20)).drop_last(10).len(), 20);
        assert_eq!(SegDataset::new(samples(7)).drop_last(10).len(), 0);
    }
}
