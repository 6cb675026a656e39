// ============================================================
// Layer 4 — Segmentation Batcher
// ============================================================
// Implements Burn's Batcher trait: a Vec of LabeledImages in,
// one pair of stacked tensors out.
//
//   images: [batch, channels, height, width]   (Float)
//   labels: [batch, height, width]             (Int, 255 = ignore)
//
// All samples share one size (the loader guarantees it), so
// stacking is flatten-then-reshape.
//
// LoaderStream adapts Burn's DataLoader to the BatchStream trait
// the orchestrator consumes.
//
// Reference: Burn Book §4 (Batcher)

use std::sync::Arc;

use burn::{
    data::dataloader::{batcher::Batcher, DataLoader},
    prelude::*,
};

use crate::domain::labeled_image::LabeledImage;
use crate::domain::traits::BatchStream;

// ─── SegBatch ─────────────────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct SegBatch<B: Backend> {
    pub images: Tensor<B, 4>,
    pub labels: Tensor<B, 3, Int>,
}

// ─── SegBatcher ───────────────────────────────────────────────────────────────
#[derive(Clone, Debug)]
pub struct SegBatcher<B: Backend> {
    pub device: B::Device,
}

impl<B: Backend> SegBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }
}

impl<B: Backend> Batcher<LabeledImage, SegBatch<B>> for SegBatcher<B> {
    fn batch(&self, items: Vec<LabeledImage>) -> SegBatch<B> {
        let batch_size = items.len();
        let [channels, height, width] = items[0].dims();

        let image_flat: Vec<f32> = items
            .iter()
            .flat_map(|s| s.image.iter().copied())
            .collect();

        // Burn Int tensors are created from i32
        let label_flat: Vec<i32> = items
            .iter()
            .flat_map(|s| s.label.iter().map(|&l| l as i32))
            .collect();

        let images = Tensor::<B, 1>::from_floats(image_flat.as_slice(), &self.device)
            .reshape([batch_size, channels, height, width]);

        let labels = Tensor::<B, 1, Int>::from_ints(label_flat.as_slice(), &self.device)
            .reshape([batch_size, height, width]);

        SegBatch { images, labels }
    }
}

// ─── LoaderStream ─────────────────────────────────────────────────────────────
/// A Burn DataLoader viewed as a replayable BatchStream.
pub struct LoaderStream<O> {
    loader:     Arc<dyn DataLoader<O>>,
    batch_size: usize,
}

impl<O> LoaderStream<O> {
    pub fn new(loader: Arc<dyn DataLoader<O>>, batch_size: usize) -> Self {
        Self { loader, batch_size: batch_size.max(1) }
    }
}

impl<O: 'static> BatchStream for LoaderStream<O> {
    type Item = O;

    fn batches(&self) -> Box<dyn Iterator<Item = O> + '_> {
        Box::new(self.loader.iter())
    }

    fn num_batches(&self) -> usize {
        self.loader.num_items().div_ceil(self.batch_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestBackend = burn::backend::NdArray;

    #[test]
    fn test_batch_shapes_and_ignore_label_survive() {
        let device = Default::default();
        let a = LabeledImage::new("a", [1, 1, 2], vec![0.5, 1.5], vec![0, 255]);
        let b = LabeledImage::new("b", [1, 1, 2], vec![2.5, 3.5], vec![1, 2]);

        let batch: SegBatch<TestBackend> = SegBatcher::new(device).batch(vec![a, b]);
        assert_eq!(batch.images.dims(), [2, 1, 1, 2]);
        assert_eq!(batch.labels.dims(), [2, 1, 2]);

        let labels: Vec<i64> = batch.labels.into_data().convert::<i64>().to_vec().unwrap();
        assert_eq!(labels, vec![0, 255, 1, 2]);
    }
}
