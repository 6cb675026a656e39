// ============================================================
// Layer 4 — Segmentation Sample Loader
// ============================================================
// Loads image/label pairs stored as .npy files in one directory:
//
//   data/
//     0001_image.npy   ← height × width × 3 (uint8 or float)
//     0001_label.npy   ← height × width     (integer, 255 = ignore)
//     0002_image.npy
//     0002_label.npy
//     ...
//
// Samples are returned sorted by id so the validation hold-out
// (the first N samples) is the same on every run.
//
// Reference: Rust Book §9 (Error Handling)

use anyhow::{bail, Context, Result};
use ndarray::{Axis, Ix2, Ix3};
use std::{fs, path::Path};

use crate::data::npy;
use crate::data::transform::SampleConverter;
use crate::domain::labeled_image::LabeledImage;
use crate::domain::traits::SampleSource;

pub const IMAGE_SUFFIX: &str = "_image.npy";
pub const LABEL_SUFFIX: &str = "_label.npy";

/// Loads all image/label pairs from a directory.
/// Implements the SampleSource trait from Layer 3.
pub struct NpySampleLoader {
    dir:       String,
    converter: SampleConverter,
}

impl NpySampleLoader {
    pub fn new(dir: impl Into<String>) -> Self {
        Self { dir: dir.into(), converter: SampleConverter::new() }
    }

    pub fn with_converter(mut self, converter: SampleConverter) -> Self {
        self.converter = converter;
        self
    }

    fn load_pair(&self, dir: &Path, id: &str) -> Result<LabeledImage> {
        let image = npy::read_f32(&dir.join(format!("{id}{IMAGE_SUFFIX}")))?;
        // Grayscale images get a single channel axis
        let image = if image.ndim() == 2 { image.insert_axis(Axis(2)) } else { image };
        let image = image
            .into_dimensionality::<Ix3>()
            .with_context(|| format!("sample '{id}': image must be H x W x C"))?;

        let label = npy::read_labels(&dir.join(format!("{id}{LABEL_SUFFIX}")))?
            .into_dimensionality::<Ix2>()
            .with_context(|| format!("sample '{id}': label map must be H x W"))?;

        self.converter.convert(id, image, label)
    }
}

impl SampleSource for NpySampleLoader {
    fn load_all(&self) -> Result<Vec<LabeledImage>> {
        let dir = Path::new(&self.dir);

        // A missing directory yields an empty set; the caller decides
        // whether that is fatal.
        if !dir.exists() {
            tracing::warn!("Data directory '{}' does not exist, no samples", self.dir);
            return Ok(Vec::new());
        }

        let mut ids: Vec<String> = fs::read_dir(dir)
            .with_context(|| format!("Cannot read directory '{}'", self.dir))?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let name = entry.file_name().to_string_lossy().into_owned();
                name.strip_suffix(IMAGE_SUFFIX).map(str::to_string)
            })
            .collect();
        ids.sort();

        let mut samples: Vec<LabeledImage> = Vec::with_capacity(ids.len());
        for id in &ids {
            match self.load_pair(dir, id) {
                Ok(sample) => samples.push(sample),
                // One unreadable pair shouldn't sink the whole dataset
                Err(e) => tracing::warn!("Skipping sample '{}': {:#}", id, e),
            }
        }

        // The batcher stacks samples, so every sample must share one size
        if let Some(first) = samples.first() {
            let dims = first.dims();
            if let Some(odd) = samples.iter().find(|s| s.dims() != dims) {
                bail!(
                    "sample '{}' is {:?} but '{}' is {:?}; all samples must share one size",
                    odd.id, odd.dims(), first.id, dims
                );
            }
        }

        tracing::info!("Loaded {} samples from '{}'", samples.len(), self.dir);
        Ok(samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array2, Array3};
    use ndarray_npy::write_npy;

    fn write_pair(dir: &Path, id: &str, h: usize, w: usize) {
        write_npy(dir.join(format!("{id}{IMAGE_SUFFIX}")), &Array3::<u8>::zeros((h, w, 3))).unwrap();
        write_npy(dir.join(format!("{id}{LABEL_SUFFIX}")), &Array2::<u8>::from_elem((h, w), 255)).unwrap();
    }

    #[test]
    fn test_loads_pairs_sorted_by_id() {
        let tmp = tempfile::tempdir().unwrap();
        write_pair(tmp.path(), "b", 2, 3);
        write_pair(tmp.path(), "a", 2, 3);

        let samples = NpySampleLoader::new(tmp.path().to_string_lossy()).load_all().unwrap();
        let ids: Vec<&str> = samples.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(samples[0].dims(), [3, 2, 3]);
        assert!(samples[0].label.iter().all(|&l| l == 255));
    }

    #[test]
    fn test_image_without_label_is_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        write_pair(tmp.path(), "good", 2, 2);
        write_npy(tmp.path().join("lonely_image.npy"), &Array3::<u8>::zeros((2, 2, 3))).unwrap();

        let samples = NpySampleLoader::new(tmp.path().to_string_lossy()).load_all().unwrap();
        assert_eq!(samples.len(), 1);
    }

    #[test]
    fn test_mixed_sizes_are_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        write_pair(tmp.path(), "a", 2, 2);
        write_pair(tmp.path(), "b", 4, 4);
        assert!(NpySampleLoader::new(tmp.path().to_string_lossy()).load_all().is_err());
    }

    #[test]
    fn test_missing_directory_is_empty() {
        let samples = NpySampleLoader::new("/definitely/not/here").load_all().unwrap();
        assert!(samples.is_empty());
    }
}
