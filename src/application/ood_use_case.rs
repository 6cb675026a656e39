// ============================================================
// Layer 2 — OodScatterUseCase
// ============================================================
// Offline pipeline over the per-frame arrays an inference run
// left behind:
//
//   Step 1: Build the domain map from class names   (analysis)
//   Step 2: Discover frames by *_label.npy          (Layer 4 - data)
//   Step 3: Read + partition one frame at a time    (analysis)
//   Step 4: Write in/out NLL and entropy arrays     (Layer 4 - data)
//
// The written arrays are the inputs of the latent-density vs.
// softmax-entropy scatter plot, drawn outside this program.

use anyhow::{bail, Context, Result};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::analysis::ood::{mean, DomainMap, OodAggregator, OodPartition};
use crate::data::{frames::FrameDirectory, npy};
use crate::domain::class_names::{DEFAULT_OOD_CLASSES, NYU40_CLASS_NAMES};
use crate::domain::error::ConfigError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OodConfig {
    pub dir:         String,
    pub out_classes: Vec<String>,
    pub num_classes: usize,
}

impl Default for OodConfig {
    fn default() -> Self {
        Self {
            dir:         "ood_frames".to_string(),
            out_classes: DEFAULT_OOD_CLASSES.iter().map(|s| s.to_string()).collect(),
            num_classes: NYU40_CLASS_NAMES.len(),
        }
    }
}

impl OodConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_classes == 0 || self.num_classes > NYU40_CLASS_NAMES.len() {
            return Err(ConfigError::OutOfRange {
                field: "num_classes",
                value: self.num_classes,
                min:   1,
                max:   NYU40_CLASS_NAMES.len(),
            });
        }
        Ok(())
    }
}

pub const OUTPUT_FILES: [&str; 4] = ["in_nll.npy", "out_nll.npy", "in_entropy.npy", "out_entropy.npy"];

pub struct OodScatterUseCase {
    config: OodConfig,
}

impl OodScatterUseCase {
    pub fn new(config: OodConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<OodPartition> {
        let cfg = &self.config;
        cfg.validate().context("invalid OOD configuration")?;

        // ── Step 1: Domain map ────────────────────────────────────────────────
        let map = DomainMap::from_names(&NYU40_CLASS_NAMES[..cfg.num_classes], &cfg.out_classes);
        tracing::info!("Out-of-distribution class ids: {:?}", map.out_ids());

        // ── Step 2: Frames ────────────────────────────────────────────────────
        let frames = FrameDirectory::new(&cfg.dir);
        let ids    = frames.frame_ids()?;
        if ids.is_empty() {
            bail!("No *_label.npy frames found in '{}'", cfg.dir);
        }
        tracing::info!("Aggregating {} frames from '{}'", ids.len(), cfg.dir);

        // ── Step 3: Partition ─────────────────────────────────────────────────
        let mut aggregator = OodAggregator::new(map);
        for id in &ids {
            let record = frames.read(id).with_context(|| format!("Cannot read frame '{id}'"))?;
            aggregator.add_frame(&record)?;
        }
        tracing::debug!("Partitioned {} frames", aggregator.frames());
        let parts = aggregator.finish();

        tracing::info!(
            "In-distribution: {} pixels, mean NLL {:.4}, mean entropy {:.4}",
            parts.in_count(),
            mean(&parts.in_nll),
            mean(&parts.in_entropy)
        );
        tracing::info!(
            "Out-of-distribution: {} pixels, mean NLL {:.4}, mean entropy {:.4}",
            parts.out_count(),
            mean(&parts.out_nll),
            mean(&parts.out_entropy)
        );

        // ── Step 4: Outputs for plotting ──────────────────────────────────────
        write_partition(frames.path(), &parts)?;
        Ok(parts)
    }
}

/// Write the four flat arrays next to the frames.
pub fn write_partition(dir: &Path, parts: &OodPartition) -> Result<Vec<PathBuf>> {
    let arrays = [&parts.in_nll, &parts.out_nll, &parts.in_entropy, &parts.out_entropy];
    let mut written = Vec::with_capacity(OUTPUT_FILES.len());
    for (name, values) in OUTPUT_FILES.iter().zip(arrays) {
        let path = dir.join(name);
        npy::write_f32(&path, &Array1::from_vec(values.clone()))?;
        written.push(path);
    }
    tracing::info!("Wrote {} arrays to '{}'", written.len(), dir.display());
    Ok(written)
}
