// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The orchestration engine never touches a tensor library.
// It talks to its collaborators through the traits below:
//
//   SegmentationLearner  model + optimiser, one step at a time
//   ParameterStore       named-weight export/import for checkpoints
//   BatchStream          restartable, finite sequence of batches
//   CheckpointSink       where regular/best snapshots are written
//   RunTracker           experiment sink for scalars and artifacts
//   SampleSource         where labelled images come from
//
// The Burn implementations live in Layer 5 (ml) and Layer 4
// (data); tests plug in small fakes.
//
// Reference: Rust Book §10 (Traits), §17 (Trait Objects)

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::domain::labeled_image::LabeledImage;
use crate::domain::parameter_set::ParameterSet;
use crate::domain::pixel_batch::PixelBatch;

// ─── SampleSource ─────────────────────────────────────────────────────────────
/// Any component that can produce labelled images.
pub trait SampleSource {
    fn load_all(&self) -> Result<Vec<LabeledImage>>;
}

// ─── BatchStream ──────────────────────────────────────────────────────────────
/// A finite sequence of batches that can be replayed once per epoch.
pub trait BatchStream {
    type Item;

    /// Start a fresh pass over the data.
    fn batches(&self) -> Box<dyn Iterator<Item = Self::Item> + '_>;

    /// Number of batches one pass yields.
    fn num_batches(&self) -> usize;
}

impl<T: Clone> BatchStream for Vec<T> {
    type Item = T;

    fn batches(&self) -> Box<dyn Iterator<Item = T> + '_> {
        Box::new(self.iter().cloned())
    }

    fn num_batches(&self) -> usize {
        self.len()
    }
}

// ─── SegmentationLearner ──────────────────────────────────────────────────────
/// The opaque neural computation: forward, loss, backward, optimiser step.
///
/// Implementations:
///   - BurnLearner → SegNet + Adam on an autodiff backend
pub trait SegmentationLearner {
    type TrainBatch;
    type ValidBatch;

    /// Set the learning rate used by the next `step`.
    fn set_learning_rate(&mut self, lr: f64);

    /// Run one optimisation step on `batch` and return the loss.
    fn step(&mut self, batch: Self::TrainBatch) -> Result<f64>;

    /// Forward in evaluation mode, argmax over classes, paired with the targets.
    fn predict(&self, batch: Self::ValidBatch) -> Result<PixelBatch>;
}

// ─── ParameterStore ───────────────────────────────────────────────────────────
/// Named-weight access used for checkpointing and adaptation.
pub trait ParameterStore {
    /// Expected parameter names and shapes of the live model.
    fn parameter_shapes(&self) -> BTreeMap<String, Vec<usize>>;

    fn state_dict(&self) -> Result<ParameterSet>;

    /// Overwrite the named parameters present in `params`; everything
    /// else keeps its current value. Shapes must already match.
    fn load_state_dict(&mut self, params: ParameterSet) -> Result<()>;
}

// ─── CheckpointSink ───────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointKind {
    /// Overwritten every epoch so the run is resumable
    Regular,
    /// Written only when the composite score strictly improves
    Best,
}

pub trait CheckpointSink {
    fn save(&self, kind: CheckpointKind, params: &ParameterSet) -> Result<PathBuf>;
}

// ─── RunTracker ───────────────────────────────────────────────────────────────
/// Experiment-tracking context for exactly one training run.
pub trait RunTracker {
    fn log_scalar(&mut self, name: &str, value: f64, step: usize) -> Result<()>;

    /// Hand a finished file to the artifact store, keyed by file name.
    fn add_artifact(&mut self, path: &Path) -> Result<()>;
}
