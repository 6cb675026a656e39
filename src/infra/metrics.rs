// ============================================================
// Layer 6 — Run Tracker
// ============================================================
// File-backed experiment tracking for exactly one training run.
//
// Layout under the run directory:
//
//   runs/<run>/
//     scalars.csv      ← name,step,value  (one row per log_scalar)
//     epochs.csv       ← per-epoch summary written at the end
//     summary.json     ← RunSummary of the finished run
//     artifacts/
//       segnet.safetensors       ← copied by add_artifact
//       segnet_best.safetensors
//
// Example scalars.csv:
//   name,step,value
//   loss,0,1.832100
//   learningrate,0,0.000100
//   val_acc,0,0.412000
//   val_miou,0,0.118000
//
// How to read the metrics:
//   - loss should fall epoch over epoch
//   - val_score = (val_acc + val_miou) / 2 drives best-checkpoint selection
//   - a flat val_miou with rising val_acc usually means the
//     frequent classes dominate (wall, floor)
//
// Reference: Rust Book §12 (I/O and File Handling)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use crate::domain::traits::RunTracker;

pub const SCALARS_FILE: &str  = "scalars.csv";
pub const EPOCHS_FILE: &str   = "epochs.csv";
pub const ARTIFACT_DIR: &str  = "artifacts";

/// One row of metrics for a single training epoch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochMetrics {
    /// Zero-based epoch index
    pub epoch: usize,

    /// Mean training loss over the epoch's iterations (NaN if none ran)
    pub train_loss: f64,

    /// Learning rate of the last iteration in the epoch
    pub learning_rate: f64,

    /// Fraction of non-ignored validation pixels predicted correctly
    pub pixel_accuracy: f64,

    /// Mean IoU over classes observed during validation
    pub mean_iou: f64,

    /// (pixel_accuracy + mean_iou) / 2
    pub score: f64,

    /// True when this epoch wrote the best checkpoint
    pub improved: bool,
}

/// CSV-backed tracker scoped to one run directory.
pub struct CsvRunTracker {
    dir:          PathBuf,
    scalars_path: PathBuf,
}

impl CsvRunTracker {
    /// Create the run directory and the scalars file header.
    /// An existing scalars file is appended to.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(dir.join(ARTIFACT_DIR))
            .with_context(|| format!("Cannot create run directory '{}'", dir.display()))?;

        let scalars_path = dir.join(SCALARS_FILE);
        if !scalars_path.exists() {
            let mut f = fs::File::create(&scalars_path)?;
            writeln!(f, "name,step,value")?;
            tracing::debug!("Created scalars CSV: '{}'", scalars_path.display());
        }

        Ok(Self { dir, scalars_path })
    }

    pub fn artifact_dir(&self) -> PathBuf {
        self.dir.join(ARTIFACT_DIR)
    }

    /// Overwrite epochs.csv with the full per-epoch history.
    pub fn write_history(&self, history: &[EpochMetrics]) -> Result<PathBuf> {
        let path  = self.dir.join(EPOCHS_FILE);
        let mut f = fs::File::create(&path)
            .with_context(|| format!("Cannot write '{}'", path.display()))?;

        writeln!(f, "epoch,train_loss,learning_rate,pixel_accuracy,mean_iou,score,improved")?;
        for m in history {
            writeln!(
                f,
                "{},{:.6},{:.8},{:.6},{:.6},{:.6},{}",
                m.epoch, m.train_loss, m.learning_rate, m.pixel_accuracy, m.mean_iou, m.score, m.improved,
            )?;
        }
        Ok(path)
    }

    /// Write any serialisable value as pretty JSON inside the run directory.
    pub fn write_json<T: Serialize>(&self, file_name: &str, value: &T) -> Result<PathBuf> {
        let path = self.dir.join(file_name);
        fs::write(&path, serde_json::to_string_pretty(value)?)
            .with_context(|| format!("Cannot write '{}'", path.display()))?;
        Ok(path)
    }
}

impl RunTracker for CsvRunTracker {
    fn log_scalar(&mut self, name: &str, value: f64, step: usize) -> Result<()> {
        // Open in append mode so rows from earlier epochs survive
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.scalars_path)
            .with_context(|| format!("Cannot open '{}'", self.scalars_path.display()))?;

        writeln!(f, "{name},{step},{value:.6}")?;
        tracing::debug!("Logged {}={:.6} at step {}", name, value, step);
        Ok(())
    }

    fn add_artifact(&mut self, path: &Path) -> Result<()> {
        let file_name = path
            .file_name()
            .with_context(|| format!("Artifact path '{}' has no file name", path.display()))?;
        let dest = self.artifact_dir().join(file_name);

        fs::copy(path, &dest).with_context(|| {
            format!("Cannot copy '{}' to '{}'", path.display(), dest.display())
        })?;
        tracing::info!("Stored artifact '{}'", dest.display());
        Ok(())
    }
}
