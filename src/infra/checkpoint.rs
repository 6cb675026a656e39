// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Saves and restores named model parameters as safetensors.
//
// Why safetensors instead of a framework record?
//   A pretrained checkpoint comes from a different training
//   setup with its own naming and class count. Keeping weights
//   as a plain name → (shape, f32 data) table lets the
//   CheckpointAdapter rename, drop and shape-check entries
//   before anything reaches the Burn model.
//
// File naming convention (fixed identifiers, overwritten):
//   checkpoints/
//     segnet.safetensors        ← regular, written every epoch
//     segnet_best.safetensors   ← written on strict improvement
//     train_config.json         ← hyperparameters of the run
//
// Reference: https://github.com/huggingface/safetensors

use anyhow::{bail, Context, Result};
use safetensors::{tensor::TensorView, Dtype, SafeTensors};
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

use crate::application::train_use_case::TrainConfig;
use crate::domain::parameter_set::{ParamTensor, ParameterSet};
use crate::domain::traits::{CheckpointKind, CheckpointSink};

pub const CHECKPOINT_EXT: &str = "safetensors";
pub const CONFIG_FILE: &str    = "train_config.json";

/// Manages the regular/best checkpoint pair of one run.
pub struct CheckpointManager {
    dir:  PathBuf,
    name: String,
}

impl CheckpointManager {
    /// Creates the directory if it doesn't already exist.
    pub fn new(dir: impl Into<PathBuf>, name: impl Into<String>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create checkpoint directory '{}'", dir.display()))?;
        Ok(Self { dir, name: name.into() })
    }

    pub fn path(&self, kind: CheckpointKind) -> PathBuf {
        match kind {
            CheckpointKind::Regular => self.dir.join(format!("{}.{CHECKPOINT_EXT}", self.name)),
            CheckpointKind::Best => self.dir.join(format!("{}_best.{CHECKPOINT_EXT}", self.name)),
        }
    }

    /// Write every parameter as an F32 tensor.
    pub fn save_params(path: &Path, params: &ParameterSet) -> Result<()> {
        let bytes: Vec<(&str, Vec<u8>, &[usize])> = params
            .iter()
            .map(|(name, t)| {
                let raw: &[u8] = bytemuck::cast_slice(&t.values);
                (name.as_str(), raw.to_vec(), t.shape.as_slice())
            })
            .collect();

        let views = bytes
            .iter()
            .map(|(name, raw, shape)| {
                TensorView::new(Dtype::F32, shape.to_vec(), raw)
                    .map(|view| (*name, view))
                    .with_context(|| format!("Parameter '{name}' has inconsistent data"))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut metadata = HashMap::new();
        metadata.insert("parameters".to_string(), params.len().to_string());

        let serialized = safetensors::serialize(views, Some(metadata))
            .context("SafeTensors serialization failed")?;
        fs::write(path, serialized)
            .with_context(|| format!("Failed to save checkpoint to '{}'", path.display()))?;

        tracing::debug!("Saved {} parameters to '{}'", params.len(), path.display());
        Ok(())
    }

    /// Read any safetensors file with F32 or F64 tensors as a ParameterSet.
    pub fn load_params(path: &Path) -> Result<ParameterSet> {
        let bytes = fs::read(path)
            .with_context(|| format!("Cannot read checkpoint '{}'", path.display()))?;
        let tensors = SafeTensors::deserialize(&bytes)
            .with_context(|| format!("'{}' is not a safetensors file", path.display()))?;

        let mut params = ParameterSet::new();
        for (name, view) in tensors.tensors() {
            let values: Vec<f32> = match view.dtype() {
                Dtype::F32 => bytemuck::pod_collect_to_vec::<u8, f32>(view.data()),
                Dtype::F64 => bytemuck::pod_collect_to_vec::<u8, f64>(view.data())
                    .into_iter()
                    .map(|v| v as f32)
                    .collect(),
                other => bail!("Parameter '{name}' has unsupported dtype {other:?}"),
            };
            params.insert(name, ParamTensor::new(view.shape().to_vec(), values));
        }
        if params.is_empty() {
            bail!("Checkpoint '{}' holds no parameters", path.display());
        }

        tracing::info!("Read {} parameters from '{}'", params.len(), path.display());
        Ok(params)
    }

    /// Save the training configuration to JSON.
    pub fn save_config(&self, cfg: &TrainConfig) -> Result<()> {
        let path = self.dir.join(CONFIG_FILE);
        let json = serde_json::to_string_pretty(cfg)?;

        fs::write(&path, json)
            .with_context(|| format!("Cannot write config to '{}'", path.display()))?;

        tracing::debug!("Saved training config to '{}'", path.display());
        Ok(())
    }
}

impl CheckpointSink for CheckpointManager {
    fn save(&self, kind: CheckpointKind, params: &ParameterSet) -> Result<PathBuf> {
        let path = self.path(kind);
        Self::save_params(&path, params)?;
        Ok(path)
    }
}
