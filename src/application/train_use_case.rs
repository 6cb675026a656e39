// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates the full fine-tuning pipeline in order:
//
//   Step 1: Validate hyperparameters          (fail before any I/O)
//   Step 2: Load + check image/label pairs    (Layer 4 - data)
//   Step 3: Hold out the first N for val      (Layer 4 - data)
//   Step 4: Build datasets, drop last batch   (Layer 4 - data)
//   Step 5: Build SegNet + Adam learner       (Layer 5 - ml)
//   Step 6: Adapt pretrained / resume weights (Layer 5 - ml)
//   Step 7: Save config, open run tracker     (Layer 6 - infra)
//   Step 8: Run the orchestrator              (Layer 5 - ml)
//   Step 9: Write history and summary         (Layer 6 - infra)
//
// Everything that can reject the run happens before Step 7, so a
// failed start leaves the checkpoint and run directories as they were.
//
// Reference: Rust Book §13 (Iterators and Closures)
//            Burn Book §5 (Training)

use anyhow::{bail, Context, Result};
use burn::{data::dataloader::DataLoaderBuilder, tensor::backend::AutodiffBackend};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

use crate::data::{
    batcher::{LoaderStream, SegBatcher},
    dataset::SegDataset,
    loader::NpySampleLoader,
    transform::SampleConverter,
    splitter::split_holdout,
};
use crate::domain::error::ConfigError;
use crate::domain::labeled_image::LabeledImage;
use crate::domain::traits::{BatchStream, ParameterStore, SampleSource};
use crate::infra::{checkpoint::CheckpointManager, metrics::CsvRunTracker};
use crate::ml::{
    checkpoint_adapter::{CheckpointAdapter, LoadMode, REPLICATION_PREFIX},
    learner::adam_learner,
    lr_schedule::PolyLrSchedule,
    model::{SegNetConfig, CLASS_DEPENDENT_PARAMS},
    trainer::{RunSummary, TrainingOrchestrator, Validator},
};

type MyBackend = burn::backend::Autodiff<burn::backend::Wgpu>;

// ─── Training Configuration ──────────────────────────────────────────────────
// All hyperparameters for a training run.
// Serialisable so it can be saved next to the checkpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    pub data_dir:        String,
    pub checkpoint_dir:  String,
    pub run_dir:         String,
    pub checkpoint_name: String,
    pub num_classes:     usize,
    pub in_channels:     usize,
    pub image_scale:     f32,
    pub width:           usize,
    pub batch_size:      usize,
    pub epochs:          usize,
    pub lr:              f64,
    pub lr_power:        f64,
    pub val_holdout:     usize,
    pub log_interval:    usize,
    pub aux_weight:      f32,
    pub pretrained:      Option<String>,
    pub drop_params:     Vec<String>,
    pub resume:          Option<String>,
    pub seed:            u64,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            data_dir:        "data/nyu".to_string(),
            checkpoint_dir:  "checkpoints".to_string(),
            run_dir:         "runs/latest".to_string(),
            checkpoint_name: "segnet".to_string(),
            num_classes:     40,
            in_channels:     3,
            image_scale:     1.0 / 255.0,
            width:           32,
            batch_size:      10,
            epochs:          100,
            lr:              1e-4,
            lr_power:        0.9,
            val_holdout:     200,
            log_interval:    100,
            aux_weight:      0.4,
            pretrained:      None,
            drop_params:     default_drop_params(),
            resume:          None,
            seed:            42,
        }
    }
}

/// Output-head parameters sized for the pretraining class count,
/// with and without the replication prefix.
pub fn default_drop_params() -> Vec<String> {
    CLASS_DEPENDENT_PARAMS
        .iter()
        .flat_map(|name| [name.to_string(), format!("{REPLICATION_PREFIX}{name}")])
        .collect()
}

impl TrainConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("num_classes", self.num_classes),
            ("in_channels", self.in_channels),
            ("width", self.width),
            ("batch_size", self.batch_size),
            ("epochs", self.epochs),
            ("log_interval", self.log_interval),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(ConfigError::NonPositive { field, value: value.to_string() });
            }
        }

        for (field, value) in [("lr", self.lr), ("lr_power", self.lr_power)] {
            if !value.is_finite() {
                return Err(ConfigError::NotFinite { field, value });
            }
            if value <= 0.0 {
                return Err(ConfigError::NonPositive { field, value: value.to_string() });
            }
        }

        if !self.image_scale.is_finite() {
            return Err(ConfigError::NotFinite { field: "image_scale", value: self.image_scale as f64 });
        }
        if !self.aux_weight.is_finite() {
            return Err(ConfigError::NotFinite { field: "aux_weight", value: self.aux_weight as f64 });
        }
        Ok(())
    }
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    /// Execute the full training pipeline end to end on the WGPU device
    pub fn execute(&self) -> Result<RunSummary> {
        self.config.validate().context("invalid training configuration")?;

        let device = burn::backend::wgpu::WgpuDevice::default();
        tracing::info!("Using WGPU device: {:?}", device);
        run_pipeline::<MyBackend>(&self.config, device)
    }
}

/// Backend-generic body of the pipeline.
pub fn run_pipeline<B: AutodiffBackend>(cfg: &TrainConfig, device: B::Device) -> Result<RunSummary> {
    cfg.validate().context("invalid training configuration")?;

    // ── Step 2: Load all samples ──────────────────────────────────────────────
    tracing::info!("Loading samples from '{}'", cfg.data_dir);
    let samples = NpySampleLoader::new(&cfg.data_dir)
        .with_converter(SampleConverter::with_scale(cfg.image_scale))
        .load_all()?;
    if samples.is_empty() {
        bail!("No samples found in '{}'", cfg.data_dir);
    }
    check_channels(&samples, cfg.in_channels)?;
    for sample in &samples {
        sample
            .check_labels(cfg.num_classes)
            .with_context(|| format!("sample '{}' has an invalid label map", sample.id))?;
    }

    // ── Step 3: Hold-out split ────────────────────────────────────────────────
    let (train_samples, val_samples) = split_holdout(samples, cfg.val_holdout);
    if val_samples.is_empty() {
        tracing::warn!("Validation hold-out is empty; scores will stay at 0");
    }

    // ── Step 4: Burn datasets (incomplete last batch dropped) ─────────────────
    let train_dataset = SegDataset::new(train_samples).drop_last(cfg.batch_size);
    let val_dataset   = SegDataset::new(val_samples).drop_last(cfg.batch_size);
    if train_dataset.sample_count() == 0 {
        bail!(
            "Need at least {} training samples after holding out {} for validation",
            cfg.batch_size,
            cfg.val_holdout
        );
    }
    tracing::info!(
        "Split: {} train, {} validation",
        train_dataset.sample_count(),
        val_dataset.sample_count()
    );

    let train_loader = DataLoaderBuilder::new(SegBatcher::<B>::new(device.clone()))
        .batch_size(cfg.batch_size)
        .shuffle(cfg.seed)
        .num_workers(1)
        .build(train_dataset);
    let val_loader = DataLoaderBuilder::new(SegBatcher::<B::InnerBackend>::new(device.clone()))
        .batch_size(cfg.batch_size)
        .num_workers(1)
        .build(val_dataset);

    let train_stream = LoaderStream::new(train_loader, cfg.batch_size);
    let val_stream   = LoaderStream::new(val_loader, cfg.batch_size);

    // ── Step 5: Model + optimiser ─────────────────────────────────────────────
    let model = SegNetConfig::new(cfg.num_classes)
        .with_in_channels(cfg.in_channels)
        .with_width(cfg.width)
        .init::<B>(&device);
    let mut learner = adam_learner(model, cfg.aux_weight);
    tracing::info!("Model ready: {} classes, width {}", cfg.num_classes, cfg.width);

    let schedule = PolyLrSchedule::for_run(cfg.lr, cfg.epochs, train_stream.num_batches(), cfg.lr_power)
        .context("invalid learning-rate schedule")?;

    // ── Step 6: Initial weights (nothing on disk has been touched yet) ────────
    load_initial_weights(&mut learner, cfg)?;

    // ── Step 7: Save config next to the checkpoints ───────────────────────────
    let ckpt_manager = CheckpointManager::new(&cfg.checkpoint_dir, &cfg.checkpoint_name)?;
    ckpt_manager.save_config(cfg)?;
    let mut tracker = CsvRunTracker::new(&cfg.run_dir)?;

    // ── Step 8: Train ─────────────────────────────────────────────────────────
    let summary = {
        let mut orchestrator = TrainingOrchestrator::new(
            learner,
            schedule,
            Validator::new(cfg.num_classes),
            &ckpt_manager,
            &mut tracker,
            cfg.epochs,
            cfg.log_interval,
        )?;
        let summary = orchestrator.run(&train_stream, &val_stream)?;
        tracing::debug!(
            "Orchestrator {:?} after {} iterations, best score {:.4}",
            orchestrator.phase(),
            orchestrator.iteration(),
            orchestrator.best_score()
        );
        summary
    };

    // ── Step 9: Persist the run record ────────────────────────────────────────
    tracker.write_history(&summary.history)?;
    tracker.write_json("summary.json", &summary)?;
    Ok(summary)
}

/// Resume (strict, nothing dropped) or pretrained (partial) weights.
fn load_initial_weights<L: ParameterStore>(learner: &mut L, cfg: &TrainConfig) -> Result<()> {
    if let Some(resume) = &cfg.resume {
        if cfg.pretrained.is_some() {
            tracing::warn!("Both --resume and --pretrained given; resuming from '{}'", resume);
        }
        let params = CheckpointManager::load_params(Path::new(resume))?;
        CheckpointAdapter::new(LoadMode::Strict)
            .load_into(learner, params, &BTreeSet::new())
            .with_context(|| format!("cannot resume from '{resume}'"))?;
    } else if let Some(pretrained) = &cfg.pretrained {
        let params = CheckpointManager::load_params(Path::new(pretrained))?;
        let drop: BTreeSet<String> = cfg.drop_params.iter().cloned().collect();
        CheckpointAdapter::new(LoadMode::Partial)
            .load_into(learner, params, &drop)
            .with_context(|| format!("cannot adapt pretrained weights from '{pretrained}'"))?;
    } else {
        tracing::info!("No checkpoint given; training from random initialisation");
    }
    Ok(())
}

fn check_channels(samples: &[LabeledImage], expected: usize) -> Result<()> {
    match samples.first() {
        Some(first) if first.channels != expected => bail!(
            "Samples have {} channel(s) but the model expects {}",
            first.channels,
            expected
        ),
        _ => Ok(()),
    }
}
