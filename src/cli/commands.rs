// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the two subcommands: `train` and `ood-scatter`
// and all their configurable flags.
//
// clap's derive macros automatically generate:
//   - help text (--help)
//   - error messages for missing args
//   - type conversion (string → usize, f64, etc.)
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand};

use crate::application::ood_use_case::OodConfig;
use crate::application::train_use_case::{default_drop_params, TrainConfig};
use crate::domain::class_names::DEFAULT_OOD_CLASSES;

/// The two top-level subcommands available to the user
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fine-tune the segmentation model on .npy image/label pairs
    Train(TrainArgs),

    /// Split saved per-pixel NLL/entropy into in- and out-of-distribution sets
    OodScatter(OodArgs),
}

/// All arguments for the `train` command.
#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Directory with <id>_image.npy / <id>_label.npy pairs
    #[arg(long, default_value = "data/nyu")]
    pub data_dir: String,

    /// Directory for the regular and best checkpoints
    #[arg(long, default_value = "checkpoints")]
    pub checkpoint_dir: String,

    /// Run directory for scalars, history and stored artifacts
    #[arg(long, default_value = "runs/latest")]
    pub run_dir: String,

    /// Checkpoint file stem; the best copy gets a `_best` suffix
    #[arg(long, default_value = "segnet")]
    pub checkpoint_name: String,

    /// Number of semantic classes of the target label set
    #[arg(long, default_value_t = 40)]
    pub num_classes: usize,

    /// Image channels (3 for RGB)
    #[arg(long, default_value_t = 3)]
    pub in_channels: usize,

    /// Factor applied to raw pixel values (1/255 maps uint8 to [0, 1])
    #[arg(long, default_value_t = 1.0 / 255.0)]
    pub image_scale: f32,

    /// Feature channels of the last convolution
    #[arg(long, default_value_t = 32)]
    pub width: usize,

    #[arg(long, default_value_t = 10)]
    pub batch_size: usize,

    #[arg(long, default_value_t = 100)]
    pub epochs: usize,

    /// Base learning rate of the poly schedule
    #[arg(long, default_value_t = 1e-4)]
    pub lr: f64,

    /// Exponent of the poly schedule: lr·(1 - i/total)^power
    #[arg(long, default_value_t = 0.9)]
    pub lr_power: f64,

    /// Number of leading samples (by id) held out for validation
    #[arg(long, default_value_t = 200)]
    pub val_holdout: usize,

    /// Log loss and learning rate every N iterations
    #[arg(long, default_value_t = 100)]
    pub log_interval: usize,

    /// Loss weight of the auxiliary output
    #[arg(long, default_value_t = 0.4)]
    pub aux_weight: f32,

    /// Pretrained safetensors checkpoint, loaded partially
    #[arg(long)]
    pub pretrained: Option<String>,

    /// Parameters to discard from the pretrained checkpoint
    /// (comma separated; defaults to the class-dependent heads)
    #[arg(long, value_delimiter = ',')]
    pub drop_params: Vec<String>,

    /// Checkpoint of an earlier run of this model, loaded strictly
    #[arg(long)]
    pub resume: Option<String>,

    /// Shuffle seed of the training loader
    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

/// Convert CLI TrainArgs into the application-layer TrainConfig.
/// The application layer never sees clap types.
impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        let drop_params = if a.drop_params.is_empty() { default_drop_params() } else { a.drop_params };
        TrainConfig {
            data_dir:        a.data_dir,
            checkpoint_dir:  a.checkpoint_dir,
            run_dir:         a.run_dir,
            checkpoint_name: a.checkpoint_name,
            num_classes:     a.num_classes,
            in_channels:     a.in_channels,
            image_scale:     a.image_scale,
            width:           a.width,
            batch_size:      a.batch_size,
            epochs:          a.epochs,
            lr:              a.lr,
            lr_power:        a.lr_power,
            val_holdout:     a.val_holdout,
            log_interval:    a.log_interval,
            aux_weight:      a.aux_weight,
            pretrained:      a.pretrained,
            drop_params,
            resume:          a.resume,
            seed:            a.seed,
        }
    }
}

/// All arguments for the `ood-scatter` command
#[derive(Args, Debug)]
pub struct OodArgs {
    /// Directory holding <frame>_label.npy, _nll.npy and _entropy.npy
    #[arg(long)]
    pub dir: String,

    /// Class names treated as out-of-distribution (comma separated)
    #[arg(long, value_delimiter = ',', default_values_t = DEFAULT_OOD_CLASSES.map(String::from))]
    pub out_classes: Vec<String>,

    #[arg(long, default_value_t = 40)]
    pub num_classes: usize,
}

impl From<OodArgs> for OodConfig {
    fn from(a: OodArgs) -> Self {
        OodConfig { dir: a.dir, out_classes: a.out_classes, num_classes: a.num_classes }
    }
}
