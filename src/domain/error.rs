// ============================================================
// Layer 3 — Typed Errors
// ============================================================
// The core components fail in a small number of well-defined
// ways. Each gets a thiserror enum so callers (and tests) can
// match on the exact kind instead of parsing strings.
//
// The application and orchestration layers wrap these in
// anyhow with epoch/iteration context before reporting.

use thiserror::Error;

/// Invalid hyperparameters, rejected before any state is touched.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{field} must be positive, got {value}")]
    NonPositive { field: &'static str, value: String },

    #[error("{field} must be finite, got {value}")]
    NotFinite { field: &'static str, value: f64 },

    #[error("{field} must be in {min}..={max}, got {value}")]
    OutOfRange { field: &'static str, value: usize, min: usize, max: usize },

    #[error("schedule needs at least one iteration (epochs={epochs}, iterations_per_epoch={iterations_per_epoch})")]
    EmptySchedule { epochs: usize, iterations_per_epoch: usize },

    #[error("schedule length overflows (epochs={epochs}, iterations_per_epoch={iterations_per_epoch})")]
    ScheduleOverflow { epochs: usize, iterations_per_epoch: usize },
}

/// Failures while reconciling a foreign parameter set with a live model.
#[derive(Debug, Error, PartialEq)]
pub enum AdaptError {
    /// Strict load found names that don't line up on one or both sides.
    #[error(
        "strict load rejected: {} missing parameter(s) {:?}, {} unexpected parameter(s) {:?}",
        missing.len(), missing, unexpected.len(), unexpected
    )]
    NameMismatch {
        missing:    Vec<String>,
        unexpected: Vec<String>,
    },

    /// A parameter exists on both sides but its shape disagrees.
    #[error("parameter '{name}' has shape {found:?} in checkpoint but model expects {expected:?}")]
    ShapeMismatch {
        name:     String,
        expected: Vec<usize>,
        found:    Vec<usize>,
    },

    /// Stored element count does not match the declared shape.
    #[error("parameter '{name}' declares shape {shape:?} but holds {len} values")]
    CorruptTensor {
        name:  String,
        shape: Vec<usize>,
        len:   usize,
    },
}

/// Contract violations while accumulating segmentation metrics.
#[derive(Debug, Error, PartialEq)]
pub enum MetricError {
    #[error("prediction has {predicted} pixels but target has {target}")]
    ShapeMismatch { predicted: usize, target: usize },

    #[error("batch shape {shape:?} does not match {pixels} target pixels")]
    PixelCount { shape: [usize; 3], pixels: usize },

    #[error("{side} label {label} is outside [0, {num_classes})")]
    LabelOutOfRange {
        side:        &'static str,
        label:       i64,
        num_classes: usize,
    },
}

/// Problems with a stored OOD frame.
#[derive(Debug, Error, PartialEq)]
pub enum FrameError {
    #[error("frame '{frame}': {array} has shape {found:?}, label map has {expected:?}")]
    ShapeMismatch {
        frame:    String,
        array:    &'static str,
        expected: Vec<usize>,
        found:    Vec<usize>,
    },

    #[error("frame '{frame}': label {label} has no entry in the domain map (size {size})")]
    UnknownLabel { frame: String, label: i64, size: usize },
}
