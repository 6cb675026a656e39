// ============================================================
// Layer 5 — ML / Model Layer
// ============================================================
// The orchestration core plus all Burn compute code.
//
// Framework-free core (unit-testable with fakes):
//
//   metric.rs             — incremental pixel accuracy / per-class IoU
//   lr_schedule.rs        — poly learning-rate decay
//   checkpoint_adapter.rs — prefix reconciliation, dropped heads,
//                           strict vs. partial loading
//   trainer.rs            — epoch/iteration state machine, validation,
//                           best-checkpoint selection
//
// Burn-specific:
//
//   model.rs   — SegNet: conv features, primary + auxiliary heads,
//                named parameter export/import
//   loss.rs    — masked cross-entropy over all outputs
//   learner.rs — SegNet + Adam behind SegmentationLearner
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)
//            Long et al. (2015) Fully Convolutional Networks

/// Confusion-style accumulator for pixAcc and mIoU
pub mod metric;

/// Poly learning-rate schedule
pub mod lr_schedule;

/// Foreign checkpoint → live model parameter reconciliation
pub mod checkpoint_adapter;

/// Training orchestrator and validator
pub mod trainer;

/// Fully-convolutional segmentation network
pub mod model;

/// Mixed softmax cross-entropy with ignored pixels
pub mod loss;

/// Burn learner: forward, backward, optimiser step
pub mod learner;
