// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Cross-cutting persistence that doesn't belong to any one
// business layer:
//
//   checkpoint.rs — Named parameters as safetensors files
//                   (regular + best per run) and the run's
//                   TrainConfig as JSON.
//
//   metrics.rs    — The run tracker: scalars.csv, per-epoch
//                   history, summary.json and an artifacts/
//                   directory that receives the final
//                   checkpoints.
//
// Keeping these here makes it easy to swap implementations
// (e.g. a remote experiment server instead of CSV files)
// without touching the orchestrator, which only sees the
// CheckpointSink and RunTracker traits.
//
// Reference: Rust Book §7 (Modules)
//            Rust Book §9 (Error Handling with anyhow)

/// Safetensors checkpoints and config JSON
pub mod checkpoint;

/// CSV run tracker and artifact store
pub mod metrics;
