// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything from .npy files on disk to tensor batches:
//
//   <id>_image.npy + <id>_label.npy
//       │
//       ▼
//   NpySampleLoader   → reads pairs, sorted by id
//       │
//       ▼
//   SampleConverter   → HWC → CHW, cast to f32 / i64
//       │
//       ▼
//   split_holdout     → first N samples validate, rest train
//       │
//       ▼
//   SegDataset        → Burn Dataset (drop incomplete last batch)
//       │
//       ▼
//   SegBatcher        → stacks samples into tensors
//       │
//       ▼
//   LoaderStream      → DataLoader as a replayable BatchStream
//
// FrameDirectory is the offline side: per-frame label/NLL/entropy
// arrays produced by an external inference run.
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

/// Reads image/label pairs from a directory of .npy files
pub mod loader;

/// Channel-last to channel-first conversion
pub mod transform;

/// Implements Burn's Dataset trait for labelled images
pub mod dataset;

/// Implements Burn's Batcher trait and the BatchStream adapter
pub mod batcher;

/// Deterministic train/validation hold-out
pub mod splitter;

/// Per-frame uncertainty arrays for OOD analysis
pub mod frames;

/// dtype-tolerant .npy readers and writers
pub mod npy;
