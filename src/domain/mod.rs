// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Pure Rust structs, enums and traits that define the core
// concepts of the system.
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O
//   - Only plain Rust structs, enums, and traits
//
// Reference: Rust Book §5 (Structs), §10 (Traits)

// Label taxonomy (class id ↔ name)
pub mod class_names;

// Typed errors for the core components
pub mod error;

// Per-frame uncertainty arrays for OOD analysis
pub mod frame_record;

// A converted image plus its per-pixel labels
pub mod labeled_image;

// Named weight snapshots (foreign and target)
pub mod parameter_set;

// Predicted vs. ground-truth labels for one batch
pub mod pixel_batch;

// Core abstractions (traits) that other layers implement
pub mod traits;
