// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// This layer coordinates the other layers to accomplish one
// goal (training, or OOD aggregation).
//
// Rules for this layer:
//   - No model math here (Layer 5)
//   - No printing here (Layer 1)
//   - No file formats here (Layers 4 and 6)
//   - Only workflow coordination
//
// Reference: Clean Architecture pattern
//            Rust Book §7 (Module System)

// The fine-tuning workflow
pub mod train_use_case;

// The uncertainty partition workflow
pub mod ood_use_case;
