// ============================================================
// Offline Analysis
// ============================================================
// Post-hoc reductions over arrays a separate inference run has
// already written to disk. Nothing here touches a model.
//
//   ood.rs — splits per-pixel NLL / entropy into in-distribution
//            and out-of-distribution sets by ground-truth class,
//            ready for a latent-density vs. entropy scatter plot

/// In/out-of-distribution partition of per-pixel uncertainty
pub mod ood;
