// ============================================================
// Layer 4 — Train/Validation Hold-out
// ============================================================
// Splits samples into two sets:
//   - Validation set: the FIRST `val_count` samples
//   - Training set:   everything after them
//
// Deterministic on purpose: samples arrive sorted by id, so the
// same images are held out on every run and validation scores
// of different runs are comparable.
//
// Reference: Rust Book §8 (Vectors)

/// Split `samples` into (train, validation), taking the first
/// `val_count` items (or all of them, if fewer) for validation.
pub fn split_holdout<T>(mut samples: Vec<T>, val_count: usize) -> (Vec<T>, Vec<T>) {
    let split_at = val_count.min(samples.len());

    // split_off(n) leaves [0..n) in `samples` and returns [n..)
    let train = samples.split_off(split_at);

    tracing::debug!(
        "Dataset split: {} training, {} validation",
        train.len(),
        samples.len(),
    );

    (train, samples)
}
