// ============================================================
// Layer 3 — FrameRecord Domain Type
// ============================================================
// The output of an external inference stage for one frame:
// a ground-truth label map plus two per-pixel uncertainty maps
// (negative log-likelihood under the latent density, and
// softmax entropy). All three share the same spatial shape.

use ndarray::ArrayD;

use crate::domain::error::FrameError;

#[derive(Debug, Clone)]
pub struct FrameRecord {
    /// Frame identifier, the file stem shared by the three arrays
    pub id:      String,
    pub label:   ArrayD<i64>,
    pub nll:     ArrayD<f32>,
    pub entropy: ArrayD<f32>,
}

impl FrameRecord {
    pub fn new(
        id:      impl Into<String>,
        label:   ArrayD<i64>,
        nll:     ArrayD<f32>,
        entropy: ArrayD<f32>,
    ) -> Result<Self, FrameError> {
        let id = id.into();
        for (array, shape) in [("nll", nll.shape()), ("entropy", entropy.shape())] {
            if shape != label.shape() {
                return Err(FrameError::ShapeMismatch {
                    frame:    id,
                    array,
                    expected: label.shape().to_vec(),
                    found:    shape.to_vec(),
                });
            }
        }
        Ok(Self { id, label, nll, entropy })
    }
}
