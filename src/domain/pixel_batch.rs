// ============================================================
// Layer 3 — PixelBatch Domain Type
// ============================================================
// One validation batch after the model has been argmax-ed:
// a predicted label per pixel and the ground-truth label per
// pixel, both flattened from (batch × height × width).
//
// Ground truth may contain the ignore sentinel (255). Those
// pixels are excluded from every metric: accuracy numerator,
// accuracy denominator, intersection and union.

/// Reserved label value meaning "exclude this pixel".
pub const IGNORE_LABEL: i64 = 255;

#[derive(Debug, Clone, PartialEq)]
pub struct PixelBatch {
    /// (batch, height, width)
    pub shape:     [usize; 3],
    pub predicted: Vec<i64>,
    pub target:    Vec<i64>,
}

impl PixelBatch {
    pub fn new(shape: [usize; 3], predicted: Vec<i64>, target: Vec<i64>) -> Self {
        Self { shape, predicted, target }
    }

    /// A single-image batch from row-major 2-D label grids.
    #[cfg(test)]
    pub fn from_grids(predicted: &[&[i64]], target: &[&[i64]]) -> Self {
        let height = target.len();
        let width  = target.first().map_or(0, |row| row.len());
        Self {
            shape:     [1, height, width],
            predicted: predicted.iter().flat_map(|r| r.iter().copied()).collect(),
            target:    target.iter().flat_map(|r| r.iter().copied()).collect(),
        }
    }
}
