// ============================================================
// Layer 5 — Mixed Softmax Cross-Entropy
// ============================================================
// Per-pixel cross-entropy that skips ignored pixels:
//
//   loss = -Σ valid · log_softmax(logits)[target] / max(#valid, 1)
//
// Burn's CrossEntropyLoss gathers the target column before any
// masking, so a target of 255 would index past the class axis.
// Ignored targets are therefore rewritten to class 0 for the
// gather and zeroed out by the mask afterwards.
//
// A target outside [0, classes) that is not the ignore label
// would gather past the class axis, so targets are checked on the
// host first and rejected with an error.
//
// With several model outputs, the primary output gets weight 1
// and every auxiliary output gets `aux_weight`.

use anyhow::{anyhow, Result};
use burn::{prelude::*, tensor::activation::log_softmax};

use crate::domain::error::MetricError;
use crate::domain::pixel_batch::IGNORE_LABEL;

/// Cross-entropy over [batch, classes, h, w] logits and [batch, h, w] targets.
pub fn masked_cross_entropy<B: Backend>(
    logits:  Tensor<B, 4>,
    targets: Tensor<B, 3, Int>,
) -> Tensor<B, 1> {
    let [batch, classes, height, width] = logits.dims();
    let pixels = batch * height * width;

    // [batch, classes, h, w] → [pixels, classes]
    let logits  = logits.permute([0, 2, 3, 1]).reshape([pixels, classes]);
    let targets = targets.reshape([pixels]);

    let ignored = targets.clone().equal_elem(IGNORE_LABEL);
    let valid   = ignored.clone().bool_not().float();
    let safe    = targets.mask_fill(ignored, 0);

    let picked = log_softmax(logits, 1)
        .gather(1, safe.reshape([pixels, 1]))
        .reshape([pixels]);

    let total = (picked * valid.clone()).sum().neg();
    total / valid.sum().clamp_min(1.0)
}

/// Weighted sum of the masked loss over every model output.
pub fn mixed_cross_entropy<B: Backend>(
    outputs:    Vec<Tensor<B, 4>>,
    targets:    Tensor<B, 3, Int>,
    aux_weight: f32,
) -> Result<Tensor<B, 1>> {
    let mut outputs = outputs.into_iter();
    let primary = outputs
        .next()
        .ok_or_else(|| anyhow!("segmentation model returned no outputs"))?;
    check_targets(&targets, primary.dims()[1])?;

    let mut loss = masked_cross_entropy(primary, targets.clone());
    for aux in outputs {
        loss = loss + masked_cross_entropy(aux, targets.clone()).mul_scalar(aux_weight);
    }
    Ok(loss)
}

/// Every target must be a class index or the ignore label.
fn check_targets<B: Backend>(targets: &Tensor<B, 3, Int>, num_classes: usize) -> Result<()> {
    let values = targets
        .clone()
        .into_data()
        .convert::<i64>()
        .to_vec::<i64>()
        .map_err(|e| anyhow!("cannot read target tensor: {e:?}"))?;

    let classes = 0..num_classes as i64;
    if let Some(&label) = values.iter().find(|&&l| l != IGNORE_LABEL && !classes.contains(&l)) {
        return Err(MetricError::LabelOutOfRange { side: "target", label, num_classes }.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    type TestBackend = burn::backend::NdArray;

    fn scalar(t: Tensor<TestBackend, 1>) -> f64 {
        t.into_scalar().elem::<f64>()
    }

    fn targets(values: [i32; 2]) -> Tensor<TestBackend, 3, Int> {
        Tensor::<TestBackend, 1, Int>::from_ints(values, &Default::default()).reshape([1, 1, 2])
    }

    #[test]
    fn test_uniform_logits_give_log_num_classes() {
        let logits = Tensor::<TestBackend, 4>::zeros([1, 2, 1, 2], &Default::default());
        assert_relative_eq!(scalar(masked_cross_entropy(logits, targets([0, 1]))), 2f64.ln(), epsilon = 1e-5);
    }

    #[test]
    fn test_ignored_pixels_do_not_contribute() {
        let logits = Tensor::<TestBackend, 4>::zeros([1, 2, 1, 2], &Default::default());
        let loss = scalar(masked_cross_entropy(logits, targets([1, 255])));
        assert_relative_eq!(loss, 2f64.ln(), epsilon = 1e-5);
    }

    #[test]
    fn test_all_ignored_is_zero_not_nan() {
        let logits = Tensor::<TestBackend, 4>::zeros([1, 2, 1, 2], &Default::default());
        assert_eq!(scalar(masked_cross_entropy(logits, targets([255, 255]))), 0.0);
    }

    #[test]
    fn test_no_outputs_is_an_error() {
        assert!(mixed_cross_entropy::<TestBackend>(Vec::new(), targets([0, 1]), 0.4).is_err());
    }

    #[test]
    fn test_target_beyond_class_axis_is_an_error() {
        let logits = Tensor::<TestBackend, 4>::zeros([1, 2, 1, 2], &Default::default());
        let err = mixed_cross_entropy(vec![logits], targets([0, 7]), 0.4).unwrap_err();
        assert_eq!(
            err.downcast_ref::<MetricError>(),
            Some(&MetricError::LabelOutOfRange { side: "target", label: 7, num_classes: 2 })
        );
    }

    #[test]
    fn test_aux_output_is_weighted() {
        let device = Default::default();
        let zeros  = || Tensor::<TestBackend, 4>::zeros([1, 2, 1, 2], &device);
        let loss = scalar(mixed_cross_entropy(vec![zeros(), zeros()], targets([0, 1]), 0.4).unwrap());
        assert_relative_eq!(loss, 1.4 * 2f64.ln(), epsilon = 1e-5);
    }
}
