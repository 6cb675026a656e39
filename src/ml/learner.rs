// ============================================================
// Layer 5 — Burn Learner
// ============================================================
// Binds SegNet and an optimiser to the SegmentationLearner and
// ParameterStore traits the orchestrator drives.
//
// Key Burn insight (as in every Burn training loop):
//   - training runs on an Autodiff backend so loss.backward() works
//   - model.valid() returns the same weights on the inner backend,
//     so validation batches must be built for B::InnerBackend
//   - optim.step() consumes the model and returns the updated one
//
// Reference: Burn Book §5, Kingma & Ba (2015) Adam

use std::collections::BTreeMap;

use anyhow::{anyhow, bail, Result};
use burn::{
    module::AutodiffModule,
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};

use crate::data::batcher::SegBatch;
use crate::domain::parameter_set::ParameterSet;
use crate::domain::pixel_batch::PixelBatch;
use crate::domain::traits::{ParameterStore, SegmentationLearner};
use crate::ml::loss::mixed_cross_entropy;
use crate::ml::model::SegNet;

pub struct BurnLearner<B: AutodiffBackend, O> {
    model:      SegNet<B>,
    optim:      O,
    lr:         f64,
    aux_weight: f32,
}

/// Learner with Adam (ε = 1e-8), the optimiser used for fine-tuning.
pub fn adam_learner<B: AutodiffBackend>(
    model:      SegNet<B>,
    aux_weight: f32,
) -> BurnLearner<B, impl Optimizer<SegNet<B>, B>> {
    let optim = AdamConfig::new().with_epsilon(1e-8).init();
    BurnLearner::new(model, optim, aux_weight)
}

impl<B, O> BurnLearner<B, O>
where
    B: AutodiffBackend,
    O: Optimizer<SegNet<B>, B>,
{
    pub fn new(model: SegNet<B>, optim: O, aux_weight: f32) -> Self {
        Self { model, optim, lr: 0.0, aux_weight }
    }
}

impl<B, O> SegmentationLearner for BurnLearner<B, O>
where
    B: AutodiffBackend,
    O: Optimizer<SegNet<B>, B>,
{
    type TrainBatch = SegBatch<B>;
    type ValidBatch = SegBatch<B::InnerBackend>;

    fn set_learning_rate(&mut self, lr: f64) {
        self.lr = lr;
    }

    fn step(&mut self, batch: SegBatch<B>) -> Result<f64> {
        let outputs = self.model.forward(batch.images);
        let loss    = mixed_cross_entropy(outputs, batch.labels, self.aux_weight)?;

        let loss_val: f64 = loss.clone().into_scalar().elem::<f64>();
        if !loss_val.is_finite() {
            bail!("loss is {loss_val}");
        }

        // Backward pass + optimiser update
        let grads = loss.backward();
        let grads = GradientsParams::from_grads(grads, &self.model);
        self.model = self.optim.step(self.lr, self.model.clone(), grads);
        Ok(loss_val)
    }

    fn predict(&self, batch: SegBatch<B::InnerBackend>) -> Result<PixelBatch> {
        // dropout-free weights on the inner backend
        let model   = self.model.valid();
        let primary = model
            .forward(batch.images)
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("segmentation model returned no outputs"))?;

        // argmax over the class axis: [n, classes, h, w] → [n, 1, h, w] → [n, h, w]
        let [n, _, h, w] = primary.dims();
        let predicted = primary.argmax(1).reshape([n, h, w]);

        Ok(PixelBatch::new([n, h, w], int_values(predicted)?, int_values(batch.labels)?))
    }
}

impl<B, O> ParameterStore for BurnLearner<B, O>
where
    B: AutodiffBackend,
    O: Optimizer<SegNet<B>, B>,
{
    fn parameter_shapes(&self) -> BTreeMap<String, Vec<usize>> {
        self.model.parameter_shapes()
    }

    fn state_dict(&self) -> Result<ParameterSet> {
        self.model.state_dict()
    }

    fn load_state_dict(&mut self, params: ParameterSet) -> Result<()> {
        self.model = self.model.clone().load_parameters(params)?;
        Ok(())
    }
}

fn int_values<B: Backend>(tensor: Tensor<B, 3, Int>) -> Result<Vec<i64>> {
    tensor
        .into_data()
        .convert::<i64>()
        .to_vec::<i64>()
        .map_err(|e| anyhow!("cannot read label tensor: {e:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::batcher::SegBatcher;
    use crate::domain::labeled_image::LabeledImage;
    use crate::ml::model::SegNetConfig;
    use burn::data::dataloader::batcher::Batcher;

    type Inner   = burn::backend::NdArray;
    type Backend = burn::backend::Autodiff<Inner>;

    fn sample() -> LabeledImage {
        LabeledImage::new("s", [3, 2, 2], vec![0.5; 12], vec![0, 1, 255, 1])
    }

    fn learner() -> BurnLearner<Backend, impl Optimizer<SegNet<Backend>, Backend>> {
        let model = SegNetConfig::new(2).with_width(4).init::<Backend>(&Default::default());
        adam_learner(model, 0.4)
    }

    #[test]
    fn test_step_returns_finite_loss_and_changes_weights() {
        let mut learner = learner();
        learner.set_learning_rate(1e-2);
        let before = learner.state_dict().unwrap();

        let batch = SegBatcher::<Backend>::new(Default::default()).batch(vec![sample()]);
        let loss  = learner.step(batch).unwrap();

        assert!(loss.is_finite() && loss > 0.0);
        assert_ne!(learner.state_dict().unwrap(), before);
    }

    #[test]
    fn test_step_rejects_label_outside_class_range() {
        let mut learner = learner();
        learner.set_learning_rate(1e-2);
        let before = learner.state_dict().unwrap();

        let bad   = LabeledImage::new("bad", [3, 2, 2], vec![0.5; 12], vec![0, 1, 7, 1]);
        let batch = SegBatcher::<Backend>::new(Default::default()).batch(vec![bad]);
        let err   = format!("{:#}", learner.step(batch).unwrap_err());

        assert!(err.contains("label 7"), "{err}");
        assert_eq!(learner.state_dict().unwrap(), before);
    }

    #[test]
    fn test_predict_pairs_argmax_with_targets() {
        let learner = learner();
        let batch   = SegBatcher::<Inner>::new(Default::default()).batch(vec![sample()]);
        let pixels  = learner.predict(batch).unwrap();

        assert_eq!(pixels.shape, [1, 2, 2]);
        assert_eq!(pixels.target, vec![0, 1, 255, 1]);
        assert!(pixels.predicted.iter().all(|&p| p == 0 || p == 1));
    }
}
