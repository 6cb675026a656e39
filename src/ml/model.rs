// ============================================================
// Layer 5 — SegNet Segmentation Network
// ============================================================
// Small fully-convolutional network with two heads:
//
//   images ─► conv1+ReLU ─┬─► conv2+ReLU ─► classifier      (primary)
//                         └─► aux_classifier                 (auxiliary)
//
// Parameter names follow `<layer>.weight|bias` (`features.conv1.weight`,
// `classifier.conv.bias`, ...) so foreign checkpoints map onto
// the model by name.

use std::collections::BTreeMap;

use anyhow::{anyhow, bail, Result};
use burn::{
    module::Param,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        PaddingConfig2d, Relu,
    },
    prelude::*,
};

use crate::domain::parameter_set::{ParamTensor, ParameterSet};

// Checkpoint names of each convolution, in forward order.
const FEATURES_1: &str = "features.conv1";
const FEATURES_2: &str = "features.conv2";
const CLASSIFIER: &str = "classifier.conv";
const AUX_CLASSIFIER: &str = "aux_classifier.conv";

/// Parameters whose shape depends on the number of classes.
pub const CLASS_DEPENDENT_PARAMS: [&str; 4] = [
    "classifier.conv.weight",
    "classifier.conv.bias",
    "aux_classifier.conv.weight",
    "aux_classifier.conv.bias",
];

#[derive(Config, Debug)]
pub struct SegNetConfig {
    pub num_classes: usize,
    #[config(default = 3)]
    pub in_channels: usize,
    #[config(default = 32)]
    pub width:       usize,
}

impl SegNetConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> SegNet<B> {
        let half = (self.width / 2).max(1);
        let conv3 = |i, o| {
            Conv2dConfig::new([i, o], [3, 3])
                .with_padding(PaddingConfig2d::Explicit(1, 1))
                .init::<B>(device)
        };
        let conv1 = |i, o| Conv2dConfig::new([i, o], [1, 1]).init::<B>(device);

        SegNet {
            conv1:          conv3(self.in_channels, half),
            conv2:          conv3(half, self.width),
            classifier:     conv1(self.width, self.num_classes),
            aux_classifier: conv1(half, self.num_classes),
            activation:     Relu::new(),
        }
    }
}

/// Small fully-convolutional segmentation network.
///
/// Output resolution equals input resolution; the auxiliary head reads
/// the first feature map and only contributes to the training loss.
#[derive(Module, Debug)]
pub struct SegNet<B: Backend> {
    pub conv1:          Conv2d<B>,
    pub conv2:          Conv2d<B>,
    pub classifier:     Conv2d<B>,
    pub aux_classifier: Conv2d<B>,
    pub activation:     Relu,
}

impl<B: Backend> SegNet<B> {
    /// images: [batch, channels, h, w] → [primary, aux], each [batch, classes, h, w]
    pub fn forward(&self, images: Tensor<B, 4>) -> Vec<Tensor<B, 4>> {
        let x   = self.activation.forward(self.conv1.forward(images));
        let aux = self.aux_classifier.forward(x.clone());
        let x   = self.activation.forward(self.conv2.forward(x));
        vec![self.classifier.forward(x), aux]
    }

    fn layers(&self) -> [(&'static str, &Conv2d<B>); 4] {
        [
            (FEATURES_1, &self.conv1),
            (FEATURES_2, &self.conv2),
            (CLASSIFIER, &self.classifier),
            (AUX_CLASSIFIER, &self.aux_classifier),
        ]
    }

    fn layer_mut(&mut self, name: &str) -> Option<&mut Conv2d<B>> {
        match name {
            FEATURES_1 => Some(&mut self.conv1),
            FEATURES_2 => Some(&mut self.conv2),
            CLASSIFIER => Some(&mut self.classifier),
            AUX_CLASSIFIER => Some(&mut self.aux_classifier),
            _ => None,
        }
    }

    pub fn parameter_shapes(&self) -> BTreeMap<String, Vec<usize>> {
        let mut shapes = BTreeMap::new();
        for (name, conv) in self.layers() {
            shapes.insert(format!("{name}.weight"), conv.weight.val().dims().to_vec());
            if let Some(bias) = &conv.bias {
                shapes.insert(format!("{name}.bias"), bias.val().dims().to_vec());
            }
        }
        shapes
    }

    pub fn state_dict(&self) -> Result<ParameterSet> {
        let mut params = ParameterSet::new();
        for (name, conv) in self.layers() {
            params.insert(format!("{name}.weight"), export(conv.weight.val())?);
            if let Some(bias) = &conv.bias {
                params.insert(format!("{name}.bias"), export(bias.val())?);
            }
        }
        Ok(params)
    }

    /// Replace the named parameters; names not in `params` keep their values.
    pub fn load_parameters(mut self, params: ParameterSet) -> Result<Self> {
        for (name, tensor) in params {
            let (layer, field) = name
                .rsplit_once('.')
                .ok_or_else(|| anyhow!("parameter '{name}' has no layer prefix"))?;
            let conv = self
                .layer_mut(layer)
                .ok_or_else(|| anyhow!("model has no layer '{layer}' (from '{name}')"))?;

            match field {
                "weight" => {
                    let device = conv.weight.val().device();
                    conv.weight = Param::from_tensor(import::<B, 4>(&name, &tensor, &device)?);
                }
                "bias" => {
                    let Some(bias) = &conv.bias else {
                        bail!("layer '{layer}' has no bias");
                    };
                    let device = bias.val().device();
                    conv.bias = Some(Param::from_tensor(import::<B, 1>(&name, &tensor, &device)?));
                }
                other => bail!("unknown parameter field '{other}' in '{name}'"),
            }
        }
        Ok(self)
    }
}

fn export<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> Result<ParamTensor> {
    let shape  = tensor.dims().to_vec();
    let values = tensor
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| anyhow!("cannot read tensor data: {e:?}"))?;
    Ok(ParamTensor::new(shape, values))
}

fn import<B: Backend, const D: usize>(
    name:   &str,
    tensor: &ParamTensor,
    device: &B::Device,
) -> Result<Tensor<B, D>> {
    if tensor.shape.len() != D || tensor.values.len() != tensor.numel() {
        bail!("parameter '{name}' has shape {:?}, expected rank {D}", tensor.shape);
    }
    let data = TensorData::new(tensor.values.clone(), tensor.shape.clone());
    Ok(Tensor::from_data(data, device))
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestBackend = burn::backend::NdArray;

    fn model(classes: usize) -> SegNet<TestBackend> {
        SegNetConfig::new(classes).with_width(4).init(&Default::default())
    }

    #[test]
    fn test_forward_keeps_resolution() {
        let net = model(5);
        let images = Tensor::<TestBackend, 4>::zeros([2, 3, 6, 7], &Default::default());
        let outputs = net.forward(images);
        assert_eq!(outputs.len(), 2);
        assert_eq!(outputs[0].dims(), [2, 5, 6, 7]);
        assert_eq!(outputs[1].dims(), [2, 5, 6, 7]);
    }

    #[test]
    fn test_state_dict_names_and_shapes() {
        let net = model(5);
        let shapes = net.parameter_shapes();
        assert_eq!(shapes.len(), 8);
        assert_eq!(shapes["classifier.conv.weight"], vec![5, 4, 1, 1]);
        assert_eq!(shapes["features.conv1.weight"], vec![2, 3, 3, 3]);

        let params = net.state_dict().unwrap();
        assert_eq!(params.names(), shapes.keys().cloned().collect::<std::collections::BTreeSet<_>>());
        for name in CLASS_DEPENDENT_PARAMS {
            assert!(params.contains(name), "{name}");
        }
    }

    #[test]
    fn test_load_parameters_overwrites_only_given_names() {
        let net = model(3);
        let before = net.state_dict().unwrap();

        let mut update = ParameterSet::new();
        update.insert("classifier.conv.bias", ParamTensor::new(vec![3], vec![7.0, 8.0, 9.0]));
        let after = net.load_parameters(update).unwrap().state_dict().unwrap();

        assert_eq!(after.get("classifier.conv.bias").unwrap().values, vec![7.0, 8.0, 9.0]);
        assert_eq!(after.get("features.conv1.weight"), before.get("features.conv1.weight"));
    }

    #[test]
    fn test_load_parameters_rejects_unknown_layer() {
        let mut update = ParameterSet::new();
        update.insert("decoder.conv.bias", ParamTensor::scalar(1.0));
        assert!(model(3).load_parameters(update).is_err());
    }
}
