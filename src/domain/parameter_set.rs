// ============================================================
// Layer 3 — ParameterSet Domain Type
// ============================================================
// A framework-neutral snapshot of model weights:
//   parameter name  →  (shape, f32 values)
//
// Two kinds flow through the system:
//   - foreign: read from a checkpoint file, possibly written by
//     a replicated-training run ("module." prefixed names) and
//     sized for a different number of classes
//   - target:  produced from the live model's state_dict()
//
// BTreeMap keeps iteration order stable so checkpoints are
// written deterministically and error lists are sorted.

use std::collections::{btree_map, BTreeMap, BTreeSet};

use crate::domain::error::AdaptError;

/// One named weight tensor, stored row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamTensor {
    pub shape:  Vec<usize>,
    pub values: Vec<f32>,
}

impl ParamTensor {
    pub fn new(shape: Vec<usize>, values: Vec<f32>) -> Self {
        Self { shape, values }
    }

    #[cfg(test)]
    pub fn scalar(value: f32) -> Self {
        Self { shape: vec![1], values: vec![value] }
    }

    pub fn numel(&self) -> usize {
        self.shape.iter().product()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterSet {
    params: BTreeMap<String, ParamTensor>,
}

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, tensor: ParamTensor) -> Option<ParamTensor> {
        self.params.insert(name.into(), tensor)
    }

    pub fn get(&self, name: &str) -> Option<&ParamTensor> {
        self.params.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<ParamTensor> {
        self.params.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.params.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn names(&self) -> BTreeSet<String> {
        self.params.keys().cloned().collect()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, ParamTensor> {
        self.params.iter()
    }

    /// Keep only the entries whose name satisfies `keep`.
    pub fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.params.retain(|name, _| keep(name));
    }

    /// Verify every entry against the shapes the model expects.
    ///
    /// Names absent from `expected` are reported as a shape mismatch
    /// with an empty expected shape; callers filter names first.
    pub fn check_shapes(&self, expected: &BTreeMap<String, Vec<usize>>) -> Result<(), AdaptError> {
        for (name, tensor) in &self.params {
            if tensor.values.len() != tensor.numel() {
                return Err(AdaptError::CorruptTensor {
                    name:  name.clone(),
                    shape: tensor.shape.clone(),
                    len:   tensor.values.len(),
                });
            }
            let want = expected.get(name).cloned().unwrap_or_default();
            if want != tensor.shape {
                return Err(AdaptError::ShapeMismatch {
                    name:     name.clone(),
                    expected: want,
                    found:    tensor.shape.clone(),
                });
            }
        }
        Ok(())
    }
}

impl FromIterator<(String, ParamTensor)> for ParameterSet {
    fn from_iter<I: IntoIterator<Item = (String, ParamTensor)>>(iter: I) -> Self {
        Self { params: iter.into_iter().collect() }
    }
}

impl IntoIterator for ParameterSet {
    type Item     = (String, ParamTensor);
    type IntoIter = btree_map::IntoIter<String, ParamTensor>;

    fn into_iter(self) -> Self::IntoIter {
        self.params.into_iter()
    }
}
