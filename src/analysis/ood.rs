// ============================================================
// OOD Aggregator
// ============================================================
// For each frame:
//
//   label[i]  ──► domain_map[label[i]]  ──► 0 = in, 1 = out
//   nll[i], entropy[i]  appended to the matching side
//
// After the last frame the four growing collections are the
// flat sequences the scatter plot consumes. Frames are
// independent; the only state is the four vectors.

use crate::domain::error::FrameError;
use crate::domain::frame_record::FrameRecord;

// ─── DomainMap ────────────────────────────────────────────────────────────────
/// Class id → out-of-distribution flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainMap {
    out: Vec<bool>,
}

impl DomainMap {
    /// Mark every class whose name appears in `out_classes`.
    ///
    /// Names that match no class are reported and otherwise ignored.
    pub fn from_names<S: AsRef<str>>(class_names: &[&str], out_classes: &[S]) -> Self {
        for name in out_classes {
            if !class_names.contains(&name.as_ref()) {
                tracing::warn!("OOD class '{}' is not a known class name", name.as_ref());
            }
        }
        let out_ids: Vec<usize> = class_names
            .iter()
            .enumerate()
            .filter(|(_, class)| out_classes.iter().any(|o| o.as_ref() == **class))
            .map(|(c, _)| c)
            .collect();
        Self::from_ids(class_names.len(), &out_ids)
    }

    pub fn from_ids(num_classes: usize, out_ids: &[usize]) -> Self {
        Self { out: (0..num_classes).map(|c| out_ids.contains(&c)).collect() }
    }

    pub fn num_classes(&self) -> usize {
        self.out.len()
    }

    /// None if `label` has no entry.
    pub fn is_out(&self, label: i64) -> Option<bool> {
        usize::try_from(label).ok().and_then(|l| self.out.get(l).copied())
    }

    pub fn out_ids(&self) -> Vec<usize> {
        self.out.iter().enumerate().filter(|&(_, &o)| o).map(|(c, _)| c).collect()
    }
}

// ─── OodPartition ─────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OodPartition {
    pub in_nll:      Vec<f32>,
    pub out_nll:     Vec<f32>,
    pub in_entropy:  Vec<f32>,
    pub out_entropy: Vec<f32>,
}

impl OodPartition {
    pub fn in_count(&self) -> usize {
        self.in_nll.len()
    }

    pub fn out_count(&self) -> usize {
        self.out_nll.len()
    }
}

/// Mean of `values`, NaN when empty.
pub fn mean(values: &[f32]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().map(|&v| v as f64).sum::<f64>() / values.len() as f64
}

// ─── OodAggregator ────────────────────────────────────────────────────────────
pub struct OodAggregator {
    map:    DomainMap,
    parts:  OodPartition,
    frames: usize,
}

impl OodAggregator {
    pub fn new(map: DomainMap) -> Self {
        Self { map, parts: OodPartition::default(), frames: 0 }
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Partition one frame. A frame with an unmapped label adds nothing.
    pub fn add_frame(&mut self, frame: &FrameRecord) -> Result<(), FrameError> {
        let mut sides = Vec::with_capacity(frame.label.len());
        for &label in frame.label.iter() {
            let out = self.map.is_out(label).ok_or_else(|| FrameError::UnknownLabel {
                frame: frame.id.clone(),
                label,
                size:  self.map.num_classes(),
            })?;
            sides.push(out);
        }

        // Shapes were checked when the record was built, so the three
        // iterators walk the same pixels in the same order.
        for ((&out, &nll), &entropy) in sides.iter().zip(frame.nll.iter()).zip(frame.entropy.iter()) {
            if out {
                self.parts.out_nll.push(nll);
                self.parts.out_entropy.push(entropy);
            } else {
                self.parts.in_nll.push(nll);
                self.parts.in_entropy.push(entropy);
            }
        }
        self.frames += 1;
        Ok(())
    }

    pub fn finish(self) -> OodPartition {
        self.parts
    }
}
