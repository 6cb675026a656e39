// ============================================================
// Layer 4 — OOD Frame Reader
// ============================================================
// An external inference stage leaves three arrays per frame in
// one directory:
//
//   <frame>_label.npy     ground-truth class per pixel
//   <frame>_nll.npy       negative log-likelihood per pixel
//   <frame>_entropy.npy   softmax entropy per pixel
//
// Frames are discovered through their label file and read one
// at a time, so memory stays bounded by a single frame.

use anyhow::{Context, Result};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::data::npy;
use crate::domain::frame_record::FrameRecord;

pub const LABEL_SUFFIX: &str   = "_label.npy";
pub const NLL_SUFFIX: &str     = "_nll.npy";
pub const ENTROPY_SUFFIX: &str = "_entropy.npy";

pub struct FrameDirectory {
    dir: PathBuf,
}

impl FrameDirectory {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Frame ids present in the directory, sorted.
    pub fn frame_ids(&self) -> Result<Vec<String>> {
        let mut ids: Vec<String> = fs::read_dir(&self.dir)
            .with_context(|| format!("Cannot read frame directory '{}'", self.dir.display()))?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let name = entry.file_name().to_string_lossy().into_owned();
                name.strip_suffix(LABEL_SUFFIX).map(str::to_string)
            })
            .collect();
        ids.sort();
        Ok(ids)
    }

    pub fn read(&self, id: &str) -> Result<FrameRecord> {
        let label   = npy::read_labels(&self.dir.join(format!("{id}{LABEL_SUFFIX}")))?;
        let nll     = npy::read_f32(&self.dir.join(format!("{id}{NLL_SUFFIX}")))?;
        let entropy = npy::read_f32(&self.dir.join(format!("{id}{ENTROPY_SUFFIX}")))?;
        Ok(FrameRecord::new(id, label, nll, entropy)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use ndarray_npy::write_npy;

    #[test]
    fn test_frames_are_discovered_by_label_file() {
        let tmp = tempfile::tempdir().unwrap();
        for id in ["f2", "f1"] {
            write_npy(tmp.path().join(format!("{id}_label.npy")), &array![[0u8, 2]]).unwrap();
            write_npy(tmp.path().join(format!("{id}_nll.npy")), &array![[1.0f32, 2.0]]).unwrap();
            write_npy(tmp.path().join(format!("{id}_entropy.npy")), &array![[0.1f32, 0.2]]).unwrap();
        }
        // Outputs of a previous aggregation must not look like frames
        write_npy(tmp.path().join("in_nll.npy"), &array![1.0f32]).unwrap();

        let frames = FrameDirectory::new(tmp.path());
        assert_eq!(frames.frame_ids().unwrap(), vec!["f1", "f2"]);

        let record = frames.read("f1").unwrap();
        assert_eq!(record.label.iter().copied().collect::<Vec<_>>(), vec![0, 2]);
        assert_eq!(record.nll.shape(), &[1, 2]);
    }

    #[test]
    fn test_missing_entropy_file_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        write_npy(tmp.path().join("x_label.npy"), &array![0u8]).unwrap();
        write_npy(tmp.path().join("x_nll.npy"), &array![0.0f32]).unwrap();
        assert!(FrameDirectory::new(tmp.path()).read("x").is_err());
    }
}
