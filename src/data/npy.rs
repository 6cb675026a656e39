// ============================================================
// Layer 4 — NPY Array I/O
// ============================================================
// Thin wrappers over ndarray-npy. Arrays written by numpy come
// in whatever dtype the producer used (uint8 images, int64 or
// uint8 label maps, float32/float64 scores), so readers try the
// common dtypes in turn and widen to the type we compute with.

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use ndarray::{ArrayD, Dimension};
use ndarray_npy::{read_npy, write_npy, ReadNpyError};

/// Read any float or 8-bit array as f32.
pub fn read_f32(path: &Path) -> Result<ArrayD<f32>> {
    let mut last = match read_npy::<_, ArrayD<f32>>(path) {
        Ok(a) => return Ok(a),
        Err(e) => e,
    };
    if is_type_mismatch(&last) {
        match read_npy::<_, ArrayD<f64>>(path) {
            Ok(a) => return Ok(a.mapv(|v| v as f32)),
            Err(e) => last = e,
        }
    }
    if is_type_mismatch(&last) {
        match read_npy::<_, ArrayD<u8>>(path) {
            Ok(a) => return Ok(a.mapv(f32::from)),
            Err(e) => last = e,
        }
    }
    Err(anyhow!("{last}")).with_context(|| format!("Cannot read float array '{}'", path.display()))
}

/// Read an integer label map of any common width as i64.
pub fn read_labels(path: &Path) -> Result<ArrayD<i64>> {
    let mut last = match read_npy::<_, ArrayD<i64>>(path) {
        Ok(a) => return Ok(a),
        Err(e) => e,
    };
    if is_type_mismatch(&last) {
        match read_npy::<_, ArrayD<u8>>(path) {
            Ok(a) => return Ok(a.mapv(i64::from)),
            Err(e) => last = e,
        }
    }
    if is_type_mismatch(&last) {
        match read_npy::<_, ArrayD<i32>>(path) {
            Ok(a) => return Ok(a.mapv(i64::from)),
            Err(e) => last = e,
        }
    }
    if is_type_mismatch(&last) {
        match read_npy::<_, ArrayD<u16>>(path) {
            Ok(a) => return Ok(a.mapv(i64::from)),
            Err(e) => last = e,
        }
    }
    Err(anyhow!("{last}")).with_context(|| format!("Cannot read label array '{}'", path.display()))
}

pub fn write_f32<D: Dimension>(path: &Path, array: &ndarray::Array<f32, D>) -> Result<()> {
    write_npy(path, array).with_context(|| format!("Cannot write '{}'", path.display()))
}

fn is_type_mismatch(err: &ReadNpyError) -> bool {
    matches!(err, ReadNpyError::WrongDescriptor(_))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array1};

    #[test]
    fn test_u8_labels_widen_to_i64() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("l.npy");
        write_npy(&path, &array![[0u8, 255], [3, 4]]).unwrap();

        let labels = read_labels(&path).unwrap();
        assert_eq!(labels.shape(), &[2, 2]);
        assert_eq!(labels.iter().copied().collect::<Vec<_>>(), vec![0, 255, 3, 4]);
    }

    #[test]
    fn test_f64_scores_narrow_to_f32() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.npy");
        write_npy(&path, &Array1::from(vec![0.5f64, 1.5])).unwrap();
        assert_eq!(read_f32(&path).unwrap().iter().copied().collect::<Vec<_>>(), vec![0.5, 1.5]);
    }

    #[test]
    fn test_missing_file_mentions_path() {
        let err = read_f32(Path::new("/nonexistent/x.npy")).unwrap_err();
        assert!(format!("{err:#}").contains("/nonexistent/x.npy"));
    }
}
