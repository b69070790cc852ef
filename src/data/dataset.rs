/// Row-aligned feature/label tables
use candle_core::{Device, Tensor};
use ndarray::{Array2, ArrayView1};

use super::{FEATURE_DIM, LABEL_DIM};

/// Samples extracted from telemetry.
///
/// Row `i` of `features` (12 values: positions then velocities) is paired with
/// row `i` of `labels` (6 efforts). Both tables always have the same number of
/// rows.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    features: Array2<f64>,  // [N, 12]
    labels: Array2<f64>,    // [N, 6]
}

impl Dataset {
    /// Build from two tables, checking widths and row alignment
    pub fn new(features: Array2<f64>, labels: Array2<f64>) -> crate::Result<Self> {
        if features.ncols() != FEATURE_DIM || labels.ncols() != LABEL_DIM {
            return Err(crate::EffortError::ShapeMismatch(format!(
                "expected features [N, {}] and labels [N, {}], got {:?} and {:?}",
                FEATURE_DIM,
                LABEL_DIM,
                features.shape(),
                labels.shape()
            )));
        }

        if features.nrows() != labels.nrows() {
            return Err(crate::EffortError::ShapeMismatch(format!(
                "features have {} rows but labels have {}",
                features.nrows(),
                labels.nrows()
            )));
        }

        Ok(Self { features, labels })
    }

    /// Build from flat row-major buffers as produced by the parser
    pub fn from_flat(features: Vec<f64>, labels: Vec<f64>) -> crate::Result<Self> {
        let rows = labels.len() / LABEL_DIM;
        let features = Array2::from_shape_vec((features.len() / FEATURE_DIM, FEATURE_DIM), features)
            .map_err(|e| crate::EffortError::ShapeMismatch(e.to_string()))?;
        let labels = Array2::from_shape_vec((rows, LABEL_DIM), labels)
            .map_err(|e| crate::EffortError::ShapeMismatch(e.to_string()))?;
        Self::new(features, labels)
    }

    pub fn empty() -> Self {
        Self {
            features: Array2::zeros((0, FEATURE_DIM)),
            labels: Array2::zeros((0, LABEL_DIM)),
        }
    }

    /// Get number of samples
    pub fn len(&self) -> usize {
        self.features.nrows()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.features.nrows() == 0
    }

    pub fn features(&self) -> &Array2<f64> {
        &self.features
    }

    pub fn labels(&self) -> &Array2<f64> {
        &self.labels
    }

    /// Get feature row at index
    pub fn feature_row(&self, idx: usize) -> ArrayView1<f64> {
        self.features.row(idx)
    }

    /// Get label row at index
    pub fn label_row(&self, idx: usize) -> ArrayView1<f64> {
        self.labels.row(idx)
    }

    /// Upload both tables to `device` as F32 tensors `([N, 12], [N, 6])`
    pub fn to_tensors(&self, device: &Device) -> candle_core::Result<(Tensor, Tensor)> {
        let n = self.len();

        let features: Vec<f32> = self.features.iter().map(|&x| x as f32).collect();
        let labels: Vec<f32> = self.labels.iter().map(|&x| x as f32).collect();

        let features = Tensor::from_vec(features, (n, FEATURE_DIM), device)?;
        let labels = Tensor::from_vec(labels, (n, LABEL_DIM), device)?;

        Ok((features, labels))
    }
}
