/// Per-epoch mean losses
use crate::data::NUM_JOINTS;

/// Mean loss of each joint over one pass
pub type JointLosses = [f64; NUM_JOINTS];

/// Append-only record of per-epoch mean losses.
///
/// Row `e` of `train` and `validation` belongs to epoch `e + 1`.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LossHistory {
    train: Vec<JointLosses>,
    validation: Vec<JointLosses>,
}

impl LossHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one epoch
    pub fn push(&mut self, train: JointLosses, validation: JointLosses) {
        self.train.push(train);
        self.validation.push(validation);
    }

    /// Number of epochs recorded
    pub fn epochs(&self) -> usize {
        self.train.len()
    }

    pub fn train(&self) -> &[JointLosses] {
        &self.train
    }

    pub fn validation(&self) -> &[JointLosses] {
        &self.validation
    }

    pub fn final_train(&self) -> Option<&JointLosses> {
        self.train.last()
    }

    pub fn final_validation(&self) -> Option<&JointLosses> {
        self.validation.last()
    }

    /// Training loss curve of a single joint
    pub fn joint_train_curve(&self, joint: usize) -> Vec<f64> {
        self.train.iter().map(|row| row[joint]).collect()
    }

    /// Validation loss curve of a single joint
    pub fn joint_validation_curve(&self, joint: usize) -> Vec<f64> {
        self.validation.iter().map(|row| row[joint]).collect()
    }
}

/// Running per-joint loss sums over one pass
#[derive(Debug, Clone, Default)]
pub struct LossAccumulator {
    sums: [f64; NUM_JOINTS],
    rows: usize,
}

impl LossAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, losses: &[f32; NUM_JOINTS]) {
        for (sum, &loss) in self.sums.iter_mut().zip(losses.iter()) {
            *sum += f64::from(loss);
        }
        self.rows += 1;
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Per-joint means; NaN for a pass with no rows
    pub fn mean(&self) -> JointLosses {
        if self.rows == 0 {
            return [f64::NAN; NUM_JOINTS];
        }
        let n = self.rows as f64;
        self.sums.map(|sum| sum / n)
    }
}
