/// Training loop for the six joint models
use std::time::Instant;

use candle_core::Tensor;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::config::{ModelConfig, TrainingConfig};
use crate::data::{Dataset, FEATURE_DIM, LABEL_DIM, NUM_JOINTS};
use crate::device::ComputeContext;
use crate::models::JointModel;
use super::history::{LossAccumulator, LossHistory};
use super::observer::{EpochSummary, TrainingObserver};

/// Share of every epoch's permutation held out for validation
pub const VALIDATION_FRACTION: f64 = 0.2;

/// Validation rows for a dataset of `n` samples: ⌊0.2·n⌋
pub fn validation_len(n: usize) -> usize {
    (VALIDATION_FRACTION * n as f64).floor() as usize
}

/// One epoch's partition of the sample indices.
///
/// The first ⌊0.2·n⌋ entries of a fresh permutation are validation, the rest
/// training.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpochSplit {
    permutation: Vec<usize>,
    split: usize,
}

impl EpochSplit {
    /// Draw a uniformly random permutation of `0..n` and split it
    pub fn draw<R: Rng + ?Sized>(n: usize, rng: &mut R) -> Self {
        let mut permutation: Vec<usize> = (0..n).collect();
        permutation.shuffle(rng);
        Self::from_permutation(permutation)
    }

    pub fn from_permutation(permutation: Vec<usize>) -> Self {
        let split = validation_len(permutation.len());
        Self { permutation, split }
    }

    pub fn permutation(&self) -> &[usize] {
        &self.permutation
    }

    pub fn validation(&self) -> &[usize] {
        &self.permutation[..self.split]
    }

    pub fn training(&self) -> &[usize] {
        &self.permutation[self.split..]
    }
}

/// The six joint models, indexed by joint.
pub struct JointEnsemble {
    models: [JointModel; NUM_JOINTS],
}

impl JointEnsemble {
    /// Build one freshly initialized model per joint
    pub fn new(
        model_config: &ModelConfig,
        training_config: &TrainingConfig,
        context: &ComputeContext,
    ) -> crate::Result<Self> {
        let models = (0..NUM_JOINTS)
            .map(|joint| JointModel::new(joint, model_config, training_config, context))
            .collect::<crate::Result<Vec<_>>>()?;
        Self::from_models(models)
    }

    /// Wrap existing models; model `j` must be the one for joint `j`
    pub fn from_models(models: Vec<JointModel>) -> crate::Result<Self> {
        if let Some((idx, model)) = models.iter().enumerate().find(|(i, m)| m.joint() != *i) {
            return Err(crate::EffortError::Model(format!(
                "model at position {} is for joint {}",
                idx,
                model.joint()
            )));
        }
        let models: [JointModel; NUM_JOINTS] = models.try_into().map_err(|models: Vec<_>| {
            crate::EffortError::ShapeMismatch(format!(
                "expected {} joint models, got {}",
                NUM_JOINTS,
                models.len()
            ))
        })?;
        Ok(Self { models })
    }

    pub fn get(&self, joint: usize) -> Option<&JointModel> {
        self.models.get(joint)
    }

    pub fn iter(&self) -> impl Iterator<Item = &JointModel> {
        self.models.iter()
    }

    /// Train every joint on one row. Each joint backpropagates only its own
    /// loss through its own parameters.
    fn train_row(
        &mut self,
        features: &Tensor,
        labels: &Tensor,
    ) -> candle_core::Result<[f32; NUM_JOINTS]> {
        let mut losses = [0f32; NUM_JOINTS];
        for (joint, model) in self.models.iter_mut().enumerate() {
            let target = labels.narrow(1, joint, 1)?;
            losses[joint] = model.train_step(features, &target)?;
        }
        Ok(losses)
    }

    fn evaluate_row(
        &self,
        features: &Tensor,
        labels: &Tensor,
    ) -> candle_core::Result<[f32; NUM_JOINTS]> {
        let mut losses = [0f32; NUM_JOINTS];
        for (joint, model) in self.models.iter().enumerate() {
            let target = labels.narrow(1, joint, 1)?;
            losses[joint] = model.evaluate(features, &target)?;
        }
        Ok(losses)
    }
}

/// Trained models plus their loss history
pub struct TrainingOutcome {
    pub models: JointEnsemble,
    pub history: LossHistory,
}

/// Trainer for the joint ensemble
pub struct Trainer {
    models: JointEnsemble,
    config: TrainingConfig,
    context: ComputeContext,
}

impl Trainer {
    /// Create new trainer with freshly initialized models
    pub fn new(
        model_config: &ModelConfig,
        training_config: TrainingConfig,
        context: ComputeContext,
    ) -> crate::Result<Self> {
        training_config.validate()?;
        let models = JointEnsemble::new(model_config, &training_config, &context)?;
        Ok(Self::with_models(models, training_config, context))
    }

    /// Create a trainer around pre-built models
    pub fn with_models(
        models: JointEnsemble,
        training_config: TrainingConfig,
        context: ComputeContext,
    ) -> Self {
        Self {
            models,
            config: training_config,
            context,
        }
    }

    /// Run all epochs over `dataset`.
    ///
    /// Each epoch draws a new permutation, holds out the first ⌊0.2·N⌋ rows
    /// for validation and trains on the rest one sample at a time.
    pub fn train(
        mut self,
        dataset: &Dataset,
        observer: &mut dyn TrainingObserver,
    ) -> crate::Result<TrainingOutcome> {
        self.config.validate()?;
        if dataset.is_empty() {
            return Err(crate::EffortError::EmptyDataset);
        }

        let (features, labels) = dataset.to_tensors(self.context.device())?;
        check_shapes(&features, &labels)?;

        let n = dataset.len();
        let mut rng = match self.config.shuffle_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut history = LossHistory::new();

        log::info!(
            "Training {} joints on {} samples for {} epochs (lr={}, device={})",
            NUM_JOINTS,
            n,
            self.config.epochs,
            self.config.learning_rate,
            self.context.describe()
        );
        observer.on_run_start(n, self.config.epochs);

        for epoch in 1..=self.config.epochs {
            let started = Instant::now();
            let split = EpochSplit::draw(n, &mut rng);

            // Permute features and labels with the same indices
            let order: Vec<u32> = split.permutation().iter().map(|&i| i as u32).collect();
            let order = Tensor::from_vec(order, n, self.context.device())?;
            let features_epoch = features.index_select(&order, 0)?;
            let labels_epoch = labels.index_select(&order, 0)?;

            let val_rows = split.validation().len();
            let train_rows = split.training().len();

            let mut train_acc = LossAccumulator::new();
            for row in 0..train_rows {
                let idx = val_rows + row;
                let x = features_epoch.narrow(0, idx, 1)?;
                let y = labels_epoch.narrow(0, idx, 1)?;

                let losses = self.models.train_row(&x, &y)?;
                train_acc.add(&losses);
                observer.on_row(epoch, row, train_rows, &losses);
            }

            let mut val_acc = LossAccumulator::new();
            for idx in 0..val_rows {
                let x = features_epoch.narrow(0, idx, 1)?;
                let y = labels_epoch.narrow(0, idx, 1)?;
                val_acc.add(&self.models.evaluate_row(&x, &y)?);
            }

            let summary = EpochSummary {
                epoch,
                total_epochs: self.config.epochs,
                train_rows,
                val_rows,
                train_loss: train_acc.mean(),
                val_loss: val_acc.mean(),
                elapsed: started.elapsed(),
            };
            history.push(summary.train_loss, summary.val_loss);
            observer.on_epoch_end(&summary);
        }

        observer.on_run_end();

        Ok(TrainingOutcome {
            models: self.models,
            history,
        })
    }
}

fn check_shapes(features: &Tensor, labels: &Tensor) -> crate::Result<()> {
    let (feature_rows, feature_cols) = features.dims2()?;
    let (label_rows, label_cols) = labels.dims2()?;
    if feature_cols != FEATURE_DIM || label_cols != LABEL_DIM || feature_rows != label_rows {
        return Err(crate::EffortError::ShapeMismatch(format!(
            "features {:?} / labels {:?}, expected [N, {}] / [N, {}]",
            features.dims(),
            labels.dims(),
            FEATURE_DIM,
            LABEL_DIM
        )));
    }
    Ok(())
}
