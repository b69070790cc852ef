/// Persistence of trained models and loss tables
use std::path::{Path, PathBuf};

use crate::config::{ModelConfig, TrainingConfig};
use crate::data::{table, NUM_JOINTS};
use crate::device::ComputeContext;
use crate::models::loader::load_model;
use super::checkpoint::CheckpointMetadata;
use super::history::{JointLosses, LossHistory};
use super::trainer::JointEnsemble;

pub const TRAIN_LOSS_FILE: &str = "avg_train_loss.csv";
pub const VAL_LOSS_FILE: &str = "avg_val_loss.csv";
pub const SUMMARY_FILE: &str = "run_summary.json";

/// Checkpoint file of `joint` (0-based); files are numbered from 1
pub fn checkpoint_file_name(joint: usize) -> String {
    format!("network{}.safetensors", joint + 1)
}

/// Where a run's outputs go
#[derive(Debug, Clone, PartialEq)]
pub struct ArtifactLayout {
    pub models_dir: PathBuf,
    pub results_dir: PathBuf,
}

impl ArtifactLayout {
    pub fn new<P: AsRef<Path>, Q: AsRef<Path>>(models_dir: P, results_dir: Q) -> Self {
        Self {
            models_dir: models_dir.as_ref().to_path_buf(),
            results_dir: results_dir.as_ref().to_path_buf(),
        }
    }

    /// Models and loss tables in the same directory
    pub fn single<P: AsRef<Path>>(dir: P) -> Self {
        Self::new(dir.as_ref(), dir.as_ref())
    }

    pub fn checkpoint_path(&self, joint: usize) -> PathBuf {
        self.models_dir.join(checkpoint_file_name(joint))
    }

    pub fn train_loss_path(&self) -> PathBuf {
        self.results_dir.join(TRAIN_LOSS_FILE)
    }

    pub fn val_loss_path(&self) -> PathBuf {
        self.results_dir.join(VAL_LOSS_FILE)
    }

    pub fn summary_path(&self) -> PathBuf {
        self.results_dir.join(SUMMARY_FILE)
    }

    /// Both directories must already exist; nothing is created
    fn ensure_exists(&self) -> crate::Result<()> {
        for dir in [&self.models_dir, &self.results_dir] {
            if !dir.is_dir() {
                return Err(crate::EffortError::MissingDirectory(dir.clone()));
            }
        }
        Ok(())
    }
}

/// Summary of a finished run, written next to the loss tables
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RunSummary {
    pub samples: usize,
    pub epochs: usize,
    pub learning_rate: f64,
    pub device: String,
    pub model: ModelConfig,
    pub final_train_loss: Option<JointLosses>,
    pub final_val_loss: Option<JointLosses>,
}

impl RunSummary {
    pub fn new(
        samples: usize,
        model: &ModelConfig,
        training: &TrainingConfig,
        context: &ComputeContext,
        history: &LossHistory,
    ) -> Self {
        Self {
            samples,
            epochs: history.epochs(),
            learning_rate: training.learning_rate,
            device: context.describe().to_string(),
            model: model.clone(),
            final_train_loss: history.final_train().copied(),
            final_val_loss: history.final_validation().copied(),
        }
    }
}

/// Writes checkpoints and loss tables of a finished run.
#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    layout: ArtifactLayout,
}

impl ArtifactWriter {
    pub fn new(layout: ArtifactLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &ArtifactLayout {
        &self.layout
    }

    /// Save `network{1..6}.safetensors` and both loss tables.
    ///
    /// Fails with `MissingDirectory` before writing anything when an output
    /// directory is absent.
    pub fn save(&self, models: &JointEnsemble, history: &LossHistory) -> crate::Result<()> {
        self.layout.ensure_exists()?;

        log::info!("Saving loss history to {:?}", self.layout.results_dir);
        table::write_rows(
            self.layout.train_loss_path(),
            history.train().iter().map(|row| row.as_slice()),
        )?;
        table::write_rows(
            self.layout.val_loss_path(),
            history.validation().iter().map(|row| row.as_slice()),
        )?;

        log::info!("Saving models to {:?}", self.layout.models_dir);
        for model in models.iter() {
            let joint = model.joint();
            let metadata = CheckpointMetadata {
                joint,
                epochs: history.epochs(),
                learning_rate: model.learning_rate(),
                train_loss: history.final_train().map(|l| l[joint]),
                val_loss: history.final_validation().map(|l| l[joint]),
                config: Some(serde_json::to_string(model.config())?),
            };
            model.save_checkpoint(self.layout.checkpoint_path(joint), metadata)?;
        }

        Ok(())
    }

    /// Write `run_summary.json`
    pub fn write_summary(&self, summary: &RunSummary) -> crate::Result<()> {
        self.layout.ensure_exists()?;
        let file = std::fs::File::create(self.layout.summary_path())?;
        serde_json::to_writer_pretty(std::io::BufWriter::new(file), summary)?;
        Ok(())
    }
}

/// Read a loss table written by [`ArtifactWriter::save`]
pub fn read_loss_table<P: AsRef<Path>>(path: P) -> crate::Result<Vec<JointLosses>> {
    let table = table::read_array(path.as_ref(), NUM_JOINTS)?.ok_or_else(|| {
        crate::EffortError::ShapeMismatch(format!(
            "{:?} is not a {}-column table",
            path.as_ref(),
            NUM_JOINTS
        ))
    })?;

    Ok(table
        .rows()
        .into_iter()
        .map(|row| {
            let mut losses = [0.0; NUM_JOINTS];
            for (dst, src) in losses.iter_mut().zip(row.iter()) {
                *dst = *src;
            }
            losses
        })
        .collect())
}

/// Reload the six checkpoints of a run
pub fn load_ensemble(
    layout: &ArtifactLayout,
    model_config: &ModelConfig,
    training_config: &TrainingConfig,
    context: &ComputeContext,
) -> crate::Result<JointEnsemble> {
    let mut models = Vec::with_capacity(NUM_JOINTS);
    for joint in 0..NUM_JOINTS {
        let path = layout.checkpoint_path(joint);
        let (model, metadata) = load_model(model_config, training_config, &path, context)?;
        if metadata.joint != joint {
            return Err(crate::EffortError::Checkpoint(format!(
                "{:?} holds joint {}, expected {}",
                path, metadata.joint, joint
            )));
        }
        models.push(model);
    }
    JointEnsemble::from_models(models)
}
