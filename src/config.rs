/// Configuration for the joint networks, the training loop and the pipeline
use std::path::{Path, PathBuf};

use crate::data::FEATURE_DIM;

/// Shape of a single joint network.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Input width: 6 positions followed by 6 velocities
    pub input_size: usize,

    /// Width of every hidden layer
    pub hidden_size: usize,

    /// Number of hidden ReLU layers before the scalar head
    pub num_hidden_layers: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            input_size: FEATURE_DIM,
            hidden_size: 64,
            num_hidden_layers: 2,
        }
    }
}

impl ModelConfig {
    /// Validate configuration
    pub fn validate(&self) -> crate::Result<()> {
        if self.input_size != FEATURE_DIM {
            return Err(crate::EffortError::Config(format!(
                "input_size must be {}, got {}",
                FEATURE_DIM, self.input_size
            )));
        }

        if self.hidden_size == 0 {
            return Err(crate::EffortError::Config(
                "hidden_size must be > 0".to_string(),
            ));
        }

        if self.num_hidden_layers == 0 {
            return Err(crate::EffortError::Config(
                "num_hidden_layers must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Hyperparameters of a training run.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Number of epochs; every epoch reshuffles and re-splits the dataset
    pub epochs: usize,

    /// Adam learning rate shared by all six joints
    pub learning_rate: f64,

    /// First moment decay
    pub beta1: f64,

    /// Second moment decay
    pub beta2: f64,

    /// Denominator epsilon
    pub eps: f64,

    /// Seed for the per-epoch permutations (random when unset)
    pub shuffle_seed: Option<u64>,

    /// Seed for network initialization; joint j uses `init_seed + j`
    pub init_seed: Option<u64>,

    /// Stay on the host even when an accelerator is present
    pub force_cpu: bool,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: 5,
            learning_rate: 1e-3,
            beta1: 0.9,
            beta2: 0.999,
            eps: 1e-8,
            shuffle_seed: None,
            init_seed: None,
            force_cpu: false,
        }
    }
}

impl TrainingConfig {
    /// Validate configuration
    pub fn validate(&self) -> crate::Result<()> {
        if self.epochs == 0 {
            return Err(crate::EffortError::Config(
                "epochs must be > 0".to_string(),
            ));
        }

        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(crate::EffortError::Config(format!(
                "learning_rate must be a positive number, got {}",
                self.learning_rate
            )));
        }

        if !(0.0..1.0).contains(&self.beta1) || !(0.0..1.0).contains(&self.beta2) {
            return Err(crate::EffortError::Config(
                "beta1 and beta2 must lie in [0, 1)".to_string(),
            ));
        }

        Ok(())
    }
}

/// Everything the `train_joints` driver needs: input, cache and output locations
/// plus the nested model and training sections.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// JSON Lines telemetry log
    pub log_path: PathBuf,

    /// Channel substring selecting joint-state messages
    pub channel: String,

    /// Directory holding `data.csv` and `labels.csv`
    pub cache_dir: PathBuf,

    /// Destination of the per-joint checkpoints
    pub models_dir: PathBuf,

    /// Destination of the loss tables and run summary
    pub results_dir: PathBuf,

    pub model: ModelConfig,

    pub training: TrainingConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            log_path: PathBuf::from("joint_states.jsonl"),
            channel: "state_joint_current".to_string(),
            cache_dir: PathBuf::from("."),
            models_dir: PathBuf::from("../models"),
            results_dir: PathBuf::from("../train_results"),
            model: ModelConfig::default(),
            training: TrainingConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Load from a JSON file; missing fields take their defaults
    pub fn from_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let file = std::fs::File::open(path.as_ref())?;
        let config: Self = serde_json::from_reader(std::io::BufReader::new(file))?;
        Ok(config)
    }

    pub fn validate(&self) -> crate::Result<()> {
        if self.channel.is_empty() {
            return Err(crate::EffortError::Config(
                "channel must not be empty".to_string(),
            ));
        }
        self.model.validate()?;
        self.training.validate()
    }
}
