//! Joint effort regression from robot telemetry
//!
//! Turns a logged stream of joint-state messages into a supervised dataset
//! and trains six independent regressors, one per joint, that predict the
//! commanded effort of that joint from the full kinematic state
//! (6 positions followed by 6 velocities).
//!
//! # Pipeline
//!
//! - **data**: telemetry log parsing plus a CSV cache so repeated runs skip parsing
//! - **models**: the per-joint network and its optimizer state
//! - **training**: the epoch loop, loss history, checkpoints and artifact output
//!
//! # Example
//!
//! ```ignore
//! use joint_effort::{data, ComputeContext, ModelConfig, TrainingConfig};
//! use joint_effort::training::{LogObserver, Trainer};
//!
//! let cache = data::TelemetryCache::new(".");
//! let dataset = data::load_or_parse("run.jsonl", "state_joint_current", &cache)?;
//! let context = ComputeContext::detect(false)?;
//! let trainer = Trainer::new(&ModelConfig::default(), TrainingConfig::default(), context)?;
//! let outcome = trainer.train(&dataset, &mut LogObserver::default())?;
//! ```

pub mod config;
pub mod data;
pub mod device;
pub mod models;
pub mod training;

use std::path::PathBuf;

// Re-export commonly used items
pub use config::{ModelConfig, PipelineConfig, TrainingConfig};
pub use data::Dataset;
pub use device::ComputeContext;
pub use models::JointModel;

/// Library error types
#[derive(Debug, thiserror::Error)]
pub enum EffortError {
    #[error("Candle error: {0}")]
    Candle(#[from] candle_core::Error),

    #[error("Malformed message at line {line}: {reason}")]
    MalformedMessage { line: usize, reason: String },

    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("Directory does not exist: {}", .0.display())]
    MissingDirectory(PathBuf),

    #[error("Dataset is empty")]
    EmptyDataset,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    #[error("Model error: {0}")]
    Model(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Safetensors error: {0}")]
    Safetensors(#[from] safetensors::SafeTensorError),
}

pub type Result<T> = std::result::Result<T, EffortError>;
