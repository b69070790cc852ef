/// Training infrastructure for the joint ensemble
pub mod artifacts;
pub mod checkpoint;
pub mod history;
pub mod observer;
pub mod trainer;

pub use artifacts::{ArtifactLayout, ArtifactWriter, RunSummary};
pub use checkpoint::{Checkpoint, CheckpointMetadata};
pub use history::{JointLosses, LossHistory};
pub use observer::{EpochSummary, LogObserver, NoopObserver, TrainingObserver};
pub use trainer::{EpochSplit, JointEnsemble, Trainer, TrainingOutcome, VALIDATION_FRACTION};
