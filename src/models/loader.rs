/// Weight loading from safetensors checkpoints
use std::path::Path;

use crate::config::{ModelConfig, TrainingConfig};
use crate::device::ComputeContext;
use crate::training::checkpoint::{Checkpoint, CheckpointMetadata};
use super::JointModel;

/// Load a trained joint model from a checkpoint
///
/// # Arguments
/// * `model_config` - Network shape the checkpoint was trained with
/// * `training_config` - Optimizer settings for any further training
/// * `path` - Path to the safetensors file
/// * `context` - Device to load the model on
///
/// # Returns
/// The model and the metadata stored with it
pub fn load_model<P: AsRef<Path>>(
    model_config: &ModelConfig,
    training_config: &TrainingConfig,
    path: P,
    context: &ComputeContext,
) -> crate::Result<(JointModel, CheckpointMetadata)> {
    let checkpoint = Checkpoint::load(path.as_ref(), context.device())?;
    let metadata = checkpoint.metadata;

    let mut model =
        JointModel::with_seed(metadata.joint, model_config, training_config, context, 0)?;
    model.restore(&checkpoint.tensors)?;

    log::debug!(
        "Loaded joint {} from {:?} ({} epochs)",
        metadata.joint,
        path.as_ref(),
        metadata.epochs
    );

    Ok((model, metadata))
}
