/// Per-joint checkpoints with safetensors
use std::collections::HashMap;
use std::path::Path;

use candle_core::{Device, Tensor};
use safetensors::SafeTensors;

/// Key under which the JSON encoded metadata is stored in the safetensors header
const METADATA_KEY: &str = "joint_effort";

/// Checkpoint metadata
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CheckpointMetadata {
    /// Joint index (0-based)
    pub joint: usize,
    /// Epochs trained
    pub epochs: usize,
    /// Learning rate used
    pub learning_rate: f64,
    /// Mean training loss of the last epoch
    pub train_loss: Option<f64>,
    /// Mean validation loss of the last epoch
    pub val_loss: Option<f64>,
    /// Model configuration (as JSON string)
    pub config: Option<String>,
}

impl CheckpointMetadata {
    pub fn new(joint: usize) -> Self {
        Self {
            joint,
            epochs: 0,
            learning_rate: 0.0,
            train_loss: None,
            val_loss: None,
            config: None,
        }
    }
}

/// Model checkpoint
pub struct Checkpoint {
    /// Model parameters
    pub tensors: HashMap<String, Tensor>,
    /// Metadata
    pub metadata: CheckpointMetadata,
}

impl Checkpoint {
    /// Create new checkpoint
    pub fn new(tensors: HashMap<String, Tensor>, metadata: CheckpointMetadata) -> Self {
        Self { tensors, metadata }
    }

    /// Save checkpoint to file
    ///
    /// Tensors are copied to the host before serialization; the metadata is
    /// stored as JSON in the safetensors header.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> crate::Result<()> {
        let mut tensors = Vec::with_capacity(self.tensors.len());
        for (name, tensor) in &self.tensors {
            tensors.push((name.clone(), tensor.to_device(&Device::Cpu)?));
        }
        tensors.sort_by(|a, b| a.0.cmp(&b.0));

        let mut header = HashMap::new();
        header.insert(
            METADATA_KEY.to_string(),
            serde_json::to_string(&self.metadata)?,
        );

        safetensors::serialize_to_file(tensors, &Some(header), path.as_ref())?;
        Ok(())
    }

    /// Load checkpoint from file
    ///
    /// # Arguments
    /// * `path` - Path to checkpoint file
    /// * `device` - Device to load tensors on
    pub fn load<P: AsRef<Path>>(path: P, device: &Device) -> crate::Result<Self> {
        let data = std::fs::read(path.as_ref())?;

        let tensors = candle_core::safetensors::load_buffer(&data, device)?;

        let (_, header) = SafeTensors::read_metadata(&data)?;
        let metadata = header
            .metadata()
            .as_ref()
            .and_then(|m| m.get(METADATA_KEY))
            .ok_or_else(|| {
                crate::EffortError::Checkpoint(format!(
                    "{:?} has no `{}` metadata",
                    path.as_ref(),
                    METADATA_KEY
                ))
            })?;
        let metadata: CheckpointMetadata = serde_json::from_str(metadata)?;

        Ok(Self { tensors, metadata })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::DType;

    #[test]
    fn test_save_load_checkpoint() -> crate::Result<()> {
        let device = Device::Cpu;
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("network1.safetensors");

        let mut tensors = HashMap::new();
        tensors.insert(
            "head.weight".to_string(),
            Tensor::new(&[[0.5f32, -1.0, 2.0]], &device)?,
        );
        tensors.insert(
            "head.bias".to_string(),
            Tensor::zeros(1, DType::F32, &device)?,
        );

        let metadata = CheckpointMetadata {
            joint: 0,
            epochs: 5,
            learning_rate: 1e-3,
            train_loss: Some(0.25),
            val_loss: Some(0.5),
            config: None,
        };

        Checkpoint::new(tensors, metadata.clone()).save(&path)?;
        let loaded = Checkpoint::load(&path, &device)?;

        assert_eq!(loaded.metadata, metadata);
        assert_eq!(loaded.tensors.len(), 2);
        let weight = loaded.tensors["head.weight"].to_vec2::<f32>()?;
        assert_eq!(weight, vec![vec![0.5, -1.0, 2.0]]);
        Ok(())
    }

    #[test]
    fn test_missing_metadata_is_error() -> crate::Result<()> {
        let device = Device::Cpu;
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("plain.safetensors");

        let mut tensors = HashMap::new();
        tensors.insert("w".to_string(), Tensor::ones(2, DType::F32, &device)?);
        candle_core::safetensors::save(&tensors, &path)?;

        assert!(matches!(
            Checkpoint::load(&path, &device),
            Err(crate::EffortError::Checkpoint(_))
        ));
        Ok(())
    }
}
