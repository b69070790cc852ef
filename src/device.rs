/// Compute placement, chosen once per run
use candle_core::Device;

/// The device every tensor of a run lives on.
///
/// Selected at run start and threaded through model construction and dataset
/// upload; nothing inside the training loop inspects device availability.
#[derive(Debug, Clone)]
pub struct ComputeContext {
    device: Device,
}

impl ComputeContext {
    /// Use CUDA device 0 when available (and not `force_cpu`), otherwise the host
    pub fn detect(force_cpu: bool) -> crate::Result<Self> {
        let device = if !force_cpu && candle_core::utils::cuda_is_available() {
            Device::new_cuda(0)?
        } else {
            Device::Cpu
        };
        log::info!("Using device: {:?}", device);
        Ok(Self { device })
    }

    pub fn cpu() -> Self {
        Self { device: Device::Cpu }
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn is_accelerated(&self) -> bool {
        !self.device.is_cpu()
    }

    /// Short name for logs and the run summary
    pub fn describe(&self) -> &'static str {
        if self.device.is_cuda() {
            "cuda"
        } else if self.device.is_metal() {
            "metal"
        } else {
            "cpu"
        }
    }
}

impl Default for ComputeContext {
    fn default() -> Self {
        Self::cpu()
    }
}
