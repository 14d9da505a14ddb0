use candle_core::Device;
use once_cell::sync::Lazy;
use tracing::{info, warn};

/// Process-wide default device: CUDA 0 when available, CPU otherwise.
pub static DEVICE: Lazy<Device> = Lazy::new(|| match Device::new_cuda(0) {
    Ok(device) => {
        info!("initialized CUDA device");
        device
    }
    Err(err_cuda) => {
        warn!(error = %err_cuda, "failed to initialize CUDA device, falling back to CPU");
        Device::Cpu
    }
});
