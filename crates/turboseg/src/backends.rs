//! Backend selection
//!
//! Enable one backend via feature flags:
//!
//! - `ndarray`: CPU backend (default, no GPU required)
//! - `tch`: libtorch backend (CUDA, MPS)
//! - `wgpu`: WebGPU backend
//! - `cuda`: native CUDA backend
//!
//! ```toml
//! [dependencies]
//! turboseg = { version = "0.1", default-features = false, features = ["wgpu"] }
//! ```

#[cfg(feature = "ndarray")]
pub use burn_ndarray::{NdArray, NdArrayDevice};

#[cfg(feature = "tch")]
pub use burn_tch::{LibTorch, LibTorchDevice};

#[cfg(feature = "wgpu")]
pub use burn_wgpu::{Wgpu, WgpuDevice};

#[cfg(feature = "cuda")]
pub use burn_cuda::{Cuda, CudaDevice};

#[cfg(feature = "ndarray")]
pub type DefaultBackend = NdArray;

#[cfg(all(feature = "tch", not(feature = "ndarray")))]
pub type DefaultBackend = LibTorch;

#[cfg(all(feature = "wgpu", not(any(feature = "ndarray", feature = "tch"))))]
pub type DefaultBackend = Wgpu;

#[cfg(all(
    feature = "cuda",
    not(any(feature = "ndarray", feature = "tch", feature = "wgpu"))
))]
pub type DefaultBackend = Cuda;

/// Device the pipeline runs on when the caller does not pick one
#[cfg(feature = "ndarray")]
pub fn default_device() -> NdArrayDevice {
    NdArrayDevice::default()
}

/// Device the pipeline runs on when the caller does not pick one
#[cfg(all(feature = "tch", not(feature = "ndarray")))]
pub fn default_device() -> LibTorchDevice {
    if burn_tch::is_cuda_available() {
        LibTorchDevice::Cuda(0)
    } else {
        LibTorchDevice::Cpu
    }
}

/// Device the pipeline runs on when the caller does not pick one
#[cfg(all(feature = "wgpu", not(any(feature = "ndarray", feature = "tch"))))]
pub fn default_device() -> WgpuDevice {
    WgpuDevice::default()
}

/// Device the pipeline runs on when the caller does not pick one
#[cfg(all(
    feature = "cuda",
    not(any(feature = "ndarray", feature = "tch", feature = "wgpu"))
))]
pub fn default_device() -> CudaDevice {
    CudaDevice::default()
}

#[cfg(all(test, feature = "ndarray"))]
mod tests {
    use super::*;
    use burn::prelude::*;

    #[test]
    fn test_default_backend_allocates_on_default_device() {
        let device = default_device();
        let t = Tensor::<DefaultBackend, 1>::zeros([3], &device);
        assert_eq!(t.dims(), [3]);
    }
}
