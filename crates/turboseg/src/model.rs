//! Diffusion backbone contract and the loaded-model context

use std::path::Path;

use burn::prelude::*;
use tracing::info;
use turboseg_convert::load_fusion_head;
use turboseg_core::{Conditioning, FeatureDictionary};
use turboseg_head::{FusionHead, FusionHeadConfig};

use crate::error::PipelineError;

/// Output of one denoiser evaluation
///
/// The network returns its intermediate activations alongside the noise
/// prediction, so the features are tied to the evaluation that produced
/// them.
#[derive(Debug, Clone)]
pub struct DenoiserOutput<B: Backend> {
    /// Predicted noise, same shape as the latent
    pub noise: Tensor<B, 4>,
    /// Named intermediate activations of this evaluation
    pub features: FeatureDictionary<B>,
}

/// A pretrained latent diffusion backbone
///
/// Implementations must be deterministic for fixed inputs.
pub trait DiffusionModel<B: Backend> {
    /// Channels of the latent the denoiser operates on
    fn latent_channels(&self) -> usize {
        4
    }

    /// Spatial factor between image pixels and latent cells
    fn downsample_factor(&self) -> usize {
        8
    }

    /// Encode text into conditioning for an image of `height` x `width`
    ///
    /// The size feeds the pooled vector (original size, crop and target
    /// size embeddings on SDXL-style backbones).
    fn condition(&self, text: &str, height: usize, width: usize) -> Conditioning<B>;

    /// Predict noise for `latent` (already scaled by `c_in`) at `timestep`
    fn predict_noise(
        &self,
        latent: Tensor<B, 4>,
        timestep: Tensor<B, 1>,
        conditioning: &Conditioning<B>,
    ) -> DenoiserOutput<B>;

    /// Decode a latent to an image tensor [1, 3, H, W] with values in [-1, 1]
    fn decode(&self, latent: Tensor<B, 4>) -> Tensor<B, 4>;
}

/// Post-decode image filter (safety or watermark screening)
///
/// Receives the decoded images mapped to [0, 1] and returns images of the
/// same shape; values are clamped to [0, 1] again afterwards.
pub trait SampleFilter<B: Backend> {
    fn apply(&self, images: Tensor<B, 4>) -> Tensor<B, 4>;
}

/// Backbone, segmentation head, optional sample filter and device
///
/// Loaded once and shared by all runs.
pub struct ModelContext<B: Backend, M, H> {
    model: M,
    head: H,
    filter: Option<Box<dyn SampleFilter<B> + Send>>,
    device: B::Device,
}

impl<B: Backend, M, H> ModelContext<B, M, H> {
    pub fn new(model: M, head: H, device: B::Device) -> Self {
        Self {
            model,
            head,
            filter: None,
            device,
        }
    }

    /// Run `filter` on every decoded sample before pixel conversion
    pub fn with_filter(mut self, filter: impl SampleFilter<B> + Send + 'static) -> Self {
        self.filter = Some(Box::new(filter));
        self
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn head(&self) -> &H {
        &self.head
    }

    pub fn filter(&self) -> Option<&dyn SampleFilter<B>> {
        self.filter
            .as_deref()
            .map(|filter| filter as &dyn SampleFilter<B>)
    }

    pub fn device(&self) -> &B::Device {
        &self.device
    }
}

impl<B: Backend, M: DiffusionModel<B>> ModelContext<B, M, FusionHead<B>> {
    /// Load a fusion head checkpoint and pair it with `model`
    ///
    /// Fails at startup if the checkpoint is missing or does not match
    /// `head_config`.
    pub fn with_head_checkpoint(
        model: M,
        head_path: impl AsRef<Path>,
        head_config: &FusionHeadConfig,
        device: B::Device,
    ) -> Result<Self, PipelineError> {
        let head = load_fusion_head::<B>(head_path, head_config, &device)?;
        info!(
            layers = head_config.signature.len(),
            embed_dim = head_config.embed_dim,
            "model context ready"
        );
        Ok(Self::new(model, head, device))
    }
}
