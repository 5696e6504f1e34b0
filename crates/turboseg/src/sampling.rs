//! Seeded text-to-image sampling with feature capture

use std::ops::RangeInclusive;

use burn::prelude::*;
use image::RgbImage;
use tracing::debug;
use turboseg_core::{ConfigError, FeatureDictionary, SequencingError};
use turboseg_samplers::{
    seeded_randn, LegacyDdpmDiscretization, SeededNoise, SubstepConfig, SubstepSampler,
};

use crate::error::PipelineError;
use crate::model::{DiffusionModel, SampleFilter};

/// Step counts the turbo sampler accepts
pub const SUPPORTED_STEPS: RangeInclusive<usize> = 4..=4;

/// Holds the feature dictionary of the most recent denoiser evaluation
///
/// Each evaluation replaces the previous record, so after a sampling run
/// the tap holds the features of the final step only.
#[derive(Debug)]
pub struct FeatureTap<B: Backend> {
    latest: Option<FeatureDictionary<B>>,
}

impl<B: Backend> Default for FeatureTap<B> {
    fn default() -> Self {
        Self { latest: None }
    }
}

impl<B: Backend> FeatureTap<B> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, features: FeatureDictionary<B>) {
        self.latest = Some(features);
    }

    pub fn has_features(&self) -> bool {
        self.latest.is_some()
    }

    /// Take the recorded features, leaving the tap empty
    pub fn capture(&mut self) -> Result<FeatureDictionary<B>, SequencingError> {
        self.latest.take().ok_or(SequencingError::EmptyFeatureTap)
    }
}

/// Result of one sampling run: the image and the features that produced it
#[derive(Debug, Clone)]
pub struct SampleOutput<B: Backend> {
    pub image: RgbImage,
    pub features: FeatureDictionary<B>,
}

/// Seeded few-step sampler driving a [`DiffusionModel`]
#[derive(Debug, Clone)]
pub struct SeededSampler {
    sampler: SubstepSampler,
}

impl SeededSampler {
    /// Sampler for `steps` denoising iterations with the default turbo schedule
    pub fn new(steps: usize) -> Result<Self, ConfigError> {
        Self::with_config(SubstepConfig::default().with_steps(steps))
    }

    /// Fails with [`ConfigError::UnsupportedSteps`] unless the step count is
    /// in [`SUPPORTED_STEPS`]
    pub fn with_config(config: SubstepConfig) -> Result<Self, ConfigError> {
        let steps = config.n_sample_steps;
        if !SUPPORTED_STEPS.contains(&steps) {
            return Err(ConfigError::UnsupportedSteps {
                requested: steps,
                min: *SUPPORTED_STEPS.start(),
                max: *SUPPORTED_STEPS.end(),
            });
        }
        let sampler = SubstepSampler::new(config, &LegacyDdpmDiscretization::default())?;
        Ok(Self { sampler })
    }

    pub fn num_steps(&self) -> usize {
        self.sampler.num_steps()
    }

    /// Generate an image for `prompt`
    ///
    /// Identical `(prompt, seed, height, width)` on the same backend give an
    /// identical image. Size errors are reported before the model is called.
    /// `filter`, when given, screens the decoded image before it is
    /// converted to pixels.
    #[allow(clippy::too_many_arguments)]
    pub fn sample<B: Backend, M: DiffusionModel<B>>(
        &self,
        model: &M,
        filter: Option<&dyn SampleFilter<B>>,
        prompt: &str,
        seed: u64,
        height: usize,
        width: usize,
        device: &B::Device,
    ) -> Result<SampleOutput<B>, PipelineError> {
        let factor = model.downsample_factor();
        if height == 0 || width == 0 || height % factor != 0 || width % factor != 0 {
            return Err(ConfigError::ImageSize {
                height,
                width,
                factor,
            }
            .into());
        }

        let conditioning = model.condition(prompt, height, width);
        let shape = [1, model.latent_channels(), height / factor, width / factor];
        let mut latent = self
            .sampler
            .prepare_latent(seeded_randn::<B, 4>(shape, seed, device));
        let mut noise = SeededNoise::new(seed);
        let mut tap = FeatureTap::new();

        for step_idx in 0..self.sampler.num_steps() {
            let timestep = self.sampler.timestep(step_idx);
            let scalings = self.sampler.scalings(step_idx);
            debug!(
                step = step_idx,
                timestep,
                sigma = self.sampler.sigmas()[step_idx],
                "denoising step"
            );

            let t = Tensor::<B, 1>::from_floats([timestep as f32], device);
            let output = model.predict_noise(latent.clone() * scalings.c_in, t, &conditioning);
            tap.record(output.features);

            let denoised = self.sampler.denoise(latent.clone(), output.noise, step_idx);
            latent = self.sampler.step(latent, denoised, step_idx, &mut noise);
        }

        let features = tap.capture()?;
        let mut images = to_unit_range(model.decode(latent));
        if let Some(filter) = filter {
            images = filter.apply(images);
        }
        let image = unit_tensor_to_image(images, height, width)?;

        Ok(SampleOutput { image, features })
    }
}

/// Map decoder output from [-1, 1] to [0, 1]
pub fn to_unit_range<B: Backend>(tensor: Tensor<B, 4>) -> Tensor<B, 4> {
    ((tensor + 1.0) / 2.0).clamp(0.0, 1.0)
}

/// Convert a decoded [1, 3, H, W] tensor in [-1, 1] to an 8-bit RGB image
///
/// Values are mapped to `trunc(255 * clamp((x + 1) / 2, 0, 1))`.
pub fn tensor_to_image<B: Backend>(
    tensor: Tensor<B, 4>,
    height: usize,
    width: usize,
) -> Result<RgbImage, ConfigError> {
    unit_tensor_to_image(to_unit_range(tensor), height, width)
}

/// Convert a [1, 3, H, W] tensor in [0, 1] to an 8-bit RGB image, truncating
pub fn unit_tensor_to_image<B: Backend>(
    tensor: Tensor<B, 4>,
    height: usize,
    width: usize,
) -> Result<RgbImage, ConfigError> {
    let dims = tensor.dims();
    let shape_error = || ConfigError::DecodedShape {
        expected: vec![1, 3, height, width],
        actual: dims.to_vec(),
    };
    if dims != [1, 3, height, width] {
        return Err(shape_error());
    }

    let floats: Vec<f32> = tensor.into_data().iter::<f32>().collect();
    let plane = height * width;
    let mut rgb = Vec::with_capacity(plane * 3);
    for idx in 0..plane {
        for c in 0..3 {
            let v = floats[c * plane + idx].clamp(0.0, 1.0);
            rgb.push((v * 255.0) as u8);
        }
    }

    RgbImage::from_raw(width as u32, height as u32, rgb).ok_or_else(shape_error)
}
