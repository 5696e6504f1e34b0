//! Text-to-image-plus-mask orchestration

use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use burn::prelude::*;
use image::RgbImage;
use serde::{Deserialize, Serialize};
use tracing::info;
use turboseg_core::SequencingError;
use turboseg_head::SegmentationHead;

use crate::compositor::{BinaryMask, MaskCompositor};
use crate::condition::ConditionEncoder;
use crate::error::PipelineError;
use crate::model::{DiffusionModel, ModelContext};
use crate::output::{save_png, SaveConfig};
use crate::sampling::{SeededSampler, SUPPORTED_STEPS};
use crate::seed::SeedState;

/// Pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Image height in pixels
    pub height: usize,
    /// Image width in pixels
    pub width: usize,
    pub overlay: MaskCompositor,
    pub save: SaveConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            height: 512,
            width: 512,
            overlay: MaskCompositor::default(),
            save: SaveConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn with_size(mut self, height: usize, width: usize) -> Self {
        self.height = height;
        self.width = width;
        self
    }

    pub fn with_overlay(mut self, color: [u8; 3], alpha: f32) -> Self {
        self.overlay = MaskCompositor { color, alpha };
        self
    }

    pub fn with_save(mut self, save: SaveConfig) -> Self {
        self.save = save;
        self
    }
}

/// One generation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentRequest {
    /// Text the image is generated from
    pub prompt: String,
    /// Object category to segment in the generated image
    pub category: String,
    pub seed: SeedState,
    pub steps: usize,
}

impl SegmentRequest {
    pub fn new(prompt: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            category: category.into(),
            seed: SeedState::default(),
            steps: *SUPPORTED_STEPS.start(),
        }
    }

    pub fn with_seed(mut self, seed: impl Into<SeedState>) -> Self {
        self.seed = seed.into();
        self
    }

    pub fn with_steps(mut self, steps: usize) -> Self {
        self.steps = steps;
        self
    }
}

/// Everything one run produces
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// Generated image
    pub image: RgbImage,
    pub mask: BinaryMask,
    /// Generated image and its overlaid copy, side by side
    pub composite: RgbImage,
    /// Path written when saving is enabled
    pub saved_to: Option<PathBuf>,
}

/// Generates an image and a segmentation mask for a category in it
///
/// The model context lives behind a mutex held across sampling, feature
/// capture, class encoding and head prediction, so overlapping requests
/// from several threads run one after another.
pub struct TurboSegPipeline<B: Backend, M, H> {
    inference: Mutex<ModelContext<B, M, H>>,
    config: PipelineConfig,
    encoder: ConditionEncoder,
}

impl<B, M, H> TurboSegPipeline<B, M, H>
where
    B: Backend,
    M: DiffusionModel<B>,
    H: SegmentationHead<B>,
{
    pub fn new(
        context: ModelContext<B, M, H>,
        config: PipelineConfig,
    ) -> Result<Self, PipelineError> {
        config.overlay.validate()?;
        Ok(Self {
            inference: Mutex::new(context),
            config,
            encoder: ConditionEncoder::new(),
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Lock the model context, waiting for any run in progress
    pub fn context(&self) -> Result<MutexGuard<'_, ModelContext<B, M, H>>, PipelineError> {
        Ok(self
            .inference
            .lock()
            .map_err(|_| SequencingError::Poisoned)?)
    }

    pub fn into_context(self) -> Result<ModelContext<B, M, H>, PipelineError> {
        Ok(self
            .inference
            .into_inner()
            .map_err(|_| SequencingError::Poisoned)?)
    }

    pub fn run(&self, request: &SegmentRequest) -> Result<PipelineOutput, PipelineError> {
        let sampler = SeededSampler::new(request.steps)?;
        let (height, width) = (self.config.height, self.config.width);

        info!(
            prompt = %request.prompt,
            category = %request.category,
            seed = request.seed.value(),
            steps = request.steps,
            "segment request"
        );

        let context = self.context()?;
        let model = context.model();
        let sample = sampler.sample::<B, M>(
            model,
            context.filter(),
            &request.prompt,
            request.seed.value(),
            height,
            width,
            context.device(),
        )?;
        let embedding = self
            .encoder
            .encode::<B, M>(model, &request.category, height, width)?;
        let logits = context.head().predict(&sample.features, &embedding)?;
        drop(context);

        let composite = self.config.overlay.composite(&sample.image, &logits)?;

        let saved_to = if self.config.save.enabled {
            Some(save_png(
                &composite.image,
                &self.config.save.output_dir,
                &request.prompt,
            )?)
        } else {
            None
        };

        Ok(PipelineOutput {
            image: sample.image,
            mask: composite.mask,
            composite: composite.image,
            saved_to,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = PipelineConfig::default();
        assert_eq!((config.height, config.width), (512, 512));
        assert_eq!(config.overlay.color, [0, 255, 0]);
        assert_eq!(config.overlay.alpha, 0.5);
        assert!(!config.save.enabled);
        assert_eq!(config.save.output_dir, PathBuf::from("outputs/txt2img"));
    }

    #[test]
    fn test_config_serde() {
        let config = PipelineConfig::default()
            .with_size(256, 384)
            .with_overlay([255, 0, 0], 0.25)
            .with_save(SaveConfig::default().with_enabled(true));
        let json = serde_json::to_string(&config).unwrap();
        let parsed: PipelineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_request_defaults() {
        let request = SegmentRequest::new("a fox", "fox");
        assert_eq!(request.seed.value(), 0);
        assert_eq!(request.steps, 4);

        let request = request.with_seed(3).with_steps(2);
        assert_eq!(request.seed, SeedState::new(3));
        assert_eq!(request.steps, 2);
    }
}
