//! turboseg: seeded few-step text-to-image generation with segmentation
//!
//! A prompt is turned into an image by a turbo-distilled latent diffusion
//! model. The denoiser's intermediate activations from the final sampling
//! step are fed, together with a class embedding of a category name, to a
//! segmentation head. The resulting mask is overlaid on the image and the
//! original and overlaid images are returned side by side.
//!
//! # Example
//!
//! ```ignore
//! use turboseg::{ModelContext, PipelineConfig, SegmentRequest, TurboSegPipeline};
//!
//! let context =
//!     ModelContext::with_head_checkpoint(model, "head.safetensors", &head_config, device)?;
//! let pipeline = TurboSegPipeline::new(context, PipelineConfig::default())?;
//!
//! let output = pipeline.run(&SegmentRequest::new("a racoon in a tree", "racoon").with_seed(0))?;
//! output.composite.save("racoon.png")?;
//! ```

pub mod backends;
pub mod compositor;
pub mod condition;
pub mod error;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod sampling;
pub mod seed;

pub use compositor::{concat_horizontal, BinaryMask, Composite, MaskCompositor};
pub use condition::ConditionEncoder;
pub use error::PipelineError;
pub use model::{DenoiserOutput, DiffusionModel, ModelContext, SampleFilter};
pub use output::{output_path, save_png, SaveConfig};
pub use pipeline::{PipelineConfig, PipelineOutput, SegmentRequest, TurboSegPipeline};
pub use sampling::{
    tensor_to_image, to_unit_range, unit_tensor_to_image, FeatureTap, SampleOutput,
    SeededSampler, SUPPORTED_STEPS,
};
pub use seed::SeedState;

pub use turboseg_convert as convert;
pub use turboseg_core as core;
pub use turboseg_head as head;
pub use turboseg_samplers as samplers;
