//! Core types for turboseg
//!
//! This crate holds the data model shared by the sampler, the
//! segmentation head and the pipeline:
//!
//! - [`FeatureDictionary`] - per-layer activations captured from one sampling run
//! - [`FeatureSignature`] - the layer set and shapes a segmentation head expects
//! - [`Conditioning`] / [`ConditioningEmbedding`] - text conditioning tensors
//! - [`LogitMask`] - single-channel segmentation logits
//!
//! It also defines the error kinds raised before or during inference
//! ([`ConfigError`], [`SequencingError`]).

pub mod conditioning;
pub mod error;
pub mod features;
pub mod mask;

pub use conditioning::{CLASS_TOKEN_INDEX, Conditioning, ConditioningEmbedding};
pub use error::{ConfigError, SequencingError};
pub use features::{FeatureDictionary, FeatureSignature};
pub use mask::LogitMask;
