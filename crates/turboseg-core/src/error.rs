//! Error kinds shared across the workspace

use thiserror::Error;

/// Configuration or model-compatibility errors
///
/// These are fatal for the run that raised them and are never retried.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("unsupported step count {requested}: supported range is {min}..={max}")]
    UnsupportedSteps {
        requested: usize,
        min: usize,
        max: usize,
    },

    #[error("image size {height}x{width} is not a positive multiple of {factor}")]
    ImageSize {
        height: usize,
        width: usize,
        factor: usize,
    },

    #[error("decoder produced shape {actual:?}, expected {expected:?}")]
    DecodedShape {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("feature `{0}` is missing from the feature dictionary")]
    MissingFeature(String),

    #[error("feature `{layer}` has shape {actual:?}, head expects {expected:?}")]
    FeatureShape {
        layer: String,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("conditioning embedding width {actual} does not match head width {expected}")]
    EmbeddingWidth { expected: usize, actual: usize },

    #[error("conditioning has {tokens} tokens, token index {index} is out of range")]
    TokenIndex { index: usize, tokens: usize },

    #[error("mask is {mask_height}x{mask_width} but image is {image_height}x{image_width}")]
    MaskSize {
        mask_height: usize,
        mask_width: usize,
        image_height: usize,
        image_width: usize,
    },

    #[error("overlay alpha {0} is outside [0, 1]")]
    Alpha(f32),
}

/// Ordering violations between sampling and feature capture
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequencingError {
    #[error("feature tap read before any sampling step recorded features")]
    EmptyFeatureTap,

    #[error("inference lock poisoned by a previous run that panicked")]
    Poisoned,
}
