//! Text conditioning tensors

use burn::prelude::*;

use crate::error::ConfigError;

/// Token position of the class embedding inside the cross-attention tensor
///
/// Position 0 holds the start-of-text token; the category's first word
/// token sits at position 1. Segmentation heads are trained against this
/// slice, so the value is fixed.
pub const CLASS_TOKEN_INDEX: usize = 1;

/// Conditioning produced by the diffusion model's text path
#[derive(Debug, Clone)]
pub struct Conditioning<B: Backend> {
    /// Cross-attention context [batch, tokens, width]
    pub crossattn: Tensor<B, 3>,
    /// Pooled / size-embedding vector [batch, dim], if the model uses one
    pub vector: Option<Tensor<B, 2>>,
}

impl<B: Backend> Conditioning<B> {
    pub fn new(crossattn: Tensor<B, 3>) -> Self {
        Self {
            crossattn,
            vector: None,
        }
    }

    pub fn with_vector(mut self, vector: Tensor<B, 2>) -> Self {
        self.vector = Some(vector);
        self
    }

    /// Number of tokens in the cross-attention context
    pub fn num_tokens(&self) -> usize {
        self.crossattn.dims()[1]
    }

    /// Width of each cross-attention token
    pub fn width(&self) -> usize {
        self.crossattn.dims()[2]
    }
}

/// A single token's slice of the cross-attention context, [batch, 1, width]
#[derive(Debug, Clone)]
pub struct ConditioningEmbedding<B: Backend>(Tensor<B, 3>);

impl<B: Backend> ConditioningEmbedding<B> {
    /// Slice token `index` out of `conditioning.crossattn`
    pub fn from_token(conditioning: &Conditioning<B>, index: usize) -> Result<Self, ConfigError> {
        let [batch, tokens, width] = conditioning.crossattn.dims();
        if index >= tokens {
            return Err(ConfigError::TokenIndex { index, tokens });
        }

        let slice = conditioning
            .crossattn
            .clone()
            .slice([0..batch, index..index + 1, 0..width]);
        Ok(Self(slice))
    }

    /// Wrap an existing [batch, 1, width] tensor
    pub fn from_tensor(tensor: Tensor<B, 3>) -> Self {
        Self(tensor)
    }

    pub fn width(&self) -> usize {
        self.0.dims()[2]
    }

    pub fn tensor(&self) -> &Tensor<B, 3> {
        &self.0
    }

    pub fn into_tensor(self) -> Tensor<B, 3> {
        self.0
    }
}
