//! Segmentation head contract

use burn::prelude::*;
use turboseg_core::{
    ConditioningEmbedding, ConfigError, FeatureDictionary, FeatureSignature, LogitMask,
};

/// A trained head mapping (features, class embedding) to logits
///
/// Implementations must be deterministic for fixed inputs and weights.
pub trait SegmentationHead<B: Backend> {
    /// Feature layers (and their shapes) the head was trained against
    fn signature(&self) -> &FeatureSignature;

    /// Width of the class embedding the head consumes
    fn embed_dim(&self) -> usize;

    /// Raw forward pass, [1, 1, H, W] logits
    ///
    /// Callers should go through [`predict`](Self::predict), which validates
    /// the inputs first.
    fn forward(
        &self,
        features: &FeatureDictionary<B>,
        embedding: &ConditioningEmbedding<B>,
    ) -> Tensor<B, 4>;

    /// Validate inputs against the head's signature, then run it
    ///
    /// Any mismatch is a [`ConfigError`]; inputs are never broadcast.
    fn predict(
        &self,
        features: &FeatureDictionary<B>,
        embedding: &ConditioningEmbedding<B>,
    ) -> Result<LogitMask<B>, ConfigError> {
        self.signature().check(features)?;

        let width = embedding.width();
        if width != self.embed_dim() {
            return Err(ConfigError::EmbeddingWidth {
                expected: self.embed_dim(),
                actual: width,
            });
        }

        Ok(LogitMask::from_head_output(self.forward(features, embedding)))
    }
}
