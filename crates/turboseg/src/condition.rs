//! Class embedding for the segmentation head

use burn::prelude::*;
use turboseg_core::{ConditioningEmbedding, ConfigError, CLASS_TOKEN_INDEX};

use crate::model::DiffusionModel;

/// Encodes a category name with the backbone's own text path
///
/// The embedding is the cross-attention vector at [`CLASS_TOKEN_INDEX`],
/// which is what segmentation heads are trained against.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConditionEncoder;

impl ConditionEncoder {
    pub fn new() -> Self {
        Self
    }

    /// Embed `category` as conditioned for an image of `height` x `width`
    pub fn encode<B: Backend, M: DiffusionModel<B>>(
        &self,
        model: &M,
        category: &str,
        height: usize,
        width: usize,
    ) -> Result<ConditioningEmbedding<B>, ConfigError> {
        let conditioning = model.condition(category, height, width);
        ConditioningEmbedding::from_token(&conditioning, CLASS_TOKEN_INDEX)
    }
}
