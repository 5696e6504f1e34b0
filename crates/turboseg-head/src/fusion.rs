//! Multi-scale feature fusion head
//!
//! Each feature layer is projected to a shared width with a 1x1 conv and
//! resized to the output resolution; the projections are summed and
//! scored against the projected class embedding:
//!
//! ```text
//! logits[y, x] = <sum_l up(proj_l(f_l))[:, y, x], W e + b> / sqrt(hidden)
//! ```

use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::{Linear, LinearConfig};
use burn::prelude::*;
use burn::tensor::module::interpolate;
use burn::tensor::ops::{InterpolateMode, InterpolateOptions};
use serde::{Deserialize, Serialize};
use turboseg_core::{ConditioningEmbedding, FeatureDictionary, FeatureSignature};

use crate::head::SegmentationHead;

/// Fusion head configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusionHeadConfig {
    /// Feature layers consumed, with their [channels, height, width]
    pub signature: FeatureSignature,
    /// Class embedding width (cross-attention width of the text path)
    pub embed_dim: usize,
    /// Shared projection width
    pub hidden_dim: usize,
    /// Output resolution [height, width]
    pub output_size: [usize; 2],
}

impl FusionHeadConfig {
    pub fn new(signature: FeatureSignature, embed_dim: usize) -> Self {
        Self {
            signature,
            embed_dim,
            hidden_dim: 256,
            output_size: [512, 512],
        }
    }

    pub fn with_hidden_dim(mut self, hidden_dim: usize) -> Self {
        self.hidden_dim = hidden_dim;
        self
    }

    pub fn with_output_size(mut self, height: usize, width: usize) -> Self {
        self.output_size = [height, width];
        self
    }

    /// Initialize a head with freshly initialized weights
    pub fn init<B: Backend>(&self, device: &B::Device) -> FusionHead<B> {
        let projections = self
            .signature
            .iter()
            .map(|(_, [channels, _, _])| {
                Conv2dConfig::new([channels, self.hidden_dim], [1, 1]).init(device)
            })
            .collect();
        let embed_proj = LinearConfig::new(self.embed_dim, self.hidden_dim).init(device);

        FusionHead::new(
            self.clone(),
            FusionHeadModule {
                projections,
                embed_proj,
            },
        )
    }
}

/// Learnable parameters of a [`FusionHead`]
///
/// `projections[i]` belongs to the i-th layer of the signature in sorted order.
#[derive(Module, Debug)]
pub struct FusionHeadModule<B: Backend> {
    pub projections: Vec<Conv2d<B>>,
    pub embed_proj: Linear<B>,
}

/// Reference segmentation head
#[derive(Debug)]
pub struct FusionHead<B: Backend> {
    config: FusionHeadConfig,
    module: FusionHeadModule<B>,
}

impl<B: Backend> FusionHead<B> {
    pub fn new(config: FusionHeadConfig, module: FusionHeadModule<B>) -> Self {
        Self { config, module }
    }

    pub fn config(&self) -> &FusionHeadConfig {
        &self.config
    }

    pub fn module(&self) -> &FusionHeadModule<B> {
        &self.module
    }

    pub fn into_module(self) -> FusionHeadModule<B> {
        self.module
    }
}

impl<B: Backend> SegmentationHead<B> for FusionHead<B> {
    fn signature(&self) -> &FeatureSignature {
        &self.config.signature
    }

    fn embed_dim(&self) -> usize {
        self.config.embed_dim
    }

    fn forward(
        &self,
        features: &FeatureDictionary<B>,
        embedding: &ConditioningEmbedding<B>,
    ) -> Tensor<B, 4> {
        let [height, width] = self.config.output_size;
        let hidden = self.config.hidden_dim;
        let device = embedding.tensor().device();

        let mut fused: Tensor<B, 4> = Tensor::zeros([1, hidden, height, width], &device);
        let layers = self.config.signature.iter().zip(&self.module.projections);
        for ((layer, _), proj) in layers {
            if let Some(activation) = features.get(layer) {
                let projected = proj.forward(activation.clone());
                fused = fused
                    + interpolate(
                        projected,
                        [height, width],
                        InterpolateOptions::new(InterpolateMode::Bilinear),
                    );
            }
        }

        let [batch, _, _] = embedding.tensor().dims();
        let class = self
            .module
            .embed_proj
            .forward(embedding.tensor().clone())
            .reshape([batch, hidden, 1, 1]);

        (fused * class).sum_dim(1) / (hidden as f32).sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;
    use turboseg_core::ConfigError;

    type TestBackend = NdArray<f32>;

    fn config() -> FusionHeadConfig {
        let signature = FeatureSignature::new()
            .with_layer("low", [4, 8, 8])
            .with_layer("mid", [6, 4, 4]);
        FusionHeadConfig::new(signature, 16)
            .with_hidden_dim(8)
            .with_output_size(32, 32)
    }

    fn features(device: &<TestBackend as Backend>::Device) -> FeatureDictionary<TestBackend> {
        FeatureDictionary::new()
            .with_layer("low", Tensor::ones([1, 4, 8, 8], device))
            .with_layer("mid", Tensor::ones([1, 6, 4, 4], device) * 0.5)
    }

    fn embedding(
        width: usize,
        device: &<TestBackend as Backend>::Device,
    ) -> ConditioningEmbedding<TestBackend> {
        ConditioningEmbedding::from_tensor(Tensor::ones([1, 1, width], device))
    }

    #[test]
    fn test_predict_output_size() {
        let device = Default::default();
        let head = config().init::<TestBackend>(&device);

        let logits = head.predict(&features(&device), &embedding(16, &device)).unwrap();
        assert_eq!(logits.height(), 32);
        assert_eq!(logits.width(), 32);
    }

    #[test]
    fn test_predict_deterministic() {
        let device = Default::default();
        let head = config().init::<TestBackend>(&device);

        let a: Vec<f32> = head
            .predict(&features(&device), &embedding(16, &device))
            .unwrap()
            .into_tensor()
            .into_data()
            .to_vec()
            .unwrap();
        let b: Vec<f32> = head
            .predict(&features(&device), &embedding(16, &device))
            .unwrap()
            .into_tensor()
            .into_data()
            .to_vec()
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_predict_rejects_wrong_feature_shape() {
        let device = Default::default();
        let head = config().init::<TestBackend>(&device);
        let features = FeatureDictionary::new()
            .with_layer("low", Tensor::ones([1, 4, 8, 8], &device))
            .with_layer("mid", Tensor::ones([1, 6, 8, 8], &device));

        let err = head.predict(&features, &embedding(16, &device)).unwrap_err();
        assert!(matches!(err, ConfigError::FeatureShape { ref layer, .. } if layer == "mid"));
    }

    #[test]
    fn test_predict_rejects_wrong_embedding_width() {
        let device = Default::default();
        let head = config().init::<TestBackend>(&device);

        let err = head.predict(&features(&device), &embedding(12, &device)).unwrap_err();
        assert_eq!(
            err,
            ConfigError::EmbeddingWidth {
                expected: 16,
                actual: 12
            }
        );
    }

    #[test]
    fn test_projection_order_follows_signature() {
        let device = Default::default();
        let head = config().init::<TestBackend>(&device);
        let module = head.module();

        // "low" sorts before "mid"
        assert_eq!(module.projections[0].weight.dims(), [8, 4, 1, 1]);
        assert_eq!(module.projections[1].weight.dims(), [8, 6, 1, 1]);
        assert_eq!(module.embed_proj.weight.dims(), [16, 8]);
    }

    #[test]
    fn test_config_serde() {
        let json = serde_json::to_string(&config()).unwrap();
        let parsed: FusionHeadConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config());
    }
}
