//! Intermediate backbone activations and the shapes a head expects
//!
//! A [`FeatureDictionary`] is produced by exactly one sampling run and
//! travels with the image of that run; it is never cached across runs.

use std::collections::BTreeMap;

use burn::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Per-layer activations keyed by layer identifier
///
/// Each entry is a `[batch, channels, height, width]` tensor.
#[derive(Debug, Clone)]
pub struct FeatureDictionary<B: Backend> {
    layers: BTreeMap<String, Tensor<B, 4>>,
}

impl<B: Backend> Default for FeatureDictionary<B> {
    fn default() -> Self {
        Self {
            layers: BTreeMap::new(),
        }
    }
}

impl<B: Backend> FeatureDictionary<B> {
    /// Create an empty dictionary
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert (or replace) the activation for a layer
    pub fn insert(&mut self, layer: impl Into<String>, activation: Tensor<B, 4>) {
        self.layers.insert(layer.into(), activation);
    }

    /// Builder form of [`insert`](Self::insert)
    pub fn with_layer(mut self, layer: impl Into<String>, activation: Tensor<B, 4>) -> Self {
        self.insert(layer, activation);
        self
    }

    pub fn get(&self, layer: &str) -> Option<&Tensor<B, 4>> {
        self.layers.get(layer)
    }

    pub fn contains(&self, layer: &str) -> bool {
        self.layers.contains_key(layer)
    }

    /// Layer identifiers in sorted order
    pub fn layers(&self) -> impl Iterator<Item = &str> {
        self.layers.keys().map(|k| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Tensor<B, 4>)> {
        self.layers.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

/// Expected feature layers of a segmentation head
///
/// Maps layer id to `[channels, height, width]` (batch excluded, always 1).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FeatureSignature {
    layers: BTreeMap<String, [usize; 3]>,
}

impl FeatureSignature {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a layer with its `[channels, height, width]` shape
    pub fn with_layer(mut self, layer: impl Into<String>, shape: [usize; 3]) -> Self {
        self.layers.insert(layer.into(), shape);
        self
    }

    pub fn shape(&self, layer: &str) -> Option<[usize; 3]> {
        self.layers.get(layer).copied()
    }

    /// Layers with their shapes, in sorted order
    pub fn iter(&self) -> impl Iterator<Item = (&str, [usize; 3])> {
        self.layers.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Verify that `features` provides every expected layer with the exact shape
    ///
    /// Layers present in `features` but absent from the signature are ignored.
    /// Nothing is broadcast: any dimension mismatch is an error.
    pub fn check<B: Backend>(&self, features: &FeatureDictionary<B>) -> Result<(), ConfigError> {
        for (layer, [c, h, w]) in self.iter() {
            let activation = features
                .get(layer)
                .ok_or_else(|| ConfigError::MissingFeature(layer.to_string()))?;

            let actual = activation.dims();
            let expected = [1, c, h, w];
            if actual != expected {
                return Err(ConfigError::FeatureShape {
                    layer: layer.to_string(),
                    expected: expected.to_vec(),
                    actual: actual.to_vec(),
                });
            }
        }
        Ok(())
    }
}
