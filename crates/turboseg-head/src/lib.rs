//! Segmentation Heads
//!
//! A segmentation head maps the feature dictionary of one sampling run
//! plus a class embedding to a per-pixel logit mask.
//!
//! - [`SegmentationHead`] - the contract, including the shape check that
//!   guards against checkpoint / backbone version mismatches
//! - [`FusionHead`] - a reference head fusing projected multi-scale features
//!
//! # Example
//!
//! ```ignore
//! use turboseg_core::FeatureSignature;
//! use turboseg_head::{FusionHeadConfig, SegmentationHead};
//!
//! let signature = FeatureSignature::new()
//!     .with_layer("mid", [1280, 16, 16])
//!     .with_layer("high", [640, 32, 32]);
//! let head = FusionHeadConfig::new(signature, 2048).init::<Backend>(&device);
//!
//! let logits = head.predict(&features, &embedding)?;
//! ```

pub mod fusion;
pub mod head;

pub use fusion::{FusionHead, FusionHeadConfig, FusionHeadModule};
pub use head::SegmentationHead;
