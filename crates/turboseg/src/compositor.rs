//! Mask thresholding and overlay compositing

use burn::prelude::*;
use image::{imageops, GrayImage, Luma, RgbImage};
use serde::{Deserialize, Serialize};
use turboseg_core::{ConfigError, LogitMask};

/// Per-pixel foreground mask, each pixel 0 or 1
pub type BinaryMask = GrayImage;

/// Mask and side-by-side composite of one run
#[derive(Debug, Clone, PartialEq)]
pub struct Composite {
    pub mask: BinaryMask,
    /// Original image on the left, overlaid image on the right
    pub image: RgbImage,
}

/// Overlay color and opacity for masked pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MaskCompositor {
    pub color: [u8; 3],
    pub alpha: f32,
}

impl Default for MaskCompositor {
    fn default() -> Self {
        Self {
            color: [0, 255, 0],
            alpha: 0.5,
        }
    }
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

impl MaskCompositor {
    pub fn new(color: [u8; 3], alpha: f32) -> Result<Self, ConfigError> {
        let compositor = Self { color, alpha };
        compositor.validate()?;
        Ok(compositor)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if (0.0..=1.0).contains(&self.alpha) {
            Ok(())
        } else {
            Err(ConfigError::Alpha(self.alpha))
        }
    }

    /// Foreground where `sigmoid(logit) > 0.5`; exactly 0.5 is background
    pub fn threshold<B: Backend>(logits: &LogitMask<B>) -> BinaryMask {
        let (h, w) = (logits.height() as u32, logits.width() as u32);
        let values = logits.to_host();
        GrayImage::from_fn(w, h, |x, y| {
            let logit = values[(y * w + x) as usize];
            Luma([u8::from(sigmoid(logit) > 0.5)])
        })
    }

    /// Blend the overlay color into `image` wherever `mask` is set
    pub fn overlay(&self, image: &RgbImage, mask: &BinaryMask) -> Result<RgbImage, ConfigError> {
        self.validate()?;
        if image.dimensions() != mask.dimensions() {
            return Err(ConfigError::MaskSize {
                mask_height: mask.height() as usize,
                mask_width: mask.width() as usize,
                image_height: image.height() as usize,
                image_width: image.width() as usize,
            });
        }

        let mut out = image.clone();
        for (pixel, m) in out.pixels_mut().zip(mask.pixels()) {
            if m.0[0] == 0 {
                continue;
            }
            for (channel, &color) in pixel.0.iter_mut().zip(&self.color) {
                let blended = (1.0 - self.alpha) * *channel as f32 + self.alpha * color as f32;
                *channel = blended as u8;
            }
        }
        Ok(out)
    }

    /// Threshold `logits`, overlay them on `image` and place the result
    /// to the right of the original
    pub fn composite<B: Backend>(
        &self,
        image: &RgbImage,
        logits: &LogitMask<B>,
    ) -> Result<Composite, ConfigError> {
        let mask = Self::threshold(logits);
        let overlaid = self.overlay(image, &mask)?;
        Ok(Composite {
            mask,
            image: concat_horizontal(image, &overlaid),
        })
    }
}

/// Place `right` next to `left`; both must share a height
pub fn concat_horizontal(left: &RgbImage, right: &RgbImage) -> RgbImage {
    let height = left.height().max(right.height());
    let mut out = RgbImage::new(left.width() + right.width(), height);
    imageops::replace(&mut out, left, 0, 0);
    imageops::replace(&mut out, right, left.width() as i64, 0);
    out
}
