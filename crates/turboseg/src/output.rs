//! Persisting composites to disk

use std::fs;
use std::path::{Path, PathBuf};

use image::{ImageFormat, RgbImage};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::PipelineError;

/// Where (and whether) composites are written
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveConfig {
    pub enabled: bool,
    pub output_dir: PathBuf,
}

impl Default for SaveConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            output_dir: PathBuf::from("outputs/txt2img"),
        }
    }
}

impl SaveConfig {
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }
}

/// File name for a prompt: the literal prompt text with a `.png` suffix
pub fn output_path(dir: &Path, prompt: &str) -> PathBuf {
    dir.join(format!("{prompt}.png"))
}

/// Write `image` as `{dir}/{prompt}.png`, creating `dir` if needed
///
/// An existing file with the same name is replaced.
pub fn save_png(image: &RgbImage, dir: &Path, prompt: &str) -> Result<PathBuf, PipelineError> {
    fs::create_dir_all(dir)?;
    let path = output_path(dir, prompt);
    if path.exists() {
        warn!(path = %path.display(), "overwriting existing output");
    }
    image.save_with_format(&path, ImageFormat::Png)?;
    info!(path = %path.display(), "saved composite");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_output_path_uses_literal_prompt() {
        let path = output_path(Path::new("outputs/txt2img"), "a red fox, 4k");
        assert_eq!(path, PathBuf::from("outputs/txt2img/a red fox, 4k.png"));
    }

    #[test]
    fn test_save_creates_dir_and_overwrites() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("nested/out");

        let first = RgbImage::from_pixel(4, 2, Rgb([1, 2, 3]));
        let path = save_png(&first, &dir, "fox").unwrap();
        assert_eq!(path, dir.join("fox.png"));

        let second = RgbImage::from_pixel(4, 2, Rgb([9, 9, 9]));
        save_png(&second, &dir, "fox").unwrap();

        let read = image::open(&path).unwrap().to_rgb8();
        assert_eq!(read, second);
    }

    #[test]
    fn test_save_config_serde() {
        let config = SaveConfig::default()
            .with_enabled(true)
            .with_output_dir("/tmp/out");
        let json = serde_json::to_string(&config).unwrap();
        let parsed: SaveConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }
}
