//! Pipeline error type

use thiserror::Error;
use turboseg_convert::LoadError;
use turboseg_core::{ConfigError, SequencingError};

/// Everything a pipeline run can fail with
///
/// Configuration and resource errors are fatal for a request; the pipeline
/// itself stays usable afterwards.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("sequencing error: {0}")]
    Sequencing(#[from] SequencingError),

    #[error("resource error: {0}")]
    Resource(#[from] LoadError),

    #[error("failed to encode image: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    pub fn is_sequencing(&self) -> bool {
        matches!(self, Self::Sequencing(_))
    }

    /// Missing or unreadable weights, or a failed write of the output
    pub fn is_resource(&self) -> bool {
        matches!(self, Self::Resource(_) | Self::Image(_) | Self::Io(_))
    }
}
