//! Checkpoint Loading
//!
//! Reads `.safetensors` checkpoints and builds segmentation heads from them.
//!
//! ```ignore
//! use turboseg_convert::load_fusion_head;
//!
//! let head = load_fusion_head::<Backend>("checkpoints/head.safetensors", &config, &device)?;
//! ```
//!
//! Loading is strict: every expected tensor must be present with its exact
//! shape and no unexpected tensors may remain. Any failure is a
//! [`LoadError`] and no partially loaded head is ever returned.

pub mod head_loader;
pub mod loader;

pub use head_loader::{fusion_head_tensors, load_fusion_head, save_fusion_head};
pub use loader::{CheckpointFile, LoadError};
