//! Safetensors checkpoint reader

use std::collections::BTreeMap;
use std::fs::File;
use std::ops::Range;
use std::path::Path;

use burn::prelude::*;
use half::{bf16, f16};
use memmap2::Mmap;
use safetensors::{Dtype, SafeTensors};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid safetensors data: {0}")]
    Format(#[from] safetensors::SafeTensorError),

    #[error("tensor not found: {0}")]
    TensorNotFound(String),

    #[error("tensor `{tensor}` has unsupported dtype {dtype:?}")]
    UnsupportedDtype { tensor: String, dtype: Dtype },

    #[error("tensor `{tensor}` shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        tensor: String,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("unexpected tensors in checkpoint: {0:?}")]
    UnexpectedTensors(Vec<String>),
}

enum Storage {
    Mapped(Mmap),
    Owned(Vec<u8>),
}

impl Storage {
    fn bytes(&self) -> &[u8] {
        match self {
            Storage::Mapped(mmap) => mmap,
            Storage::Owned(bytes) => bytes,
        }
    }
}

struct Entry {
    dtype: Dtype,
    shape: Vec<usize>,
    /// Byte range within the whole buffer
    range: Range<usize>,
}

/// A parsed safetensors checkpoint
///
/// The header is parsed once on open; tensor bytes are decoded on demand.
pub struct CheckpointFile {
    storage: Storage,
    entries: BTreeMap<String, Entry>,
}

impl CheckpointFile {
    /// Memory-map and parse a checkpoint file
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, LoadError> {
        let file = File::open(path)?;
        // Safety: the map is read-only and owned by the returned value
        let mmap = unsafe { Mmap::map(&file)? };
        Self::parse(Storage::Mapped(mmap))
    }

    /// Parse a checkpoint held in memory
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, LoadError> {
        Self::parse(Storage::Owned(bytes))
    }

    fn parse(storage: Storage) -> Result<Self, LoadError> {
        let (header_len, metadata) = SafeTensors::read_metadata(storage.bytes())?;
        let data_start = 8 + header_len;

        let entries = metadata
            .tensors()
            .into_iter()
            .map(|(name, info)| {
                let (start, end) = info.data_offsets;
                let entry = Entry {
                    dtype: info.dtype,
                    shape: info.shape.clone(),
                    range: data_start + start..data_start + end,
                };
                (name, entry)
            })
            .collect();

        Ok(Self { storage, entries })
    }

    /// Tensor names in sorted order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(|k| k.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn shape(&self, name: &str) -> Option<&[usize]> {
        self.entries.get(name).map(|e| e.shape.as_slice())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Load a tensor as f32, requiring exactly `expected` as its shape
    ///
    /// fp16 and bf16 tensors are widened to f32.
    pub fn load<B: Backend, const D: usize>(
        &self,
        name: &str,
        expected: [usize; D],
        device: &B::Device,
    ) -> Result<Tensor<B, D>, LoadError> {
        let entry = self
            .entries
            .get(name)
            .ok_or_else(|| LoadError::TensorNotFound(name.to_string()))?;

        if entry.shape.as_slice() != expected.as_slice() {
            return Err(LoadError::ShapeMismatch {
                tensor: name.to_string(),
                expected: expected.to_vec(),
                actual: entry.shape.clone(),
            });
        }

        let bytes = &self.storage.bytes()[entry.range.clone()];
        let values = decode_f32(name, entry.dtype, bytes)?;
        Ok(Tensor::from_data(TensorData::new(values, expected), device))
    }
}

/// Decode little-endian tensor bytes into f32 values
///
/// Reads element by element so unaligned mmap offsets are fine.
fn decode_f32(name: &str, dtype: Dtype, bytes: &[u8]) -> Result<Vec<f32>, LoadError> {
    let values: Vec<f32> = match dtype {
        Dtype::F32 => bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect(),
        Dtype::F16 => bytes
            .chunks_exact(2)
            .map(|c| f16::from_le_bytes([c[0], c[1]]).to_f32())
            .collect(),
        Dtype::BF16 => bytes
            .chunks_exact(2)
            .map(|c| bf16::from_le_bytes([c[0], c[1]]).to_f32())
            .collect(),
        dtype => {
            return Err(LoadError::UnsupportedDtype {
                tensor: name.to_string(),
                dtype,
            });
        }
    };
    Ok(values)
}
