//! Fusion head checkpoints
//!
//! Tensor names and layouts follow PyTorch conventions:
//!
//! | name | shape |
//! |------|-------|
//! | `proj.{layer}.weight` | `[hidden, channels, 1, 1]` |
//! | `proj.{layer}.bias` | `[hidden]` |
//! | `class_proj.weight` | `[hidden, embed_dim]` |
//! | `class_proj.bias` | `[hidden]` |

use std::collections::BTreeSet;
use std::path::Path;

use burn::module::Param;
use burn::nn::LinearConfig;
use burn::nn::conv::Conv2dConfig;
use burn::prelude::*;
use safetensors::Dtype;
use safetensors::tensor::TensorView;
use tracing::info;
use turboseg_head::{FusionHead, FusionHeadConfig, FusionHeadModule};

use crate::loader::{CheckpointFile, LoadError};

/// Expected tensor names and shapes for a fusion head with `config`
pub fn fusion_head_tensors(config: &FusionHeadConfig) -> Vec<(String, Vec<usize>)> {
    let hidden = config.hidden_dim;
    let mut tensors = Vec::with_capacity(config.signature.len() * 2 + 2);
    for (layer, [channels, _, _]) in config.signature.iter() {
        tensors.push((format!("proj.{layer}.weight"), vec![hidden, channels, 1, 1]));
        tensors.push((format!("proj.{layer}.bias"), vec![hidden]));
    }
    tensors.push(("class_proj.weight".to_string(), vec![hidden, config.embed_dim]));
    tensors.push(("class_proj.bias".to_string(), vec![hidden]));
    tensors
}

/// Load a fusion head from a safetensors file
pub fn load_fusion_head<B: Backend>(
    path: impl AsRef<Path>,
    config: &FusionHeadConfig,
    device: &B::Device,
) -> Result<FusionHead<B>, LoadError> {
    let path = path.as_ref();
    let file = CheckpointFile::open(path)?;
    let head = build_fusion_head(&file, config, device)?;
    info!(
        path = %path.display(),
        layers = config.signature.len(),
        tensors = file.len(),
        "loaded segmentation head"
    );
    Ok(head)
}

/// Build a fusion head from an already parsed checkpoint
pub fn build_fusion_head<B: Backend>(
    file: &CheckpointFile,
    config: &FusionHeadConfig,
    device: &B::Device,
) -> Result<FusionHead<B>, LoadError> {
    let expected: BTreeSet<String> = fusion_head_tensors(config)
        .into_iter()
        .map(|(name, _)| name)
        .collect();
    let unexpected: Vec<String> = file
        .names()
        .filter(|name| !expected.contains(*name))
        .map(str::to_string)
        .collect();
    if !unexpected.is_empty() {
        return Err(LoadError::UnexpectedTensors(unexpected));
    }

    let hidden = config.hidden_dim;
    let mut projections = Vec::with_capacity(config.signature.len());
    for (layer, [channels, _, _]) in config.signature.iter() {
        let mut conv = Conv2dConfig::new([channels, hidden], [1, 1]).init(device);
        conv.weight = Param::from_tensor(file.load(
            &format!("proj.{layer}.weight"),
            [hidden, channels, 1, 1],
            device,
        )?);
        conv.bias = Some(Param::from_tensor(file.load(
            &format!("proj.{layer}.bias"),
            [hidden],
            device,
        )?));
        projections.push(conv);
    }

    // PyTorch stores [out, in]; burn's Linear wants [in, out]
    let weight: Tensor<B, 2> = file.load("class_proj.weight", [hidden, config.embed_dim], device)?;
    let mut embed_proj = LinearConfig::new(config.embed_dim, hidden).init(device);
    embed_proj.weight = Param::from_tensor(weight.transpose());
    embed_proj.bias = Some(Param::from_tensor(file.load(
        "class_proj.bias",
        [hidden],
        device,
    )?));

    Ok(FusionHead::new(
        config.clone(),
        FusionHeadModule {
            projections,
            embed_proj,
        },
    ))
}

/// Serialize a fusion head to safetensors bytes in the layout read by [`load_fusion_head`]
pub fn save_fusion_head<B: Backend>(head: &FusionHead<B>) -> Result<Vec<u8>, LoadError> {
    let config = head.config();
    let module = head.module();
    let mut tensors: Vec<(String, Vec<usize>, Vec<u8>)> = Vec::new();

    let layers = config.signature.iter().zip(&module.projections);
    for ((layer, _), conv) in layers {
        let weight = conv.weight.val();
        tensors.push((
            format!("proj.{layer}.weight"),
            weight.dims().to_vec(),
            f32_bytes(weight),
        ));
        if let Some(bias) = &conv.bias {
            let bias = bias.val();
            tensors.push((format!("proj.{layer}.bias"), bias.dims().to_vec(), f32_bytes(bias)));
        }
    }

    let weight = module.embed_proj.weight.val().transpose();
    tensors.push((
        "class_proj.weight".to_string(),
        weight.dims().to_vec(),
        f32_bytes(weight),
    ));
    if let Some(bias) = &module.embed_proj.bias {
        let bias = bias.val();
        tensors.push(("class_proj.bias".to_string(), bias.dims().to_vec(), f32_bytes(bias)));
    }

    let views = tensors
        .iter()
        .map(|(name, shape, bytes)| {
            TensorView::new(Dtype::F32, shape.clone(), bytes).map(|view| (name.clone(), view))
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(safetensors::serialize(views, &None)?)
}

fn f32_bytes<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> Vec<u8> {
    tensor
        .into_data()
        .convert::<f32>()
        .as_slice::<f32>()
        .map(|values| values.iter().flat_map(|v| v.to_le_bytes()).collect())
        .unwrap_or_default()
}
