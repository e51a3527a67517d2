//! Payload construction for text-to-image jobs.
//!
//! [`build_payload`] is a pure function of a validated request and a seed.
//! Seed resolution happens first, in [`resolve_seed`], so the same inputs
//! always produce the same graph.

use crate::request::ValidatedRequest;
use comfy_relay_client::Payload;
use serde_json::{Map, json};

/// Node ids of the text-to-image graph.
pub mod nodes {
    /// `CheckpointLoaderSimple`: model, clip, and vae outputs.
    pub const CHECKPOINT: &str = "1";
    /// `EmptyLatentImage` sized to the request.
    pub const LATENT: &str = "2";
    /// `CLIPTextEncode` of the prompt.
    pub const POSITIVE: &str = "3";
    /// `CLIPTextEncode` of the negative prompt.
    pub const NEGATIVE: &str = "4";
    /// `KSampler`.
    pub const SAMPLER: &str = "5";
    /// `VAEDecode` of the sampled latent.
    pub const DECODE: &str = "6";
    /// `SaveImage`, the only output node.
    pub const SAVE: &str = "7";
}

const SAMPLER_NAME: &str = "euler";
const SCHEDULER: &str = "normal";

/// Returns the caller's seed, or a random 32-bit one.
///
/// # Errors
///
/// Returns an error if the OS random source is unavailable.
pub fn resolve_seed(seed: Option<u64>) -> Result<u64, getrandom::Error> {
    match seed {
        Some(seed) => Ok(seed),
        None => {
            let mut bytes = [0u8; 4];
            getrandom::fill(&mut bytes)?;
            Ok(u64::from(u32::from_be_bytes(bytes)))
        }
    }
}

/// Builds the SDXL text-to-image graph.
///
/// Links are `[source_node_id, output_index]` pairs; the checkpoint loader
/// exposes model, clip, and vae at indices 0, 1, and 2.
#[must_use]
pub fn build_payload(request: &ValidatedRequest, seed: u64) -> Payload {
    let mut graph = Map::new();

    graph.insert(
        nodes::CHECKPOINT.to_string(),
        json!({
            "inputs": {"ckpt_name": request.checkpoint},
            "class_type": "CheckpointLoaderSimple"
        }),
    );
    graph.insert(
        nodes::LATENT.to_string(),
        json!({
            "inputs": {
                "width": request.width,
                "height": request.height,
                "batch_size": 1
            },
            "class_type": "EmptyLatentImage"
        }),
    );
    graph.insert(
        nodes::POSITIVE.to_string(),
        json!({
            "inputs": {"text": request.prompt, "clip": [nodes::CHECKPOINT, 1]},
            "class_type": "CLIPTextEncode"
        }),
    );
    graph.insert(
        nodes::NEGATIVE.to_string(),
        json!({
            "inputs": {"text": request.negative_prompt, "clip": [nodes::CHECKPOINT, 1]},
            "class_type": "CLIPTextEncode"
        }),
    );
    graph.insert(
        nodes::SAMPLER.to_string(),
        json!({
            "inputs": {
                "seed": seed,
                "steps": request.steps,
                "cfg": request.cfg_scale,
                "sampler_name": SAMPLER_NAME,
                "scheduler": SCHEDULER,
                "denoise": 1.0,
                "model": [nodes::CHECKPOINT, 0],
                "positive": [nodes::POSITIVE, 0],
                "negative": [nodes::NEGATIVE, 0],
                "latent_image": [nodes::LATENT, 0]
            },
            "class_type": "KSampler"
        }),
    );
    graph.insert(
        nodes::DECODE.to_string(),
        json!({
            "inputs": {
                "samples": [nodes::SAMPLER, 0],
                "vae": [nodes::CHECKPOINT, 2]
            },
            "class_type": "VAEDecode"
        }),
    );
    graph.insert(
        nodes::SAVE.to_string(),
        json!({
            "inputs": {"images": [nodes::DECODE, 0]},
            "class_type": "SaveImage"
        }),
    );

    Payload::new(graph)
}
