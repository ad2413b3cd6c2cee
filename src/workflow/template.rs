//! Built-in text-to-image graph.
//!
//! Seven nodes wired the way ComfyUI's default workflow is: checkpoint loader,
//! positive/negative text encoders, empty latent, sampler, VAE decode and a
//! save-image sink. The sampler sits at node `3` so the graph passes the
//! relay's required-node check.
use std::collections::BTreeMap;

use super::{Node, NodeInputs, NodeRef, Workflow};

pub const DEFAULT_CFG: f64 = 8.0;
pub const DEFAULT_DENOISE: f64 = 1.0;
pub const DEFAULT_SAMPLER_NAME: &str = "euler";
pub const DEFAULT_SCHEDULER: &str = "normal";
pub const DEFAULT_STEPS: u32 = 20;
pub const DEFAULT_BATCH_SIZE: u32 = 1;
pub const DEFAULT_HEIGHT: u32 = 512;
pub const DEFAULT_WIDTH: u32 = 512;
pub const DEFAULT_CKPT_NAME: &str = "v1-5-pruned-emaonly.ckpt";
pub const DEFAULT_NEGATIVE_TEXT: &str = "bad hands";
pub const DEFAULT_FILENAME_PREFIX: &str = "ComfyUI";

/// Build the default graph for `text` with a fixed `seed`.
pub fn text_to_image(text: &str, seed: u64) -> Workflow {
    text_to_image_with_checkpoint(text, seed, DEFAULT_CKPT_NAME)
}

pub fn text_to_image_with_checkpoint(text: &str, seed: u64, ckpt_name: &str) -> Workflow {
    let mut nodes = BTreeMap::new();

    nodes.insert(
        "3".to_string(),
        Node::new(
            "KSampler",
            NodeInputs {
                cfg: Some(DEFAULT_CFG.into()),
                denoise: Some(DEFAULT_DENOISE.into()),
                latent_image: Some(NodeRef::new("5", 0)),
                model: Some(NodeRef::new("4", 0)),
                negative: Some(NodeRef::new("7", 0)),
                positive: Some(NodeRef::new("6", 0)),
                sampler_name: Some(DEFAULT_SAMPLER_NAME.to_string().into()),
                scheduler: Some(DEFAULT_SCHEDULER.to_string().into()),
                seed: Some(seed.into()),
                steps: Some(DEFAULT_STEPS.into()),
                ..Default::default()
            },
        ),
    );
    nodes.insert(
        "4".to_string(),
        Node::new(
            "CheckpointLoaderSimple",
            NodeInputs {
                ckpt_name: Some(ckpt_name.to_string().into()),
                ..Default::default()
            },
        ),
    );
    nodes.insert(
        "5".to_string(),
        Node::new(
            "EmptyLatentImage",
            NodeInputs {
                batch_size: Some(DEFAULT_BATCH_SIZE.into()),
                height: Some(DEFAULT_HEIGHT.into()),
                width: Some(DEFAULT_WIDTH.into()),
                ..Default::default()
            },
        ),
    );
    nodes.insert("6".to_string(), clip_text_encode(text));
    nodes.insert("7".to_string(), clip_text_encode(DEFAULT_NEGATIVE_TEXT));
    nodes.insert(
        "8".to_string(),
        Node::new(
            "VAEDecode",
            NodeInputs {
                samples: Some(NodeRef::new("3", 0)),
                vae: Some(NodeRef::new("4", 2)),
                ..Default::default()
            },
        ),
    );
    nodes.insert(
        "9".to_string(),
        Node::new(
            "SaveImage",
            NodeInputs {
                filename_prefix: Some(DEFAULT_FILENAME_PREFIX.to_string().into()),
                images: Some(NodeRef::new("8", 0)),
                ..Default::default()
            },
        ),
    );

    Workflow::new(nodes)
}

fn clip_text_encode(text: &str) -> Node {
    Node::new(
        "CLIPTextEncode",
        NodeInputs {
            clip: Some(NodeRef::new("4", 1)),
            text: Some(text.to_string().into()),
            ..Default::default()
        },
    )
}
