//! The built-in QR-code ControlNet workflow.

use super::plan::{NodeSpec, Phase, PipelinePlan};

pub const CHECKPOINT: &str = "dreamshaper_8.safetensors";
pub const TILE_CONTROLNET: &str = "control_v11f1e_sd15_tile.pth";
pub const BRIGHTNESS_CONTROLNET: &str = "control_v1p_sd15_brightness.safetensors";
pub const INPUT_IMAGE: &str = "qr-code_resized.png";
pub const VAE: &str = "vae-ft-mse-840000-ema-pruned.safetensors";

/// Id of the node whose first output is the decoded image.
pub const OUTPUT_NODE: &str = "decode";

/// Build the default plan.
///
/// Two chained ControlNet applications (tile, then brightness) steer a
/// 20-step Euler sampler over an empty 768x768 latent batch of 4.
pub fn default_plan() -> PipelinePlan {
    use Phase::{Loop, Setup};

    let nodes = vec![
        NodeSpec::new("checkpoint", "CheckpointLoaderSimple", "load_checkpoint", Setup)
            .literal("ckpt_name", CHECKPOINT)
            .loads("checkpoints", "ckpt_name"),
        NodeSpec::new("empty_latent", "EmptyLatentImage", "generate", Setup)
            .literal("width", 768)
            .literal("height", 768)
            .literal("batch_size", 4),
        NodeSpec::new("positive_prompt", "CLIPTextEncode", "encode", Setup)
            .literal("text", "a cyborg\n")
            .link("clip", "checkpoint", 1),
        NodeSpec::new("negative_prompt", "CLIPTextEncode", "encode", Setup)
            .literal("text", "ugly, artefacts, bad")
            .link("clip", "checkpoint", 1),
        NodeSpec::new("tile_controlnet", "ControlNetLoader", "load_controlnet", Setup)
            .literal("control_net_name", TILE_CONTROLNET)
            .loads("controlnet", "control_net_name"),
        NodeSpec::new("brightness_controlnet", "ControlNetLoader", "load_controlnet", Setup)
            .literal("control_net_name", BRIGHTNESS_CONTROLNET)
            .loads("controlnet", "control_net_name"),
        NodeSpec::new("qr_image", "LoadImage", "load_image", Setup)
            .literal("image", INPUT_IMAGE)
            .loads("input", "image"),
        NodeSpec::new("vae", "VAELoader", "load_vae", Setup)
            .literal("vae_name", VAE)
            .loads("vae", "vae_name"),
        // Active for 35%..60% of the schedule.
        NodeSpec::new("tile_control", "ControlNetApplyAdvanced", "apply_controlnet", Loop)
            .literal("strength", 0.75)
            .literal("start_percent", 0.35000000000000003)
            .literal("end_percent", 0.6)
            .link("positive", "positive_prompt", 0)
            .link("negative", "negative_prompt", 0)
            .link("control_net", "tile_controlnet", 0)
            .link("image", "qr_image", 0),
        NodeSpec::new("brightness_control", "ControlNetApplyAdvanced", "apply_controlnet", Loop)
            .literal("strength", 0.35000000000000003)
            .literal("start_percent", 0)
            .literal("end_percent", 1)
            .link("positive", "tile_control", 0)
            .link("negative", "tile_control", 1)
            .link("control_net", "brightness_controlnet", 0)
            .link("image", "qr_image", 0),
        NodeSpec::new("sampler", "KSampler", "sample", Loop)
            .seed("seed")
            .literal("steps", 20)
            .literal("cfg", 8)
            .literal("sampler_name", "euler")
            .literal("scheduler", "normal")
            .literal("denoise", 1)
            .link("model", "checkpoint", 0)
            .link("positive", "brightness_control", 0)
            .link("negative", "brightness_control", 1)
            .link("latent_image", "empty_latent", 0),
        NodeSpec::new(OUTPUT_NODE, "VAEDecode", "decode", Loop)
            .link("samples", "sampler", 0)
            .link("vae", "vae", 0),
    ];

    PipelinePlan {
        nodes,
        output: OUTPUT_NODE.to_string(),
    }
}
