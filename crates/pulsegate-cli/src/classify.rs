//! `pulsegate image`: score a single fingerprint image with an ONNX classifier.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use pulsegate_core::classifier::{load_image, DEFAULT_IMAGE_THRESHOLD};
use pulsegate_core::{InputLayout, LivenessScorer, OnnxClassifier};
use pulsegate_models::{verify_model, Verification};

#[derive(Args, Debug)]
pub struct ImageArgs {
    /// Path to the ONNX classifier (single sigmoid output, 224x224 RGB input)
    model: PathBuf,
    /// Path to the fingerprint image
    image: PathBuf,
    /// Probability threshold for liveness
    #[arg(long, default_value_t = DEFAULT_IMAGE_THRESHOLD)]
    threshold: f32,
    /// Expected SHA-256 of the model (default: <MODEL>.sha256 sidecar, if present)
    #[arg(long)]
    model_sha256: Option<String>,
    /// Model takes channels-first input ([1, 3, 224, 224])
    #[arg(long)]
    nchw: bool,
}

pub fn run(args: ImageArgs) -> Result<bool> {
    // Missing image is an input error, never a verdict
    let image = load_image(&args.image)?;

    match verify_model(&args.model, args.model_sha256.as_deref())? {
        Verification::Verified(digest) => tracing::info!(
            path = %args.model.display(),
            sha256 = %digest,
            "model checksum verified"
        ),
        Verification::Unchecked => tracing::warn!(
            path = %args.model.display(),
            "no checksum available; model not verified"
        ),
    }

    let layout = if args.nchw {
        InputLayout::Nchw
    } else {
        InputLayout::Nhwc
    };
    let model_path = args.model.to_string_lossy();
    let mut classifier = OnnxClassifier::load(&model_path, layout)
        .with_context(|| format!("failed to load classifier {model_path}"))?;

    let probability = classifier.predict(&image)?;
    let is_live = probability >= args.threshold;
    tracing::info!(
        image = %args.image.display(),
        probability,
        threshold = args.threshold,
        live = is_live,
        "image scored"
    );

    Ok(is_live)
}
