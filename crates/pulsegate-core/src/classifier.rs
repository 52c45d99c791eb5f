//! Static-image liveness scoring.
//!
//! The video pulse check is the primary gate; a pre-trained binary classifier
//! can score a single fingerprint image as an alternative. Backends implement
//! [`LivenessScorer`] so the inference engine can be swapped without touching
//! the capture pipeline. [`OnnxClassifier`] is the stock backend.

use std::path::Path;

use image::imageops::FilterType;
use image::DynamicImage;
use ndarray::Array4;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;
use thiserror::Error;

/// Side length of the square model input.
pub const INPUT_SIZE: u32 = 224;

/// Default probability threshold for a live verdict.
pub const DEFAULT_IMAGE_THRESHOLD: f32 = 0.5;

#[derive(Error, Debug)]
pub enum ScorerError {
    #[error("failed to load model {path}: {message}")]
    Load { path: String, message: String },
    #[error("inference failed: {0}")]
    Inference(String),
    #[error("model produced no usable output: {0}")]
    InvalidOutput(String),
}

#[derive(Error, Debug)]
pub enum ImageError {
    #[error("image not found: {0}")]
    NotFound(String),
    #[error("failed to decode image {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: image::ImageError,
    },
}

/// Anything that maps an image to a probability of being live.
pub trait LivenessScorer {
    /// Probability in `[0, 1]` that the image shows a live finger.
    fn predict(&mut self, image: &DynamicImage) -> Result<f32, ScorerError>;

    fn is_live(&mut self, image: &DynamicImage, threshold: f32) -> Result<bool, ScorerError> {
        Ok(self.predict(image)? >= threshold)
    }
}

/// Memory layout of the model's input tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputLayout {
    /// `[1, H, W, 3]` (Keras/TFLite exports).
    #[default]
    Nhwc,
    /// `[1, 3, H, W]` (PyTorch exports).
    Nchw,
}

/// Read an image from disk. A missing file is reported as [`ImageError::NotFound`].
pub fn load_image(path: &Path) -> Result<DynamicImage, ImageError> {
    if !path.exists() {
        return Err(ImageError::NotFound(path.display().to_string()));
    }
    image::open(path).map_err(|source| ImageError::Decode {
        path: path.display().to_string(),
        source,
    })
}

/// RGB, resized to `INPUT_SIZE` square, scaled to `[0, 1]`, batch of one.
pub fn preprocess(image: &DynamicImage, layout: InputLayout) -> Array4<f32> {
    let resized = image
        .resize_exact(INPUT_SIZE, INPUT_SIZE, FilterType::Triangle)
        .to_rgb8();
    let side = INPUT_SIZE as usize;
    let pixel = |y: usize, x: usize, c: usize| {
        resized.get_pixel(x as u32, y as u32)[c] as f32 / 255.0
    };

    match layout {
        InputLayout::Nhwc => {
            Array4::from_shape_fn((1, side, side, 3), |(_, y, x, c)| pixel(y, x, c))
        }
        InputLayout::Nchw => {
            Array4::from_shape_fn((1, 3, side, side), |(_, c, y, x)| pixel(y, x, c))
        }
    }
}

/// Single-output sigmoid classifier served by ONNX Runtime.
pub struct OnnxClassifier {
    session: Session,
    layout: InputLayout,
}

impl OnnxClassifier {
    pub fn load(model_path: &str, layout: InputLayout) -> Result<Self, ScorerError> {
        let load_err = |e: &dyn std::fmt::Display| ScorerError::Load {
            path: model_path.to_string(),
            message: e.to_string(),
        };

        let session = Session::builder()
            .map_err(|e| load_err(&e))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| load_err(&e))?
            .commit_from_file(model_path)
            .map_err(|e| load_err(&e))?;

        tracing::debug!(path = model_path, ?layout, "classifier model loaded");
        Ok(Self { session, layout })
    }
}

impl LivenessScorer for OnnxClassifier {
    fn predict(&mut self, image: &DynamicImage) -> Result<f32, ScorerError> {
        let input = preprocess(image, self.layout);
        let tensor =
            Tensor::from_array(input).map_err(|e| ScorerError::Inference(e.to_string()))?;

        let outputs = self
            .session
            .run(ort::inputs![tensor])
            .map_err(|e| ScorerError::Inference(e.to_string()))?;

        let (_, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| ScorerError::InvalidOutput(e.to_string()))?;

        let raw = data
            .first()
            .copied()
            .ok_or_else(|| ScorerError::InvalidOutput("empty output tensor".into()))?;
        probability(raw)
    }
}

/// Clamp a raw model output into `[0, 1]`; NaN is rejected.
fn probability(raw: f32) -> Result<f32, ScorerError> {
    if raw.is_nan() {
        return Err(ScorerError::InvalidOutput("output is NaN".into()));
    }
    Ok(raw.clamp(0.0, 1.0))
}
