//! Finger liveness from a short video of the fingertip.
//!
//! Each frame contributes one sample, the mean of one colour channel over the
//! ROI. When the session ends the trace is detrended, its power spectrum is
//! estimated with Welch's method, and the finger is accepted as live if enough
//! of that power sits in the heart-rate band.

pub mod classifier;
pub mod config;
pub mod frame;
pub mod liveness;
pub mod roi;
pub mod session;
pub mod signal;
pub mod spectral;

pub use classifier::{InputLayout, LivenessScorer, OnnxClassifier, ScorerError};
pub use config::{ConfigError, SessionConfig};
pub use frame::{Channel, Frame};
pub use liveness::{LivenessReport, DEFAULT_POWER_THRESHOLD};
pub use roi::{select_roi, Roi};
pub use session::{
    CancelToken, CaptureError, CaptureSession, FeedbackSink, FrameSource, NoFeedback,
    SessionReport, SourceError, StopReason,
};
pub use signal::{SignalBuffer, MAX_WINDOW_SAMPLES};
pub use spectral::SpectralEstimate;
