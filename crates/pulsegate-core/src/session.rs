use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::config::SessionConfig;
use crate::frame::Frame;
use crate::liveness::{self, LivenessReport};
use crate::roi::{select_roi, Roi};
use crate::signal::SignalBuffer;

/// Relative deviation between achieved and configured frame rate that earns a warning.
const FPS_DIVERGENCE_WARN: f64 = 0.2;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("failed to open frame source {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read frame: {0}")]
    Read(#[from] std::io::Error),
    #[error("failed to decode frame {path}: {message}")]
    Decode { path: String, message: String },
    #[error("frame source is empty: {0}")]
    Empty(String),
}

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("frame source error: {0}")]
    Source(#[from] SourceError),
    #[error("ROI {roi} does not fit inside a {width}x{height} frame")]
    RoiOutOfBounds { roi: Roi, width: u32, height: u32 },
}

/// Producer of frames for a capture session.
pub trait FrameSource {
    /// Block until the next frame is available. `Ok(None)` signals end of stream.
    fn next_frame(&mut self) -> Result<Option<Frame>, SourceError>;
}

/// Receives every captured frame together with the ROI sampled from it.
pub trait FeedbackSink {
    fn show(&mut self, frame: &Frame, roi: &Roi);
}

/// Sink that discards all feedback.
pub struct NoFeedback;

impl FeedbackSink for NoFeedback {
    fn show(&mut self, _frame: &Frame, _roi: &Roi) {}
}

/// Cooperative cancellation flag, polled once per captured frame.
#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Why sampling stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// `sample_seconds` of wall-clock time elapsed.
    Duration,
    /// The frame source ran dry.
    EndOfStream,
    /// The cancel token was tripped.
    Cancelled,
}

/// Outcome of one capture session.
#[derive(Debug, Clone)]
pub struct SessionReport {
    pub liveness: LivenessReport,
    pub stop_reason: StopReason,
    /// Frames pulled from the source, including any evicted from the window.
    pub frames: usize,
    pub elapsed: Duration,
}

impl SessionReport {
    pub fn is_live(&self) -> bool {
        self.liveness.is_live
    }

    /// Frame rate actually delivered by the source.
    pub fn achieved_fps(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.frames as f64 / secs
        } else {
            0.0
        }
    }
}

/// One liveness capture: sample frames, then analyse the trace once.
///
/// The session owns its buffer and configuration; nothing survives between
/// calls to [`CaptureSession::run`].
pub struct CaptureSession {
    config: SessionConfig,
}

impl CaptureSession {
    pub fn new(config: SessionConfig) -> Self {
        Self { config }
    }

    /// Pull frames until the duration elapses, the source ends, or `cancel`
    /// is tripped, then decide liveness.
    ///
    /// Source failures and an ROI that does not fit the frame abort the
    /// session. A short trace is not an error; it yields a negative verdict.
    pub fn run(
        &self,
        source: &mut dyn FrameSource,
        feedback: &mut dyn FeedbackSink,
        cancel: &CancelToken,
    ) -> Result<SessionReport, CaptureError> {
        let cfg = &self.config;
        let mut buffer = SignalBuffer::for_session(cfg.sample_seconds, cfg.fps);
        let duration =
            Duration::try_from_secs_f64(cfg.sample_seconds.max(0.0)).unwrap_or(Duration::MAX);
        let frame_interval = Duration::from_secs_f64(1.0 / cfg.fps.max(1) as f64);

        tracing::info!(
            seconds = cfg.sample_seconds,
            fps = cfg.fps,
            capacity = buffer.capacity(),
            channel = ?cfg.channel,
            roi = %cfg.roi,
            "capture session started"
        );

        let start = Instant::now();
        let mut frames = 0usize;

        let stop_reason = loop {
            if cancel.is_cancelled() {
                break StopReason::Cancelled;
            }

            let Some(frame) = source.next_frame()? else {
                break StopReason::EndOfStream;
            };
            frames += 1;

            let roi = select_roi(frame.height(), frame.width(), cfg.roi);
            if !roi.fits(frame.width(), frame.height()) {
                return Err(CaptureError::RoiOutOfBounds {
                    roi,
                    width: frame.width(),
                    height: frame.height(),
                });
            }

            let sample = frame.channel_mean(&roi, cfg.channel);
            buffer.push(sample);
            tracing::trace!(frame = frames, sample, "sample captured");

            feedback.show(&frame, &roi);

            let elapsed = start.elapsed();
            if elapsed >= duration {
                break StopReason::Duration;
            }

            if cfg.pace {
                let ticks = u32::try_from(frames).unwrap_or(u32::MAX);
                let due = frame_interval.saturating_mul(ticks);
                if let Some(wait) = due.checked_sub(elapsed) {
                    std::thread::sleep(wait.min(duration - elapsed));
                }
            }
        };

        let elapsed = start.elapsed();
        let samples = buffer.snapshot();
        let liveness = liveness::evaluate(&samples, cfg.fps as f64, cfg.power_threshold);

        let report = SessionReport {
            liveness,
            stop_reason,
            frames,
            elapsed,
        };

        // The analysis assumes the configured rate; flag sources that do not deliver it.
        let achieved = report.achieved_fps();
        if stop_reason == StopReason::Duration
            && (achieved - cfg.fps as f64).abs() > cfg.fps as f64 * FPS_DIVERGENCE_WARN
        {
            tracing::warn!(
                configured = cfg.fps,
                achieved,
                "achieved frame rate diverges from configured fps; pulse band may be mis-scaled"
            );
        }

        tracing::info!(
            stop = ?stop_reason,
            frames,
            samples = report.liveness.samples,
            ratio = ?report.liveness.ratio,
            live = report.liveness.is_live,
            elapsed_ms = elapsed.as_millis() as u64,
            "capture session finished"
        );

        Ok(report)
    }
}
