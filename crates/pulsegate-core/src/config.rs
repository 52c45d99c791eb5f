use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::frame::Channel;
use crate::liveness::DEFAULT_POWER_THRESHOLD;
use crate::roi::Roi;
use crate::signal::{buffer_capacity, MAX_WINDOW_SAMPLES};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Capture session configuration.
///
/// Layered lowest to highest: defaults, TOML file, `PULSEGATE_*` environment
/// variables, then whatever the caller overrides (CLI flags).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    /// Frame source: a raw RGB24 stream file, a directory of frames, or `-` for stdin.
    pub source: String,
    /// Width of frames in a raw stream.
    pub frame_width: u32,
    /// Height of frames in a raw stream.
    pub frame_height: u32,
    /// Fixed ROI. All zeros selects the centred square.
    pub roi: Roi,
    /// Capture duration and buffer-window length in seconds.
    pub sample_seconds: f64,
    /// Assumed capture rate. Sizes the buffer and sets the PSD sample rate;
    /// never measured from the stream.
    pub fps: u32,
    /// Minimum in-band power fraction for a live verdict.
    pub power_threshold: f64,
    /// Channel averaged over the ROI.
    pub channel: Channel,
    /// Sleep between frames so a replayed source is consumed at `fps`.
    pub pace: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            source: "-".to_string(),
            frame_width: 640,
            frame_height: 480,
            roi: Roi::default(),
            sample_seconds: 5.0,
            fps: 30,
            power_threshold: DEFAULT_POWER_THRESHOLD,
            channel: Channel::Green,
            pace: false,
        }
    }
}

impl SessionConfig {
    /// Parse a TOML document. Missing keys keep their defaults.
    pub fn from_toml_str(s: &str, origin: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|source| ConfigError::Parse {
            path: origin.to_string(),
            source,
        })
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&contents, &path.display().to_string())
    }

    /// Overlay `PULSEGATE_*` environment variables.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Overlay variables from `lookup`. Unparseable values are logged and ignored.
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("PULSEGATE_SOURCE") {
            self.source = v;
        }
        env_parse(&lookup, "PULSEGATE_FRAME_WIDTH", &mut self.frame_width);
        env_parse(&lookup, "PULSEGATE_FRAME_HEIGHT", &mut self.frame_height);
        env_parse(&lookup, "PULSEGATE_ROI", &mut self.roi);
        env_parse(&lookup, "PULSEGATE_SAMPLE_SECONDS", &mut self.sample_seconds);
        env_parse(&lookup, "PULSEGATE_FPS", &mut self.fps);
        env_parse(&lookup, "PULSEGATE_POWER_THRESHOLD", &mut self.power_threshold);
        env_parse(&lookup, "PULSEGATE_CHANNEL", &mut self.channel);
        if let Some(v) = lookup("PULSEGATE_PACE") {
            self.pace = v != "0";
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.sample_seconds.is_finite() && self.sample_seconds > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "sample_seconds must be positive, got {}",
                self.sample_seconds
            )));
        }
        if self.fps == 0 {
            return Err(ConfigError::Invalid("fps must be at least 1".into()));
        }
        let window = buffer_capacity(self.sample_seconds, self.fps);
        if window > MAX_WINDOW_SAMPLES
            || std::time::Duration::try_from_secs_f64(self.sample_seconds).is_err()
        {
            return Err(ConfigError::Invalid(format!(
                "sample_seconds {} at {} fps exceeds the window limit of {} samples",
                self.sample_seconds, self.fps, MAX_WINDOW_SAMPLES
            )));
        }
        if !(0.0..=1.0).contains(&self.power_threshold) {
            return Err(ConfigError::Invalid(format!(
                "power_threshold must be within [0, 1], got {}",
                self.power_threshold
            )));
        }
        if !self.roi.is_unset() && (self.roi.w == 0 || self.roi.h == 0) {
            return Err(ConfigError::Invalid(format!(
                "roi {} has zero width or height",
                self.roi
            )));
        }
        if self.frame_width == 0 || self.frame_height == 0 {
            return Err(ConfigError::Invalid("frame size must be non-zero".into()));
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    target: &mut T,
) {
    let Some(raw) = lookup(key) else {
        return;
    };
    match raw.parse() {
        Ok(v) => *target = v,
        Err(_) => tracing::warn!(key, value = %raw, "ignoring unparseable environment value"),
    }
}
