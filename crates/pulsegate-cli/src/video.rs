//! `pulsegate video`: capture a few seconds of fingertip video and look for a pulse.

use std::future::Future;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use pulsegate_core::{
    CancelToken, CaptureSession, Channel, FeedbackSink, NoFeedback, Roi, SessionConfig,
    SessionReport,
};
use pulsegate_hw::RoiPreview;

#[derive(Args, Debug)]
pub struct VideoArgs {
    /// Raw RGB24 stream file, directory of frames, or `-` for stdin
    #[arg(long)]
    source: Option<String>,
    /// Frame size of a raw stream, WIDTHxHEIGHT
    #[arg(long, value_parser = parse_size)]
    size: Option<FrameSize>,
    /// Fixed ROI as x,y,w,h (default: centred square)
    #[arg(long)]
    roi: Option<Roi>,
    /// Sampling duration in seconds
    #[arg(long)]
    seconds: Option<f64>,
    /// Expected frames per second
    #[arg(long)]
    fps: Option<u32>,
    /// Minimum relative power in the pulse band
    #[arg(long)]
    threshold: Option<f64>,
    /// Colour channel to sample (red, green, blue)
    #[arg(long)]
    channel: Option<Channel>,
    /// Consume the source no faster than --fps
    #[arg(long)]
    pace: bool,
    /// Periodically write the frame with the ROI outlined to this image file
    #[arg(long)]
    preview: Option<PathBuf>,
    /// Write the preview every N frames
    #[arg(long, default_value_t = 10)]
    preview_every: usize,
    /// TOML configuration file (also PULSEGATE_CONFIG)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSize {
    width: u32,
    height: u32,
}

fn parse_size(s: &str) -> Result<FrameSize, String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("invalid size '{s}' (expected WIDTHxHEIGHT)"))?;
    let width = w.trim().parse().map_err(|e| format!("invalid width '{w}': {e}"))?;
    let height = h.trim().parse().map_err(|e| format!("invalid height '{h}': {e}"))?;
    Ok(FrameSize { width, height })
}

/// Build the session configuration: file, then environment, then flags.
fn resolve_config(
    args: &VideoArgs,
    env: impl Fn(&str) -> Option<String>,
) -> Result<SessionConfig> {
    let file = args
        .config
        .clone()
        .or_else(|| env("PULSEGATE_CONFIG").map(PathBuf::from));

    let mut config = match &file {
        Some(path) => {
            tracing::debug!(path = %path.display(), "loading configuration file");
            SessionConfig::from_file(path)?
        }
        None => SessionConfig::default(),
    };
    config.apply_env_from(env);

    if let Some(source) = &args.source {
        config.source = source.clone();
    }
    if let Some(size) = args.size {
        config.frame_width = size.width;
        config.frame_height = size.height;
    }
    if let Some(roi) = args.roi {
        config.roi = roi;
    }
    if let Some(seconds) = args.seconds {
        config.sample_seconds = seconds;
    }
    if let Some(fps) = args.fps {
        config.fps = fps;
    }
    if let Some(threshold) = args.threshold {
        config.power_threshold = threshold;
    }
    if let Some(channel) = args.channel {
        config.channel = channel;
    }
    if args.pace {
        config.pace = true;
    }

    config.validate()?;
    Ok(config)
}

/// Open the source and run one session. Runs on a blocking thread.
fn capture(
    config: SessionConfig,
    preview: Option<(PathBuf, usize)>,
    cancel: CancelToken,
) -> Result<SessionReport> {
    let mut source = pulsegate_hw::open_source(&config)
        .with_context(|| format!("unable to open frame source {}", config.source))?;

    let mut feedback: Box<dyn FeedbackSink> = match preview {
        Some((path, every)) => Box::new(RoiPreview::new(path, every)),
        None => Box::new(NoFeedback),
    };

    let report = CaptureSession::new(config).run(source.as_mut(), feedback.as_mut(), &cancel)?;
    Ok(report)
}

/// First interrupt cancels the session so it can finish with the samples it
/// has. Returns `true` on a second interrupt, which the capture thread may
/// never notice if it is blocked inside a read.
async fn watch_interrupts<F, Fut>(cancel: CancelToken, mut interrupt: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::io::Result<()>>,
{
    if let Err(e) = interrupt().await {
        tracing::warn!(error = %e, "unable to listen for Ctrl-C");
        return false;
    }
    tracing::info!("abort requested; finishing with the samples collected so far");
    cancel.cancel();

    interrupt().await.is_ok()
}

pub async fn run(args: VideoArgs) -> Result<bool> {
    let config = resolve_config(&args, |key| std::env::var(key).ok())?;
    tracing::debug!(?config, "video session configured");

    let cancel = CancelToken::new();
    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if watch_interrupts(cancel, tokio::signal::ctrl_c).await {
                tracing::error!("second interrupt; exiting without a verdict");
                std::process::exit(1);
            }
        })
    };

    let preview = args.preview.map(|p| (p, args.preview_every));
    let report = tokio::task::spawn_blocking(move || capture(config, preview, cancel))
        .await
        .context("capture task failed")??;
    watcher.abort();

    Ok(report.is_live())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::collections::HashMap;

    #[derive(Parser)]
    struct Wrap {
        #[command(flatten)]
        args: VideoArgs,
    }

    fn parse(argv: &[&str]) -> VideoArgs {
        let mut full = vec!["video"];
        full.extend_from_slice(argv);
        Wrap::try_parse_from(full).unwrap().args
    }

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_flags() {
        let config = resolve_config(&parse(&[]), env(&[])).unwrap();
        assert_eq!(config, SessionConfig::default());
    }

    #[test]
    fn test_flags_override_env() {
        let args = parse(&[
            "--seconds",
            "3",
            "--fps",
            "60",
            "--threshold",
            "0.5",
            "--roi",
            "10,10,50,50",
            "--size",
            "320x240",
            "--channel",
            "red",
            "--pace",
        ]);
        let config = resolve_config(
            &args,
            env(&[("PULSEGATE_FPS", "25"), ("PULSEGATE_SOURCE", "/tmp/clip.rgb")]),
        )
        .unwrap();
        assert_eq!(config.sample_seconds, 3.0);
        assert_eq!(config.fps, 60);
        assert_eq!(config.power_threshold, 0.5);
        assert_eq!(config.roi, Roi::new(10, 10, 50, 50));
        assert_eq!((config.frame_width, config.frame_height), (320, 240));
        assert_eq!(config.channel, Channel::Red);
        assert!(config.pace);
        // not overridden on the command line
        assert_eq!(config.source, "/tmp/clip.rgb");
    }

    #[test]
    fn test_config_file_from_env() {
        let path = std::env::temp_dir().join(format!(
            "pulsegate-cli-config-{}.toml",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        std::fs::write(&path, "sample_seconds = 7.5\nfps = 15\n").unwrap();
        let path_str = path.to_string_lossy().into_owned();

        let config = resolve_config(
            &parse(&["--fps", "20"]),
            env(&[("PULSEGATE_CONFIG", path_str.as_str())]),
        )
        .unwrap();
        assert_eq!(config.sample_seconds, 7.5);
        assert_eq!(config.fps, 20);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(resolve_config(&parse(&["--fps", "0"]), env(&[])).is_err());
        assert!(resolve_config(&parse(&["--threshold", "2"]), env(&[])).is_err());
        assert!(Wrap::try_parse_from(["video", "--size", "640"]).is_err());
        assert!(Wrap::try_parse_from(["video", "--roi", "1,2"]).is_err());
    }

    /// Interrupt source that yields the given results in order, then never resolves.
    fn interrupts(
        results: Vec<std::io::Result<()>>,
    ) -> impl FnMut() -> std::pin::Pin<Box<dyn Future<Output = std::io::Result<()>> + Send>> {
        let mut results = results.into_iter();
        move || match results.next() {
            Some(r) => Box::pin(std::future::ready(r)),
            None => Box::pin(std::future::pending()),
        }
    }

    #[tokio::test]
    async fn test_second_interrupt_requests_exit() {
        let cancel = CancelToken::new();
        let exit = watch_interrupts(cancel.clone(), interrupts(vec![Ok(()), Ok(())])).await;
        assert!(exit);
        assert!(cancel.is_cancelled());
    }

    #[tokio::test]
    async fn test_single_interrupt_only_cancels() {
        let cancel = CancelToken::new();
        let watcher = tokio::spawn(watch_interrupts(cancel.clone(), interrupts(vec![Ok(())])));
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(cancel.is_cancelled());
        assert!(!watcher.is_finished());
        watcher.abort();
    }

    #[tokio::test]
    async fn test_listener_failure_leaves_session_running() {
        let cancel = CancelToken::new();
        let failed = std::io::Error::new(std::io::ErrorKind::Other, "no signal handler");
        let exit = watch_interrupts(cancel.clone(), interrupts(vec![Err(failed)])).await;
        assert!(!exit);
        assert!(!cancel.is_cancelled());
    }

    #[test]
    fn test_parse_size() {
        assert_eq!(
            parse_size("640x480").unwrap(),
            FrameSize {
                width: 640,
                height: 480
            }
        );
        assert!(parse_size("640*480").is_err());
    }

    #[test]
    fn test_capture_replays_raw_file() {
        // 90 flat 4x4 frames: enough data, no pulse
        let path = std::env::temp_dir().join(format!(
            "pulsegate-cli-clip-{}.rgb",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        std::fs::write(&path, vec![100u8; 4 * 4 * 3 * 90]).unwrap();
        let config = SessionConfig {
            source: path.to_string_lossy().into_owned(),
            frame_width: 4,
            frame_height: 4,
            roi: Roi::new(0, 0, 4, 4),
            ..SessionConfig::default()
        };

        let report = capture(config, None, CancelToken::new()).unwrap();
        assert_eq!(report.frames, 90);
        assert!(!report.is_live());

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_capture_missing_source_is_error() {
        let config = SessionConfig {
            source: "/nonexistent/pulsegate/clip.rgb".into(),
            ..SessionConfig::default()
        };
        let err = capture(config, None, CancelToken::new()).unwrap_err();
        assert!(err.to_string().contains("unable to open frame source"));
    }
}
