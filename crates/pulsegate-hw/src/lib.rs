//! Frame sources and feedback sinks for capture sessions.
//!
//! Device access stays outside the process: a camera is read through any
//! tool that emits raw RGB24 (ffmpeg, gstreamer), or a clip is replayed from a
//! directory of frames.

pub mod frames_dir;
pub mod preview;
pub mod raw;

use std::path::Path;

use pulsegate_core::{FrameSource, SessionConfig, SourceError};

pub use frames_dir::FrameDirSource;
pub use preview::RoiPreview;
pub use raw::RawVideoSource;

/// Open the source named by `config.source`.
///
/// A directory is replayed frame by frame; anything else (including `-` for
/// stdin) is read as a raw RGB24 stream of `frame_width` × `frame_height`.
pub fn open_source(config: &SessionConfig) -> Result<Box<dyn FrameSource>, SourceError> {
    let path = Path::new(&config.source);
    if config.source != "-" && path.is_dir() {
        return Ok(Box::new(FrameDirSource::open(path)?));
    }
    Ok(Box::new(RawVideoSource::open(
        &config.source,
        config.frame_width,
        config.frame_height,
    )?))
}
