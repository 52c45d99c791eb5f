use std::fs::File;
use std::io::{self, BufReader, Read};

use pulsegate_core::{Frame, FrameSource, SourceError};

/// Packed RGB24 frames of a fixed size, back to back, read from a file or stdin.
///
/// This is what `ffmpeg -f v4l2 -i /dev/video0 -f rawvideo -pix_fmt rgb24 -`
/// produces, so any capture device ffmpeg can open can feed a session.
pub struct RawVideoSource {
    reader: Box<dyn Read>,
    pub width: u32,
    pub height: u32,
    frames_read: usize,
}

impl RawVideoSource {
    /// Open `path`, or stdin when `path` is `-`.
    pub fn open(path: &str, width: u32, height: u32) -> Result<Self, SourceError> {
        let reader: Box<dyn Read> = if path == "-" {
            Box::new(io::stdin().lock())
        } else {
            let file = File::open(path).map_err(|source| SourceError::Open {
                path: path.to_string(),
                source,
            })?;
            Box::new(BufReader::new(file))
        };

        tracing::info!(source = path, width, height, "raw video source opened");
        Ok(Self::from_reader(reader, width, height))
    }

    pub fn from_reader(reader: Box<dyn Read>, width: u32, height: u32) -> Self {
        Self {
            reader,
            width,
            height,
            frames_read: 0,
        }
    }

    fn frame_len(&self) -> usize {
        self.width as usize * self.height as usize * Frame::CHANNELS
    }
}

impl FrameSource for RawVideoSource {
    fn next_frame(&mut self) -> Result<Option<Frame>, SourceError> {
        let mut data = vec![0u8; self.frame_len()];
        let mut filled = 0;

        while filled < data.len() {
            match self.reader.read(&mut data[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(SourceError::Read(e)),
            }
        }

        if filled < data.len() {
            if filled > 0 {
                tracing::warn!(
                    bytes = filled,
                    expected = data.len(),
                    frame = self.frames_read,
                    "truncated trailing frame discarded"
                );
            }
            return Ok(None);
        }

        self.frames_read += 1;
        Ok(Frame::from_rgb(data, self.width, self.height))
    }
}
