use std::path::{Path, PathBuf};

use pulsegate_core::{Frame, FrameSource, SourceError};

const FRAME_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "ppm", "pgm", "tif", "tiff"];

/// A directory of still frames played back in filename order.
///
/// Zero-padded names (`frame_0001.png`, ...) sort correctly; anything without
/// a recognised image extension is skipped.
pub struct FrameDirSource {
    paths: std::vec::IntoIter<PathBuf>,
}

impl FrameDirSource {
    pub fn open(dir: &Path) -> Result<Self, SourceError> {
        let open_err = |source: std::io::Error| SourceError::Open {
            path: dir.display().to_string(),
            source,
        };

        let mut paths = Vec::new();
        for entry in std::fs::read_dir(dir).map_err(open_err)? {
            let path = entry.map_err(open_err)?.path();
            if path.is_file() && has_frame_extension(&path) {
                paths.push(path);
            }
        }

        if paths.is_empty() {
            return Err(SourceError::Empty(dir.display().to_string()));
        }
        paths.sort();

        tracing::info!(dir = %dir.display(), frames = paths.len(), "frame directory opened");
        Ok(Self {
            paths: paths.into_iter(),
        })
    }
}

fn has_frame_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| FRAME_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

impl FrameSource for FrameDirSource {
    fn next_frame(&mut self) -> Result<Option<Frame>, SourceError> {
        let Some(path) = self.paths.next() else {
            return Ok(None);
        };

        let rgb = image::open(&path)
            .map_err(|e| SourceError::Decode {
                path: path.display().to_string(),
                message: e.to_string(),
            })?
            .to_rgb8();
        let (width, height) = rgb.dimensions();

        Ok(Frame::from_rgb(rgb.into_raw(), width, height))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use std::fs;

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "pulsegate-hw-{tag}-{}",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_plays_frames_in_name_order() {
        let dir = temp_dir("order");
        let frames = [
            ("frame_002.png", 20u8),
            ("frame_001.png", 10),
            ("frame_010.png", 30),
        ];
        for (name, green) in frames {
            RgbImage::from_pixel(4, 3, Rgb([0, green, 0]))
                .save(dir.join(name))
                .unwrap();
        }
        fs::write(dir.join("notes.txt"), b"ignored").unwrap();

        let mut src = FrameDirSource::open(&dir).unwrap();
        let mut greens = Vec::new();
        while let Some(frame) = src.next_frame().unwrap() {
            assert_eq!((frame.width(), frame.height()), (4, 3));
            greens.push(frame.data()[1]);
        }
        assert_eq!(greens, vec![10, 20, 30]);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_empty_directory_rejected() {
        let dir = temp_dir("empty");
        fs::write(dir.join("readme.md"), b"no frames").unwrap();
        assert!(matches!(FrameDirSource::open(&dir), Err(SourceError::Empty(_))));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_missing_directory_rejected() {
        let dir = std::env::temp_dir().join("pulsegate-hw-does-not-exist-4242");
        assert!(matches!(FrameDirSource::open(&dir), Err(SourceError::Open { .. })));
    }

    #[test]
    fn test_corrupt_frame_is_error() {
        let dir = temp_dir("corrupt");
        fs::write(dir.join("frame_001.png"), b"garbage").unwrap();
        let mut src = FrameDirSource::open(&dir).unwrap();
        assert!(matches!(src.next_frame(), Err(SourceError::Decode { .. })));
        let _ = fs::remove_dir_all(&dir);
    }
}
