use std::path::PathBuf;

use image::{Rgb, RgbImage};
use pulsegate_core::{FeedbackSink, Frame, Roi};

const OUTLINE: Rgb<u8> = Rgb([0, 255, 0]);

/// Feedback sink that periodically writes the current frame, with the sampled
/// ROI outlined in green, to a single image file.
///
/// Write failures are logged once and never interrupt the session.
pub struct RoiPreview {
    path: PathBuf,
    every: usize,
    seen: usize,
    failed: bool,
}

impl RoiPreview {
    /// Write every `every`-th frame (the first frame is always written).
    pub fn new(path: impl Into<PathBuf>, every: usize) -> Self {
        Self {
            path: path.into(),
            every: every.max(1),
            seen: 0,
            failed: false,
        }
    }
}

impl FeedbackSink for RoiPreview {
    fn show(&mut self, frame: &Frame, roi: &Roi) {
        let due = self.seen % self.every == 0;
        self.seen += 1;
        if !due || self.failed {
            return;
        }

        let Some(image) = annotate(frame, roi) else {
            return;
        };
        if let Err(e) = image.save(&self.path) {
            tracing::warn!(
                path = %self.path.display(),
                error = %e,
                "preview write failed; disabling preview"
            );
            self.failed = true;
        }
    }
}

/// Copy of the frame with a one-pixel outline around the ROI.
pub fn annotate(frame: &Frame, roi: &Roi) -> Option<RgbImage> {
    let (width, height) = (frame.width(), frame.height());
    let mut image = RgbImage::from_raw(width, height, frame.data().to_vec())?;
    if !roi.fits(width, height) {
        return Some(image);
    }

    let (x0, y0) = (roi.x, roi.y);
    let (x1, y1) = (roi.x + roi.w - 1, roi.y + roi.h - 1);
    for x in x0..=x1 {
        image.put_pixel(x, y0, OUTLINE);
        image.put_pixel(x, y1, OUTLINE);
    }
    for y in y0..=y1 {
        image.put_pixel(x0, y, OUTLINE);
        image.put_pixel(x1, y, OUTLINE);
    }
    Some(image)
}
