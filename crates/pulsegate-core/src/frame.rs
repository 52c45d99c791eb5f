use serde::Deserialize;

use crate::roi::Roi;

/// Colour channel sampled from each frame.
///
/// Green is the default: haemoglobin absorbs strongly in the green band, so the
/// blood-volume pulse shows up there with the best contrast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Red,
    #[default]
    Green,
    Blue,
}

impl Channel {
    /// Byte offset of this channel inside an interleaved RGB pixel.
    pub fn offset(self) -> usize {
        match self {
            Channel::Red => 0,
            Channel::Green => 1,
            Channel::Blue => 2,
        }
    }
}

impl std::str::FromStr for Channel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "red" | "r" => Ok(Channel::Red),
            "green" | "g" => Ok(Channel::Green),
            "blue" | "b" => Ok(Channel::Blue),
            other => Err(format!("unknown channel '{other}' (expected red, green or blue)")),
        }
    }
}

/// A single captured frame: packed RGB24, row-major, no padding.
///
/// Only [`Frame::from_rgb`] builds one, so `data` always holds exactly
/// `width * height * 3` bytes.
#[derive(Debug, Clone)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
}

impl Frame {
    pub const CHANNELS: usize = 3;

    /// Wrap an RGB24 buffer. Returns `None` if the buffer length does not
    /// match `width * height * 3`.
    pub fn from_rgb(data: Vec<u8>, width: u32, height: u32) -> Option<Self> {
        let expected = width as usize * height as usize * Self::CHANNELS;
        (data.len() == expected).then_some(Self {
            data,
            width,
            height,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Packed RGB24 pixel bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Mean intensity of one channel over the ROI.
    ///
    /// The ROI must fit inside the frame (see [`Roi::fits`]); pixels outside
    /// the frame are never read.
    pub fn channel_mean(&self, roi: &Roi, channel: Channel) -> f64 {
        let x0 = (roi.x as usize).min(self.width as usize);
        let y0 = (roi.y as usize).min(self.height as usize);
        let x1 = (roi.x as usize + roi.w as usize).min(self.width as usize);
        let y1 = (roi.y as usize + roi.h as usize).min(self.height as usize);

        let count = (x1 - x0) * (y1 - y0);
        if count == 0 {
            return 0.0;
        }

        let stride = self.width as usize * Self::CHANNELS;
        let offset = channel.offset();
        let mut sum = 0u64;
        for row in y0..y1 {
            let line = &self.data[row * stride..(row + 1) * stride];
            for col in x0..x1 {
                sum += line[col * Self::CHANNELS + offset] as u64;
            }
        }

        sum as f64 / count as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Frame where every pixel is (r, g, b).
    fn solid(width: u32, height: u32, rgb: [u8; 3]) -> Frame {
        let data = rgb
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 3)
            .collect();
        Frame::from_rgb(data, width, height).unwrap()
    }

    #[test]
    fn test_from_rgb_rejects_wrong_length() {
        assert!(Frame::from_rgb(vec![0; 10], 2, 2).is_none());
        assert!(Frame::from_rgb(vec![0; 12], 2, 2).is_some());
    }

    #[test]
    fn test_channel_mean_picks_channel() {
        let frame = solid(8, 6, [10, 200, 30]);
        let roi = Roi::new(1, 1, 4, 3);
        assert_eq!(frame.channel_mean(&roi, Channel::Red), 10.0);
        assert_eq!(frame.channel_mean(&roi, Channel::Green), 200.0);
        assert_eq!(frame.channel_mean(&roi, Channel::Blue), 30.0);
    }

    #[test]
    fn test_channel_mean_only_reads_roi() {
        // 4x2 frame: left half green=0, right half green=100
        let mut frame = solid(4, 2, [0, 0, 0]);
        for y in 0..2 {
            for x in 2..4 {
                frame.data[(y * 4 + x) * 3 + 1] = 100;
            }
        }
        assert_eq!(frame.channel_mean(&Roi::new(2, 0, 2, 2), Channel::Green), 100.0);
        assert_eq!(frame.channel_mean(&Roi::new(0, 0, 2, 2), Channel::Green), 0.0);
        assert_eq!(frame.channel_mean(&Roi::new(1, 0, 2, 1), Channel::Green), 50.0);
    }

    #[test]
    fn test_channel_mean_clamps_roi_to_frame() {
        let frame = solid(4, 4, [0, 60, 0]);
        assert_eq!(frame.channel_mean(&Roi::new(2, 2, 10, 10), Channel::Green), 60.0);
        assert_eq!(frame.channel_mean(&Roi::new(9, 9, 3, 3), Channel::Green), 0.0);
        assert_eq!((frame.width(), frame.height(), frame.data().len()), (4, 4, 48));
    }

    #[test]
    fn test_channel_parse() {
        assert_eq!("GREEN".parse::<Channel>().unwrap(), Channel::Green);
        assert_eq!("r".parse::<Channel>().unwrap(), Channel::Red);
        assert!("infrared".parse::<Channel>().is_err());
    }
}
