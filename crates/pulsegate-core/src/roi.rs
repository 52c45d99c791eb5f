use serde::Deserialize;

/// Rectangular region of interest in frame coordinates.
///
/// An all-zero ROI means "not configured": [`select_roi`] then falls back to a
/// centred square.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub struct Roi {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl Roi {
    pub const fn new(x: u32, y: u32, w: u32, h: u32) -> Self {
        Self { x, y, w, h }
    }

    /// True when every field is zero (auto-select).
    pub fn is_unset(&self) -> bool {
        self.x == 0 && self.y == 0 && self.w == 0 && self.h == 0
    }

    /// Whether this ROI is non-empty and lies fully inside a `width` × `height` frame.
    pub fn fits(&self, width: u32, height: u32) -> bool {
        self.w > 0
            && self.h > 0
            && self.x as u64 + self.w as u64 <= width as u64
            && self.y as u64 + self.h as u64 <= height as u64
    }
}

impl std::fmt::Display for Roi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{},{},{}", self.x, self.y, self.w, self.h)
    }
}

impl std::str::FromStr for Roi {
    type Err = String;

    /// Parse `x,y,w,h`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        let [x, y, w, h] = parts.as_slice() else {
            return Err(format!("invalid ROI '{s}' (expected x,y,w,h)"));
        };
        let parse = |v: &str| {
            v.parse::<u32>()
                .map_err(|e| format!("invalid ROI component '{v}': {e}"))
        };
        Ok(Roi::new(parse(x)?, parse(y)?, parse(w)?, parse(h)?))
    }
}

/// Pick the ROI to sample for a frame of the given size.
///
/// A configured ROI (any field non-zero) is returned unchanged. Otherwise the
/// result is a square of side `min(height, width) / 3`, centred in both axes
/// with integer division.
pub fn select_roi(frame_height: u32, frame_width: u32, configured: Roi) -> Roi {
    if !configured.is_unset() {
        return configured;
    }

    let size = frame_height.min(frame_width) / 3;
    Roi {
        x: (frame_width - size) / 2,
        y: (frame_height - size) / 2,
        w: size,
        h: size,
    }
}
