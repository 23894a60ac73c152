use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Detection box as returned by the remote service: center point plus extent, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CenterBox {
    /// X coordinate of the box center
    pub x: f64,
    /// Y coordinate of the box center
    pub y: f64,
    /// Box width
    pub width: f64,
    /// Box height
    pub height: f64,
}

impl CenterBox {
    /// Create a new center box.
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    /// Integer corner box.
    ///
    /// Each field is truncated to an integer first, then the corners are
    /// `center ± extent / 2` with flooring division. Values out of `i64`
    /// range saturate.
    pub fn to_corners(&self) -> BoundingBox {
        let (x, y) = (self.x as i64, self.y as i64);
        let (half_w, half_h) = ((self.width as i64).div_euclid(2), (self.height as i64).div_euclid(2));

        BoundingBox {
            x1: x.saturating_sub(half_w),
            y1: y.saturating_sub(half_h),
            x2: x.saturating_add(half_w),
            y2: y.saturating_add(half_h),
        }
    }
}

/// Pixel box given by its top-left and bottom-right corners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct BoundingBox {
    pub x1: i64,
    pub y1: i64,
    pub x2: i64,
    pub y2: i64,
}

impl BoundingBox {
    pub fn width(&self) -> i64 {
        self.x2.saturating_sub(self.x1)
    }

    pub fn height(&self) -> i64 {
        self.y2.saturating_sub(self.y1)
    }

    /// Clamp every corner into `[-margin, extent + margin]`.
    ///
    /// Edges that lie outside the image stay outside, so drawing the clamped
    /// box looks the same as drawing the original one.
    pub fn clamp_to(&self, width: u32, height: u32, margin: i64) -> BoundingBox {
        let (max_x, max_y) = (i64::from(width) + margin, i64::from(height) + margin);
        BoundingBox {
            x1: self.x1.clamp(-margin, max_x),
            y1: self.y1.clamp(-margin, max_y),
            x2: self.x2.clamp(-margin, max_x),
            y2: self.y2.clamp(-margin, max_y),
        }
    }

    /// A box with no area cannot be drawn.
    pub fn is_degenerate(&self) -> bool {
        self.width() <= 0 || self.height() <= 0
    }
}
