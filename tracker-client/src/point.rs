//! 2D points shared between calibration layout and the tracker protocol.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A point on the display.
///
/// Used both for normalized `[0, 1]` display coordinates and for absolute
/// screen pixels; the owning context decides which.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2D {
    pub x: f64,
    pub y: f64,
}

impl Point2D {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Scale both axes, e.g. to denormalize into screen pixels.
    pub fn scaled(&self, sx: f64, sy: f64) -> Self {
        Self {
            x: self.x * sx,
            y: self.y * sy,
        }
    }

    /// Nearest whole pixel, as sent to the service with `point_start`.
    pub fn to_pixel(&self) -> (i32, i32) {
        (self.x.round() as i32, self.y.round() as i32)
    }
}

impl fmt::Display for Point2D {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({:.1}, {:.1})", self.x, self.y)
    }
}
