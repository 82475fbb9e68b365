//! Calibration target layout.
//!
//! Targets are placed on a padded grid in normalized display coordinates,
//! optionally embedded in a sub-region of the screen, shuffled, and finally
//! denormalized to screen pixels.

use clap::ValueEnum;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracker_client::Point2D;

/// Fraction of the screen height kept free around the grid.
pub const TARGET_PADDING: f64 = 0.1;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LayoutError {
    #[error("Unsupported point count {0}: must be 1, a perfect square, or 12")]
    UnsupportedPointCount(usize),

    #[error("Screen size must be non-zero, got {0}")]
    EmptyScreen(ScreenSize),

    #[error("Calibration area {area} does not fit on screen {screen}")]
    AreaExceedsScreen { area: ScreenSize, screen: ScreenSize },

    #[error("Padding {0} leaves no room for targets")]
    InvalidPadding(f64),
}

/// Size of a screen or screen region in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScreenSize {
    pub width: u32,
    pub height: u32,
}

impl ScreenSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Whether `other` fits inside this size.
    pub fn contains(&self, other: &ScreenSize) -> bool {
        other.width <= self.width && other.height <= self.height
    }
}

impl fmt::Display for ScreenSize {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Placement of the calibration area along one screen axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Alignment {
    /// Left or top edge.
    Start,
    #[default]
    Center,
    /// Right or bottom edge.
    End,
}

impl Alignment {
    /// Normalized offset of an `area`-long span inside a `screen`-long axis.
    fn offset(&self, screen: f64, area: f64) -> f64 {
        match self {
            Alignment::Start => 0.0,
            Alignment::Center => (screen - area) / 2.0 / screen,
            Alignment::End => (screen - area) / screen,
        }
    }
}

pub fn lerp(from: f64, to: f64, amount: f64) -> f64 {
    from + (to - from) * amount
}

/// Grid columns and rows for a point count.
///
/// Square grids for perfect squares; 12 points use 4 columns by 3 rows.
pub fn grid_dimensions(point_count: usize) -> Result<(usize, usize), LayoutError> {
    if point_count == 12 {
        return Ok((4, 3));
    }

    let side = (point_count as f64).sqrt().round() as usize;
    if point_count == 0 || side * side != point_count {
        return Err(LayoutError::UnsupportedPointCount(point_count));
    }
    Ok((side, side))
}

/// Position of cell `index` along an axis with `count` cells, in `[0, 1]`.
///
/// A single cell sits in the middle.
fn axis_fraction(index: usize, count: usize) -> f64 {
    if count <= 1 {
        0.5
    } else {
        index as f64 / (count - 1) as f64
    }
}

/// Generates the calibration target layout.
#[derive(Debug, Clone)]
pub struct GridLayoutGenerator {
    point_count: usize,
    screen: ScreenSize,
    area: Option<ScreenSize>,
    horizontal: Alignment,
    vertical: Alignment,
    padding: f64,
}

impl GridLayoutGenerator {
    /// Full-screen layout with default padding.
    pub fn new(point_count: usize, screen: ScreenSize) -> Self {
        Self {
            point_count,
            screen,
            area: None,
            horizontal: Alignment::Center,
            vertical: Alignment::Center,
            padding: TARGET_PADDING,
        }
    }

    /// Restrict the targets to an `area` of the screen placed by the alignments.
    pub fn with_area(mut self, area: ScreenSize, horizontal: Alignment, vertical: Alignment) -> Self {
        self.area = Some(area);
        self.horizontal = horizontal;
        self.vertical = vertical;
        self
    }

    pub fn with_padding(mut self, padding: f64) -> Self {
        self.padding = padding;
        self
    }

    pub fn point_count(&self) -> usize {
        self.point_count
    }

    pub fn screen(&self) -> ScreenSize {
        self.screen
    }

    /// Aspect-corrected horizontal padding and vertical padding.
    ///
    /// The horizontal padding covers the same number of pixels as the vertical one.
    pub fn paddings(&self) -> (f64, f64) {
        let pad_h = self.padding;
        let pad_w = self.screen.height as f64 * self.padding / self.screen.width as f64;
        (pad_w, pad_h)
    }

    pub fn validate(&self) -> Result<(), LayoutError> {
        grid_dimensions(self.point_count)?;

        if self.screen.is_empty() {
            return Err(LayoutError::EmptyScreen(self.screen));
        }
        if let Some(area) = self.area {
            if area.is_empty() {
                return Err(LayoutError::EmptyScreen(area));
            }
            if !self.screen.contains(&area) {
                return Err(LayoutError::AreaExceedsScreen {
                    area,
                    screen: self.screen,
                });
            }
        }

        let (pad_w, pad_h) = self.paddings();
        if !(0.0..0.5).contains(&pad_h) || !(0.0..0.5).contains(&pad_w) {
            return Err(LayoutError::InvalidPadding(self.padding));
        }
        Ok(())
    }

    /// Grid targets in normalized screen coordinates, column by column.
    pub fn normalized_points(&self) -> Result<Vec<Point2D>, LayoutError> {
        self.validate()?;
        let (columns, rows) = grid_dimensions(self.point_count)?;

        let screen_w = self.screen.width as f64;
        let screen_h = self.screen.height as f64;
        let (scale_w, scale_h, offset_x, offset_y) = match self.area {
            Some(area) => {
                let area_w = area.width as f64;
                let area_h = area.height as f64;
                (
                    area_w / screen_w,
                    area_h / screen_h,
                    self.horizontal.offset(screen_w, area_w),
                    self.vertical.offset(screen_h, area_h),
                )
            }
            None => (1.0, 1.0, 0.0, 0.0),
        };

        let (pad_w, pad_h) = self.paddings();
        let mut points = Vec::with_capacity(columns * rows);
        for col in 0..columns {
            for row in 0..rows {
                let x = lerp(pad_w, 1.0 - pad_w, axis_fraction(col, columns));
                let y = lerp(pad_h, 1.0 - pad_h, axis_fraction(row, rows));
                points.push(Point2D::new(offset_x + x * scale_w, offset_y + y * scale_h));
            }
        }
        Ok(points)
    }

    /// Shuffled targets in screen pixels.
    pub fn generate_with_rng<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Vec<Point2D>, LayoutError> {
        let mut points = self.normalized_points()?;
        points.shuffle(rng);

        let screen_w = self.screen.width as f64;
        let screen_h = self.screen.height as f64;
        Ok(points.iter().map(|p| p.scaled(screen_w, screen_h)).collect())
    }

    /// Shuffled targets in screen pixels, using the thread-local random source.
    pub fn generate(&self) -> Result<Vec<Point2D>, LayoutError> {
        self.generate_with_rng(&mut rand::rng())
    }
}
