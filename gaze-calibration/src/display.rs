//! Visual feedback for the calibration target.
//!
//! Rendering lives with the host application; the runner only tells it what
//! to show through [`TargetDisplay`].

use std::time::Duration;

use tracing::info;
use tracker_client::Point2D;

pub const MESSAGE_FOLLOW: &str = "Follow the circle..";
pub const MESSAGE_PROCESSING: &str = "Processing calibration, please wait.";

/// Host-side rendering of calibration targets.
pub trait TargetDisplay {
    /// Bring up the calibration surface.
    fn show(&mut self);

    /// Draw the target at a screen pixel position.
    fn draw_point(&mut self, point: Point2D);

    /// Play the shrink animation while the target is sampled.
    fn animate_point(&mut self, duration: Duration);

    /// Tell the user the service is computing the result.
    fn show_processing(&mut self) {}

    /// Tear down the calibration surface.
    fn close(&mut self);
}

/// Display that renders nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullDisplay;

impl TargetDisplay for NullDisplay {
    fn show(&mut self) {}
    fn draw_point(&mut self, _point: Point2D) {}
    fn animate_point(&mut self, _duration: Duration) {}
    fn close(&mut self) {}
}

/// Display that narrates targets through the log, for headless runs.
#[derive(Debug, Default, Clone)]
pub struct LogDisplay {
    points_drawn: usize,
}

impl LogDisplay {
    pub fn points_drawn(&self) -> usize {
        self.points_drawn
    }
}

impl TargetDisplay for LogDisplay {
    fn show(&mut self) {
        info!("{MESSAGE_FOLLOW}");
    }

    fn draw_point(&mut self, point: Point2D) {
        self.points_drawn += 1;
        info!("Target {} at {point}", self.points_drawn);
    }

    fn animate_point(&mut self, duration: Duration) {
        info!("  shrinking over {duration:?}");
    }

    fn show_processing(&mut self) {
        info!("{MESSAGE_PROCESSING}");
    }

    fn close(&mut self) {
        info!("Calibration display closed after {} targets", self.points_drawn);
    }
}
