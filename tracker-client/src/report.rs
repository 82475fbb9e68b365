//! Calibration quality report delivered by the tracker service.
//!
//! The service computes the calibration and scores each target it sampled.
//! These types carry that result back to the driver; nothing here recomputes
//! quality, it only exposes what the service reported.

use serde::{Deserialize, Serialize};

use crate::point::Point2D;

/// Per-target verdict from the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointStatus {
    /// Sample usable.
    Ok,
    /// Sample quality too low, present the target again.
    Resample,
    /// No gaze data was recorded for the target.
    NoData,
}

impl PointStatus {
    /// Whether the target has to be sampled again.
    pub fn needs_resample(&self) -> bool {
        matches!(self, PointStatus::Resample | PointStatus::NoData)
    }
}

/// A metric reported for both eyes and for their combination.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EyeMetric {
    pub average: f64,
    pub left: f64,
    pub right: f64,
}

impl EyeMetric {
    pub fn new(average: f64, left: f64, right: f64) -> Self {
        Self {
            average,
            left,
            right,
        }
    }

    /// Same value for both eyes.
    pub fn uniform(value: f64) -> Self {
        Self::new(value, value, value)
    }
}

/// Result for a single calibration target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationPointResult {
    pub status: PointStatus,
    /// Target position in screen pixels, as sent with `point_start`.
    pub coordinates: Point2D,
    /// Mean estimated gaze position while the target was sampled.
    pub mean_estimated: Point2D,
    /// Angular accuracy in degrees.
    pub accuracy: EyeMetric,
    /// Mean error in pixels.
    pub mean_error: EyeMetric,
}

impl CalibrationPointResult {
    /// A result with no quality metrics, useful for scripted services.
    pub fn with_status(coordinates: Point2D, status: PointStatus) -> Self {
        Self {
            status,
            coordinates,
            mean_estimated: coordinates,
            accuracy: EyeMetric::default(),
            mean_error: EyeMetric::default(),
        }
    }
}

/// Final calibration report.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CalibrationReport {
    /// Whether the service accepted the calibration.
    pub success: bool,
    /// Average angular error in degrees, both eyes.
    pub average_error_degree: f64,
    /// Average angular error in degrees, left eye.
    pub average_error_degree_left: f64,
    /// Average angular error in degrees, right eye.
    pub average_error_degree_right: f64,
    /// Per-target results.
    pub points: Vec<CalibrationPointResult>,
}

impl CalibrationReport {
    /// Targets the service asked to sample again, in report order.
    pub fn points_to_resample(&self) -> impl Iterator<Item = &CalibrationPointResult> {
        self.points.iter().filter(|p| p.status.needs_resample())
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}
