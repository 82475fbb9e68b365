//! Client-side interface to the eye-tracker service.
//!
//! The tracker service owns gaze sampling and the calibration computation.
//! This crate describes the part of its protocol a calibration driver needs:
//!
//! - [`TrackerService`]: the calls that start, bracket and abort a calibration
//! - [`TrackerEvent`] / [`CalibrationListener`]: asynchronous callbacks coming back
//! - [`TrackerState`]: device connectivity as reported by the service
//! - [`CalibrationReport`]: the per-point quality report delivered at the end
//!
//! [`SimulatedTracker`] is an in-process stand-in for the real service, used by
//! the demo tooling and tests.

pub mod point;
pub mod report;
pub mod service;
pub mod simulated;
pub mod state;

pub use point::Point2D;
pub use report::{CalibrationPointResult, CalibrationReport, EyeMetric, PointStatus};
pub use service::{CalibrationListener, TrackerError, TrackerEvent, TrackerResult, TrackerService};
pub use simulated::{SimulatedTracker, SimulationScript};
pub use state::TrackerState;
