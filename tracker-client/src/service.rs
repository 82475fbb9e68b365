//! Tracker service interface for calibration workflows.

use std::sync::Arc;

use thiserror::Error;

use crate::report::CalibrationReport;
use crate::state::TrackerState;

/// Errors returned by tracker service calls.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TrackerError {
    /// The service is not reachable.
    #[error("Tracker service not connected")]
    NotConnected,

    /// The service refused the request.
    #[error("Request rejected by tracker service: {0}")]
    Rejected(String),

    /// A point or abort call arrived while no calibration was running.
    #[error("No calibration in progress")]
    NoActiveCalibration,

    /// The listener for callbacks has gone away.
    #[error("Calibration listener closed")]
    ListenerClosed,
}

pub type TrackerResult<T> = Result<T, TrackerError>;

/// Asynchronous notifications from the tracker service.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackerEvent {
    /// The service accepted `start_calibration` and is ready for targets.
    CalibrationStarted,
    /// A target finished and more are expected. Carries completion in `[0, 1]`.
    Progress(f64),
    /// The service is computing the calibration, no action required.
    Processing,
    /// Final report. `None` when the service produced no result.
    Result(Option<CalibrationReport>),
    /// The device state changed.
    StateChanged(TrackerState),
}

/// Receiver for [`TrackerEvent`]s.
///
/// Implementations must not block; the expected implementation forwards the
/// event onto a queue owned by the calibration driver.
pub trait CalibrationListener: Send + Sync {
    fn on_event(&self, event: TrackerEvent);
}

/// Interface to the eye-tracker service.
///
/// Abstracts the service for testability in calibration workflows. Every call
/// is fire-and-forget: completion is reported later through the listener
/// passed to [`start_calibration`](TrackerService::start_calibration).
pub trait TrackerService {
    /// Current device state.
    fn tracker_state(&self) -> TrackerState;

    /// Subscribe to device state changes.
    fn add_state_listener(&mut self, listener: Arc<dyn CalibrationListener>);

    /// Drop a listener added with [`add_state_listener`](TrackerService::add_state_listener).
    fn remove_state_listener(&mut self, listener: &Arc<dyn CalibrationListener>);

    /// Begin a calibration with `point_count` targets.
    fn start_calibration(
        &mut self,
        point_count: usize,
        listener: Arc<dyn CalibrationListener>,
    ) -> TrackerResult<()>;

    /// Sampling for the target at pixel `(x, y)` starts now.
    fn point_start(&mut self, x: i32, y: i32) -> TrackerResult<()>;

    /// Sampling for the current target ends now.
    fn point_end(&mut self) -> TrackerResult<()>;

    /// Cancel the calibration in progress.
    fn abort_calibration(&mut self) -> TrackerResult<()>;

    /// Most recent successful calibration held by the service, if any.
    fn last_calibration(&self) -> Option<CalibrationReport> {
        None
    }
}
