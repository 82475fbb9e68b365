//! Guard that keeps calibration off unusable devices.

use tracing::{info, warn};
use tracker_client::TrackerState;

/// Verdict after a device state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// Device usable, or unusable while nothing is running.
    Continue,
    /// A running calibration must stop, with the reason to report.
    Abort(&'static str),
}

/// Tracks whether the device can be calibrated.
#[derive(Debug, Clone)]
pub struct TrackerStateGate {
    state: TrackerState,
}

impl TrackerStateGate {
    pub fn new(state: TrackerState) -> Self {
        Self { state }
    }

    pub fn state(&self) -> TrackerState {
        self.state
    }

    pub fn is_usable(&self) -> bool {
        self.state.is_usable()
    }

    /// Why calibration is blocked, if it is.
    pub fn reason(&self) -> Option<&'static str> {
        self.state.reason()
    }

    /// Record a state change.
    ///
    /// `session_active` must be false once the session is finishing, so a
    /// degraded state never triggers a second abort.
    pub fn update(&mut self, state: TrackerState, session_active: bool) -> GateDecision {
        if state != self.state {
            info!("Tracker state changed: {} -> {}", self.state, state);
        }
        self.state = state;

        match state.reason() {
            Some(reason) if session_active => {
                warn!("Device unusable during calibration: {reason}");
                GateDecision::Abort(reason)
            }
            _ => GateDecision::Continue,
        }
    }
}
