//! Terminal results of a calibration run.

use serde::Serialize;
use strum::Display;
use thiserror::Error;
use tracker_client::{CalibrationReport, TrackerError};

/// Kind of terminal outcome reported to the host application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display)]
pub enum OutcomeKind {
    Success,
    Failure,
    Abort,
    Error,
}

/// Why a calibration run ended without success.
///
/// The `Display` text is the message reported with the outcome.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CalibrationError {
    /// Device not calibratable when the run was requested.
    #[error("Device is not in a valid state, cannot calibrate.")]
    PreconditionFailed,

    /// Service returned no result.
    #[error("Calibration result is empty.")]
    EmptyResult,

    /// Resampling did not converge within the configured bounds.
    #[error("Unable to calibrate.")]
    QualityExhausted { attempts: u32, queued: usize },

    #[error("User aborted calibration process.")]
    UserAbort,

    /// Device became unusable mid-run.
    #[error("{0}")]
    DeviceLost(String),

    /// Anything that went wrong while driving the protocol.
    #[error("An error occurred during calibration. Message: {0}")]
    Unexpected(String),
}

impl CalibrationError {
    pub fn kind(&self) -> OutcomeKind {
        match self {
            CalibrationError::PreconditionFailed
            | CalibrationError::EmptyResult
            | CalibrationError::Unexpected(_) => OutcomeKind::Error,
            CalibrationError::QualityExhausted { .. } => OutcomeKind::Failure,
            CalibrationError::UserAbort | CalibrationError::DeviceLost(_) => OutcomeKind::Abort,
        }
    }
}

impl From<TrackerError> for CalibrationError {
    fn from(err: TrackerError) -> Self {
        CalibrationError::Unexpected(err.to_string())
    }
}

impl From<crate::layout::LayoutError> for CalibrationError {
    fn from(err: crate::layout::LayoutError) -> Self {
        CalibrationError::Unexpected(err.to_string())
    }
}

/// The single event a calibration run produces.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalibrationOutcome {
    pub kind: OutcomeKind,
    pub message: String,
    pub report: Option<CalibrationReport>,
}

impl CalibrationOutcome {
    pub fn success(report: CalibrationReport) -> Self {
        Self {
            kind: OutcomeKind::Success,
            message: String::new(),
            report: Some(report),
        }
    }

    pub fn is_success(&self) -> bool {
        self.kind == OutcomeKind::Success
    }
}

impl From<&CalibrationError> for CalibrationOutcome {
    fn from(err: &CalibrationError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
            report: None,
        }
    }
}
