//! Calibration quality rating shown to the user.

use strum::Display;
use tracker_client::CalibrationReport;

/// Quality bucket for an average angular error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Display)]
#[strum(serialize_all = "UPPERCASE")]
pub enum CalibrationRating {
    Perfect,
    Good,
    Moderate,
    Poor,
    Redo,
}

impl CalibrationRating {
    /// Classify an average error in degrees. Bucket bounds are exclusive.
    pub fn from_average_error(degrees: f64) -> Self {
        if degrees < 0.5 {
            CalibrationRating::Perfect
        } else if degrees < 0.7 {
            CalibrationRating::Good
        } else if degrees < 1.0 {
            CalibrationRating::Moderate
        } else if degrees < 1.5 {
            CalibrationRating::Poor
        } else {
            CalibrationRating::Redo
        }
    }

    pub fn from_report(report: &CalibrationReport) -> Self {
        Self::from_average_error(report.average_error_degree)
    }
}

/// Quality line for the host UI, empty without a report.
pub fn rating_text(report: Option<&CalibrationReport>) -> String {
    match report {
        Some(report) => format!("Calibration Quality: {}", CalibrationRating::from_report(report)),
        None => String::new(),
    }
}

/// Label of the host's calibrate button.
pub fn calibrate_button_label(has_calibration: bool) -> &'static str {
    if has_calibration {
        "Re-Calibrate"
    } else {
        "Calibrate"
    }
}
