//! Eye-tracker calibration sequencing.
//!
//! Builds a shuffled grid of calibration targets and walks them through the
//! tracker service's calibration protocol: each target is shown, sampled
//! after a settle delay, and sampled again when the service flags it. A run
//! ends with exactly one [`CalibrationOutcome`].
//!
//! Use [`run_calibration`] for a tokio-driven run, or drive a
//! [`CalibrationRunner`] by hand with your own [`Scheduler`].

pub mod config;
pub mod display;
pub mod gate;
pub mod layout;
pub mod outcome;
pub mod rating;
pub mod runner;
pub mod scheduler;
pub mod sequencer;
pub mod test_util;

pub use config::{CalibrationConfig, ConfigError};
pub use display::{LogDisplay, NullDisplay, TargetDisplay};
pub use gate::{GateDecision, TrackerStateGate};
pub use layout::{Alignment, GridLayoutGenerator, LayoutError, ScreenSize};
pub use outcome::{CalibrationError, CalibrationOutcome, OutcomeKind};
pub use rating::{calibrate_button_label, rating_text, CalibrationRating};
pub use runner::{
    run_calibration, CalibrationHandle, CalibrationRunner, CalibrationSession, EventSender, Phase,
    RunnerEvent,
};
pub use scheduler::{Scheduler, TimerHandle, TimerId, TimerKind, TokioScheduler};
pub use sequencer::PointSequencer;
