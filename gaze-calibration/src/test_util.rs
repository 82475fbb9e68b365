//! Recording doubles for driving a [`CalibrationRunner`] by hand.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tracker_client::{
    CalibrationListener, Point2D, TrackerError, TrackerEvent, TrackerResult, TrackerService,
    TrackerState,
};

use crate::config::CalibrationConfig;
use crate::display::TargetDisplay;
use crate::outcome::CalibrationOutcome;
use crate::runner::CalibrationRunner;
use crate::scheduler::{Scheduler, TimerHandle, TimerId, TimerKind};

/// Protocol call received by a [`RecordingTracker`].
#[derive(Debug, Clone, PartialEq)]
pub enum TrackerCall {
    StartCalibration(usize),
    PointStart(i32, i32),
    PointEnd,
    AbortCalibration,
}

/// Tracker that records calls and never answers.
///
/// Tests feed the answers to the runner themselves.
#[derive(Debug)]
pub struct RecordingTracker {
    pub state: TrackerState,
    pub calls: Vec<TrackerCall>,
    pub state_listeners: usize,
    pub point_start_error: Option<TrackerError>,
}

impl RecordingTracker {
    pub fn new(state: TrackerState) -> Self {
        Self {
            state,
            calls: Vec::new(),
            state_listeners: 0,
            point_start_error: None,
        }
    }

    pub fn connected() -> Self {
        Self::new(TrackerState::Connected)
    }

    pub fn abort_count(&self) -> usize {
        self.calls
            .iter()
            .filter(|call| **call == TrackerCall::AbortCalibration)
            .count()
    }
}

impl TrackerService for RecordingTracker {
    fn tracker_state(&self) -> TrackerState {
        self.state
    }

    fn add_state_listener(&mut self, _listener: Arc<dyn CalibrationListener>) {
        self.state_listeners += 1;
    }

    fn remove_state_listener(&mut self, _listener: &Arc<dyn CalibrationListener>) {
        self.state_listeners = self.state_listeners.saturating_sub(1);
    }

    fn start_calibration(
        &mut self,
        point_count: usize,
        _listener: Arc<dyn CalibrationListener>,
    ) -> TrackerResult<()> {
        self.calls.push(TrackerCall::StartCalibration(point_count));
        Ok(())
    }

    fn point_start(&mut self, x: i32, y: i32) -> TrackerResult<()> {
        self.calls.push(TrackerCall::PointStart(x, y));
        match &self.point_start_error {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn point_end(&mut self) -> TrackerResult<()> {
        self.calls.push(TrackerCall::PointEnd);
        Ok(())
    }

    fn abort_calibration(&mut self) -> TrackerResult<()> {
        self.calls.push(TrackerCall::AbortCalibration);
        Ok(())
    }
}

/// Scheduler that only records what was armed.
#[derive(Debug, Default)]
pub struct ManualScheduler {
    pub scheduled: Vec<(TimerId, TimerKind, Duration)>,
}

impl ManualScheduler {
    /// Most recently armed timer.
    pub fn last(&self) -> Option<(TimerId, TimerKind, Duration)> {
        self.scheduled.last().copied()
    }
}

impl Scheduler for ManualScheduler {
    fn schedule_once(&mut self, id: TimerId, kind: TimerKind, delay: Duration) -> TimerHandle {
        self.scheduled.push((id, kind, delay));
        TimerHandle::detached(id, kind)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DisplayCall {
    Show,
    Draw(Point2D),
    Animate(Duration),
    Processing,
    Close,
}

#[derive(Debug, Default)]
pub struct RecordingDisplay {
    pub calls: Vec<DisplayCall>,
}

impl TargetDisplay for RecordingDisplay {
    fn show(&mut self) {
        self.calls.push(DisplayCall::Show);
    }

    fn draw_point(&mut self, point: Point2D) {
        self.calls.push(DisplayCall::Draw(point));
    }

    fn animate_point(&mut self, duration: Duration) {
        self.calls.push(DisplayCall::Animate(duration));
    }

    fn show_processing(&mut self) {
        self.calls.push(DisplayCall::Processing);
    }

    fn close(&mut self) {
        self.calls.push(DisplayCall::Close);
    }
}

/// Listener that drops every event.
pub struct DiscardListener;

impl CalibrationListener for DiscardListener {
    fn on_event(&self, _event: TrackerEvent) {}
}

pub type ManualRunner = CalibrationRunner<RecordingTracker, RecordingDisplay, ManualScheduler>;

/// Runner wired to recording doubles.
pub fn manual_runner(
    tracker: RecordingTracker,
    config: &CalibrationConfig,
) -> (ManualRunner, oneshot::Receiver<CalibrationOutcome>) {
    CalibrationRunner::new(
        tracker,
        RecordingDisplay::default(),
        ManualScheduler::default(),
        Arc::new(DiscardListener),
        config,
    )
}
