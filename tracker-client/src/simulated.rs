//! In-process simulation of the tracker service.
//!
//! Follows the service's calibration protocol closely enough to drive a
//! calibration end to end without hardware: each `point_end` is answered with
//! `Progress` while targets of the current round remain, and with
//! `Processing` + `Result` once the round is complete. A script decides how
//! many targets each result flags for resampling.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::point::Point2D;
use crate::report::{CalibrationPointResult, CalibrationReport, EyeMetric, PointStatus};
use crate::service::{CalibrationListener, TrackerError, TrackerEvent, TrackerResult, TrackerService};
use crate::state::TrackerState;

/// Scripted behavior of a [`SimulatedTracker`].
#[derive(Debug, Clone)]
pub struct SimulationScript {
    /// Number of targets to flag for resampling in each successive result.
    /// Rounds beyond the end of the list flag nothing.
    pub resample_rounds: VecDeque<usize>,
    /// Average angular error reported for every target, in degrees.
    pub average_error_degree: f64,
    /// Answer the final `point_end` with an empty result.
    pub empty_result: bool,
    /// Refuse `start_calibration`.
    pub reject_start: bool,
    /// Delay before callbacks are delivered. Non-zero delays need a tokio runtime.
    pub response_delay: Duration,
    /// Drop the device to `NotConnected` after this many sampled targets.
    pub disconnect_after: Option<usize>,
}

impl Default for SimulationScript {
    fn default() -> Self {
        Self {
            resample_rounds: VecDeque::new(),
            average_error_degree: 0.45,
            empty_result: false,
            reject_start: false,
            response_delay: Duration::ZERO,
            disconnect_after: None,
        }
    }
}

impl SimulationScript {
    pub fn with_resample_rounds(mut self, rounds: impl IntoIterator<Item = usize>) -> Self {
        self.resample_rounds = rounds.into_iter().collect();
        self
    }

    pub fn with_average_error(mut self, degrees: f64) -> Self {
        self.average_error_degree = degrees;
        self
    }

    pub fn with_response_delay(mut self, delay: Duration) -> Self {
        self.response_delay = delay;
        self
    }

    pub fn with_disconnect_after(mut self, targets: usize) -> Self {
        self.disconnect_after = Some(targets);
        self
    }
}

/// State of the calibration the simulated service is running.
struct ActiveCalibration {
    listener: Arc<dyn CalibrationListener>,
    /// Targets expected in the current round.
    round_size: usize,
    /// Targets sampled in the current round, in order.
    round_sampled: Vec<Point2D>,
    /// Every distinct target sampled so far.
    all_sampled: Vec<Point2D>,
    current: Option<Point2D>,
}

/// Simulated eye-tracker service.
pub struct SimulatedTracker {
    state: TrackerState,
    script: SimulationScript,
    state_listeners: Vec<Arc<dyn CalibrationListener>>,
    active: Option<ActiveCalibration>,
    last_result: Option<CalibrationReport>,
    abort_count: usize,
    targets_sampled: usize,
}

impl SimulatedTracker {
    pub fn new(state: TrackerState, script: SimulationScript) -> Self {
        Self {
            state,
            script,
            state_listeners: Vec::new(),
            active: None,
            last_result: None,
            abort_count: 0,
            targets_sampled: 0,
        }
    }

    /// A connected device that accepts every target.
    pub fn connected() -> Self {
        Self::new(TrackerState::Connected, SimulationScript::default())
    }

    /// Change the device state and notify state listeners.
    pub fn set_state(&mut self, state: TrackerState) {
        if state == self.state {
            return;
        }
        info!("Simulated tracker state: {} -> {}", self.state, state);
        self.state = state;

        let listeners = self.state_listeners.clone();
        for listener in listeners {
            self.deliver(listener, vec![TrackerEvent::StateChanged(state)]);
        }
    }

    /// Whether a calibration is in progress.
    pub fn is_calibrating(&self) -> bool {
        self.active.is_some()
    }

    /// Number of subscribed state listeners.
    pub fn state_listener_count(&self) -> usize {
        self.state_listeners.len()
    }

    /// Number of `abort_calibration` calls received.
    pub fn abort_count(&self) -> usize {
        self.abort_count
    }

    fn deliver(&self, listener: Arc<dyn CalibrationListener>, events: Vec<TrackerEvent>) {
        let delay = self.script.response_delay;
        if delay.is_zero() {
            for event in events {
                listener.on_event(event);
            }
        } else {
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                for event in events {
                    listener.on_event(event);
                }
            });
        }
    }

    /// Build the report for a completed round and prepare the next one.
    ///
    /// Returns the report and whether the calibration is finished.
    fn finish_round(&mut self) -> Option<(CalibrationReport, bool)> {
        let flag_count = self.script.resample_rounds.pop_front().unwrap_or(0);
        let error = EyeMetric::uniform(self.script.average_error_degree);
        let active = self.active.as_mut()?;

        let flagged: Vec<Point2D> = active
            .round_sampled
            .iter()
            .take(flag_count)
            .copied()
            .collect();

        let points = active
            .all_sampled
            .iter()
            .map(|&p| {
                let status = if flagged.contains(&p) {
                    PointStatus::Resample
                } else {
                    PointStatus::Ok
                };
                CalibrationPointResult {
                    status,
                    coordinates: p,
                    mean_estimated: p,
                    accuracy: error,
                    mean_error: EyeMetric::default(),
                }
            })
            .collect();

        let done = flagged.is_empty();
        let report = CalibrationReport {
            success: done,
            average_error_degree: error.average,
            average_error_degree_left: error.left,
            average_error_degree_right: error.right,
            points,
        };

        active.round_size = flagged.len();
        active.round_sampled.clear();
        Some((report, done))
    }
}

impl TrackerService for SimulatedTracker {
    fn tracker_state(&self) -> TrackerState {
        self.state
    }

    fn add_state_listener(&mut self, listener: Arc<dyn CalibrationListener>) {
        self.state_listeners.push(listener);
    }

    fn remove_state_listener(&mut self, listener: &Arc<dyn CalibrationListener>) {
        self.state_listeners.retain(|l| !Arc::ptr_eq(l, listener));
    }

    fn start_calibration(
        &mut self,
        point_count: usize,
        listener: Arc<dyn CalibrationListener>,
    ) -> TrackerResult<()> {
        if !self.state.is_usable() {
            return Err(TrackerError::NotConnected);
        }
        if self.script.reject_start {
            return Err(TrackerError::Rejected("calibration start refused".to_string()));
        }

        debug!("Simulated calibration start with {point_count} points");
        self.active = Some(ActiveCalibration {
            listener: listener.clone(),
            round_size: point_count,
            round_sampled: Vec::with_capacity(point_count),
            all_sampled: Vec::with_capacity(point_count),
            current: None,
        });
        self.deliver(listener, vec![TrackerEvent::CalibrationStarted]);
        Ok(())
    }

    fn point_start(&mut self, x: i32, y: i32) -> TrackerResult<()> {
        let active = self.active.as_mut().ok_or(TrackerError::NoActiveCalibration)?;
        active.current = Some(Point2D::new(x as f64, y as f64));
        Ok(())
    }

    fn point_end(&mut self) -> TrackerResult<()> {
        let active = self.active.as_mut().ok_or(TrackerError::NoActiveCalibration)?;
        let point = active.current.take().ok_or(TrackerError::NoActiveCalibration)?;

        active.round_sampled.push(point);
        if !active.all_sampled.contains(&point) {
            active.all_sampled.push(point);
        }

        let listener = active.listener.clone();
        let sampled = active.round_sampled.len();
        let round_size = active.round_size;

        self.targets_sampled += 1;
        if self.script.disconnect_after == Some(self.targets_sampled) {
            self.set_state(TrackerState::NotConnected);
        }

        if sampled < round_size {
            let progress = sampled as f64 / round_size as f64;
            self.deliver(listener, vec![TrackerEvent::Progress(progress)]);
            return Ok(());
        }

        if self.script.empty_result {
            self.active = None;
            self.deliver(
                listener,
                vec![TrackerEvent::Processing, TrackerEvent::Result(None)],
            );
            return Ok(());
        }

        if let Some((report, done)) = self.finish_round() {
            if done {
                self.active = None;
                self.last_result = Some(report.clone());
            }
            self.deliver(
                listener,
                vec![TrackerEvent::Processing, TrackerEvent::Result(Some(report))],
            );
        }
        Ok(())
    }

    fn abort_calibration(&mut self) -> TrackerResult<()> {
        self.abort_count += 1;
        self.active = None;
        Ok(())
    }

    fn last_calibration(&self) -> Option<CalibrationReport> {
        self.last_result.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Collect(Mutex<Vec<TrackerEvent>>);

    impl CalibrationListener for Collect {
        fn on_event(&self, event: TrackerEvent) {
            self.0.lock().unwrap().push(event);
        }
    }

    impl Collect {
        fn take(&self) -> Vec<TrackerEvent> {
            std::mem::take(&mut *self.0.lock().unwrap())
        }
    }

    fn sample(tracker: &mut SimulatedTracker, x: i32, y: i32) {
        tracker.point_start(x, y).unwrap();
        tracker.point_end().unwrap();
    }

    #[test]
    fn test_progress_then_result() {
        let mut tracker = SimulatedTracker::connected();
        let events = Arc::new(Collect::default());
        tracker.start_calibration(2, events.clone()).unwrap();
        assert_eq!(events.take(), vec![TrackerEvent::CalibrationStarted]);

        sample(&mut tracker, 10, 20);
        match events.take().as_slice() {
            [TrackerEvent::Progress(p)] => assert_relative_eq!(*p, 0.5),
            other => panic!("unexpected events {other:?}"),
        }

        sample(&mut tracker, 30, 40);
        let events = events.take();
        assert_eq!(events[0], TrackerEvent::Processing);
        match &events[1] {
            TrackerEvent::Result(Some(report)) => {
                assert!(report.success);
                assert_eq!(report.points.len(), 2);
                assert_eq!(report.points_to_resample().count(), 0);
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert!(!tracker.is_calibrating());
        assert!(tracker.last_calibration().is_some());
    }

    #[test]
    fn test_resample_round_expects_only_flagged_points() {
        let script = SimulationScript::default().with_resample_rounds([1]);
        let mut tracker = SimulatedTracker::new(TrackerState::Connected, script);
        let events = Arc::new(Collect::default());
        tracker.start_calibration(2, events.clone()).unwrap();
        events.take();

        sample(&mut tracker, 10, 20);
        sample(&mut tracker, 30, 40);
        let flagged: Vec<Point2D> = match events.take().pop() {
            Some(TrackerEvent::Result(Some(report))) => {
                assert!(!report.success);
                report.points_to_resample().map(|p| p.coordinates).collect()
            }
            other => panic!("unexpected event {other:?}"),
        };
        assert_eq!(flagged, vec![Point2D::new(10.0, 20.0)]);

        // The single resampled target completes the next round
        sample(&mut tracker, 10, 20);
        match events.take().pop() {
            Some(TrackerEvent::Result(Some(report))) => {
                assert!(report.success);
                assert_eq!(report.points.len(), 2);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_start_rejected_when_not_connected() {
        let mut tracker = SimulatedTracker::new(TrackerState::NotConnected, SimulationScript::default());
        let events = Arc::new(Collect::default());
        assert_eq!(
            tracker.start_calibration(9, events.clone()),
            Err(TrackerError::NotConnected)
        );
        assert!(events.take().is_empty());
    }

    #[test]
    fn test_state_change_notifies_listeners() {
        let mut tracker = SimulatedTracker::connected();
        let events = Arc::new(Collect::default());
        tracker.add_state_listener(events.clone());

        tracker.set_state(TrackerState::Connected);
        assert!(events.take().is_empty());

        tracker.set_state(TrackerState::ConnectedNoStream);
        assert_eq!(
            events.take(),
            vec![TrackerEvent::StateChanged(TrackerState::ConnectedNoStream)]
        );
    }

    #[test]
    fn test_removed_listener_is_not_notified() {
        let mut tracker = SimulatedTracker::connected();
        let kept = Arc::new(Collect::default());
        let removed = Arc::new(Collect::default());
        let kept_dyn: Arc<dyn CalibrationListener> = kept.clone();
        let removed_dyn: Arc<dyn CalibrationListener> = removed.clone();
        tracker.add_state_listener(kept_dyn);
        tracker.add_state_listener(removed_dyn.clone());

        tracker.remove_state_listener(&removed_dyn);
        assert_eq!(tracker.state_listener_count(), 1);

        tracker.set_state(TrackerState::NotConnected);
        assert_eq!(kept.take().len(), 1);
        assert!(removed.take().is_empty());
    }

    #[test]
    fn test_scripted_disconnect() {
        let script = SimulationScript::default().with_disconnect_after(1);
        let mut tracker = SimulatedTracker::new(TrackerState::Connected, script);
        let state_events = Arc::new(Collect::default());
        tracker.add_state_listener(state_events.clone());
        let events = Arc::new(Collect::default());
        tracker.start_calibration(4, events.clone()).unwrap();

        sample(&mut tracker, 10, 20);
        assert_eq!(tracker.tracker_state(), TrackerState::NotConnected);
        assert_eq!(
            state_events.take(),
            vec![TrackerEvent::StateChanged(TrackerState::NotConnected)]
        );
    }
}
