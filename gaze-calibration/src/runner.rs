//! Calibration sequencing state machine.
//!
//! A run walks every target through two timed phases:
//!
//! 1. **Latency**: the target is drawn and the eye is given time to settle.
//! 2. **Recording**: the tracker samples gaze between `point_start` and `point_end`.
//!
//! The tracker answers each `point_end` asynchronously with a progress
//! notification (more targets expected) or a final report. Targets the report
//! flags are queued again, within fixed bounds, until the tracker accepts the
//! calibration.
//!
//! All state lives in [`CalibrationRunner`] and changes only inside
//! [`CalibrationRunner::handle`]. Timers and tracker callbacks arrive as
//! [`RunnerEvent`]s on one queue, which [`CalibrationSession`] drains.

use std::mem;
use std::sync::Arc;
use std::time::Duration;

use strum::Display;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, trace, warn};
use tracker_client::{
    CalibrationListener, CalibrationReport, Point2D, TrackerEvent, TrackerService,
};

use crate::config::{CalibrationConfig, ConfigError};
use crate::display::TargetDisplay;
use crate::gate::{GateDecision, TrackerStateGate};
use crate::outcome::{CalibrationError, CalibrationOutcome, OutcomeKind};
use crate::scheduler::{Scheduler, TimerHandle, TimerId, TimerKind, TokioScheduler};
use crate::sequencer::PointSequencer;

/// Everything that can move a calibration forward.
#[derive(Debug, Clone, PartialEq)]
pub enum RunnerEvent {
    TimerElapsed(TimerId),
    Tracker(TrackerEvent),
    /// User cancellation.
    Cancel,
}

/// Forwards tracker callbacks onto the runner's event queue.
#[derive(Debug, Clone)]
pub struct EventSender {
    events: mpsc::UnboundedSender<RunnerEvent>,
}

impl EventSender {
    pub fn new(events: mpsc::UnboundedSender<RunnerEvent>) -> Self {
        Self { events }
    }
}

impl CalibrationListener for EventSender {
    fn on_event(&self, event: TrackerEvent) {
        if self.events.send(RunnerEvent::Tracker(event)).is_err() {
            trace!("Calibration finished, dropping tracker event");
        }
    }
}

/// Externally visible stage of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Phase {
    Idle,
    Starting,
    AwaitingLatency,
    Recording,
    AwaitingProgress,
    Completing,
    Terminal(OutcomeKind),
}

/// Internal state. Timer handles live in the variants that wait on them.
#[derive(Debug)]
enum State {
    Idle,
    Starting,
    AwaitingLatency { point: Point2D, timer: TimerHandle },
    Recording { point: Point2D, timer: TimerHandle },
    AwaitingProgress { point: Point2D },
    /// Every queued target sampled, waiting for the report.
    Completing,
    Terminal(OutcomeKind),
}

impl State {
    fn phase(&self) -> Phase {
        match self {
            State::Idle => Phase::Idle,
            State::Starting => Phase::Starting,
            State::AwaitingLatency { .. } => Phase::AwaitingLatency,
            State::Recording { .. } => Phase::Recording,
            State::AwaitingProgress { .. } => Phase::AwaitingProgress,
            State::Completing => Phase::Completing,
            State::Terminal(kind) => Phase::Terminal(*kind),
        }
    }

    fn timer(&self) -> Option<&TimerHandle> {
        match self {
            State::AwaitingLatency { timer, .. } | State::Recording { timer, .. } => Some(timer),
            _ => None,
        }
    }

    fn point(&self) -> Option<Point2D> {
        match self {
            State::AwaitingLatency { point, .. }
            | State::Recording { point, .. }
            | State::AwaitingProgress { point } => Some(*point),
            _ => None,
        }
    }

    fn is_session_active(&self) -> bool {
        !matches!(self, State::Idle | State::Terminal(_))
    }

    fn cancel_timer(self) {
        if let State::AwaitingLatency { timer, .. } | State::Recording { timer, .. } = self {
            trace!("Cancelling {} timer {}", timer.kind(), timer.id());
            timer.cancel();
        }
    }
}

/// Drives one calibration run against a tracker service.
///
/// The runner is single-use: it starts from `Idle`, and once a terminal
/// outcome has been produced every further event is ignored.
pub struct CalibrationRunner<T, D, S> {
    tracker: T,
    display: D,
    scheduler: S,
    listener: Arc<dyn CalibrationListener>,
    gate: TrackerStateGate,
    sequencer: PointSequencer,
    state: State,
    latency: Duration,
    recording: Duration,
    max_resample_attempts: u32,
    max_resample_points: usize,
    resample_rounds: u32,
    next_timer_id: u64,
    outcome: Option<oneshot::Sender<CalibrationOutcome>>,
}

impl<T: TrackerService, D: TargetDisplay, S: Scheduler> CalibrationRunner<T, D, S> {
    /// Create a runner and the receiver its outcome is delivered to.
    ///
    /// `listener` is handed to the tracker for calibration and state callbacks.
    /// Whatever it receives must come back through [`handle`](Self::handle).
    pub fn new(
        tracker: T,
        display: D,
        scheduler: S,
        listener: Arc<dyn CalibrationListener>,
        config: &CalibrationConfig,
    ) -> (Self, oneshot::Receiver<CalibrationOutcome>) {
        let (outcome_tx, outcome_rx) = oneshot::channel();
        let gate = TrackerStateGate::new(tracker.tracker_state());

        let runner = Self {
            tracker,
            display,
            scheduler,
            listener,
            gate,
            sequencer: PointSequencer::new(config.layout_generator()),
            state: State::Idle,
            latency: config.latency(),
            recording: config.recording(),
            max_resample_attempts: config.max_resample_attempts,
            max_resample_points: config.max_resample_points,
            resample_rounds: 0,
            next_timer_id: 0,
            outcome: Some(outcome_tx),
        };
        (runner, outcome_rx)
    }

    /// Begin the calibration. Returns whether the run already finished.
    pub fn start(&mut self) -> bool {
        if !matches!(self.state, State::Idle) {
            warn!("Calibration already started ({})", self.phase());
            return self.is_finished();
        }

        // The device may have changed since the runner was built
        self.gate.update(self.tracker.tracker_state(), false);
        if !self.gate.is_usable() {
            warn!(
                "Cannot calibrate: {}",
                self.gate.reason().unwrap_or("device unusable")
            );
            self.finish(Err(CalibrationError::PreconditionFailed));
            return true;
        }

        self.state = State::Starting;
        if let Err(err) = self.begin() {
            self.finish(Err(err));
        }
        self.is_finished()
    }

    fn begin(&mut self) -> Result<(), CalibrationError> {
        let count = self.sequencer.regenerate()?;
        info!(
            "Starting calibration: {count} targets on {} screen",
            self.sequencer.generator().screen()
        );

        self.tracker.add_state_listener(self.listener.clone());
        self.tracker.start_calibration(count, self.listener.clone())?;
        self.display.show();

        let first = self
            .sequencer
            .next()?
            .ok_or_else(|| CalibrationError::Unexpected("layout produced no targets".to_string()))?;
        self.present(first);
        Ok(())
    }

    /// Process one event. Returns whether the run has finished.
    ///
    /// Any error raised while reacting to the event ends the run through the
    /// abort path; nothing propagates to the caller.
    pub fn handle(&mut self, event: RunnerEvent) -> bool {
        if let State::Terminal(kind) = self.state {
            trace!("Ignoring {event:?}, calibration already ended with {kind}");
            return true;
        }

        let result = match event {
            RunnerEvent::TimerElapsed(id) => self.on_timer(id),
            RunnerEvent::Tracker(event) => self.on_tracker_event(event),
            RunnerEvent::Cancel => Err(CalibrationError::UserAbort),
        };
        if let Err(err) = result {
            self.finish(Err(err));
        }
        self.is_finished()
    }

    fn on_timer(&mut self, id: TimerId) -> Result<(), CalibrationError> {
        if self.state.timer().map(TimerHandle::id) != Some(id) {
            trace!("Ignoring stale timer {id}");
            return Ok(());
        }

        match self.state {
            State::AwaitingLatency { point, .. } => self.on_latency_elapsed(point),
            State::Recording { point, .. } => self.on_recording_elapsed(point),
            _ => Ok(()),
        }
    }

    fn on_latency_elapsed(&mut self, point: Point2D) -> Result<(), CalibrationError> {
        let (x, y) = point.to_pixel();
        debug!("Sampling target at ({x}, {y})");
        self.tracker.point_start(x, y)?;
        self.display.animate_point(self.recording);

        let timer = self.arm(TimerKind::Recording, self.recording);
        self.state = State::Recording { point, timer };
        Ok(())
    }

    fn on_recording_elapsed(&mut self, point: Point2D) -> Result<(), CalibrationError> {
        self.tracker.point_end()?;
        debug!("Finished sampling target at {point}");
        self.state = State::AwaitingProgress { point };
        Ok(())
    }

    fn on_tracker_event(&mut self, event: TrackerEvent) -> Result<(), CalibrationError> {
        match event {
            TrackerEvent::CalibrationStarted => {
                debug!("Tracker acknowledged calibration start");
                Ok(())
            }
            TrackerEvent::Progress(fraction) => self.on_progress(fraction),
            TrackerEvent::Processing => {
                info!("Tracker is computing the calibration");
                self.display.show_processing();
                Ok(())
            }
            TrackerEvent::Result(report) => self.on_result(report),
            TrackerEvent::StateChanged(state) => {
                match self.gate.update(state, self.state.is_session_active()) {
                    GateDecision::Continue => Ok(()),
                    GateDecision::Abort(reason) => {
                        Err(CalibrationError::DeviceLost(reason.to_string()))
                    }
                }
            }
        }
    }

    fn on_progress(&mut self, fraction: f64) -> Result<(), CalibrationError> {
        info!("Calibration progress {:.0}%", fraction * 100.0);
        if !matches!(self.state, State::AwaitingProgress { .. }) {
            debug!("Progress while {}, nothing to advance", self.phase());
            return Ok(());
        }

        match self.sequencer.next()? {
            Some(point) => self.present(point),
            None => {
                debug!("All targets sampled, waiting for result");
                self.state = State::Completing;
            }
        }
        Ok(())
    }

    fn on_result(&mut self, report: Option<CalibrationReport>) -> Result<(), CalibrationError> {
        if !matches!(
            self.state,
            State::AwaitingProgress { .. } | State::Completing
        ) {
            return Err(CalibrationError::Unexpected(format!(
                "result received while {}",
                self.phase()
            )));
        }

        let report = match report {
            Some(report) if !report.is_empty() => report,
            _ => return Err(CalibrationError::EmptyResult),
        };

        let flagged: Vec<Point2D> = report.points_to_resample().map(|p| p.coordinates).collect();
        if !flagged.is_empty() {
            // Attempts are compared before this round is counted
            let rounds_before = self.resample_rounds;
            self.resample_rounds += 1;
            for point in &flagged {
                self.sequencer.resample(*point)?;
            }

            let queued = self.sequencer.remaining();
            info!(
                "Resample round {}: {} targets flagged, {queued} queued",
                self.resample_rounds,
                flagged.len()
            );
            if rounds_before >= self.max_resample_attempts
                || queued >= self.max_resample_points
            {
                return Err(CalibrationError::QualityExhausted {
                    attempts: self.resample_rounds,
                    queued,
                });
            }
        }

        match self.sequencer.next()? {
            Some(point) => self.present(point),
            None => self.finish(Ok(report)),
        }
        Ok(())
    }

    fn present(&mut self, point: Point2D) {
        debug!("Showing target at {point}");
        self.display.draw_point(point);
        let timer = self.arm(TimerKind::Latency, self.latency);
        self.state = State::AwaitingLatency { point, timer };
    }

    fn arm(&mut self, kind: TimerKind, delay: Duration) -> TimerHandle {
        self.next_timer_id += 1;
        let id = TimerId(self.next_timer_id);
        trace!("Arming {kind} timer {id} for {delay:?}");
        self.scheduler.schedule_once(id, kind, delay)
    }

    /// Enter `Terminal` and deliver the outcome. Runs at most once per runner.
    fn finish(&mut self, result: Result<CalibrationReport, CalibrationError>) {
        if self.is_finished() {
            return;
        }

        let (outcome, abort_service) = match result {
            Ok(report) => (CalibrationOutcome::success(report), false),
            Err(err) => {
                // An empty result means the service has already finished
                let abort = !matches!(err, CalibrationError::EmptyResult);
                (CalibrationOutcome::from(&err), abort)
            }
        };

        let previous = mem::replace(&mut self.state, State::Terminal(outcome.kind));
        let was_active = previous.is_session_active();
        previous.cancel_timer();

        if was_active {
            self.tracker.remove_state_listener(&self.listener);
            if abort_service {
                if let Err(err) = self.tracker.abort_calibration() {
                    warn!("Tracker abort failed: {err}");
                }
            }
            self.display.close();
        }

        match outcome.kind {
            OutcomeKind::Success => info!(
                "Calibration succeeded after {} resample rounds",
                self.resample_rounds
            ),
            kind => warn!("Calibration ended with {kind}: {}", outcome.message),
        }

        if let Some(sender) = self.outcome.take() {
            if sender.send(outcome).is_err() {
                debug!("Outcome receiver dropped");
            }
        }
    }

    pub fn phase(&self) -> Phase {
        self.state.phase()
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.state, State::Terminal(_))
    }

    /// Target currently shown, sampled, or awaiting progress.
    pub fn current_point(&self) -> Option<Point2D> {
        self.state.point()
    }

    /// The timer the current state waits on.
    pub fn pending_timer(&self) -> Option<(TimerId, TimerKind)> {
        self.state.timer().map(|timer| (timer.id(), timer.kind()))
    }

    pub fn resample_rounds(&self) -> u32 {
        self.resample_rounds
    }

    pub fn queued_points(&self) -> usize {
        self.sequencer.remaining()
    }

    pub fn tracker(&self) -> &T {
        &self.tracker
    }

    pub fn tracker_mut(&mut self) -> &mut T {
        &mut self.tracker
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn into_tracker(self) -> T {
        self.tracker
    }
}

/// Cancels a running calibration from outside its event loop.
#[derive(Debug, Clone)]
pub struct CalibrationHandle {
    events: mpsc::UnboundedSender<RunnerEvent>,
}

impl CalibrationHandle {
    pub fn cancel(&self) {
        if self.events.send(RunnerEvent::Cancel).is_err() {
            debug!("Cancel requested after calibration finished");
        }
    }
}

/// A runner wired to tokio timers and an event queue.
pub struct CalibrationSession<T, D> {
    runner: CalibrationRunner<T, D, TokioScheduler>,
    events: mpsc::UnboundedReceiver<RunnerEvent>,
    outcome: oneshot::Receiver<CalibrationOutcome>,
    handle: CalibrationHandle,
}

impl<T: TrackerService, D: TargetDisplay> CalibrationSession<T, D> {
    pub fn new(tracker: T, display: D, config: &CalibrationConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let (tx, rx) = mpsc::unbounded_channel();
        let listener = Arc::new(EventSender::new(tx.clone()));
        let scheduler = TokioScheduler::new(tx.clone());
        let (runner, outcome) = CalibrationRunner::new(tracker, display, scheduler, listener, config);

        Ok(Self {
            runner,
            events: rx,
            outcome,
            handle: CalibrationHandle { events: tx },
        })
    }

    pub fn handle(&self) -> CalibrationHandle {
        self.handle.clone()
    }

    /// Run to completion. Returns the outcome and the tracker.
    pub async fn run(mut self) -> (CalibrationOutcome, T) {
        let mut finished = self.runner.start();
        while !finished {
            let Some(event) = self.events.recv().await else {
                break;
            };
            finished = self.runner.handle(event);
        }

        let outcome = self.outcome.try_recv().unwrap_or_else(|_| {
            CalibrationOutcome::from(&CalibrationError::Unexpected(
                "event queue closed before an outcome".to_string(),
            ))
        });
        (outcome, self.runner.into_tracker())
    }
}

/// Run one calibration with tokio timers.
pub async fn run_calibration<T: TrackerService, D: TargetDisplay>(
    tracker: T,
    display: D,
    config: &CalibrationConfig,
) -> Result<(CalibrationOutcome, T), ConfigError> {
    let session = CalibrationSession::new(tracker, display, config)?;
    Ok(session.run().await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{manual_runner, DisplayCall, ManualRunner, RecordingTracker, TrackerCall};
    use tracker_client::{CalibrationPointResult, PointStatus, TrackerError, TrackerState};

    fn config(point_count: usize) -> CalibrationConfig {
        CalibrationConfig {
            point_count,
            ..Default::default()
        }
    }

    fn fire_pending(runner: &mut ManualRunner) {
        let (id, _) = runner.pending_timer().expect("no pending timer");
        runner.handle(RunnerEvent::TimerElapsed(id));
    }

    /// Run the current target through latency and recording.
    fn sample_current(runner: &mut ManualRunner) -> Point2D {
        let point = runner.current_point().expect("no current target");
        fire_pending(runner);
        fire_pending(runner);
        point
    }

    /// Sample `count` targets, answering all but the last with progress.
    fn sample_round(runner: &mut ManualRunner, count: usize) -> Vec<Point2D> {
        let mut sampled = Vec::new();
        for i in 0..count {
            sampled.push(sample_current(runner));
            if i + 1 < count {
                runner.handle(RunnerEvent::Tracker(TrackerEvent::Progress(
                    (i + 1) as f64 / count as f64,
                )));
            }
        }
        sampled
    }

    fn report(points: &[Point2D], flagged: &[Point2D], status: PointStatus) -> RunnerEvent {
        let points = points
            .iter()
            .map(|&p| {
                let status = if flagged.contains(&p) { status } else { PointStatus::Ok };
                CalibrationPointResult::with_status(p, status)
            })
            .collect();
        RunnerEvent::Tracker(TrackerEvent::Result(Some(CalibrationReport {
            success: flagged.is_empty(),
            average_error_degree: 0.42,
            points,
            ..Default::default()
        })))
    }

    #[test]
    fn test_unusable_device_errors_without_service_calls() {
        let (mut runner, mut outcome) =
            manual_runner(RecordingTracker::new(TrackerState::NotConnected), &config(9));

        assert!(runner.start());
        let outcome = outcome.try_recv().unwrap();
        assert_eq!(outcome.kind, OutcomeKind::Error);
        assert_eq!(outcome.message, "Device is not in a valid state, cannot calibrate.");

        assert!(runner.tracker().calls.is_empty());
        assert_eq!(runner.tracker().state_listeners, 0);
        assert!(runner.scheduler().scheduled.is_empty());
        assert!(runner.display().calls.is_empty());
    }

    #[test]
    fn test_device_lost_before_start_errors_without_service_calls() {
        let (mut runner, mut outcome) = manual_runner(RecordingTracker::connected(), &config(9));
        runner.tracker_mut().state = TrackerState::NotConnected;

        assert!(runner.start());
        let outcome = outcome.try_recv().unwrap();
        assert_eq!(outcome.kind, OutcomeKind::Error);
        assert_eq!(outcome.message, "Device is not in a valid state, cannot calibrate.");
        assert!(runner.tracker().calls.is_empty());
        assert_eq!(runner.tracker().state_listeners, 0);
        assert!(runner.scheduler().scheduled.is_empty());
    }

    #[test]
    fn test_device_recovered_before_start_runs() {
        let (mut runner, _outcome) =
            manual_runner(RecordingTracker::new(TrackerState::ConnectedNoStream), &config(4));
        runner.tracker_mut().state = TrackerState::Connected;

        assert!(!runner.start());
        assert_eq!(runner.phase(), Phase::AwaitingLatency);
    }

    #[test]
    fn test_state_listener_removed_when_run_ends() {
        let (mut runner, _outcome) = manual_runner(RecordingTracker::connected(), &config(4));
        runner.start();
        assert_eq!(runner.tracker().state_listeners, 1);

        runner.handle(RunnerEvent::Cancel);
        assert_eq!(runner.tracker().state_listeners, 0);
    }

    #[test]
    fn test_two_timer_protocol() {
        let (mut runner, _outcome) = manual_runner(RecordingTracker::connected(), &config(4));

        assert!(!runner.start());
        assert_eq!(runner.phase(), Phase::AwaitingLatency);
        assert_eq!(runner.tracker().calls, vec![TrackerCall::StartCalibration(4)]);
        assert_eq!(runner.tracker().state_listeners, 1);

        let point = runner.current_point().unwrap();
        assert_eq!(
            runner.display().calls,
            vec![DisplayCall::Show, DisplayCall::Draw(point)]
        );
        let (_, kind, delay) = runner.scheduler().last().unwrap();
        assert_eq!((kind, delay), (TimerKind::Latency, Duration::from_millis(500)));

        fire_pending(&mut runner);
        assert_eq!(runner.phase(), Phase::Recording);
        let (x, y) = point.to_pixel();
        assert_eq!(runner.tracker().calls[1], TrackerCall::PointStart(x, y));
        assert_eq!(
            runner.display().calls.last(),
            Some(&DisplayCall::Animate(Duration::from_millis(750)))
        );
        let (_, kind, delay) = runner.scheduler().last().unwrap();
        assert_eq!((kind, delay), (TimerKind::Recording, Duration::from_millis(750)));

        fire_pending(&mut runner);
        assert_eq!(runner.phase(), Phase::AwaitingProgress);
        assert_eq!(runner.tracker().calls[2], TrackerCall::PointEnd);
        assert!(runner.pending_timer().is_none());

        runner.handle(RunnerEvent::Tracker(TrackerEvent::Progress(0.25)));
        assert_eq!(runner.phase(), Phase::AwaitingLatency);
        assert_ne!(runner.current_point(), Some(point));
    }

    #[test]
    fn test_stale_timer_is_ignored() {
        let (mut runner, _outcome) = manual_runner(RecordingTracker::connected(), &config(4));
        runner.start();

        let (latency_id, _) = runner.pending_timer().unwrap();
        fire_pending(&mut runner);
        let calls = runner.tracker().calls.len();

        runner.handle(RunnerEvent::TimerElapsed(latency_id));
        runner.handle(RunnerEvent::TimerElapsed(TimerId(999)));
        assert_eq!(runner.tracker().calls.len(), calls);
        assert_eq!(runner.phase(), Phase::Recording);
    }

    #[test]
    fn test_clean_result_succeeds_once() {
        let (mut runner, mut outcome) = manual_runner(RecordingTracker::connected(), &config(4));
        runner.start();

        let sampled = sample_round(&mut runner, 4);
        runner.handle(RunnerEvent::Tracker(TrackerEvent::Processing));
        let timers = runner.scheduler().scheduled.len();
        assert!(runner.handle(report(&sampled, &[], PointStatus::Ok)));

        assert_eq!(runner.phase(), Phase::Terminal(OutcomeKind::Success));
        assert_eq!(runner.scheduler().scheduled.len(), timers);
        assert_eq!(runner.tracker().abort_count(), 0);
        assert!(runner.display().calls.contains(&DisplayCall::Processing));
        assert_eq!(runner.display().calls.last(), Some(&DisplayCall::Close));

        let outcome = outcome.try_recv().unwrap();
        assert!(outcome.is_success());
        assert_eq!(outcome.report.unwrap().points.len(), 4);

        // Terminal absorbs everything
        assert!(runner.handle(RunnerEvent::Cancel));
        assert!(runner.handle(report(&sampled, &[], PointStatus::Ok)));
        assert_eq!(runner.tracker().abort_count(), 0);
    }

    #[test]
    fn test_flagged_points_are_sampled_again() {
        let (mut runner, mut outcome) = manual_runner(RecordingTracker::connected(), &config(9));
        runner.start();

        let sampled = sample_round(&mut runner, 9);
        let flagged = [sampled[2], sampled[7]];
        runner.handle(report(&sampled, &flagged[..1], PointStatus::Resample));
        assert_eq!(runner.resample_rounds(), 1);
        assert_eq!(runner.current_point(), Some(flagged[0]));
        assert_eq!(runner.queued_points(), 0);

        let resampled = sample_round(&mut runner, 1);
        assert_eq!(resampled, vec![flagged[0]]);
        runner.handle(report(&sampled, &flagged[1..], PointStatus::NoData));
        assert_eq!(runner.resample_rounds(), 2);
        assert_eq!(runner.current_point(), Some(flagged[1]));

        sample_round(&mut runner, 1);
        runner.handle(report(&sampled, &[], PointStatus::Ok));

        assert_eq!(outcome.try_recv().unwrap().kind, OutcomeKind::Success);
        assert_eq!(runner.tracker().abort_count(), 0);
    }

    #[test]
    fn test_attempt_bound_fails_once() {
        let (mut runner, mut outcome) = manual_runner(RecordingTracker::connected(), &config(4));
        runner.start();

        let sampled = sample_round(&mut runner, 4);
        let flagged = [sampled[0]];
        for round in 1..=3 {
            runner.handle(report(&sampled, &flagged, PointStatus::Resample));
            assert_eq!(runner.resample_rounds(), round);
            assert_eq!(runner.phase(), Phase::AwaitingLatency);
            sample_round(&mut runner, 1);
        }

        assert!(runner.handle(report(&sampled, &flagged, PointStatus::Resample)));
        let outcome = outcome.try_recv().unwrap();
        assert_eq!(outcome.kind, OutcomeKind::Failure);
        assert_eq!(outcome.message, "Unable to calibrate.");
        assert_eq!(runner.tracker().abort_count(), 1);

        runner.handle(report(&sampled, &flagged, PointStatus::Resample));
        assert_eq!(runner.tracker().abort_count(), 1);
    }

    #[test]
    fn test_both_bounds_compare_at_the_limit() {
        let config = CalibrationConfig {
            point_count: 9,
            max_resample_attempts: 1,
            max_resample_points: 3,
            ..Default::default()
        };
        let (mut runner, mut outcome) = manual_runner(RecordingTracker::connected(), &config);
        runner.start();

        // No round used yet and two queued, both under their limits
        let sampled = sample_round(&mut runner, 9);
        runner.handle(report(&sampled, &sampled[..2], PointStatus::Resample));
        assert_eq!(runner.phase(), Phase::AwaitingLatency);

        // The attempt limit is reached once a round is already in use
        let resampled = sample_round(&mut runner, 2);
        runner.handle(report(&sampled, &resampled[..1], PointStatus::Resample));
        let outcome = outcome.try_recv().unwrap();
        assert_eq!(outcome.kind, OutcomeKind::Failure);
        assert_eq!(runner.resample_rounds(), 2);
    }

    #[test]
    fn test_queue_bound_fails() {
        let (mut runner, mut outcome) = manual_runner(RecordingTracker::connected(), &config(9));
        runner.start();

        let sampled = sample_round(&mut runner, 9);
        runner.handle(report(&sampled, &sampled[..4], PointStatus::Resample));

        assert_eq!(runner.phase(), Phase::Terminal(OutcomeKind::Failure));
        assert_eq!(outcome.try_recv().unwrap().kind, OutcomeKind::Failure);
        assert_eq!(runner.tracker().abort_count(), 1);
    }

    #[test]
    fn test_double_cancel_aborts_once() {
        let (mut runner, mut outcome) = manual_runner(RecordingTracker::connected(), &config(9));
        runner.start();
        fire_pending(&mut runner);

        assert!(runner.handle(RunnerEvent::Cancel));
        assert!(runner.handle(RunnerEvent::Cancel));

        let outcome = outcome.try_recv().unwrap();
        assert_eq!(outcome.kind, OutcomeKind::Abort);
        assert_eq!(outcome.message, "User aborted calibration process.");
        assert_eq!(runner.tracker().abort_count(), 1);
        assert!(runner.pending_timer().is_none());
        assert_eq!(
            runner
                .display()
                .calls
                .iter()
                .filter(|c| **c == DisplayCall::Close)
                .count(),
            1
        );
    }

    #[test]
    fn test_device_loss_aborts_with_reason() {
        let (mut runner, mut outcome) = manual_runner(RecordingTracker::connected(), &config(9));
        runner.start();
        sample_current(&mut runner);

        runner.handle(RunnerEvent::Tracker(TrackerEvent::StateChanged(
            TrackerState::ConnectedBadFirmware,
        )));
        runner.handle(RunnerEvent::Tracker(TrackerEvent::StateChanged(
            TrackerState::NotConnected,
        )));

        let outcome = outcome.try_recv().unwrap();
        assert_eq!(outcome.kind, OutcomeKind::Abort);
        assert_eq!(outcome.message, "A firmware update is required.");
        assert_eq!(runner.tracker().abort_count(), 1);
    }

    #[test]
    fn test_usable_state_change_continues() {
        let (mut runner, _outcome) = manual_runner(RecordingTracker::connected(), &config(4));
        runner.start();
        runner.handle(RunnerEvent::Tracker(TrackerEvent::StateChanged(TrackerState::Connected)));
        assert_eq!(runner.phase(), Phase::AwaitingLatency);
    }

    #[test]
    fn test_empty_result_errors_without_abort() {
        let (mut runner, mut outcome) = manual_runner(RecordingTracker::connected(), &config(4));
        runner.start();
        sample_round(&mut runner, 4);

        runner.handle(RunnerEvent::Tracker(TrackerEvent::Result(None)));
        let outcome = outcome.try_recv().unwrap();
        assert_eq!(outcome.kind, OutcomeKind::Error);
        assert_eq!(outcome.message, "Calibration result is empty.");
        assert_eq!(runner.tracker().abort_count(), 0);
    }

    #[test]
    fn test_service_error_becomes_error_outcome() {
        let mut tracker = RecordingTracker::connected();
        tracker.point_start_error = Some(TrackerError::Rejected("busy".to_string()));
        let (mut runner, mut outcome) = manual_runner(tracker, &config(4));
        runner.start();
        fire_pending(&mut runner);

        let outcome = outcome.try_recv().unwrap();
        assert_eq!(outcome.kind, OutcomeKind::Error);
        assert_eq!(
            outcome.message,
            "An error occurred during calibration. Message: Request rejected by tracker service: busy"
        );
        assert_eq!(runner.tracker().abort_count(), 1);
        assert!(runner.pending_timer().is_none());
    }

    #[test]
    fn test_result_out_of_order_is_an_error() {
        let (mut runner, mut outcome) = manual_runner(RecordingTracker::connected(), &config(4));
        runner.start();

        runner.handle(report(&[Point2D::new(1.0, 1.0)], &[], PointStatus::Ok));
        assert_eq!(outcome.try_recv().unwrap().kind, OutcomeKind::Error);
        assert_eq!(runner.tracker().abort_count(), 1);
    }

    #[test]
    fn test_cancel_before_start() {
        let (mut runner, mut outcome) = manual_runner(RecordingTracker::connected(), &config(4));
        assert!(runner.handle(RunnerEvent::Cancel));
        assert_eq!(outcome.try_recv().unwrap().kind, OutcomeKind::Abort);
        assert!(runner.tracker().calls.is_empty());
        assert!(runner.start());
        assert!(runner.tracker().calls.is_empty());
    }
}
