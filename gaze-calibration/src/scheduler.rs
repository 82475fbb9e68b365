//! One-shot timers delivered as runner events.

use std::fmt;
use std::time::Duration;

use strum::Display;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::AbortHandle;

use crate::runner::RunnerEvent;

/// Identifies one scheduled timer. Never reused within a runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(pub u64);

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Which of the two calibration timers a handle belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum TimerKind {
    /// Delay between showing a target and starting to sample it.
    Latency,
    /// Duration a target is sampled.
    Recording,
}

/// Handle to a scheduled timer.
///
/// Dropping the handle does not cancel the timer; call [`cancel`](Self::cancel).
/// A timer that fires after cancellation still reaches the runner, which
/// ignores it because no state holds its id anymore.
#[derive(Debug)]
pub struct TimerHandle {
    id: TimerId,
    kind: TimerKind,
    abort: Option<AbortHandle>,
}

impl TimerHandle {
    /// Handle with nothing to abort, for schedulers that are driven externally.
    pub fn detached(id: TimerId, kind: TimerKind) -> Self {
        Self {
            id,
            kind,
            abort: None,
        }
    }

    pub fn id(&self) -> TimerId {
        self.id
    }

    pub fn kind(&self) -> TimerKind {
        self.kind
    }

    pub fn cancel(self) {
        if let Some(abort) = self.abort {
            abort.abort();
        }
    }
}

/// Schedules one-shot timers that report back as [`RunnerEvent::TimerElapsed`].
pub trait Scheduler {
    fn schedule_once(&mut self, id: TimerId, kind: TimerKind, delay: Duration) -> TimerHandle;
}

/// Scheduler backed by tokio tasks posting onto the runner's event queue.
///
/// Requires a running tokio runtime.
pub struct TokioScheduler {
    events: UnboundedSender<RunnerEvent>,
}

impl TokioScheduler {
    pub fn new(events: UnboundedSender<RunnerEvent>) -> Self {
        Self { events }
    }
}

impl Scheduler for TokioScheduler {
    fn schedule_once(&mut self, id: TimerId, kind: TimerKind, delay: Duration) -> TimerHandle {
        let events = self.events.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // Receiver gone means the run already finished
            let _ = events.send(RunnerEvent::TimerElapsed(id));
        });

        TimerHandle {
            id,
            kind,
            abort: Some(task.abort_handle()),
        }
    }
}
