//! Queue of calibration targets for one run.

use std::collections::VecDeque;

use tracker_client::Point2D;

use crate::layout::{GridLayoutGenerator, LayoutError};

/// Hands out calibration targets in presentation order.
///
/// Targets are dequeued one at a time; targets the service wants sampled
/// again are appended with [`resample`](PointSequencer::resample). Owned by a
/// single runner, no internal synchronization.
#[derive(Debug, Clone)]
pub struct PointSequencer {
    generator: GridLayoutGenerator,
    queue: Option<VecDeque<Point2D>>,
}

impl PointSequencer {
    /// A sequencer that builds its layout on the first [`next`](Self::next).
    pub fn new(generator: GridLayoutGenerator) -> Self {
        Self {
            generator,
            queue: None,
        }
    }

    /// Replace the queue with a freshly generated, shuffled layout.
    pub fn regenerate(&mut self) -> Result<usize, LayoutError> {
        let points = self.generator.generate()?;
        let count = points.len();
        self.queue = Some(points.into());
        Ok(count)
    }

    /// Replace the queue with the given targets, in order.
    pub fn load(&mut self, points: impl IntoIterator<Item = Point2D>) {
        self.queue = Some(points.into_iter().collect());
    }

    /// Next target, or `None` once the queue is drained.
    pub fn next(&mut self) -> Result<Option<Point2D>, LayoutError> {
        if self.queue.is_none() {
            self.regenerate()?;
        }
        Ok(self.queue.as_mut().and_then(VecDeque::pop_front))
    }

    /// Queue a target for another sampling attempt, behind the current layout.
    pub fn resample(&mut self, point: Point2D) -> Result<(), LayoutError> {
        if self.queue.is_none() {
            self.regenerate()?;
        }
        if let Some(queue) = self.queue.as_mut() {
            queue.push_back(point);
        }
        Ok(())
    }

    /// Targets still queued.
    pub fn remaining(&self) -> usize {
        self.queue.as_ref().map_or(0, VecDeque::len)
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn generator(&self) -> &GridLayoutGenerator {
        &self.generator
    }
}
