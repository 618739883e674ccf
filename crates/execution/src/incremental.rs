//! Delta maintenance for progressive operators.
//!
//! [`IncrementalResultEngine`] remembers the last emitted snapshot and turns
//! each recomputed snapshot into retractions (tuples that left the result)
//! followed by insertions (tuples that joined it). Recomputation is
//! debounced: at most once per update interval while input flows, plus one
//! final flush at end of stream when anything arrived since the last one.

use std::time::{Duration, Instant};

use textflow_common::{progressive, Result, Tuple};

/// Result delta of one recomputation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Delta {
    /// Previously emitted tuples no longer in the result, in previous order.
    pub retractions: Vec<Tuple>,
    /// New result tuples, in current order.
    pub insertions: Vec<Tuple>,
}

impl Delta {
    /// Whether the recomputation changed nothing.
    pub fn is_empty(&self) -> bool {
        self.retractions.is_empty() && self.insertions.is_empty()
    }

    /// Retractions then insertions, each with its delta flag attached.
    pub fn into_flagged(self) -> Result<Vec<Tuple>> {
        let mut out = Vec::with_capacity(self.retractions.len() + self.insertions.len());
        for t in &self.retractions {
            out.push(progressive::add_retraction_flag(t)?);
        }
        for t in &self.insertions {
            out.push(progressive::add_insertion_flag(t)?);
        }
        Ok(out)
    }
}

/// Debounced snapshot differ behind a progressive operator.
#[derive(Debug, Clone)]
pub struct IncrementalResultEngine {
    previous: Vec<Tuple>,
    interval: Duration,
    last_update: Option<Instant>,
    pending: u64,
}

impl IncrementalResultEngine {
    /// Engine recomputing at most once per `interval` while input flows.
    pub fn new(interval: Duration) -> Self {
        Self {
            previous: Vec::new(),
            interval,
            last_update: None,
            pending: 0,
        }
    }

    /// Snapshot most recently turned into a delta.
    pub fn previous_snapshot(&self) -> &[Tuple] {
        &self.previous
    }

    /// Inputs seen since the last recomputation.
    pub fn pending(&self) -> u64 {
        self.pending
    }

    /// Count one input toward the next recomputation.
    pub fn record_input(&mut self) {
        self.pending += 1;
    }

    /// Whether an input-triggered recomputation is due at `now`.
    ///
    /// The first recomputation is always due; later ones only once the
    /// interval has fully elapsed.
    pub fn is_due(&self, now: Instant) -> bool {
        self.pending > 0
            && self
                .last_update
                .map_or(true, |last| now.saturating_duration_since(last) > self.interval)
    }

    /// Recompute with `snapshot` if due, otherwise return `None`.
    pub fn on_input_at<F>(&mut self, now: Instant, snapshot: F) -> Result<Option<Delta>>
    where
        F: FnOnce() -> Result<Vec<Tuple>>,
    {
        if !self.is_due(now) {
            return Ok(None);
        }
        Ok(Some(self.recompute_at(now, snapshot()?)))
    }

    /// End of stream: recompute if anything arrived since the last recomputation.
    pub fn on_exhausted_at<F>(&mut self, now: Instant, snapshot: F) -> Result<Option<Delta>>
    where
        F: FnOnce() -> Result<Vec<Tuple>>,
    {
        if self.pending == 0 {
            return Ok(None);
        }
        Ok(Some(self.recompute_at(now, snapshot()?)))
    }

    /// [`Self::on_input_at`] using the current time.
    pub fn on_input<F>(&mut self, snapshot: F) -> Result<Option<Delta>>
    where
        F: FnOnce() -> Result<Vec<Tuple>>,
    {
        self.on_input_at(Instant::now(), snapshot)
    }

    /// [`Self::on_exhausted_at`] using the current time.
    pub fn on_exhausted<F>(&mut self, snapshot: F) -> Result<Option<Delta>>
    where
        F: FnOnce() -> Result<Vec<Tuple>>,
    {
        self.on_exhausted_at(Instant::now(), snapshot)
    }

    /// Unconditionally diff `current` against the previous snapshot and make
    /// it the new previous snapshot.
    pub fn recompute_at(&mut self, now: Instant, current: Vec<Tuple>) -> Delta {
        let retractions = self
            .previous
            .iter()
            .filter(|t| !current.contains(t))
            .cloned()
            .collect();
        let insertions = current
            .iter()
            .filter(|t| !self.previous.contains(t))
            .cloned()
            .collect();
        self.previous = current;
        self.last_update = Some(now);
        self.pending = 0;
        Delta {
            retractions,
            insertions,
        }
    }
}
