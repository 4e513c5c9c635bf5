//! Reactive controller — coalescing recompute state machine.
//!
//! ```text
//!   Idle      + change   -> Pending
//!   Pending   + trigger  -> Computing   (takes the *current* snapshot)
//!   Computing + change   -> Pending     (queued behind the in-flight job)
//!   Computing + success  -> Idle        (bundle drawn)
//!   Computing + failure  -> Idle        (failure reported, last bundle kept)
//!   Computing + abandon  -> Pending     (outcome will never arrive; retry)
//! ```
//!
//! The controller never evaluates anything itself. `trigger` hands out an
//! [`EvalJob`]; whoever runs it (inline, or on a worker thread) feeds the
//! [`EvalOutcome`] back through `complete`. At most one job is in flight, so
//! any number of changes that arrive meanwhile collapse into a single
//! follow-up recompute against the latest values.

use serde::Serialize;
use std::sync::mpsc::{Receiver, Sender};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

use crate::domain::{SeriesBundle, TimeDomain};
use crate::evaluator::{EvalError, SeriesEvaluator};
use crate::store::{ParameterChange, ParameterStore, StoreSnapshot};

// ─── Collaborators ───────────────────────────────────────────────────

/// Presentation-side consumer of bundles. Called once per successful cycle.
pub trait RenderAdapter {
    fn draw(&mut self, bundle: &Arc<SeriesBundle>);
}

/// Where failed cycles are reported.
pub trait ErrorChannel {
    fn report(&mut self, failure: &CycleFailure);
}

impl RenderAdapter for Sender<Arc<SeriesBundle>> {
    fn draw(&mut self, bundle: &Arc<SeriesBundle>) {
        if self.send(Arc::clone(bundle)).is_err() {
            warn!(cycle = bundle.cycle, "render adapter disconnected; bundle dropped");
        }
    }
}

impl ErrorChannel for Sender<CycleFailure> {
    fn report(&mut self, failure: &CycleFailure) {
        if self.send(failure.clone()).is_err() {
            warn!(cycle = failure.cycle, "error channel disconnected; failure dropped");
        }
    }
}

/// A recompute cycle that failed. The previously drawn bundle stays current.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleFailure {
    pub cycle: u64,
    pub error: EvalError,
}

// ─── Jobs ────────────────────────────────────────────────────────────

/// One unit of evaluation work: a cycle number and the snapshot to evaluate.
#[derive(Debug, Clone)]
pub struct EvalJob {
    pub cycle: u64,
    pub domain: TimeDomain,
    pub snapshot: Arc<StoreSnapshot>,
}

impl EvalJob {
    pub fn run(&self, evaluator: &SeriesEvaluator) -> EvalOutcome {
        EvalOutcome {
            cycle: self.cycle,
            result: evaluator.recompute_cycle(self.cycle, &self.domain, &self.snapshot),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EvalOutcome {
    pub cycle: u64,
    pub result: Result<SeriesBundle, EvalError>,
}

// ─── State ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ControllerState {
    Idle,
    Pending,
    Computing,
}

/// Counters over the controller's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CycleStats {
    /// Change notifications received.
    pub changes: u64,
    /// Jobs handed out.
    pub recomputes: u64,
    /// Bundles drawn.
    pub published: u64,
    /// Failures reported.
    pub failed: u64,
    /// Outcomes discarded because they did not match the in-flight cycle.
    pub ignored: u64,
    /// In-flight cycles given up on because their executor went away.
    pub abandoned: u64,
}

pub struct ReactiveController {
    state: ControllerState,
    in_flight: Option<u64>,
    next_cycle: u64,
    last_change: Option<Instant>,
    debounce: Duration,
    domain: TimeDomain,
    changes: Receiver<ParameterChange>,
    renderer: Box<dyn RenderAdapter>,
    errors: Box<dyn ErrorChannel>,
    last_published: Option<Arc<SeriesBundle>>,
    stats: CycleStats,
}

impl ReactiveController {
    /// `changes` is a store subscription (see `ParameterStore::subscribe`).
    pub fn new(
        domain: TimeDomain,
        changes: Receiver<ParameterChange>,
        renderer: impl RenderAdapter + 'static,
        errors: impl ErrorChannel + 'static,
    ) -> Self {
        Self {
            state: ControllerState::Idle,
            in_flight: None,
            next_cycle: 0,
            last_change: None,
            debounce: Duration::ZERO,
            domain,
            changes,
            renderer: Box::new(renderer),
            errors: Box::new(errors),
            last_published: None,
            stats: CycleStats::default(),
        }
    }

    /// Only trigger once the most recent change is at least `window` old.
    pub fn with_debounce(mut self, window: Duration) -> Self {
        self.debounce = window;
        self
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn in_flight(&self) -> Option<u64> {
        self.in_flight
    }

    pub fn stats(&self) -> CycleStats {
        self.stats
    }

    pub fn domain(&self) -> &TimeDomain {
        &self.domain
    }

    /// The last bundle handed to the render adapter.
    pub fn last_published(&self) -> Option<&Arc<SeriesBundle>> {
        self.last_published.as_ref()
    }

    /// Idle with nothing in flight.
    pub fn is_settled(&self) -> bool {
        self.state == ControllerState::Idle && self.in_flight.is_none()
    }

    /// Drain the store subscription. Returns how many changes were seen.
    pub fn poll_changes(&mut self, now: Instant) -> usize {
        let mut seen = 0;
        for change in self.changes.try_iter() {
            trace!(id = %change.id, version = change.version, "change received");
            seen += 1;
        }
        if seen > 0 {
            self.stats.changes += seen as u64;
            self.mark_pending(now);
        }
        seen
    }

    /// Request a recompute without a parameter change (initial draw).
    pub fn request_refresh(&mut self, now: Instant) {
        self.mark_pending(now);
    }

    fn mark_pending(&mut self, now: Instant) {
        self.last_change = Some(now);
        if self.state != ControllerState::Pending {
            debug!(from = ?self.state, in_flight = ?self.in_flight, "-> Pending");
            self.state = ControllerState::Pending;
        }
    }

    /// When a debounced Pending state becomes eligible to trigger.
    pub fn deadline(&self) -> Option<Instant> {
        match (self.state, self.last_change) {
            (ControllerState::Pending, Some(last)) => Some(last + self.debounce),
            _ => None,
        }
    }

    /// `Pending -> Computing`: snapshot the store as it is *now* and hand out
    /// a job. Returns `None` if not Pending, a job is already in flight, or
    /// the debounce window has not elapsed.
    pub fn trigger(&mut self, now: Instant, store: &ParameterStore) -> Option<EvalJob> {
        if self.state != ControllerState::Pending || self.in_flight.is_some() {
            return None;
        }
        if let Some(deadline) = self.deadline() {
            if now < deadline {
                return None;
            }
        }

        self.next_cycle += 1;
        let cycle = self.next_cycle;
        let snapshot = Arc::new(store.snapshot());
        debug!(cycle, version = snapshot.version, "Pending -> Computing");

        self.state = ControllerState::Computing;
        self.in_flight = Some(cycle);
        self.stats.recomputes += 1;

        Some(EvalJob {
            cycle,
            domain: self.domain.clone(),
            snapshot,
        })
    }

    /// Feed back the outcome of the in-flight job.
    ///
    /// Returns `false` (and changes nothing) for an outcome that does not
    /// belong to the in-flight cycle. If changes arrived while computing, the
    /// controller stays Pending so the next `trigger` picks them up.
    pub fn complete(&mut self, outcome: EvalOutcome) -> bool {
        if self.in_flight != Some(outcome.cycle) {
            warn!(
                cycle = outcome.cycle,
                in_flight = ?self.in_flight,
                "discarding outcome for a cycle that is not in flight"
            );
            self.stats.ignored += 1;
            return false;
        }
        self.in_flight = None;

        match outcome.result {
            Ok(bundle) => {
                let bundle = Arc::new(bundle);
                info!(
                    cycle = bundle.cycle,
                    series = bundle.len(),
                    hash = bundle.hash.short(),
                    "bundle published"
                );
                self.renderer.draw(&bundle);
                self.last_published = Some(bundle);
                self.stats.published += 1;
            }
            Err(error) => {
                warn!(cycle = outcome.cycle, %error, "recompute failed; keeping last bundle");
                self.errors.report(&CycleFailure {
                    cycle: outcome.cycle,
                    error,
                });
                self.stats.failed += 1;
            }
        }

        if self.state == ControllerState::Computing {
            debug!(cycle = outcome.cycle, "Computing -> Idle");
            self.state = ControllerState::Idle;
        } else {
            debug!(cycle = outcome.cycle, "changes queued during compute; staying Pending");
        }
        true
    }

    /// Give up on the in-flight `cycle` when its outcome can no longer arrive
    /// (the executor died or never received the job).
    ///
    /// The snapshot was never drawn, so the controller goes back to Pending
    /// and the next `trigger` hands out a fresh job. An outcome for the
    /// abandoned cycle that turns up later is ignored.
    pub fn abandon(&mut self, cycle: u64) -> bool {
        if self.in_flight != Some(cycle) {
            return false;
        }
        warn!(cycle, "abandoning in-flight cycle");
        self.in_flight = None;
        self.stats.abandoned += 1;
        if self.state != ControllerState::Pending {
            debug!(cycle, "Computing -> Pending");
            self.state = ControllerState::Pending;
        }
        true
    }
}
