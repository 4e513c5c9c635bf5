//! One dashboard session: store, evaluator and controller wired together.
//!
//! The session owns the store, so edits and snapshots are serialized by the
//! borrow checker. Hosts either drive cycles inline with [`Session::settle`]
//! or hand [`EvalJob`]s to a worker and feed outcomes back via
//! [`Session::complete`].

use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use crate::config::{ConfigError, DashboardConfig};
use crate::controller::{
    ControllerState, CycleStats, ErrorChannel, EvalJob, EvalOutcome, ReactiveController,
    RenderAdapter,
};
use crate::domain::SeriesBundle;
use crate::evaluator::SeriesEvaluator;
use crate::formula::FormulaRegistry;
use crate::params::ParamId;
use crate::store::{ParameterChange, ParameterStore, StoreError};

/// A raw edit from an input widget: `parameter_id` is `group.name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputEvent {
    pub parameter_id: String,
    pub raw_value: String,
}

impl InputEvent {
    pub fn new(parameter_id: impl Into<String>, raw_value: impl Into<String>) -> Self {
        Self {
            parameter_id: parameter_id.into(),
            raw_value: raw_value.into(),
        }
    }
}

pub struct Session {
    config: DashboardConfig,
    store: ParameterStore,
    evaluator: Arc<SeriesEvaluator>,
    controller: ReactiveController,
}

impl Session {
    /// Session over the built-in formulas.
    pub fn new(
        config: DashboardConfig,
        renderer: impl RenderAdapter + 'static,
        errors: impl ErrorChannel + 'static,
    ) -> Result<Self, ConfigError> {
        Self::with_registry(config, FormulaRegistry::builtin(), renderer, errors)
    }

    /// Validate `config` against `registry` and wire everything up. An initial
    /// refresh is queued so the first cycle draws the defaults.
    pub fn with_registry(
        config: DashboardConfig,
        registry: FormulaRegistry,
        renderer: impl RenderAdapter + 'static,
        errors: impl ErrorChannel + 'static,
    ) -> Result<Self, ConfigError> {
        config.validate(&registry)?;

        let mut store = ParameterStore::new(
            config.parameter_groups(&registry),
            config.controller.bounds_policy,
        );
        let evaluator = Arc::new(SeriesEvaluator::new(
            Arc::new(registry),
            config.series_specs(),
        ));
        let mut controller =
            ReactiveController::new(config.time_domain(), store.subscribe(), renderer, errors)
                .with_debounce(config.debounce());
        controller.request_refresh(Instant::now());

        info!(
            series = config.series.len(),
            params = store.ids().len(),
            points = config.time_domain().len(),
            "session started"
        );
        Ok(Self {
            config,
            store,
            evaluator,
            controller,
        })
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    pub fn store(&self) -> &ParameterStore {
        &self.store
    }

    /// Shared handle for running jobs off-thread.
    pub fn evaluator(&self) -> Arc<SeriesEvaluator> {
        Arc::clone(&self.evaluator)
    }

    pub fn controller(&self) -> &ReactiveController {
        &self.controller
    }

    pub fn state(&self) -> ControllerState {
        self.controller.state()
    }

    pub fn stats(&self) -> CycleStats {
        self.controller.stats()
    }

    pub fn last_published(&self) -> Option<&Arc<SeriesBundle>> {
        self.controller.last_published()
    }

    // ─── Input ───────────────────────────────────────────────────────

    /// Apply a raw edit. Invalid input leaves the store untouched.
    pub fn dispatch(&mut self, event: &InputEvent) -> Result<Option<ParameterChange>, StoreError> {
        let id: ParamId = event
            .parameter_id
            .parse()
            .map_err(|_| StoreError::NotFound(event.parameter_id.clone()))?;
        self.store.set(&id, &event.raw_value)
    }

    pub fn nudge(&mut self, id: &ParamId, steps: i32) -> Result<Option<ParameterChange>, StoreError> {
        self.store.nudge(id, steps)
    }

    pub fn reset_all(&mut self) -> Vec<ParameterChange> {
        self.store.reset_all()
    }

    // ─── Cycles ──────────────────────────────────────────────────────

    /// Pick up pending changes and, if the controller is ready, start a cycle.
    pub fn next_job(&mut self, now: Instant) -> Option<EvalJob> {
        self.controller.poll_changes(now);
        self.controller.trigger(now, &self.store)
    }

    /// Run a job on the calling thread.
    pub fn run_job(&self, job: &EvalJob) -> EvalOutcome {
        job.run(&self.evaluator)
    }

    pub fn complete(&mut self, outcome: EvalOutcome) -> bool {
        self.controller.complete(outcome)
    }

    /// Give up on the in-flight cycle; see [`ReactiveController::abandon`].
    pub fn abandon(&mut self, cycle: u64) -> bool {
        self.controller.abandon(cycle)
    }

    /// Run cycles inline until the controller is settled. Debounce is
    /// evaluated against `now`, so a change younger than the window stays
    /// Pending. Returns the number of cycles run.
    pub fn settle(&mut self, now: Instant) -> usize {
        let mut cycles = 0;
        while let Some(job) = self.next_job(now) {
            let outcome = self.run_job(&job);
            self.complete(outcome);
            cycles += 1;
        }
        debug!(cycles, state = ?self.controller.state(), "settle finished");
        cycles
    }
}
