//! Application state — single-owner, main-thread only.
//!
//! The UI thread owns the session (and with it the store and controller).
//! Evaluation jobs go to the worker thread; outcomes, bundles and failures
//! come back over channels and are drained once per frame by [`AppState::pump`].

use std::collections::VecDeque;
use std::sync::mpsc::{Receiver, SendError, Sender, TryRecvError};
use std::sync::Arc;
use std::time::Instant;

use chrono::NaiveDateTime;
use tracing::warn;

use macrodash_core::{CycleFailure, InputEvent, ParamId, SeriesBundle, Session};

use crate::renderer::ChartView;
use crate::worker::{WorkerCommand, WorkerResponse};

const ERROR_HISTORY_CAP: usize = 50;

/// Status message severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLevel {
    Info,
    Warning,
    Error,
}

/// An error record for the error history overlay.
#[derive(Debug, Clone)]
pub struct ErrorRecord {
    pub timestamp: NaiveDateTime,
    pub category: ErrorCategory,
    pub message: String,
    pub context: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Input,
    Evaluation,
    Worker,
}

impl ErrorCategory {
    pub fn label(self) -> &'static str {
        match self {
            ErrorCategory::Input => "INPUT",
            ErrorCategory::Evaluation => "EVAL",
            ErrorCategory::Worker => "WORKER",
        }
    }
}

/// Which overlay (if any) is shown on top.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Overlay {
    None,
    ErrorHistory,
    Explanations,
}

/// Top-level application state.
pub struct AppState {
    pub running: bool,
    pub session: Session,

    // Parameter panel
    pub params: Vec<ParamId>,
    pub selected: usize,
    /// Raw text being typed for the selected parameter.
    pub editing: Option<String>,

    // Charts
    pub chart: Option<ChartView>,

    // Channels
    pub worker_tx: Sender<WorkerCommand>,
    pub worker_rx: Receiver<WorkerResponse>,
    pub bundles: Receiver<Arc<SeriesBundle>>,
    pub failures: Receiver<CycleFailure>,
    /// Set once the worker is gone; jobs then run on the UI thread.
    pub inline_eval: bool,

    // Cross-cutting
    pub status_message: Option<(String, StatusLevel)>,
    pub error_history: VecDeque<ErrorRecord>,
    pub error_scroll: usize,
    pub overlay: Overlay,
}

impl AppState {
    pub fn new(
        session: Session,
        bundles: Receiver<Arc<SeriesBundle>>,
        failures: Receiver<CycleFailure>,
        worker_tx: Sender<WorkerCommand>,
        worker_rx: Receiver<WorkerResponse>,
    ) -> Self {
        let params = session.store().ids();
        Self {
            running: true,
            session,
            params,
            selected: 0,
            editing: None,
            chart: None,
            worker_tx,
            worker_rx,
            bundles,
            failures,
            inline_eval: false,
            status_message: None,
            error_history: VecDeque::with_capacity(ERROR_HISTORY_CAP),
            error_scroll: 0,
            overlay: Overlay::None,
        }
    }

    // ─── Messages ────────────────────────────────────────────────────

    /// Push an error to the history, capping at 50.
    pub fn push_error(&mut self, category: ErrorCategory, message: String, context: String) {
        let record = ErrorRecord {
            timestamp: chrono::Local::now().naive_local(),
            category,
            message: message.clone(),
            context,
        };
        self.error_history.push_front(record);
        if self.error_history.len() > ERROR_HISTORY_CAP {
            self.error_history.pop_back();
        }
        self.status_message = Some((message, StatusLevel::Error));
    }

    pub fn set_status(&mut self, msg: impl Into<String>) {
        self.status_message = Some((msg.into(), StatusLevel::Info));
    }

    pub fn set_warning(&mut self, msg: impl Into<String>) {
        self.status_message = Some((msg.into(), StatusLevel::Warning));
    }

    // ─── Parameter panel ─────────────────────────────────────────────

    pub fn selected_id(&self) -> Option<&ParamId> {
        self.params.get(self.selected)
    }

    pub fn select_next(&mut self) {
        if !self.params.is_empty() {
            self.selected = (self.selected + 1) % self.params.len();
        }
    }

    pub fn select_prev(&mut self) {
        if !self.params.is_empty() {
            self.selected = (self.selected + self.params.len() - 1) % self.params.len();
        }
    }

    /// Start editing the selected parameter, pre-filled with its value.
    pub fn begin_edit(&mut self) {
        if let Some(id) = self.selected_id() {
            let current = self
                .session
                .store()
                .get(id)
                .map(|p| p.value.to_string())
                .unwrap_or_default();
            self.editing = Some(current);
        }
    }

    pub fn cancel_edit(&mut self) {
        self.editing = None;
    }

    /// Submit the edit buffer. Invalid input keeps the prior value.
    pub fn submit_edit(&mut self) {
        let (Some(raw), Some(id)) = (self.editing.take(), self.selected_id().cloned()) else {
            return;
        };
        let label = self.session.config().param_label(&id);
        match self.session.dispatch(&InputEvent::new(id.to_string(), raw.clone())) {
            Ok(Some(change)) => self.set_status(format!("{label} = {}", change.new)),
            Ok(None) => self.set_status(format!("{label} unchanged")),
            Err(e) => self.push_error(ErrorCategory::Input, e.to_string(), format!("{label}: '{raw}'")),
        }
    }

    /// Move the selected parameter by `steps` step sizes.
    pub fn nudge_selected(&mut self, steps: i32) {
        let Some(id) = self.selected_id().cloned() else {
            return;
        };
        if let Err(e) = self.session.nudge(&id, steps) {
            let label = self.session.config().param_label(&id);
            self.push_error(ErrorCategory::Input, e.to_string(), label);
        }
    }

    pub fn reset_all(&mut self) {
        let changed = self.session.reset_all().len();
        self.set_status(format!("Reset {changed} parameter(s) to defaults"));
    }

    // ─── Frame pump ──────────────────────────────────────────────────

    /// Drain worker outcomes, start the next cycle if the controller is
    /// ready, then pick up bundles and failures.
    pub fn pump(&mut self, now: Instant) {
        loop {
            match self.worker_rx.try_recv() {
                Ok(WorkerResponse::Outcome(outcome)) => {
                    self.session.complete(outcome);
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    // Nothing will answer the job the worker was holding.
                    if let Some(cycle) = self.session.controller().in_flight() {
                        self.session.abandon(cycle);
                    }
                    self.worker_lost();
                    break;
                }
            }
        }

        if let Some(job) = self.session.next_job(now) {
            if self.inline_eval {
                let outcome = self.session.run_job(&job);
                self.session.complete(outcome);
            } else if let Err(SendError(command)) =
                self.worker_tx.send(WorkerCommand::Evaluate(job))
            {
                self.worker_lost();
                if let WorkerCommand::Evaluate(job) = command {
                    let outcome = self.session.run_job(&job);
                    self.session.complete(outcome);
                }
            }
        }

        let latest = self.bundles.try_iter().last();
        if let Some(bundle) = latest {
            let view = ChartView::from_bundle(&bundle, self.session.config());
            let undefined: usize = view.series.iter().map(|s| s.undefined).sum();
            if undefined > 0 {
                self.set_warning(format!("{undefined} undefined sample(s) not plotted"));
            }
            self.chart = Some(view);
        }

        let failures: Vec<CycleFailure> = self.failures.try_iter().collect();
        for failure in failures {
            self.push_error(
                ErrorCategory::Evaluation,
                failure.error.to_string(),
                format!("cycle {}", failure.cycle),
            );
        }
    }

    /// Switch to inline evaluation for the rest of the session.
    fn worker_lost(&mut self) {
        if self.inline_eval {
            return;
        }
        self.inline_eval = true;
        warn!("evaluation worker is gone; evaluating on the UI thread");
        self.push_error(
            ErrorCategory::Worker,
            "evaluation worker stopped".into(),
            "evaluating on the UI thread".into(),
        );
    }
}
