//! End-to-end behaviour of the reactive pipeline: scenarios from the
//! dashboard, coalescing under bursts, and failure isolation.

use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use macrodash_core::formula::{CyclicalDeviation, ExponentialGrowth, Formula};
use macrodash_core::{
    ControllerState, CycleFailure, DashboardConfig, EvalJob, FormulaError, FormulaRegistry, InputEvent,
    ParamId, ParameterSet, Sample, SeriesBundle, Session, StoreError, TimeDomain,
};

// ── Helpers ──────────────────────────────────────────────────────────

struct Harness {
    session: Session,
    drawn: Receiver<Arc<SeriesBundle>>,
    failures: Receiver<CycleFailure>,
}

fn harness_with(config: DashboardConfig, registry: FormulaRegistry) -> Harness {
    let (draw_tx, drawn) = mpsc::channel();
    let (err_tx, failures) = mpsc::channel();
    let session = Session::with_registry(config, registry, draw_tx, err_tx).unwrap();
    Harness {
        session,
        drawn,
        failures,
    }
}

fn harness() -> Harness {
    harness_with(DashboardConfig::builtin(), FormulaRegistry::builtin())
}

fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}"
    );
}

fn value_at(bundle: &SeriesBundle, key: &str, i: usize) -> f64 {
    bundle.get(key).unwrap().get(i).unwrap()
}

// ── Scenarios ────────────────────────────────────────────────────────

#[test]
fn gdp_scenario() {
    let mut h = harness();
    h.session.settle(Instant::now());
    let bundle = h.drawn.try_iter().last().unwrap();

    assert_eq!(bundle.domain.len(), 11);
    assert_eq!(value_at(&bundle, "gdp", 0), 10.0);
    assert_approx(value_at(&bundle, "gdp", 10), 13.439_163_793_441_223, 1e-9);
}

#[test]
fn inflation_scenario_at_t2() {
    let mut h = harness();
    h.session.settle(Instant::now());
    let bundle = h.drawn.try_recv().unwrap();
    assert_approx(value_at(&bundle, "inflation", 2), 2.0 + 0.5 * 1.0_f64.sin(), 1e-12);
    assert_approx(value_at(&bundle, "inflation", 2), 2.4207, 1e-4);
}

#[test]
fn unemployment_starts_below_natural_rate() {
    let mut h = harness();
    h.session.settle(Instant::now());
    let bundle = h.drawn.try_recv().unwrap();
    assert_eq!(value_at(&bundle, "unemployment", 0), 3.5);
}

#[test]
fn display_axis_is_calendar_years() {
    let mut h = harness();
    h.session.settle(Instant::now());
    let bundle = h.drawn.try_recv().unwrap();
    let points = bundle.get("gdp").unwrap().plot_points();
    assert_eq!(points.first().map(|p| p.0), Some(2010.0));
    assert_eq!(points.last().map(|p| p.0), Some(2020.0));
}

#[test]
fn edit_rate_then_recompute() {
    let mut h = harness();
    h.session.settle(Instant::now());
    h.session
        .dispatch(&InputEvent::new("gdp.rate", "0.05"))
        .unwrap();
    h.session.settle(Instant::now());

    let bundle = h.drawn.try_iter().last().unwrap();
    assert_approx(value_at(&bundle, "gdp", 10), 10.0 * 1.05_f64.powi(10), 1e-9);
    // Other series are recomputed from unchanged values.
    assert_eq!(value_at(&bundle, "unemployment", 0), 3.5);
}

#[test]
fn non_numeric_edit_keeps_prior_value_and_bundle() {
    let mut h = harness();
    h.session.settle(Instant::now());
    let before = h.session.last_published().cloned().unwrap();

    let err = h
        .session
        .dispatch(&InputEvent::new("gdp.rate", "fast"))
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidValue { .. }));
    assert_eq!(
        h.session.store().get(&ParamId::new("gdp", "rate")).unwrap().value,
        0.03
    );
    assert_eq!(h.session.settle(Instant::now()), 0);
    assert!(Arc::ptr_eq(h.session.last_published().unwrap(), &before));
}

// ── Coalescing ───────────────────────────────────────────────────────

#[test]
fn burst_during_compute_yields_one_follow_up_with_latest_values() {
    let mut h = harness();
    let now = Instant::now();

    let first = h.session.next_job(now).unwrap();
    assert_eq!(h.session.state(), ControllerState::Computing);

    for v in 1..=50 {
        h.session
            .dispatch(&InputEvent::new("gdp.base", (100 + v).to_string()))
            .unwrap();
        assert!(h.session.next_job(now).is_none());
    }

    let outcome = h.session.run_job(&first);
    h.session.complete(outcome);
    let second = h.session.next_job(now).unwrap();
    let outcome = h.session.run_job(&second);
    h.session.complete(outcome);

    assert!(h.session.next_job(now).is_none());
    assert_eq!(h.session.state(), ControllerState::Idle);

    let bundles: Vec<_> = h.drawn.try_iter().collect();
    assert_eq!(bundles.len(), 2);
    assert_eq!(value_at(&bundles[1], "gdp", 0), 150.0);
    assert_eq!(h.session.stats().changes, 50);
    assert_eq!(h.session.stats().recomputes, 2);
}

#[test]
fn worker_thread_round_trip() {
    let mut h = harness();
    let evaluator = h.session.evaluator();
    let (job_tx, job_rx) = mpsc::channel::<EvalJob>();
    let (out_tx, out_rx) = mpsc::channel();

    let worker = thread::spawn(move || {
        for job in job_rx {
            if out_tx.send(job.run(&evaluator)).is_err() {
                break;
            }
        }
    });

    let now = Instant::now();
    h.session.dispatch(&InputEvent::new("inflation.target", "3")).unwrap();
    let job = h.session.next_job(now).unwrap();
    job_tx.send(job).unwrap();
    let outcome = out_rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert!(h.session.complete(outcome));
    drop(job_tx);
    worker.join().unwrap();

    let bundle = h.drawn.try_recv().unwrap();
    assert_eq!(value_at(&bundle, "inflation", 0), 3.0);
    assert!(h.session.controller().is_settled());
}

#[test]
fn debounced_session_waits_for_quiet_period() {
    let mut config = DashboardConfig::builtin();
    config.controller.debounce_ms = 200;
    let mut h = harness_with(config, FormulaRegistry::builtin());

    // Initial refresh was queued at construction; a far-future `now` clears it.
    let later = Instant::now() + Duration::from_secs(1);
    assert_eq!(h.session.settle(later), 1);

    h.session.dispatch(&InputEvent::new("gdp.base", "11")).unwrap();
    let edited = Instant::now();
    h.session.next_job(edited);
    assert_eq!(h.session.state(), ControllerState::Pending);
    assert_eq!(h.session.settle(edited + Duration::from_millis(50)), 0);
    assert_eq!(h.session.settle(edited + Duration::from_millis(250)), 1);
}

// ── Failure isolation ────────────────────────────────────────────────

/// Formula that fails while its `fail` parameter is positive.
struct Tripwire;

impl Formula for Tripwire {
    fn key(&self) -> &str {
        "tripwire"
    }

    fn required_params(&self) -> &[&'static str] {
        &["fail"]
    }

    fn expression(&self) -> String {
        "0 unless fail > 0".into()
    }

    fn evaluate(
        &self,
        domain: &TimeDomain,
        params: &ParameterSet,
    ) -> Result<Vec<Sample>, FormulaError> {
        match params.value("fail") {
            Some(v) if v > 0.0 => Err(FormulaError::MissingParameter("fail".into())),
            Some(_) => Ok(vec![Some(0.0); domain.len()]),
            None => Err(FormulaError::MissingParameter("fail".into())),
        }
    }
}

fn tripwire_config() -> DashboardConfig {
    DashboardConfig::from_toml(
        r#"
        [domain]
        start = 0
        end = 4

        [[series]]
        id = "gdp"
        label = "GDP"
        formula_key = "exponential_growth"
        [series.defaults.base]
        value = 10.0
        [series.defaults.rate]
        value = 0.03

        [[series]]
        id = "trip"
        label = "Trip"
        formula_key = "tripwire"
        [series.defaults.fail]
        value = 0.0
        step = 1.0
        "#,
    )
    .unwrap()
}

#[test]
fn failing_series_fails_whole_cycle_and_keeps_last_bundle() {
    let mut registry = FormulaRegistry::builtin();
    registry.register(Tripwire);
    let mut h = harness_with(tripwire_config(), registry);

    h.session.settle(Instant::now());
    let good = h.drawn.try_recv().unwrap();

    // GDP changes too, but the bundle is all-or-nothing.
    h.session.dispatch(&InputEvent::new("gdp.base", "99")).unwrap();
    h.session.dispatch(&InputEvent::new("trip.fail", "1")).unwrap();
    assert_eq!(h.session.settle(Instant::now()), 1);

    assert!(h.drawn.try_recv().is_err());
    let failure = h.failures.try_recv().unwrap();
    assert_eq!(failure.error.formula_key(), "tripwire");
    assert!(Arc::ptr_eq(h.session.last_published().unwrap(), &good));
    assert_eq!(h.session.state(), ControllerState::Idle);

    // Recovery: the next valid edit publishes again.
    h.session.dispatch(&InputEvent::new("trip.fail", "0")).unwrap();
    h.session.settle(Instant::now());
    let recovered = h.drawn.try_recv().unwrap();
    assert_eq!(value_at(&recovered, "gdp", 0), 99.0);
    assert_eq!(h.session.stats().failed, 1);
    assert_eq!(h.session.stats().published, 2);
}

#[test]
fn bundle_series_share_domain_and_length() {
    let mut h = harness();
    h.session.settle(Instant::now());
    let bundle = h.drawn.try_recv().unwrap();
    for series in bundle.iter() {
        assert_eq!(series.len(), bundle.domain.len());
        assert!(series.domain().is_shared_with(&bundle.domain));
    }
}

#[test]
fn builtin_formula_keys_are_stable() {
    let registry = FormulaRegistry::builtin();
    let keys: Vec<_> = registry.keys().collect();
    assert_eq!(
        keys,
        vec![
            ExponentialGrowth::KEY,
            CyclicalDeviation::COSINE_KEY,
            CyclicalDeviation::SINE_KEY
        ]
    );
}
