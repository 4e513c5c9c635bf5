//! Series evaluator — turns a store snapshot into a complete `SeriesBundle`.
//!
//! All-or-nothing: if any series fails, the whole recompute fails and no
//! bundle is produced. Series are evaluated in parallel but collected in
//! declared order, so the result is identical to a sequential pass.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, instrument};

use crate::domain::{Series, SeriesBundle, TimeDomain};
use crate::formula::{FormulaError, FormulaRegistry};
use crate::params::ParameterSet;
use crate::store::StoreSnapshot;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvalError {
    #[error("evaluation of '{formula_key}' for series '{series}' failed: {cause}")]
    EvaluationFailed {
        formula_key: String,
        series: String,
        #[source]
        cause: FormulaError,
    },
}

impl EvalError {
    pub fn formula_key(&self) -> &str {
        match self {
            EvalError::EvaluationFailed { formula_key, .. } => formula_key,
        }
    }

    pub fn cause(&self) -> &FormulaError {
        match self {
            EvalError::EvaluationFailed { cause, .. } => cause,
        }
    }
}

/// One tracked series: which formula to run for which parameter group.
///
/// `key` is both the series id and the name of its parameter group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesSpec {
    pub key: String,
    pub label: String,
    pub formula_key: String,
}

impl SeriesSpec {
    pub fn new(
        key: impl Into<String>,
        label: impl Into<String>,
        formula_key: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            formula_key: formula_key.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SeriesEvaluator {
    registry: Arc<FormulaRegistry>,
    plan: Vec<SeriesSpec>,
}

impl SeriesEvaluator {
    pub fn new(registry: Arc<FormulaRegistry>, plan: Vec<SeriesSpec>) -> Self {
        Self { registry, plan }
    }

    pub fn plan(&self) -> &[SeriesSpec] {
        &self.plan
    }

    pub fn registry(&self) -> &FormulaRegistry {
        &self.registry
    }

    /// Evaluate every planned series against `snapshot`.
    pub fn recompute(
        &self,
        domain: &TimeDomain,
        snapshot: &Arc<StoreSnapshot>,
    ) -> Result<SeriesBundle, EvalError> {
        self.recompute_cycle(0, domain, snapshot)
    }

    /// [`recompute`](Self::recompute), stamping the bundle with a cycle number.
    #[instrument(skip_all, fields(cycle = cycle, version = snapshot.version))]
    pub fn recompute_cycle(
        &self,
        cycle: u64,
        domain: &TimeDomain,
        snapshot: &Arc<StoreSnapshot>,
    ) -> Result<SeriesBundle, EvalError> {
        let started = Instant::now();

        let results: Vec<Result<Series, EvalError>> = self
            .plan
            .par_iter()
            .map(|spec| self.evaluate_one(spec, domain, snapshot))
            .collect();
        // Sequential collect so the reported failure is the first in declared order.
        let series = results.into_iter().collect::<Result<Vec<_>, _>>()?;

        debug!(
            series = series.len(),
            elapsed_us = started.elapsed().as_micros() as u64,
            "recompute finished"
        );
        Ok(SeriesBundle::new(
            cycle,
            domain.clone(),
            series,
            Arc::clone(snapshot),
        ))
    }

    fn evaluate_one(
        &self,
        spec: &SeriesSpec,
        domain: &TimeDomain,
        snapshot: &StoreSnapshot,
    ) -> Result<Series, EvalError> {
        let fail = |cause: FormulaError| EvalError::EvaluationFailed {
            formula_key: spec.formula_key.clone(),
            series: spec.key.clone(),
            cause,
        };

        let formula = self.registry.get(&spec.formula_key).map_err(fail)?;
        // An absent group surfaces as the formula's first missing parameter.
        let empty = ParameterSet::new();
        let params = snapshot.group(&spec.key).unwrap_or(&empty);

        let values = formula.evaluate(domain, params).map_err(fail)?;
        Series::new(
            spec.key.clone(),
            spec.label.clone(),
            spec.formula_key.clone(),
            domain.clone(),
            values,
        )
        .map_err(|e| {
            fail(FormulaError::LengthMismatch {
                expected: e.expected,
                actual: e.actual,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formula::{CyclicalDeviation, ExponentialGrowth};
    use crate::params::{BoundsPolicy, Parameter};
    use crate::store::{ParameterGroup, ParameterStore};

    fn snapshot() -> Arc<StoreSnapshot> {
        let store = ParameterStore::new(
            vec![
                ParameterGroup::new(
                    "gdp",
                    vec![
                        Parameter::new("base", 10.0, 0.1),
                        Parameter::new("rate", 0.03, 0.01),
                    ]
                    .into_iter()
                    .collect(),
                ),
                ParameterGroup::new(
                    "inflation",
                    vec![
                        Parameter::new("target", 2.0, 0.1),
                        Parameter::new("amplitude", 0.5, 0.1),
                    ]
                    .into_iter()
                    .collect(),
                ),
            ],
            BoundsPolicy::Clamp,
        );
        Arc::new(store.snapshot())
    }

    fn evaluator(plan: Vec<SeriesSpec>) -> SeriesEvaluator {
        SeriesEvaluator::new(Arc::new(FormulaRegistry::builtin()), plan)
    }

    #[test]
    fn bundle_preserves_declared_order() {
        let ev = evaluator(vec![
            SeriesSpec::new("inflation", "Inflation", CyclicalDeviation::SINE_KEY),
            SeriesSpec::new("gdp", "GDP", ExponentialGrowth::KEY),
        ]);
        let domain = TimeDomain::years(0, 10);
        let bundle = ev.recompute(&domain, &snapshot()).unwrap();
        assert_eq!(bundle.labels(), vec!["Inflation", "GDP"]);
        for s in bundle.iter() {
            assert_eq!(s.len(), domain.len());
            assert!(s.domain().is_shared_with(&domain));
        }
    }

    #[test]
    fn one_failure_fails_the_whole_bundle() {
        let ev = evaluator(vec![
            SeriesSpec::new("gdp", "GDP", ExponentialGrowth::KEY),
            SeriesSpec::new("unemployment", "Unemployment", CyclicalDeviation::COSINE_KEY),
        ]);
        let err = ev
            .recompute(&TimeDomain::years(0, 10), &snapshot())
            .unwrap_err();
        assert_eq!(
            err,
            EvalError::EvaluationFailed {
                formula_key: CyclicalDeviation::COSINE_KEY.into(),
                series: "unemployment".into(),
                cause: FormulaError::MissingParameter("target".into()),
            }
        );
    }

    #[test]
    fn unknown_formula_at_runtime_is_evaluation_failure() {
        let ev = evaluator(vec![SeriesSpec::new("gdp", "GDP", "logistic")]);
        let err = ev
            .recompute(&TimeDomain::years(0, 3), &snapshot())
            .unwrap_err();
        assert_eq!(err.formula_key(), "logistic");
        assert_eq!(err.cause(), &FormulaError::UnknownFormula("logistic".into()));
    }

    #[test]
    fn first_failure_in_declared_order_is_reported() {
        let ev = evaluator(vec![
            SeriesSpec::new("gdp", "GDP", ExponentialGrowth::KEY),
            SeriesSpec::new("a", "A", "nope_a"),
            SeriesSpec::new("b", "B", "nope_b"),
        ]);
        let err = ev
            .recompute(&TimeDomain::years(0, 3), &snapshot())
            .unwrap_err();
        assert_eq!(err.formula_key(), "nope_a");
    }

    #[test]
    fn recompute_is_deterministic() {
        let ev = evaluator(vec![
            SeriesSpec::new("gdp", "GDP", ExponentialGrowth::KEY),
            SeriesSpec::new("inflation", "Inflation", CyclicalDeviation::SINE_KEY),
        ]);
        let domain = TimeDomain::years(0, 10);
        let snap = snapshot();
        let a = ev.recompute(&domain, &snap).unwrap();
        let b = ev.recompute(&domain, &snap).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.hash, b.hash);
    }
}
