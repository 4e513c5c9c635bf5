//! Formula registry — pure functions from (time domain, parameters) to samples.
//!
//! Formulas are deterministic and side-effect free. A point whose result is
//! not finite comes back as `None` instead of leaking NaN/Inf into rendering.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::domain::{sample, Sample, TimeDomain};
use crate::params::ParameterSet;

// ─── Error type ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FormulaError {
    #[error("unknown formula '{0}'")]
    UnknownFormula(String),
    #[error("missing parameter '{0}'")]
    MissingParameter(String),
    #[error("formula returned {actual} samples for a domain of {expected} points")]
    LengthMismatch { expected: usize, actual: usize },
}

/// Look up a required parameter value.
fn require(params: &ParameterSet, name: &str) -> Result<f64, FormulaError> {
    params
        .value(name)
        .ok_or_else(|| FormulaError::MissingParameter(name.to_string()))
}

// ─── Trait ───────────────────────────────────────────────────────────

/// A registered formula.
///
/// `evaluate` must return exactly one sample per domain point.
pub trait Formula: Send + Sync {
    /// Registry key (e.g. "exponential_growth").
    fn key(&self) -> &str;

    /// Local names of the parameters this formula reads.
    fn required_params(&self) -> &[&'static str];

    /// Human-readable expression in terms of `t` and the parameter names.
    fn expression(&self) -> String;

    fn evaluate(
        &self,
        domain: &TimeDomain,
        params: &ParameterSet,
    ) -> Result<Vec<Sample>, FormulaError>;
}

// ─── Built-in formulas ───────────────────────────────────────────────

/// `base * (1 + rate)^t`
#[derive(Debug, Clone, Copy, Default)]
pub struct ExponentialGrowth;

impl ExponentialGrowth {
    pub const KEY: &'static str = "exponential_growth";
}

impl Formula for ExponentialGrowth {
    fn key(&self) -> &str {
        Self::KEY
    }

    fn required_params(&self) -> &[&'static str] {
        &["base", "rate"]
    }

    fn expression(&self) -> String {
        "base * (1 + rate)^t".to_string()
    }

    fn evaluate(
        &self,
        domain: &TimeDomain,
        params: &ParameterSet,
    ) -> Result<Vec<Sample>, FormulaError> {
        let base = require(params, "base")?;
        let rate = require(params, "rate")?;
        let growth = 1.0 + rate;
        Ok(domain
            .points()
            .iter()
            .map(|&t| sample(base * growth.powf(t)))
            .collect())
    }
}

/// Periodic wave used by [`CyclicalDeviation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wave {
    Sine,
    Cosine,
}

impl Wave {
    fn apply(self, x: f64) -> f64 {
        match self {
            Wave::Sine => x.sin(),
            Wave::Cosine => x.cos(),
        }
    }

    fn name(self) -> &'static str {
        match self {
            Wave::Sine => "sin",
            Wave::Cosine => "cos",
        }
    }
}

/// `target + amplitude * wave(t / period)`
#[derive(Debug, Clone)]
pub struct CyclicalDeviation {
    key: String,
    wave: Wave,
    period: f64,
}

impl CyclicalDeviation {
    pub const SINE_KEY: &'static str = "target_sine_cycle";
    pub const COSINE_KEY: &'static str = "target_cosine_cycle";

    pub fn new(key: impl Into<String>, wave: Wave, period: f64) -> Self {
        Self {
            key: key.into(),
            wave,
            period,
        }
    }

    /// `target + amplitude * sin(t / 2)`
    pub fn sine() -> Self {
        Self::new(Self::SINE_KEY, Wave::Sine, 2.0)
    }

    /// `target + amplitude * cos(t / 3)`
    pub fn cosine() -> Self {
        Self::new(Self::COSINE_KEY, Wave::Cosine, 3.0)
    }
}

impl Formula for CyclicalDeviation {
    fn key(&self) -> &str {
        &self.key
    }

    fn required_params(&self) -> &[&'static str] {
        &["target", "amplitude"]
    }

    fn expression(&self) -> String {
        format!("target + amplitude * {}(t/{})", self.wave.name(), self.period)
    }

    fn evaluate(
        &self,
        domain: &TimeDomain,
        params: &ParameterSet,
    ) -> Result<Vec<Sample>, FormulaError> {
        let target = require(params, "target")?;
        let amplitude = require(params, "amplitude")?;
        Ok(domain
            .points()
            .iter()
            .map(|&t| sample(target + amplitude * self.wave.apply(t / self.period)))
            .collect())
    }
}

// ─── Registry ────────────────────────────────────────────────────────

/// Formula key → formula. Immutable once handed to an evaluator.
#[derive(Clone, Default)]
pub struct FormulaRegistry {
    formulas: BTreeMap<String, Arc<dyn Formula>>,
}

impl FormulaRegistry {
    /// A registry with nothing registered.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The three built-in formulas.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry.register(ExponentialGrowth);
        registry.register(CyclicalDeviation::sine());
        registry.register(CyclicalDeviation::cosine());
        registry
    }

    /// Register a formula under its key, returning any formula it replaced.
    pub fn register(&mut self, formula: impl Formula + 'static) -> Option<Arc<dyn Formula>> {
        self.formulas
            .insert(formula.key().to_string(), Arc::new(formula))
    }

    pub fn get(&self, key: &str) -> Result<Arc<dyn Formula>, FormulaError> {
        self.formulas
            .get(key)
            .cloned()
            .ok_or_else(|| FormulaError::UnknownFormula(key.to_string()))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.formulas.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.formulas.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Formula>> {
        self.formulas.values()
    }

    pub fn len(&self) -> usize {
        self.formulas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.formulas.is_empty()
    }
}

impl fmt::Debug for FormulaRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.formulas.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::Parameter;

    fn params(pairs: &[(&str, f64)]) -> ParameterSet {
        pairs
            .iter()
            .map(|&(name, value)| Parameter::new(name, value, 0.1))
            .collect()
    }

    fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
        assert!(
            (actual - expected).abs() < epsilon,
            "assert_approx failed: actual={actual}, expected={expected}"
        );
    }

    #[test]
    fn exponential_growth_matches_closed_form() {
        let domain = TimeDomain::years(0, 10);
        let values = ExponentialGrowth
            .evaluate(&domain, &params(&[("base", 10.0), ("rate", 0.03)]))
            .unwrap();
        assert_eq!(values.len(), 11);
        assert_eq!(values[0], Some(10.0));
        assert_approx(values[10].unwrap(), 13.439_163_793_441_223, 1e-9);
    }

    #[test]
    fn sine_cycle_at_known_points() {
        let domain = TimeDomain::years(0, 10);
        let values = CyclicalDeviation::sine()
            .evaluate(&domain, &params(&[("target", 2.0), ("amplitude", 0.5)]))
            .unwrap();
        assert_eq!(values[0], Some(2.0));
        assert_approx(values[2].unwrap(), 2.0 + 0.5 * 1.0_f64.sin(), 1e-12);
        assert_approx(values[2].unwrap(), 2.4207, 1e-4);
    }

    #[test]
    fn cosine_cycle_uses_period_three() {
        let domain = TimeDomain::years(0, 3);
        let values = CyclicalDeviation::cosine()
            .evaluate(&domain, &params(&[("target", 4.0), ("amplitude", -0.5)]))
            .unwrap();
        assert_eq!(values[0], Some(3.5));
        assert_approx(values[3].unwrap(), 4.0 - 0.5 * 1.0_f64.cos(), 1e-12);
    }

    #[test]
    fn missing_parameter_is_reported_by_name() {
        let domain = TimeDomain::years(0, 1);
        let err = ExponentialGrowth
            .evaluate(&domain, &params(&[("base", 1.0)]))
            .unwrap_err();
        assert_eq!(err, FormulaError::MissingParameter("rate".into()));
    }

    #[test]
    fn overflow_becomes_undefined_sample() {
        let domain = TimeDomain::years(0, 2);
        let values = ExponentialGrowth
            .evaluate(&domain, &params(&[("base", f64::MAX), ("rate", 1.0)]))
            .unwrap();
        assert_eq!(values[0], Some(f64::MAX));
        assert_eq!(values[1], None);
        assert_eq!(values[2], None);
    }

    #[test]
    fn evaluation_is_deterministic() {
        let domain = TimeDomain::years(0, 50);
        let p = params(&[("target", 2.0), ("amplitude", 0.37)]);
        let a = CyclicalDeviation::sine().evaluate(&domain, &p).unwrap();
        let b = CyclicalDeviation::sine().evaluate(&domain, &p).unwrap();
        let bits = |v: &[Sample]| v.iter().map(|s| s.map(f64::to_bits)).collect::<Vec<_>>();
        assert_eq!(bits(&a), bits(&b));
    }

    #[test]
    fn registry_lookup() {
        let registry = FormulaRegistry::builtin();
        assert_eq!(registry.len(), 3);
        assert!(registry.contains("exponential_growth"));
        assert!(registry.get("target_sine_cycle").is_ok());
        assert_eq!(
            registry.get("logistic").err(),
            Some(FormulaError::UnknownFormula("logistic".into()))
        );
    }

    #[test]
    fn register_replaces_existing_key() {
        let mut registry = FormulaRegistry::builtin();
        let replaced = registry.register(CyclicalDeviation::new(
            CyclicalDeviation::SINE_KEY,
            Wave::Sine,
            4.0,
        ));
        assert!(replaced.is_some());
        assert_eq!(registry.len(), 3);
        assert_eq!(
            registry.get("target_sine_cycle").unwrap().expression(),
            "target + amplitude * sin(t/4)"
        );
    }

    #[test]
    fn expressions_name_their_parameters() {
        let registry = FormulaRegistry::builtin();
        for formula in registry.iter() {
            let expr = formula.expression();
            for name in formula.required_params() {
                assert!(expr.contains(name), "{expr} should mention {name}");
            }
        }
    }
}
