//! Dashboard configuration — the TOML file that declares the time domain and
//! every tracked series with its formula and parameter defaults.
//!
//! A config is only useful once [`DashboardConfig::validate`] has accepted it
//! against a formula registry; after that the store groups, evaluator plan and
//! time domain derived from it are guaranteed consistent.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use crate::domain::TimeDomain;
use crate::evaluator::SeriesSpec;
use crate::formula::{CyclicalDeviation, ExponentialGrowth, FormulaRegistry};
use crate::params::{Bounds, BoundsPolicy, ParamId, Parameter, ParameterSet};
use crate::store::ParameterGroup;

// ─── Error type ──────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("parse dashboard TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("serialize dashboard TOML: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("series '{series}': unknown formula '{formula_key}'")]
    UnknownFormula { series: String, formula_key: String },
    #[error("series '{series}': missing parameter '{name}'")]
    MissingParameter { series: String, name: String },
    #[error("series '{series}': parameter '{name}' is not used by its formula")]
    UnknownParameter { series: String, name: String },
    #[error("invalid default for '{id}': {reason}")]
    InvalidDefault { id: ParamId, reason: String },
    #[error("duplicate series id '{0}'")]
    DuplicateSeries(String),
    #[error("invalid series id '{0}' (must be non-empty, without '.' or whitespace)")]
    InvalidSeriesId(String),
    #[error("empty time domain: end {end} is before start {start}")]
    EmptyDomain { start: i64, end: i64 },
    #[error("time domain {start}..={end} exceeds {max} points")]
    DomainTooLarge { start: i64, end: i64, max: usize },
    #[error("domain origin must be finite, got {0}")]
    InvalidOrigin(f64),
    #[error("no series declared")]
    NoSeries,
}

// ─── Schema ──────────────────────────────────────────────────────────

/// Upper limit on sample points per series.
pub const MAX_DOMAIN_POINTS: usize = 1_000_000;

fn default_title() -> String {
    "Macroeconomic Theory Dashboard".to_string()
}

fn default_step() -> f64 {
    0.1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardConfig {
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default)]
    pub domain: DomainConfig,
    #[serde(default)]
    pub controller: ControllerConfig,
    #[serde(default)]
    pub series: Vec<SeriesConfig>,
}

/// Integer sample points `start..=end`, displayed as `origin + t`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DomainConfig {
    pub start: i64,
    pub end: i64,
    #[serde(default)]
    pub origin: f64,
}

impl Default for DomainConfig {
    fn default() -> Self {
        Self {
            start: 0,
            end: 10,
            origin: 2010.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ControllerConfig {
    #[serde(default)]
    pub debounce_ms: u64,
    #[serde(default)]
    pub bounds_policy: BoundsPolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesConfig {
    pub id: String,
    pub label: String,
    pub formula_key: String,
    /// Parameter names in display order. Empty means the formula's own list.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required_params: Vec<String>,
    /// Formula text shown above the parameters, e.g. `GDP = A * (1 + g)^t`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Hex line colour, e.g. `#bb86fc`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default)]
    pub defaults: BTreeMap<String, ParamDefault>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamDefault {
    pub value: f64,
    #[serde(default = "default_step")]
    pub step: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounds: Option<Bounds>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl ParamDefault {
    pub fn new(value: f64, step: f64, label: &str) -> Self {
        Self {
            value,
            step,
            bounds: None,
            label: Some(label.to_string()),
        }
    }
}

// ─── Built-in dashboard ──────────────────────────────────────────────

impl DashboardConfig {
    /// GDP, inflation and unemployment over 2010–2020.
    pub fn builtin() -> Self {
        let series = |id: &str,
                      label: &str,
                      formula_key: &str,
                      caption: &str,
                      description: &str,
                      color: &str,
                      defaults: [(&str, ParamDefault); 2]| SeriesConfig {
            id: id.to_string(),
            label: label.to_string(),
            formula_key: formula_key.to_string(),
            required_params: defaults.iter().map(|(n, _)| n.to_string()).collect(),
            caption: Some(caption.to_string()),
            description: Some(description.to_string()),
            color: Some(color.to_string()),
            defaults: defaults
                .into_iter()
                .map(|(n, d)| (n.to_string(), d))
                .collect(),
        };

        Self {
            title: default_title(),
            domain: DomainConfig::default(),
            controller: ControllerConfig::default(),
            series: vec![
                series(
                    "gdp",
                    "GDP",
                    ExponentialGrowth::KEY,
                    "GDP = A * (1 + g)^t",
                    "GDP (Gross Domestic Product) measures the total economic output. \
                     It is modeled as exponential growth where A is the initial GDP \
                     and g is the growth rate.",
                    "#bb86fc",
                    [
                        ("base", ParamDefault::new(10.0, 0.1, "A (Initial GDP)")),
                        ("rate", ParamDefault::new(0.03, 0.01, "g (Growth rate)")),
                    ],
                ),
                series(
                    "inflation",
                    "Inflation",
                    CyclicalDeviation::SINE_KEY,
                    "π = π_target + α * sin(t/2)",
                    "Inflation represents the rate of price level increase. \
                     This model assumes inflation fluctuates around a target rate \
                     with some cyclical behavior.",
                    "#03dac6",
                    [
                        (
                            "target",
                            ParamDefault::new(2.0, 0.1, "π_target (Target inflation rate)"),
                        ),
                        ("amplitude", ParamDefault::new(0.5, 0.1, "α (Cyclical factor)")),
                    ],
                ),
                series(
                    "unemployment",
                    "Unemployment",
                    CyclicalDeviation::COSINE_KEY,
                    "u = u_natural + β * cos(t/3)",
                    "Unemployment rate is the percentage of the labor force that is \
                     jobless. This model represents unemployment as fluctuating around \
                     a natural rate.",
                    "#cf6679",
                    [
                        (
                            "target",
                            ParamDefault::new(4.0, 0.1, "u_natural (Natural unemployment rate)"),
                        ),
                        ("amplitude", ParamDefault::new(-0.5, 0.1, "β (Cyclical factor)")),
                    ],
                ),
            ],
        }
    }

    // ─── Loading ─────────────────────────────────────────────────────

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        debug!(path = %path.display(), "loaded dashboard config");
        Self::from_toml(&content)
    }

    /// Parse only; call [`validate`](Self::validate) before use.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    // ─── Validation ──────────────────────────────────────────────────

    /// Check the config against the formulas that will evaluate it.
    pub fn validate(&self, registry: &FormulaRegistry) -> Result<(), ConfigError> {
        if self.domain.end < self.domain.start {
            return Err(ConfigError::EmptyDomain {
                start: self.domain.start,
                end: self.domain.end,
            });
        }
        let points = i128::from(self.domain.end) - i128::from(self.domain.start) + 1;
        if points > MAX_DOMAIN_POINTS as i128 {
            return Err(ConfigError::DomainTooLarge {
                start: self.domain.start,
                end: self.domain.end,
                max: MAX_DOMAIN_POINTS,
            });
        }
        if !self.domain.origin.is_finite() {
            return Err(ConfigError::InvalidOrigin(self.domain.origin));
        }
        if self.series.is_empty() {
            return Err(ConfigError::NoSeries);
        }

        let mut seen = HashSet::new();
        for series in &self.series {
            if series.id.is_empty()
                || series.id.contains('.')
                || series.id.chars().any(char::is_whitespace)
            {
                return Err(ConfigError::InvalidSeriesId(series.id.clone()));
            }
            if !seen.insert(series.id.as_str()) {
                return Err(ConfigError::DuplicateSeries(series.id.clone()));
            }
            self.validate_series(series, registry)?;
        }
        Ok(())
    }

    fn validate_series(
        &self,
        series: &SeriesConfig,
        registry: &FormulaRegistry,
    ) -> Result<(), ConfigError> {
        let formula = registry
            .get(&series.formula_key)
            .map_err(|_| ConfigError::UnknownFormula {
                series: series.id.clone(),
                formula_key: series.formula_key.clone(),
            })?;

        let declared = series.param_names(formula.required_params());
        let missing = |name: &str| ConfigError::MissingParameter {
            series: series.id.clone(),
            name: name.to_string(),
        };

        for &needed in formula.required_params() {
            if !declared.iter().any(|n| n == needed) {
                return Err(missing(needed));
            }
        }
        for name in &declared {
            if !series.defaults.contains_key(name) {
                return Err(missing(name));
            }
        }
        for name in series.defaults.keys() {
            if !declared.contains(name) {
                return Err(ConfigError::UnknownParameter {
                    series: series.id.clone(),
                    name: name.clone(),
                });
            }
        }

        for (name, default) in &series.defaults {
            let invalid = |reason: String| ConfigError::InvalidDefault {
                id: ParamId::new(series.id.clone(), name.clone()),
                reason,
            };
            if !default.value.is_finite() {
                return Err(invalid(format!("value {} is not finite", default.value)));
            }
            if !default.step.is_finite() || default.step <= 0.0 {
                return Err(invalid(format!("step {} must be positive", default.step)));
            }
            if let Some(bounds) = default.bounds {
                if !bounds.is_valid() {
                    return Err(invalid(format!(
                        "bounds [{}, {}] are not a finite ascending range",
                        bounds.min, bounds.max
                    )));
                }
                if !bounds.contains(default.value) {
                    return Err(invalid(format!(
                        "value {} is outside [{}, {}]",
                        default.value, bounds.min, bounds.max
                    )));
                }
            }
        }
        Ok(())
    }

    // ─── Derived views ───────────────────────────────────────────────

    pub fn time_domain(&self) -> TimeDomain {
        TimeDomain::years(self.domain.start, self.domain.end).with_origin(self.domain.origin)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.controller.debounce_ms)
    }

    pub fn series_specs(&self) -> Vec<SeriesSpec> {
        self.series
            .iter()
            .map(|s| SeriesSpec::new(s.id.clone(), s.label.clone(), s.formula_key.clone()))
            .collect()
    }

    /// One store group per series, parameters in declared order.
    pub fn parameter_groups(&self, registry: &FormulaRegistry) -> Vec<ParameterGroup> {
        self.series
            .iter()
            .map(|s| {
                let fallback = registry
                    .get(&s.formula_key)
                    .map(|f| f.required_params().to_vec())
                    .unwrap_or_default();
                let params: ParameterSet = s
                    .param_names(&fallback)
                    .into_iter()
                    .filter_map(|name| {
                        let d = s.defaults.get(&name)?;
                        let param = Parameter::new(name, d.value, d.step);
                        Some(match d.bounds {
                            Some(b) => param.with_bounds(b),
                            None => param,
                        })
                    })
                    .collect();
                ParameterGroup::new(s.id.clone(), params)
            })
            .collect()
    }

    pub fn series(&self, id: &str) -> Option<&SeriesConfig> {
        self.series.iter().find(|s| s.id == id)
    }

    /// Display label of a parameter, falling back to its dotted id.
    pub fn param_label(&self, id: &ParamId) -> String {
        self.series(&id.group)
            .and_then(|s| s.defaults.get(&id.name))
            .and_then(|d| d.label.clone())
            .unwrap_or_else(|| id.to_string())
    }
}

impl SeriesConfig {
    /// Declared parameter names, or the formula's when none are declared.
    pub fn param_names(&self, formula_params: &[&str]) -> Vec<String> {
        if self.required_params.is_empty() {
            formula_params.iter().map(|s| s.to_string()).collect()
        } else {
            self.required_params.clone()
        }
    }
}
