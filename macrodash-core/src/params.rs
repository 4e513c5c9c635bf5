//! Parameters — named, user-adjustable numeric inputs to formulas.
//!
//! Raw widget input never reaches the store directly: it goes through
//! [`parse_and_validate`] first, which either yields a finite number inside the
//! declared bounds or an [`InvalidValue`] describing why the edit was refused.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ─── Identity ────────────────────────────────────────────────────────

/// Stable identifier of a parameter: `group.name` (e.g. `gdp.rate`).
///
/// The group is the series id from configuration, the name is the formula's
/// local parameter name. Serialized as the dotted string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ParamId {
    pub group: String,
    pub name: String,
}

impl ParamId {
    pub fn new(group: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ParamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.group, self.name)
    }
}

/// A parameter id string that is not of the form `group.name`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed parameter id '{0}' (expected group.name)")]
pub struct MalformedParamId(pub String);

impl FromStr for ParamId {
    type Err = MalformedParamId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().split_once('.') {
            Some((group, name)) if !group.is_empty() && !name.is_empty() => {
                Ok(ParamId::new(group, name))
            }
            _ => Err(MalformedParamId(s.to_string())),
        }
    }
}

impl TryFrom<String> for ParamId {
    type Error = MalformedParamId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ParamId> for String {
    fn from(id: ParamId) -> Self {
        id.to_string()
    }
}

// ─── Bounds ──────────────────────────────────────────────────────────

/// Inclusive `[min, max]` range. Written as a two-element array in TOML.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Bounds {
    pub min: f64,
    pub max: f64,
}

impl Bounds {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Both ends finite and `min <= max`.
    pub fn is_valid(&self) -> bool {
        self.min.is_finite() && self.max.is_finite() && self.min <= self.max
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    pub fn clamp(&self, value: f64) -> f64 {
        value.max(self.min).min(self.max)
    }
}

impl From<[f64; 2]> for Bounds {
    fn from([min, max]: [f64; 2]) -> Self {
        Self { min, max }
    }
}

impl From<Bounds> for [f64; 2] {
    fn from(b: Bounds) -> Self {
        [b.min, b.max]
    }
}

/// What to do with a finite value that falls outside its bounds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundsPolicy {
    /// Pull the value to the nearest bound.
    #[default]
    Clamp,
    /// Refuse the edit with `InvalidValue::OutOfBounds`.
    Reject,
}

// ─── Validation ──────────────────────────────────────────────────────

/// Why a raw input was refused. The store is never mutated when this is returned.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InvalidValue {
    #[error("'{raw}' is not a number")]
    NotANumber { raw: String },
    #[error("'{raw}' is not a finite number")]
    NotFinite { raw: String },
    #[error("{value} is outside [{min}, {max}]")]
    OutOfBounds { value: f64, min: f64, max: f64 },
}

/// Parse a raw widget value and validate it against optional bounds.
///
/// Surrounding whitespace is ignored. Empty and non-numeric input is
/// `NotANumber`; `inf`, `NaN` and overflowing literals are `NotFinite`.
pub fn parse_and_validate(
    raw: &str,
    bounds: Option<Bounds>,
    policy: BoundsPolicy,
) -> Result<f64, InvalidValue> {
    let value: f64 = raw.trim().parse().map_err(|_| InvalidValue::NotANumber {
        raw: raw.to_string(),
    })?;
    if !value.is_finite() {
        return Err(InvalidValue::NotFinite {
            raw: raw.to_string(),
        });
    }
    apply_bounds(value, bounds, policy)
}

/// Validate an already-numeric value (nudges, defaults).
pub fn validate_value(
    value: f64,
    bounds: Option<Bounds>,
    policy: BoundsPolicy,
) -> Result<f64, InvalidValue> {
    if !value.is_finite() {
        return Err(InvalidValue::NotFinite {
            raw: value.to_string(),
        });
    }
    apply_bounds(value, bounds, policy)
}

fn apply_bounds(
    value: f64,
    bounds: Option<Bounds>,
    policy: BoundsPolicy,
) -> Result<f64, InvalidValue> {
    match bounds {
        Some(b) if !b.contains(value) => match policy {
            BoundsPolicy::Clamp => Ok(b.clamp(value)),
            BoundsPolicy::Reject => Err(InvalidValue::OutOfBounds {
                value,
                min: b.min,
                max: b.max,
            }),
        },
        _ => Ok(value),
    }
}

// ─── Parameter & ParameterSet ────────────────────────────────────────

/// A single named parameter with its current value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub value: f64,
    pub step: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounds: Option<Bounds>,
}

impl Parameter {
    pub fn new(name: impl Into<String>, value: f64, step: f64) -> Self {
        Self {
            name: name.into(),
            value,
            step,
            bounds: None,
        }
    }

    pub fn with_bounds(mut self, bounds: Bounds) -> Self {
        self.bounds = Some(bounds);
        self
    }
}

/// Parameters of one formula group, in declared order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterSet {
    params: Vec<Parameter>,
}

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a parameter, replacing any existing one with the same name.
    pub fn insert(&mut self, param: Parameter) {
        match self.params.iter_mut().find(|p| p.name == param.name) {
            Some(existing) => *existing = param,
            None => self.params.push(param),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.params.iter().find(|p| p.name == name)
    }

    pub(crate) fn get_mut(&mut self, name: &str) -> Option<&mut Parameter> {
        self.params.iter_mut().find(|p| p.name == name)
    }

    pub fn value(&self, name: &str) -> Option<f64> {
        self.get(name).map(|p| p.value)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.params.iter()
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

impl FromIterator<Parameter> for ParameterSet {
    fn from_iter<I: IntoIterator<Item = Parameter>>(iter: I) -> Self {
        let mut set = ParameterSet::new();
        for p in iter {
            set.insert(p);
        }
        set
    }
}
