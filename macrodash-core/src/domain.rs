//! Domain types: time domain, series, and the bundle published per cycle.

use serde::Serialize;
use std::fmt;
use std::sync::Arc;

use crate::store::StoreSnapshot;

/// One point of a series. `None` is the "undefined value" marker produced
/// when a formula's result at that point is not finite.
pub type Sample = Option<f64>;

/// Map a raw formula result to a sample, turning NaN/Inf into `None`.
#[inline]
pub fn sample(value: f64) -> Sample {
    value.is_finite().then_some(value)
}

// ─── TimeDomain ──────────────────────────────────────────────────────

/// Ordered, immutable sample points shared by every series in a bundle.
///
/// Points are offsets from `origin` (e.g. years since 2010). Formulas see the
/// raw points; presentation uses `origin + point`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeDomain {
    points: Arc<[f64]>,
    origin: f64,
}

impl TimeDomain {
    /// Integer years `start..=end`. Empty when `end < start`.
    pub fn years(start: i64, end: i64) -> Self {
        let points: Vec<f64> = (start..=end).map(|y| y as f64).collect();
        Self::from_points(points)
    }

    pub fn from_points(points: Vec<f64>) -> Self {
        Self {
            points: points.into(),
            origin: 0.0,
        }
    }

    pub fn with_origin(mut self, origin: f64) -> Self {
        self.origin = origin;
        self
    }

    pub fn points(&self) -> &[f64] {
        &self.points
    }

    pub fn origin(&self) -> f64 {
        self.origin
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Point `i` as displayed on the x axis (`origin + point`).
    pub fn display_point(&self, i: usize) -> Option<f64> {
        self.points.get(i).map(|t| self.origin + t)
    }

    /// True if both domains are the same allocation (cheap alignment check).
    pub fn is_shared_with(&self, other: &TimeDomain) -> bool {
        Arc::ptr_eq(&self.points, &other.points)
    }
}

// ─── Series ──────────────────────────────────────────────────────────

/// A series whose value count does not match its domain.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("series '{key}' has {actual} values for a domain of {expected} points")]
pub struct LengthMismatch {
    pub key: String,
    pub expected: usize,
    pub actual: usize,
}

/// One derived time-indexed sequence. `values.len() == domain.len()` always.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    pub key: String,
    pub label: String,
    pub formula_key: String,
    #[serde(skip)]
    domain: TimeDomain,
    values: Vec<Sample>,
}

impl Series {
    pub fn new(
        key: impl Into<String>,
        label: impl Into<String>,
        formula_key: impl Into<String>,
        domain: TimeDomain,
        values: Vec<Sample>,
    ) -> Result<Self, LengthMismatch> {
        let key = key.into();
        if values.len() != domain.len() {
            return Err(LengthMismatch {
                key,
                expected: domain.len(),
                actual: values.len(),
            });
        }
        Ok(Self {
            key,
            label: label.into(),
            formula_key: formula_key.into(),
            domain,
            values,
        })
    }

    pub fn domain(&self) -> &TimeDomain {
        &self.domain
    }

    pub fn values(&self) -> &[Sample] {
        &self.values
    }

    pub fn get(&self, i: usize) -> Sample {
        self.values.get(i).copied().flatten()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// `(display x, y)` pairs for defined samples only.
    pub fn plot_points(&self) -> Vec<(f64, f64)> {
        self.values
            .iter()
            .enumerate()
            .filter_map(|(i, v)| Some((self.domain.display_point(i)?, (*v)?)))
            .collect()
    }

    /// Min and max over defined samples.
    pub fn value_range(&self) -> Option<(f64, f64)> {
        self.values.iter().flatten().fold(None, |acc, &v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
    }

    pub fn undefined_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_none()).count()
    }
}

// ─── Bundle ──────────────────────────────────────────────────────────

/// BLAKE3 fingerprint of the parameter values a bundle was computed from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct BundleHash(pub String);

impl BundleHash {
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(12)]
    }
}

impl fmt::Display for BundleHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Every series from one evaluation pass, plus the snapshot that produced them.
///
/// Bundles are replaced wholesale each cycle; nothing mutates a published one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesBundle {
    pub cycle: u64,
    pub domain: TimeDomain,
    pub series: Vec<Series>,
    pub snapshot: Arc<StoreSnapshot>,
    pub hash: BundleHash,
}

impl SeriesBundle {
    pub fn new(
        cycle: u64,
        domain: TimeDomain,
        series: Vec<Series>,
        snapshot: Arc<StoreSnapshot>,
    ) -> Self {
        let hash = snapshot.fingerprint();
        Self {
            cycle,
            domain,
            series,
            snapshot,
            hash,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Series> {
        self.series.iter().find(|s| s.key == key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Series> {
        self.series.iter()
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    pub fn labels(&self) -> Vec<&str> {
        self.series.iter().map(|s| s.label.as_str()).collect()
    }
}
