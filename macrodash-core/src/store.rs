//! Parameter store — the single write path for parameter values.
//!
//! Every successful change bumps the store version and is broadcast to all
//! subscribers as a [`ParameterChange`]. Setting a parameter to the value it
//! already holds is a no-op and notifies nobody.

use serde::Serialize;
use std::sync::mpsc::{self, Receiver, Sender};
use tracing::{debug, trace};

use crate::domain::BundleHash;
use crate::params::{
    parse_and_validate, validate_value, BoundsPolicy, InvalidValue, ParamId, Parameter,
    ParameterSet,
};

// ─── Error type ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    #[error("parameter '{0}' not found")]
    NotFound(String),
    #[error("invalid value for '{id}': {source}")]
    InvalidValue {
        id: ParamId,
        #[source]
        source: InvalidValue,
    },
}

// ─── Groups & snapshots ──────────────────────────────────────────────

/// The parameter set of one formula group, keyed by the group's series id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterGroup {
    pub id: String,
    pub params: ParameterSet,
}

impl ParameterGroup {
    pub fn new(id: impl Into<String>, params: ParameterSet) -> Self {
        Self {
            id: id.into(),
            params,
        }
    }
}

/// Immutable copy of every parameter at one store version.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreSnapshot {
    pub version: u64,
    pub groups: Vec<ParameterGroup>,
}

impl StoreSnapshot {
    pub fn group(&self, id: &str) -> Option<&ParameterSet> {
        self.groups.iter().find(|g| g.id == id).map(|g| &g.params)
    }

    pub fn value(&self, id: &ParamId) -> Option<f64> {
        self.group(&id.group)?.value(&id.name)
    }

    /// All `(id, value)` pairs in declared order.
    pub fn values(&self) -> Vec<(ParamId, f64)> {
        self.groups
            .iter()
            .flat_map(|g| {
                g.params
                    .iter()
                    .map(move |p| (ParamId::new(g.id.clone(), p.name.clone()), p.value))
            })
            .collect()
    }

    /// Hash of the parameter ids and value bits; the store version is excluded
    /// so equal values always fingerprint equally.
    pub fn fingerprint(&self) -> BundleHash {
        let mut hasher = blake3::Hasher::new();
        for group in &self.groups {
            for param in group.params.iter() {
                hasher.update(group.id.as_bytes());
                hasher.update(b".");
                hasher.update(param.name.as_bytes());
                hasher.update(b"=");
                hasher.update(&param.value.to_bits().to_le_bytes());
                hasher.update(b";");
            }
        }
        BundleHash(hasher.finalize().to_hex().to_string())
    }
}

/// Notification emitted for every actual value change.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterChange {
    pub id: ParamId,
    pub old: f64,
    pub new: f64,
    pub version: u64,
}

// ─── Store ───────────────────────────────────────────────────────────

/// Holds the current value of every parameter of one session.
#[derive(Debug)]
pub struct ParameterStore {
    groups: Vec<ParameterGroup>,
    defaults: Vec<ParameterGroup>,
    policy: BoundsPolicy,
    version: u64,
    subscribers: Vec<Sender<ParameterChange>>,
}

impl ParameterStore {
    /// Build a store whose initial values are also its reset defaults.
    pub fn new(groups: Vec<ParameterGroup>, policy: BoundsPolicy) -> Self {
        Self {
            defaults: groups.clone(),
            groups,
            policy,
            version: 0,
            subscribers: Vec::new(),
        }
    }

    pub fn policy(&self) -> BoundsPolicy {
        self.policy
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Register a listener. It receives every change made after this call.
    pub fn subscribe(&mut self) -> Receiver<ParameterChange> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.push(tx);
        rx
    }

    pub fn groups(&self) -> &[ParameterGroup] {
        &self.groups
    }

    /// Every parameter id in declared order.
    pub fn ids(&self) -> Vec<ParamId> {
        self.groups
            .iter()
            .flat_map(|g| g.params.iter().map(move |p| ParamId::new(g.id.clone(), p.name.clone())))
            .collect()
    }

    pub fn get(&self, id: &ParamId) -> Result<&Parameter, StoreError> {
        self.groups
            .iter()
            .find(|g| g.id == id.group)
            .and_then(|g| g.params.get(&id.name))
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    /// Parse `raw`, validate it, and apply it.
    ///
    /// Returns the change if the value actually moved, `None` if it already
    /// held that value. On error the store is untouched.
    pub fn set(&mut self, id: &ParamId, raw: &str) -> Result<Option<ParameterChange>, StoreError> {
        let bounds = self.get(id)?.bounds;
        let value = parse_and_validate(raw, bounds, self.policy).map_err(|source| {
            debug!(%id, raw, %source, "rejected parameter edit");
            StoreError::InvalidValue {
                id: id.clone(),
                source,
            }
        })?;
        Ok(self.apply(id, value))
    }

    /// Apply a numeric value with the same validation as [`set`](Self::set).
    pub fn set_value(
        &mut self,
        id: &ParamId,
        value: f64,
    ) -> Result<Option<ParameterChange>, StoreError> {
        let bounds = self.get(id)?.bounds;
        let value = validate_value(value, bounds, self.policy).map_err(|source| {
            StoreError::InvalidValue {
                id: id.clone(),
                source,
            }
        })?;
        Ok(self.apply(id, value))
    }

    /// Move a parameter by `steps` multiples of its step size.
    pub fn nudge(&mut self, id: &ParamId, steps: i32) -> Result<Option<ParameterChange>, StoreError> {
        let param = self.get(id)?;
        let target = param.value + f64::from(steps) * param.step;
        self.set_value(id, target)
    }

    /// Restore one parameter to its configured default.
    pub fn reset(&mut self, id: &ParamId) -> Result<Option<ParameterChange>, StoreError> {
        let default = self
            .defaults
            .iter()
            .find(|g| g.id == id.group)
            .and_then(|g| g.params.value(&id.name))
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        Ok(self.apply(id, default))
    }

    /// Restore every parameter; returns the changes that actually happened.
    pub fn reset_all(&mut self) -> Vec<ParameterChange> {
        let mut changes = Vec::new();
        for id in self.ids() {
            if let Ok(Some(change)) = self.reset(&id) {
                changes.push(change);
            }
        }
        changes
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            version: self.version,
            groups: self.groups.clone(),
        }
    }

    fn apply(&mut self, id: &ParamId, value: f64) -> Option<ParameterChange> {
        let param = self
            .groups
            .iter_mut()
            .find(|g| g.id == id.group)
            .and_then(|g| g.params.get_mut(&id.name))?;

        if param.value == value {
            trace!(%id, value, "no-op parameter edit suppressed");
            return None;
        }

        let old = param.value;
        param.value = value;
        self.version += 1;

        let change = ParameterChange {
            id: id.clone(),
            old,
            new: value,
            version: self.version,
        };
        debug!(%id, old, new = value, version = self.version, "parameter changed");

        // Dropped receivers unsubscribe themselves.
        self.subscribers.retain(|tx| tx.send(change.clone()).is_ok());
        Some(change)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::Bounds;

    fn store() -> ParameterStore {
        let gdp: ParameterSet = vec![
            Parameter::new("base", 10.0, 0.1),
            Parameter::new("rate", 0.03, 0.01).with_bounds(Bounds::new(-0.5, 0.5)),
        ]
        .into_iter()
        .collect();
        ParameterStore::new(vec![ParameterGroup::new("gdp", gdp)], BoundsPolicy::Clamp)
    }

    fn id(s: &str) -> ParamId {
        s.parse().unwrap()
    }

    #[test]
    fn get_unknown_is_not_found() {
        let s = store();
        assert_eq!(
            s.get(&id("gdp.missing")),
            Err(StoreError::NotFound("gdp.missing".into()))
        );
        assert!(s.get(&id("cpi.base")).is_err());
    }

    #[test]
    fn set_updates_and_notifies_once() {
        let mut s = store();
        let rx = s.subscribe();

        let change = s.set(&id("gdp.base"), "12.5").unwrap().unwrap();
        assert_eq!(change.old, 10.0);
        assert_eq!(change.new, 12.5);
        assert_eq!(change.version, 1);
        assert_eq!(s.snapshot().value(&id("gdp.base")), Some(12.5));

        assert_eq!(rx.try_recv().unwrap(), change);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn setting_same_value_is_silent() {
        let mut s = store();
        let rx = s.subscribe();
        assert_eq!(s.set(&id("gdp.base"), "10").unwrap(), None);
        assert_eq!(s.set(&id("gdp.base"), " 10.0 ").unwrap(), None);
        assert!(rx.try_recv().is_err());
        assert_eq!(s.version(), 0);
    }

    #[test]
    fn invalid_input_leaves_store_unchanged() {
        let mut s = store();
        let rx = s.subscribe();
        let before = s.snapshot();

        let err = s.set(&id("gdp.base"), "ten").unwrap_err();
        assert!(matches!(
            err,
            StoreError::InvalidValue {
                source: InvalidValue::NotANumber { .. },
                ..
            }
        ));
        assert_eq!(s.snapshot(), before);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn set_clamps_to_bounds() {
        let mut s = store();
        let change = s.set(&id("gdp.rate"), "0.9").unwrap().unwrap();
        assert_eq!(change.new, 0.5);
    }

    #[test]
    fn reject_policy_refuses_out_of_bounds() {
        let mut s = store();
        s.policy = BoundsPolicy::Reject;
        assert!(s.set(&id("gdp.rate"), "0.9").is_err());
        assert_eq!(s.get(&id("gdp.rate")).unwrap().value, 0.03);
    }

    #[test]
    fn nudge_moves_by_step() {
        let mut s = store();
        s.nudge(&id("gdp.base"), 3).unwrap();
        let v = s.get(&id("gdp.base")).unwrap().value;
        assert!((v - 10.3).abs() < 1e-12);
        s.nudge(&id("gdp.rate"), 100).unwrap();
        assert_eq!(s.get(&id("gdp.rate")).unwrap().value, 0.5);
    }

    #[test]
    fn reset_all_restores_defaults() {
        let mut s = store();
        s.set(&id("gdp.base"), "20").unwrap();
        s.set(&id("gdp.rate"), "0.1").unwrap();
        let changes = s.reset_all();
        assert_eq!(changes.len(), 2);
        assert_eq!(s.get(&id("gdp.base")).unwrap().value, 10.0);
        assert!(s.reset_all().is_empty());
    }

    #[test]
    fn every_subscriber_sees_every_change() {
        let mut s = store();
        let a = s.subscribe();
        let b = s.subscribe();
        s.set(&id("gdp.base"), "11").unwrap();
        s.set(&id("gdp.base"), "12").unwrap();
        assert_eq!(a.try_iter().count(), 2);
        assert_eq!(b.try_iter().count(), 2);
    }

    #[test]
    fn dropped_subscriber_is_pruned() {
        let mut s = store();
        drop(s.subscribe());
        s.set(&id("gdp.base"), "11").unwrap();
        assert!(s.subscribers.is_empty());
    }

    #[test]
    fn fingerprint_ignores_version() {
        let mut s = store();
        let h0 = s.snapshot().fingerprint();
        s.set(&id("gdp.base"), "11").unwrap();
        assert_ne!(s.snapshot().fingerprint(), h0);
        s.set(&id("gdp.base"), "10").unwrap();
        assert_eq!(s.snapshot().fingerprint(), h0);
    }
}
