//! MacroDash Core — reactive recompute pipeline for parameter-driven charts.
//!
//! This crate contains everything between an input widget and a chart:
//! - Parameters, identifiers and input validation
//! - The parameter store with change notification and snapshots
//! - A registry of pure formulas (exponential growth, cyclical deviation)
//! - The series evaluator producing all-or-nothing bundles
//! - The reactive controller that coalesces changes into recompute cycles
//! - TOML dashboard configuration and the session that wires it all up

pub mod config;
pub mod controller;
pub mod domain;
pub mod evaluator;
pub mod formula;
pub mod params;
pub mod session;
pub mod store;

pub use config::{ConfigError, DashboardConfig, MAX_DOMAIN_POINTS};
pub use controller::{
    ControllerState, CycleFailure, CycleStats, ErrorChannel, EvalJob, EvalOutcome,
    ReactiveController, RenderAdapter,
};
pub use domain::{BundleHash, Sample, Series, SeriesBundle, TimeDomain};
pub use evaluator::{EvalError, SeriesEvaluator, SeriesSpec};
pub use formula::{Formula, FormulaError, FormulaRegistry};
pub use params::{BoundsPolicy, InvalidValue, ParamId, Parameter, ParameterSet};
pub use session::{InputEvent, Session};
pub use store::{ParameterChange, ParameterStore, StoreError, StoreSnapshot};
