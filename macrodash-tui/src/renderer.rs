//! Render adapter: bundles → chart-ready views.
//!
//! `ChartRenderer` is the controller's `RenderAdapter`. It forwards each
//! published bundle to the UI loop, which turns it into a [`ChartView`]. A
//! failed cycle publishes nothing, so the previous view stays on screen.

use std::sync::mpsc::Sender;
use std::sync::Arc;

use ratatui::style::Color;
use tracing::{trace, warn};

use macrodash_core::{DashboardConfig, RenderAdapter, SeriesBundle};

use crate::theme;

pub struct ChartRenderer {
    tx: Sender<Arc<SeriesBundle>>,
}

impl ChartRenderer {
    pub fn new(tx: Sender<Arc<SeriesBundle>>) -> Self {
        Self { tx }
    }
}

impl RenderAdapter for ChartRenderer {
    fn draw(&mut self, bundle: &Arc<SeriesBundle>) {
        trace!(cycle = bundle.cycle, series = bundle.len(), "forwarding bundle to UI");
        if self.tx.send(Arc::clone(bundle)).is_err() {
            warn!(cycle = bundle.cycle, "UI loop gone; bundle dropped");
        }
    }
}

/// One chart's worth of plotting data.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesView {
    pub label: String,
    pub color: Color,
    /// Defined samples only, x in display years.
    pub points: Vec<(f64, f64)>,
    pub x_bounds: [f64; 2],
    pub y_bounds: [f64; 2],
    pub undefined: usize,
}

/// Everything the chart row needs from one bundle.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartView {
    pub cycle: u64,
    pub hash: String,
    pub series: Vec<SeriesView>,
}

impl ChartView {
    pub fn from_bundle(bundle: &SeriesBundle, config: &DashboardConfig) -> Self {
        let x_bounds = x_bounds(bundle);
        let series = bundle
            .iter()
            .enumerate()
            .map(|(i, s)| {
                let color = config.series(&s.key).and_then(|c| c.color.as_deref());
                SeriesView {
                    label: s.label.clone(),
                    color: theme::series_color(color, i),
                    points: s.plot_points(),
                    x_bounds,
                    y_bounds: padded(s.value_range()),
                    undefined: s.undefined_count(),
                }
            })
            .collect();
        Self {
            cycle: bundle.cycle,
            hash: bundle.hash.short().to_string(),
            series,
        }
    }
}

fn x_bounds(bundle: &SeriesBundle) -> [f64; 2] {
    let domain = &bundle.domain;
    match (domain.display_point(0), domain.display_point(domain.len().saturating_sub(1))) {
        (Some(lo), Some(hi)) if hi > lo => [lo, hi],
        (Some(x), _) => [x - 0.5, x + 0.5],
        _ => [0.0, 1.0],
    }
}

/// 5% headroom on both sides; flat series get a unit band.
fn padded(range: Option<(f64, f64)>) -> [f64; 2] {
    match range {
        Some((lo, hi)) if hi > lo => {
            let pad = (hi - lo) * 0.05;
            [lo - pad, hi + pad]
        }
        Some((v, _)) => [v - 1.0, v + 1.0],
        None => [0.0, 1.0],
    }
}
