//! MacroDash CLI — validate dashboards and evaluate series without a terminal UI.
//!
//! Commands:
//! - `check` — load and validate a dashboard TOML
//! - `eval` — apply parameter edits, settle one session, print the bundle
//! - `formulas` — list registered formulas
//! - `defaults` — print the effective dashboard configuration as TOML

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use macrodash_core::{
    CycleFailure, DashboardConfig, FormulaRegistry, InputEvent, SeriesBundle, Session,
};

#[derive(Parser)]
#[command(
    name = "macrodash",
    about = "MacroDash CLI: reactive macroeconomic series from TOML dashboards"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load and validate a dashboard configuration.
    Check {
        /// Path to a dashboard TOML. Defaults to the built-in dashboard.
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Evaluate every series once and print the bundle.
    Eval {
        /// Path to a dashboard TOML. Defaults to the built-in dashboard.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Parameter edit as ID=VALUE (e.g. gdp.rate=0.05). Repeatable, applied in order.
        #[arg(long = "set", value_name = "ID=VALUE")]
        set: Vec<String>,

        /// Output format.
        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },
    /// List registered formulas with their parameters.
    Formulas,
    /// Print the effective dashboard configuration as TOML.
    Defaults {
        /// Path to a dashboard TOML. Defaults to the built-in dashboard.
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
    Csv,
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    match cli.command {
        Commands::Check { config } => run_check(config),
        Commands::Eval {
            config,
            set,
            format,
        } => run_eval(config, &set, format),
        Commands::Formulas => run_formulas(),
        Commands::Defaults { config } => run_defaults(config),
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,macrodash_core=info,macrodash=info"));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn load_config(path: Option<PathBuf>) -> Result<DashboardConfig> {
    match path {
        Some(path) => DashboardConfig::from_file(&path)
            .with_context(|| format!("loading {}", path.display())),
        None => Ok(DashboardConfig::builtin()),
    }
}

// ─── check ───────────────────────────────────────────────────────────

fn run_check(path: Option<PathBuf>) -> Result<()> {
    let config = load_config(path)?;
    config
        .validate(&FormulaRegistry::builtin())
        .context("dashboard configuration is invalid")?;

    let params: usize = config.series.iter().map(|s| s.defaults.len()).sum();
    println!(
        "ok: {} series, {} parameters, t = {}..={} (x = {} + t)",
        config.series.len(),
        params,
        config.domain.start,
        config.domain.end,
        config.domain.origin
    );
    Ok(())
}

// ─── eval ────────────────────────────────────────────────────────────

/// Split `ID=VALUE`.
fn parse_assignment(raw: &str) -> Option<InputEvent> {
    let (id, value) = raw.split_once('=')?;
    let id = id.trim();
    if id.is_empty() {
        return None;
    }
    Some(InputEvent::new(id, value))
}

fn run_eval(path: Option<PathBuf>, sets: &[String], format: OutputFormat) -> Result<()> {
    let config = load_config(path)?;
    let (bundle_tx, bundle_rx) = mpsc::channel::<Arc<SeriesBundle>>();
    let (failure_tx, failure_rx) = mpsc::channel::<CycleFailure>();
    let mut session = Session::new(config, bundle_tx, failure_tx)
        .context("dashboard configuration is invalid")?;

    for raw in sets {
        let Some(event) = parse_assignment(raw) else {
            warn!(raw = %raw, "ignoring --set without ID=VALUE");
            eprintln!("skipping '{raw}': expected ID=VALUE");
            continue;
        };
        match session.dispatch(&event) {
            Ok(change) => info!(id = %event.parameter_id, changed = change.is_some(), "applied --set"),
            Err(e) => eprintln!("skipping '{raw}': {e}"),
        }
    }

    let cycles = session.settle(Instant::now());
    info!(cycles, stats = ?session.stats(), "session settled");

    if let Some(failure) = failure_rx.try_iter().last() {
        bail!("evaluation failed in cycle {}: {}", failure.cycle, failure.error);
    }
    let Some(bundle) = bundle_rx.try_iter().last() else {
        bail!("no bundle was produced");
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();
    match format {
        OutputFormat::Table => write_table(&mut out, &bundle)?,
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut out, bundle.as_ref())?;
            writeln!(out)?;
        }
        OutputFormat::Csv => write_csv(&mut out, &bundle)?,
    }
    Ok(())
}

fn write_table(out: &mut impl Write, bundle: &SeriesBundle) -> Result<()> {
    write!(out, "{:>6}", "year")?;
    for label in bundle.labels() {
        write!(out, " {label:>14}")?;
    }
    writeln!(out)?;

    for i in 0..bundle.domain.len() {
        let year = bundle.domain.display_point(i).unwrap_or_default();
        write!(out, "{year:>6}")?;
        for series in bundle.iter() {
            match series.get(i) {
                Some(v) => write!(out, " {v:>14.4}")?,
                None => write!(out, " {:>14}", "-")?,
            }
        }
        writeln!(out)?;
    }
    writeln!(out, "# cycle {} hash {}", bundle.cycle, bundle.hash.short())?;
    Ok(())
}

/// `year` column then one column per series; undefined samples are empty.
fn write_csv(out: &mut impl Write, bundle: &SeriesBundle) -> Result<()> {
    let mut writer = csv::Writer::from_writer(out);

    let mut header = vec!["year".to_string()];
    header.extend(bundle.labels().into_iter().map(String::from));
    writer.write_record(&header)?;

    for i in 0..bundle.domain.len() {
        let year = bundle.domain.display_point(i).unwrap_or_default();
        let mut row = vec![year.to_string()];
        row.extend(
            bundle
                .iter()
                .map(|s| s.get(i).map(|v| v.to_string()).unwrap_or_default()),
        );
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(())
}

// ─── formulas / defaults ─────────────────────────────────────────────

fn run_formulas() -> Result<()> {
    let registry = FormulaRegistry::builtin();
    for formula in registry.iter() {
        println!(
            "{:<22} [{}]  {}",
            formula.key(),
            formula.required_params().join(", "),
            formula.expression()
        );
    }
    Ok(())
}

fn run_defaults(path: Option<PathBuf>) -> Result<()> {
    let config = load_config(path)?;
    config
        .validate(&FormulaRegistry::builtin())
        .context("dashboard configuration is invalid")?;
    print!("{}", config.to_toml()?);
    Ok(())
}
