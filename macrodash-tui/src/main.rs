//! MacroDash TUI — interactive macroeconomic dashboard in the terminal.
//!
//! Layout:
//! 1. Parameter panels, one per series, with the formula caption
//! 2. One line chart per series over calendar years
//! 3. Status bar with controller state and the last message
//!
//! Overlays: error history (`e`) and model explanations (`?`).

mod app;
mod input;
mod logging;
mod renderer;
mod theme;
mod ui;
mod worker;

use std::io::{self, stdout};
use std::path::PathBuf;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::event::{self, Event};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use tracing::info;

use macrodash_core::{DashboardConfig, Session};

use crate::app::AppState;
use crate::renderer::ChartRenderer;
use crate::worker::WorkerCommand;

#[derive(Parser)]
#[command(name = "macrodash-tui", about = "Interactive macroeconomic dashboard")]
struct Args {
    /// Dashboard TOML. Defaults to <config dir>/macrodash/dashboard.toml, then the built-in dashboard.
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let log_path = logging::init_logging()?;

    let config = load_config(args.config)?;

    // Install a panic hook that restores the terminal before printing the panic.
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stderr(), LeaveAlternateScreen);
        default_hook(info);
    }));

    // Session: bundles and failures come back to the UI loop over channels.
    let (bundle_tx, bundle_rx) = mpsc::channel();
    let (failure_tx, failure_rx) = mpsc::channel();
    let session = Session::new(config, ChartRenderer::new(bundle_tx), failure_tx)
        .context("invalid dashboard configuration")?;

    // Worker
    let (cmd_tx, cmd_rx) = mpsc::channel();
    let (resp_tx, resp_rx) = mpsc::channel();
    let worker_handle = worker::spawn_worker(session.evaluator(), cmd_rx, resp_tx)
        .context("failed to spawn evaluation worker")?;

    let mut app = AppState::new(session, bundle_rx, failure_rx, cmd_tx.clone(), resp_rx);
    app.set_status(format!("Logging to {}", log_path.display()));

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    let result = run_app(&mut terminal, &mut app);

    // Shutdown worker
    let _ = cmd_tx.send(WorkerCommand::Shutdown);
    let _ = worker_handle.join();
    info!(stats = ?app.session.stats(), "dashboard closed");

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

/// `--config`, else the per-user dashboard file if present, else built-in.
fn load_config(explicit: Option<PathBuf>) -> Result<DashboardConfig> {
    let user_file = dirs::config_dir().map(|d| d.join("macrodash").join("dashboard.toml"));
    let path = explicit.or_else(|| user_file.filter(|p| p.exists()));

    match path {
        Some(path) => {
            info!(path = %path.display(), "loading dashboard config");
            DashboardConfig::from_file(&path)
                .with_context(|| format!("loading {}", path.display()))
        }
        None => {
            info!("using built-in dashboard");
            Ok(DashboardConfig::builtin())
        }
    }
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut AppState,
) -> Result<()> {
    loop {
        // 1. Drain worker results and start the next cycle if one is due
        app.pump(Instant::now());

        // 2. Render
        terminal.draw(|f| ui::draw(f, app))?;

        // 3. Poll for input events (50ms timeout for ~20 FPS tick)
        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                input::handle_key(app, key);
            }
        }

        // 4. Check quit
        if !app.running {
            break;
        }
    }
    Ok(())
}
