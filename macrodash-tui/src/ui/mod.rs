//! Top-level UI layout: title, parameter panels, chart row, status bar.

pub mod charts;
pub mod overlays;
pub mod params_panel;
pub mod status_bar;

use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::Style;
use ratatui::text::Span;
use ratatui::widgets::{Block, Paragraph};
use ratatui::Frame;

use crate::app::{AppState, Overlay};
use crate::theme;

/// Draw the entire UI.
pub fn draw(f: &mut Frame, app: &AppState) {
    f.render_widget(
        Block::default().style(Style::default().bg(theme::BACKGROUND)),
        f.area(),
    );

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(params_panel::height(app)),
            Constraint::Min(8),
            Constraint::Length(1),
        ])
        .split(f.area());

    let title = Paragraph::new(Span::styled(app.session.config().title.as_str(), theme::heading()))
        .alignment(Alignment::Center);
    f.render_widget(title, chunks[0]);

    params_panel::render(f, chunks[1], app);
    charts::render(f, chunks[2], app);
    status_bar::render(f, chunks[3], app);

    let main_area = Rect {
        height: f.area().height.saturating_sub(1),
        ..f.area()
    };
    match app.overlay {
        Overlay::ErrorHistory => overlays::render_error_history(f, main_area, app),
        Overlay::Explanations => overlays::render_explanations(f, main_area, app),
        Overlay::None => {}
    }
}

/// Split `area` into `n` equal columns.
pub fn columns(area: Rect, n: usize) -> Vec<Rect> {
    let n = n.max(1) as u32;
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints((0..n).map(|_| Constraint::Ratio(1, n)))
        .split(area)
        .to_vec()
}

/// Compute a centered rect for overlays.
pub fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
