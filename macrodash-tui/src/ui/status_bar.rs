//! Bottom status bar: key hints, controller state, last status message.

use ratatui::layout::Rect;
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use ratatui::Frame;

use macrodash_core::ControllerState;

use crate::app::{AppState, StatusLevel};
use crate::theme;

pub fn render(f: &mut Frame, area: Rect, app: &AppState) {
    let mut spans: Vec<Span> = Vec::new();

    let hints = if app.editing.is_some() {
        " [Enter]apply [Esc]cancel"
    } else {
        " [j/k]select [+/-]nudge [Enter]edit [r]reset [e]errors [?]about [q]quit"
    };
    spans.push(Span::styled(hints, theme::muted()));
    spans.push(Span::raw(" | "));

    let (state, style) = match app.session.state() {
        ControllerState::Idle => ("idle", theme::muted()),
        ControllerState::Pending => ("pending", theme::warning()),
        ControllerState::Computing => ("computing", theme::accent()),
    };
    spans.push(Span::styled(state, style));
    if let Some(view) = &app.chart {
        spans.push(Span::styled(
            format!(" #{} {}", view.cycle, view.hash),
            theme::muted(),
        ));
    }
    spans.push(Span::raw(" | "));

    if let Some((msg, level)) = &app.status_message {
        let style = match level {
            StatusLevel::Info => theme::accent(),
            StatusLevel::Warning => theme::warning(),
            StatusLevel::Error => theme::negative(),
        };
        spans.push(Span::styled(msg.as_str(), style));
    }

    f.render_widget(Paragraph::new(Line::from(spans)), area);
}
