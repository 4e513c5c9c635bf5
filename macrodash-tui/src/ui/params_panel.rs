//! Parameter panels: one column per series with its formula caption and
//! editable parameters.

use ratatui::layout::Rect;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;

use crate::app::AppState;
use crate::theme;
use crate::ui::columns;

/// Rows needed by the tallest column (borders + caption + parameters).
pub fn height(app: &AppState) -> u16 {
    let tallest = app
        .session
        .config()
        .series
        .iter()
        .map(|s| app.params.iter().filter(|id| id.group == s.id).count())
        .max()
        .unwrap_or(0);
    (tallest as u16).saturating_add(4)
}

pub fn render(f: &mut Frame, area: Rect, app: &AppState) {
    let config = app.session.config();
    let selected = app.selected_id();

    for (series, col) in config.series.iter().zip(columns(area, config.series.len())) {
        let is_active = selected.is_some_and(|id| id.group == series.id);
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(theme::panel_border(is_active))
            .title(format!(" {} Parameters ", series.label))
            .title_style(theme::panel_title(is_active));

        let mut lines: Vec<Line> = Vec::new();
        let caption = series.caption.clone().unwrap_or_else(|| {
            app.session
                .evaluator()
                .registry()
                .get(&series.formula_key)
                .map(|formula| formula.expression())
                .unwrap_or_default()
        });
        lines.push(Line::from(Span::styled(caption, theme::accent_bold())));
        lines.push(Line::from(""));

        for (idx, id) in app.params.iter().enumerate().filter(|(_, id)| id.group == series.id) {
            let is_selected = idx == app.selected;
            let label = config.param_label(id);
            let Ok(param) = app.session.store().get(id) else {
                continue;
            };

            let value = match (&app.editing, is_selected) {
                (Some(buffer), true) => Span::styled(format!("[{buffer}_]"), theme::warning()),
                _ => Span::styled(format!("{}", param.value), theme::text()),
            };
            let label_style = if is_selected {
                theme::selected()
            } else {
                theme::accent()
            };

            lines.push(Line::from(vec![
                Span::styled(label, label_style),
                Span::raw("  "),
                value,
                Span::styled(format!("  ±{}", param.step), theme::muted()),
            ]));
        }

        f.render_widget(Paragraph::new(lines).block(block), col);
    }
}
