//! Chart row: one line chart per series over calendar years.

use ratatui::layout::{Alignment, Rect};
use ratatui::style::Style;
use ratatui::symbols;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Axis, Block, Borders, Chart, Dataset, GraphType, Paragraph};
use ratatui::Frame;

use crate::app::AppState;
use crate::renderer::SeriesView;
use crate::theme;
use crate::ui::columns;

pub fn render(f: &mut Frame, area: Rect, app: &AppState) {
    match &app.chart {
        Some(view) if !view.series.is_empty() => {
            for (series, col) in view.series.iter().zip(columns(area, view.series.len())) {
                render_series(f, col, series);
            }
        }
        _ => render_empty(f, area),
    }
}

fn render_empty(f: &mut Frame, area: Rect) {
    let lines = vec![
        Line::from(""),
        Line::from(""),
        Line::from(Span::styled("Computing series…", theme::muted())),
    ];
    let para = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL).border_style(theme::muted()));
    f.render_widget(para, area);
}

fn render_series(f: &mut Frame, area: Rect, series: &SeriesView) {
    let [x_min, x_max] = series.x_bounds;
    let [y_min, y_max] = series.y_bounds;

    let mut title = format!(" {} ", series.label);
    if series.undefined > 0 {
        title.push_str(&format!("({} undefined) ", series.undefined));
    }

    let dataset = Dataset::default()
        .name(series.label.as_str())
        .marker(symbols::Marker::Braille)
        .style(Style::default().fg(series.color))
        .graph_type(GraphType::Line)
        .data(&series.points);

    let chart = Chart::new(vec![dataset])
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(theme::muted())
                .title(title)
                .title_style(Style::default().fg(series.color)),
        )
        .legend_position(None)
        .x_axis(
            Axis::default()
                .title(Span::styled("Year", theme::muted()))
                .style(theme::muted())
                .bounds([x_min, x_max])
                .labels(vec![
                    Span::styled(format!("{x_min:.0}"), theme::muted()),
                    Span::styled(format!("{x_max:.0}"), theme::muted()),
                ]),
        )
        .y_axis(
            Axis::default()
                .style(theme::muted())
                .bounds([y_min, y_max])
                .labels(vec![
                    Span::styled(format!("{y_min:.2}"), theme::muted()),
                    Span::styled(format!("{:.2}", (y_min + y_max) / 2.0), theme::muted()),
                    Span::styled(format!("{y_max:.2}"), theme::muted()),
                ]),
        );

    f.render_widget(chart, area);
}
