//! Dark dashboard palette.
//!
//! - **Background**: near-black surface
//! - **Accent**: teal (labels, focus, info)
//! - **Heading**: lavender (titles, captions)
//! - **Negative**: rose (errors, failed cycles)
//! - **Warning**: amber
//! - **Muted**: grid grey (axes, hints)

use ratatui::style::{Color, Modifier, Style};

pub const BACKGROUND: Color = Color::Rgb(30, 30, 30);
pub const ACCENT: Color = Color::Rgb(3, 218, 198);
pub const HEADING: Color = Color::Rgb(187, 134, 252);
pub const NEGATIVE: Color = Color::Rgb(207, 102, 121);
pub const WARNING: Color = Color::Rgb(255, 183, 77);
pub const MUTED: Color = Color::Rgb(94, 94, 94);
pub const TEXT: Color = Color::Rgb(224, 224, 224);

/// Line colours used when a series declares none.
const SERIES_FALLBACK: [Color; 3] = [HEADING, ACCENT, NEGATIVE];

pub fn accent() -> Style {
    Style::default().fg(ACCENT)
}

pub fn accent_bold() -> Style {
    accent().add_modifier(Modifier::BOLD)
}

pub fn heading() -> Style {
    Style::default().fg(HEADING).add_modifier(Modifier::BOLD)
}

pub fn text() -> Style {
    Style::default().fg(TEXT)
}

pub fn muted() -> Style {
    Style::default().fg(MUTED)
}

pub fn warning() -> Style {
    Style::default().fg(WARNING)
}

pub fn negative() -> Style {
    Style::default().fg(NEGATIVE)
}

pub fn selected() -> Style {
    accent().add_modifier(Modifier::REVERSED)
}

pub fn panel_border(active: bool) -> Style {
    if active {
        accent()
    } else {
        muted()
    }
}

pub fn panel_title(active: bool) -> Style {
    if active {
        accent_bold()
    } else {
        heading()
    }
}

/// Parse `#rrggbb`.
pub fn parse_hex(hex: &str) -> Option<Color> {
    let digits = hex.strip_prefix('#')?;
    if digits.len() != 6 || !digits.is_ascii() {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&digits[i..i + 2], 16).ok();
    Some(Color::Rgb(channel(0)?, channel(2)?, channel(4)?))
}

/// Colour for the `index`-th series, preferring its configured hex colour.
pub fn series_color(configured: Option<&str>, index: usize) -> Color {
    configured
        .and_then(parse_hex)
        .unwrap_or(SERIES_FALLBACK[index % SERIES_FALLBACK.len()])
}
