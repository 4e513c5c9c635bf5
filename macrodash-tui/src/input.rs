//! Keyboard input dispatch: edit buffer → overlays → global keys.

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::app::{AppState, Overlay};

pub fn handle_key(app: &mut AppState, key: KeyEvent) {
    // Only handle key press events (Windows sends both Press and Release).
    if key.kind != KeyEventKind::Press {
        return;
    }
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        app.running = false;
        return;
    }

    // 1. An open edit buffer swallows everything.
    if app.editing.is_some() {
        handle_edit_key(app, key);
        return;
    }

    // 2. Overlays consume input next.
    match app.overlay {
        Overlay::ErrorHistory => {
            handle_error_overlay(app, key);
            return;
        }
        Overlay::Explanations => {
            app.overlay = Overlay::None;
            return;
        }
        Overlay::None => {}
    }

    // 3. Dashboard keys.
    match key.code {
        KeyCode::Char('q') => app.running = false,
        KeyCode::Char('j') | KeyCode::Down => app.select_next(),
        KeyCode::Char('k') | KeyCode::Up => app.select_prev(),
        KeyCode::Char('+') | KeyCode::Char('=') | KeyCode::Char('l') | KeyCode::Right => {
            app.nudge_selected(1)
        }
        KeyCode::Char('-') | KeyCode::Char('h') | KeyCode::Left => app.nudge_selected(-1),
        KeyCode::Enter => app.begin_edit(),
        KeyCode::Char('r') => app.reset_all(),
        KeyCode::Char('e') => {
            app.error_scroll = 0;
            app.overlay = Overlay::ErrorHistory;
        }
        KeyCode::Char('?') => app.overlay = Overlay::Explanations,
        _ => {}
    }
}

fn handle_edit_key(app: &mut AppState, key: KeyEvent) {
    match key.code {
        KeyCode::Enter => app.submit_edit(),
        KeyCode::Esc => app.cancel_edit(),
        KeyCode::Backspace => {
            if let Some(buffer) = app.editing.as_mut() {
                buffer.pop();
            }
        }
        KeyCode::Char(c) if !c.is_control() => {
            if let Some(buffer) = app.editing.as_mut() {
                buffer.push(c);
            }
        }
        _ => {}
    }
}

fn handle_error_overlay(app: &mut AppState, key: KeyEvent) {
    match key.code {
        KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('e') => {
            app.overlay = Overlay::None;
        }
        KeyCode::Char('j') | KeyCode::Down => {
            if app.error_scroll + 1 < app.error_history.len() {
                app.error_scroll += 1;
            }
        }
        KeyCode::Char('k') | KeyCode::Up => {
            app.error_scroll = app.error_scroll.saturating_sub(1);
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::tests::harness;
    use crate::app::ErrorCategory;
    use macrodash_core::ParamId;

    fn press(app: &mut AppState, code: KeyCode) {
        handle_key(app, KeyEvent::new(code, KeyModifiers::NONE));
    }

    fn type_str(app: &mut AppState, s: &str) {
        for c in s.chars() {
            press(app, KeyCode::Char(c));
        }
    }

    #[test]
    fn quit_keys() {
        let mut h = harness();
        press(&mut h.app, KeyCode::Char('q'));
        assert!(!h.app.running);

        let mut h = harness();
        handle_key(
            &mut h.app,
            KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL),
        );
        assert!(!h.app.running);
    }

    #[test]
    fn edit_flow_sets_value() {
        let mut h = harness();
        press(&mut h.app, KeyCode::Down);
        press(&mut h.app, KeyCode::Enter);
        // Clear the pre-filled value.
        for _ in 0..8 {
            press(&mut h.app, KeyCode::Backspace);
        }
        type_str(&mut h.app, "0.07");
        press(&mut h.app, KeyCode::Enter);

        assert!(h.app.editing.is_none());
        assert_eq!(
            h.app.session.store().get(&ParamId::new("gdp", "rate")).unwrap().value,
            0.07
        );
    }

    #[test]
    fn q_while_editing_is_text_not_quit() {
        let mut h = harness();
        press(&mut h.app, KeyCode::Enter);
        press(&mut h.app, KeyCode::Char('q'));
        assert!(h.app.running);
        assert!(h.app.editing.as_deref().unwrap().ends_with('q'));

        press(&mut h.app, KeyCode::Enter);
        assert_eq!(h.app.error_history[0].category, ErrorCategory::Input);
    }

    #[test]
    fn esc_cancels_edit() {
        let mut h = harness();
        press(&mut h.app, KeyCode::Enter);
        type_str(&mut h.app, "5");
        press(&mut h.app, KeyCode::Esc);
        assert!(h.app.editing.is_none());
        assert_eq!(
            h.app.session.store().get(&ParamId::new("gdp", "base")).unwrap().value,
            10.0
        );
    }

    #[test]
    fn nudge_keys() {
        let mut h = harness();
        press(&mut h.app, KeyCode::Char('+'));
        press(&mut h.app, KeyCode::Char('l'));
        press(&mut h.app, KeyCode::Char('h'));
        let v = h.app.session.store().get(&ParamId::new("gdp", "base")).unwrap().value;
        assert!((v - 10.1).abs() < 1e-12);
    }

    #[test]
    fn overlays_toggle() {
        let mut h = harness();
        press(&mut h.app, KeyCode::Char('e'));
        assert_eq!(h.app.overlay, Overlay::ErrorHistory);
        // Keys inside the overlay do not reach the dashboard.
        press(&mut h.app, KeyCode::Char('r'));
        press(&mut h.app, KeyCode::Esc);
        assert_eq!(h.app.overlay, Overlay::None);

        press(&mut h.app, KeyCode::Char('?'));
        assert_eq!(h.app.overlay, Overlay::Explanations);
        press(&mut h.app, KeyCode::Char('x'));
        assert_eq!(h.app.overlay, Overlay::None);
    }
}
