/// Terminal input: turns crossterm events into player events.
///
/// Only presses count; repeats and releases are dropped so that holding a
/// theme key does not toggle it on and off. Letters are lowercased and
/// keypad digits arrive as plain digits, so `Shift+F` and `F` select the
/// same theme.

use std::time::Duration;

use crossterm::event::{self, poll, Event, KeyCode, KeyEvent, KeyEventKind, KeyEventState, KeyModifiers};

use crate::sim::event::{Key, PlayerEvent};

/// Drain every pending terminal event without blocking.
pub fn drain_events(out: &mut Vec<PlayerEvent>) {
    while poll(Duration::ZERO).unwrap_or(false) {
        match event::read() {
            Ok(Event::Key(key)) => {
                if let Some(e) = translate_key(&key) {
                    out.push(e);
                }
            }
            Ok(Event::Resize(w, h)) => out.push(PlayerEvent::Resize(w, h)),
            Ok(_) => {}
            Err(e) => {
                log::warn!("Could not read terminal event: {e}");
                break;
            }
        }
    }
}

pub fn translate_key(key: &KeyEvent) -> Option<PlayerEvent> {
    if key.kind != KeyEventKind::Press {
        return None;
    }
    if is_ctrl_c(key) {
        return Some(PlayerEvent::Quit);
    }
    Some(PlayerEvent::KeyDown(map_code(key.code, key.state)))
}

/// Check for Ctrl+C
fn is_ctrl_c(key: &KeyEvent) -> bool {
    key.modifiers.contains(KeyModifiers::CONTROL)
        && (key.code == KeyCode::Char('c') || key.code == KeyCode::Char('C'))
}

pub fn map_code(code: KeyCode, state: KeyEventState) -> Key {
    match code {
        // keypad digits report as plain chars; the state flag is informational
        KeyCode::Char(c) if state.contains(KeyEventState::KEYPAD) && c.is_ascii_digit() => Key::Char(c),
        KeyCode::Char(' ') => Key::Space,
        KeyCode::Char(c) => Key::Char(c.to_ascii_lowercase()),
        KeyCode::Esc => Key::Esc,
        KeyCode::Enter => Key::Enter,
        KeyCode::Left => Key::Left,
        KeyCode::Right => Key::Right,
        KeyCode::Up => Key::Up,
        KeyCode::Down => Key::Down,
        KeyCode::F(n) => Key::F(n),
        _ => Key::Other,
    }
}
