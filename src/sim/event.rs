/// Events consumed by the player loop, in arrival order.
/// Input, the audio backend and the player itself all post into one queue.

use std::fmt;

use crate::domain::model::Hotkey;

/// A pressed key, already normalized by the input layer.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Key {
    Char(char),
    Esc,
    Space,
    Enter,
    Left,
    Right,
    Up,
    Down,
    F(u8),
    Other,
}

impl Key {
    /// Parse a key name as written in config.toml (`"Esc"`, `"F10"`, `"q"`).
    pub fn from_name(s: &str) -> Option<Key> {
        let s = s.trim();
        let mut chars = s.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            return Some(Key::Char(c.to_ascii_lowercase()));
        }
        match s.to_ascii_uppercase().as_str() {
            "ESC" | "ESCAPE" => Some(Key::Esc),
            "SPACE" => Some(Key::Space),
            "ENTER" | "RETURN" => Some(Key::Enter),
            "LEFT" => Some(Key::Left),
            "RIGHT" => Some(Key::Right),
            "UP" => Some(Key::Up),
            "DOWN" => Some(Key::Down),
            f if f.starts_with('F') => f[1..].parse::<u8>().ok()
                .filter(|n| (1..=24).contains(n))
                .map(Key::F),
            _ => None,
        }
    }

    /// The theme/effect key this press refers to, if it is one.
    pub fn hotkey(self) -> Option<Hotkey> {
        match self {
            Key::Char(c) => Hotkey::new(c).ok(),
            _ => None,
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Char(c) => write!(f, "{c}"),
            Key::Esc => f.write_str("Escape"),
            Key::Space => f.write_str("Space"),
            Key::Enter => f.write_str("Enter"),
            Key::Left => f.write_str("Left"),
            Key::Right => f.write_str("Right"),
            Key::Up => f.write_str("Up"),
            Key::Down => f.write_str("Down"),
            Key::F(n) => write!(f, "F{n}"),
            Key::Other => f.write_str("?"),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PlayerEvent {
    Quit,
    KeyDown(Key),
    SongFinished,
    EffectFinished,
    Resize(u16, u16),
}
