/// External configuration loader.
///
/// Reads `config.toml` from the executable's directory (or CWD), unless an
/// explicit path is given on the command line.
/// Falls back to sensible defaults if the file is missing or incomplete.
///
/// This is about how the player behaves (tick rate, control keys, gamepad).
/// What it plays comes from the box file, see `library`.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::domain::playlist::DEFAULT_REMEMBER;
use crate::sim::event::Key;

// ── Public Config Struct ──

#[derive(Clone, Debug)]
pub struct PlayerConfig {
    pub timing: TimingConfig,
    pub keys: ControlKeys,
    pub gamepad: GamepadConfig,
    pub channels: usize,
    pub debug: bool,
    pub custom_colors: bool,
}

#[derive(Clone, Debug)]
pub struct TimingConfig {
    pub tick_rate_ms: u64,
    pub sound_interval_ticks: u32, // one random sound draw every N ticks
    pub remember: usize,           // playlist lookahead / history depth
}

impl TimingConfig {
    pub fn tick_rate(&self) -> Duration {
        Duration::from_millis(self.tick_rate_ms)
    }

    /// Seconds that pass between two sound draws.
    pub fn sound_interval_secs(&self) -> f64 {
        self.tick_rate_ms as f64 * self.sound_interval_ticks as f64 / 1000.0
    }
}

/// Keys of the fixed controls. Theme and effect keys come from the box.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ControlKeys {
    pub quit: Key,
    pub pause: Key,
    pub next: Key,
    pub previous: Key,
    pub allow_music: Key,
    pub allow_sounds: Key,
    pub custom_colors: Key,
    pub debug: Key,
}

#[derive(Clone, Debug)]
pub struct GamepadConfig {
    pub pause: Vec<String>,
    pub next: Vec<String>,
    pub previous: Vec<String>,
    pub allow_music: Vec<String>,
    pub allow_sounds: Vec<String>,
}

// ── TOML Schema (with serde defaults) ──

#[derive(Deserialize, Debug, Default)]
struct TomlConfig {
    #[serde(default)]
    general: TomlGeneral,
    #[serde(default)]
    keys: TomlKeys,
    #[serde(default)]
    gamepad: TomlGamepad,
}

#[derive(Deserialize, Debug)]
struct TomlGeneral {
    #[serde(default = "default_tick_rate")]
    tick_rate_ms: u64,
    #[serde(default = "default_sound_interval")]
    sound_interval_ticks: u32,
    #[serde(default = "default_remember")]
    remember: usize,
    #[serde(default = "default_channels")]
    channels: usize,
    #[serde(default)]
    debug: bool,
    #[serde(default = "default_true")]
    custom_colors: bool,
}

#[derive(Deserialize, Debug)]
struct TomlKeys {
    #[serde(default = "default_quit")]
    quit: String,
    #[serde(default = "default_pause")]
    pause: String,
    #[serde(default = "default_next")]
    next: String,
    #[serde(default = "default_previous")]
    previous: String,
    #[serde(default = "default_allow_music")]
    allow_music: String,
    #[serde(default = "default_allow_sounds")]
    allow_sounds: String,
    #[serde(default = "default_custom_colors")]
    custom_colors: String,
    #[serde(default = "default_debug")]
    debug: String,
}

#[derive(Deserialize, Debug)]
struct TomlGamepad {
    #[serde(default = "default_pad_pause")]
    pause: Vec<String>,
    #[serde(default = "default_pad_next")]
    next: Vec<String>,
    #[serde(default = "default_pad_previous")]
    previous: Vec<String>,
    #[serde(default = "default_pad_allow_music")]
    allow_music: Vec<String>,
    #[serde(default = "default_pad_allow_sounds")]
    allow_sounds: Vec<String>,
}

// ── Defaults ──

fn default_tick_rate() -> u64 { 100 }      // 10 ticks per second
fn default_sound_interval() -> u32 { 10 }  // ~1s between sound draws
fn default_remember() -> usize { DEFAULT_REMEMBER }
fn default_channels() -> usize { 8 }       // channel 0 is reserved for global effects
fn default_true() -> bool { true }

fn default_quit() -> String { "Esc".into() }
fn default_pause() -> String { "Space".into() }
fn default_next() -> String { "Right".into() }
fn default_previous() -> String { "Left".into() }
fn default_allow_music() -> String { "F1".into() }
fn default_allow_sounds() -> String { "F2".into() }
fn default_custom_colors() -> String { "F5".into() }
fn default_debug() -> String { "F10".into() }

fn default_pad_pause() -> Vec<String> { vec!["Start".into()] }
fn default_pad_next() -> Vec<String> { vec!["R1".into()] }
fn default_pad_previous() -> Vec<String> { vec!["L1".into()] }
fn default_pad_allow_music() -> Vec<String> { vec!["Y".into()] }
fn default_pad_allow_sounds() -> Vec<String> { vec!["X".into()] }

impl Default for TomlGeneral {
    fn default() -> Self {
        TomlGeneral {
            tick_rate_ms: default_tick_rate(),
            sound_interval_ticks: default_sound_interval(),
            remember: default_remember(),
            channels: default_channels(),
            debug: false,
            custom_colors: true,
        }
    }
}

impl Default for TomlKeys {
    fn default() -> Self {
        TomlKeys {
            quit: default_quit(),
            pause: default_pause(),
            next: default_next(),
            previous: default_previous(),
            allow_music: default_allow_music(),
            allow_sounds: default_allow_sounds(),
            custom_colors: default_custom_colors(),
            debug: default_debug(),
        }
    }
}

impl Default for TomlGamepad {
    fn default() -> Self {
        TomlGamepad {
            pause: default_pad_pause(),
            next: default_pad_next(),
            previous: default_pad_previous(),
            allow_music: default_pad_allow_music(),
            allow_sounds: default_pad_allow_sounds(),
        }
    }
}

impl Default for ControlKeys {
    fn default() -> Self {
        ControlKeys::from_toml(&TomlKeys::default())
    }
}

impl Default for PlayerConfig {
    fn default() -> Self {
        PlayerConfig::from_toml(TomlConfig::default())
    }
}

// ── Loading ──

impl ControlKeys {
    fn from_toml(t: &TomlKeys) -> Self {
        // Unknown names keep the built-in binding.
        fn key(name: &str, fallback: fn() -> String) -> Key {
            Key::from_name(name).unwrap_or_else(|| {
                log::warn!("Unknown key name {name:?} in config.toml");
                Key::from_name(&fallback()).unwrap_or(Key::Other)
            })
        }
        ControlKeys {
            quit: key(&t.quit, default_quit),
            pause: key(&t.pause, default_pause),
            next: key(&t.next, default_next),
            previous: key(&t.previous, default_previous),
            allow_music: key(&t.allow_music, default_allow_music),
            allow_sounds: key(&t.allow_sounds, default_allow_sounds),
            custom_colors: key(&t.custom_colors, default_custom_colors),
            debug: key(&t.debug, default_debug),
        }
    }
}

impl PlayerConfig {
    /// Load config from `explicit` if given, otherwise search for `config.toml`.
    /// Search order: (1) exe directory, (2) current working directory.
    /// Missing file or missing keys gracefully fall back to defaults.
    pub fn load(explicit: Option<&Path>) -> Self {
        let toml_cfg = match explicit {
            Some(path) => read_toml(path).unwrap_or_default(),
            None => load_toml(&candidate_dirs()),
        };
        PlayerConfig::from_toml(toml_cfg)
    }

    fn from_toml(t: TomlConfig) -> Self {
        PlayerConfig {
            timing: TimingConfig {
                tick_rate_ms: t.general.tick_rate_ms.max(1),
                sound_interval_ticks: t.general.sound_interval_ticks.max(1),
                remember: t.general.remember,
            },
            keys: ControlKeys::from_toml(&t.keys),
            gamepad: GamepadConfig {
                pause: t.gamepad.pause,
                next: t.gamepad.next,
                previous: t.gamepad.previous,
                allow_music: t.gamepad.allow_music,
                allow_sounds: t.gamepad.allow_sounds,
            },
            // the reserved effect channel plus at least one for theme sounds
            channels: t.general.channels.max(2),
            debug: t.general.debug,
            custom_colors: t.general.custom_colors,
        }
    }

    #[cfg(test)]
    fn parse_str(text: &str) -> Result<Self, toml::de::Error> {
        Ok(PlayerConfig::from_toml(toml::from_str(text)?))
    }
}

/// Candidate directories to search: exe dir + CWD + system paths (deduplicated).
fn candidate_dirs() -> Vec<PathBuf> {
    let mut dirs = vec![];

    // 1. Directory of the running executable
    if let Ok(exe) = std::env::current_exe() {
        let resolved = exe.canonicalize().unwrap_or(exe);
        if let Some(parent) = resolved.parent() {
            dirs.push(parent.to_path_buf());
        }
    }

    // 2. Current working directory
    if let Ok(cwd) = std::env::current_dir() {
        if !dirs.iter().any(|d| d == &cwd) {
            dirs.push(cwd);
        }
    }

    // 3. XDG data home (~/.local/share/rpgbox)
    if let Ok(home) = std::env::var("HOME") {
        let xdg = PathBuf::from(&home).join(".local/share/rpgbox");
        if xdg.is_dir() && !dirs.iter().any(|d| d == &xdg) {
            dirs.push(xdg);
        }
    }

    // 4. System data directory (/usr/share/rpgbox)
    let sys = PathBuf::from("/usr/share/rpgbox");
    if sys.is_dir() && !dirs.iter().any(|d| d == &sys) {
        dirs.push(sys);
    }

    if dirs.is_empty() {
        dirs.push(PathBuf::from("."));
    }

    dirs
}

/// Search for config.toml in candidate directories.
fn load_toml(search_dirs: &[PathBuf]) -> TomlConfig {
    for dir in search_dirs {
        let path = dir.join("config.toml");
        if path.exists() {
            if let Some(cfg) = read_toml(&path) {
                return cfg;
            }
        }
    }
    TomlConfig::default()
}

fn read_toml(path: &Path) -> Option<TomlConfig> {
    match std::fs::read_to_string(path) {
        Ok(text) => match toml::from_str::<TomlConfig>(&text) {
            Ok(cfg) => Some(cfg),
            Err(e) => {
                log::warn!("{} parse error: {e}", path.display());
                log::warn!("Using default settings.");
                Some(TomlConfig::default())
            }
        },
        Err(e) => {
            log::warn!("could not read {}: {e}", path.display());
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let cfg = PlayerConfig::parse_str("").unwrap();
        assert_eq!(cfg.timing.tick_rate_ms, 100);
        assert_eq!(cfg.timing.sound_interval_ticks, 10);
        assert_eq!(cfg.timing.remember, 5);
        assert_eq!(cfg.channels, 8);
        assert!(cfg.custom_colors);
        assert!(!cfg.debug);
        assert_eq!(cfg.keys, ControlKeys::default());
        assert_eq!(cfg.keys.quit, Key::Esc);
        assert_eq!(cfg.keys.debug, Key::F(10));
    }

    #[test]
    fn sound_interval_is_one_second_by_default() {
        let cfg = PlayerConfig::default();
        assert!((cfg.timing.sound_interval_secs() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let cfg = PlayerConfig::parse_str(
            "[general]\ntick_rate_ms = 50\n[keys]\npause = \"Enter\"\n",
        )
        .unwrap();
        assert_eq!(cfg.timing.tick_rate_ms, 50);
        assert_eq!(cfg.timing.sound_interval_ticks, 10);
        assert_eq!(cfg.keys.pause, Key::Enter);
        assert_eq!(cfg.keys.next, Key::Right);
    }

    #[test]
    fn unknown_key_name_falls_back() {
        let cfg = PlayerConfig::parse_str("[keys]\nquit = \"Hyper\"\n").unwrap();
        assert_eq!(cfg.keys.quit, Key::Esc);
    }

    #[test]
    fn remember_reaches_the_playlist_unchanged() {
        assert_eq!(PlayerConfig::default().timing.remember, DEFAULT_REMEMBER);
        let cfg = PlayerConfig::parse_str("[general]\nremember = 1\n").unwrap();
        assert_eq!(cfg.timing.remember, 1);
    }

    #[test]
    fn channel_count_has_a_floor() {
        let cfg = PlayerConfig::parse_str("[general]\nchannels = 0\n").unwrap();
        assert_eq!(cfg.channels, 2);
    }
}
