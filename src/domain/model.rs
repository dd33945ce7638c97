/// Read-only value objects describing a music box.
///
/// Everything in here is created once by the loader and never mutated
/// afterwards. Runtime state (handles, playlists, cooldowns) lives in `sim`.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use crate::domain::occurrence::OccurrenceTable;
use crate::error::ConfigError;

/// Occurrence recorded for looped sounds. They are never drawn.
pub const LOOP_OCCURRENCE: f64 = 0.01;

// ── Hotkey ──

/// A theme or global effect key: one lowercase ASCII letter or digit.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Hotkey(char);

impl Hotkey {
    pub fn new(c: char) -> Result<Self, ConfigError> {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            Ok(Hotkey(c))
        } else {
            Err(ConfigError::InvalidKey(c))
        }
    }

    pub fn as_char(self) -> char {
        self.0
    }
}

impl fmt::Display for Hotkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Colors ──

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    /// Parse `#rrggbb` (the leading `#` is optional).
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        let hex = s.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ConfigError::InvalidColor(s.to_string()));
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16)
            .map_err(|_| ConfigError::InvalidColor(s.to_string()));
        Ok(Rgb(channel(0)?, channel(2)?, channel(4)?))
    }
}

/// Text, background, emphasis and fading color of the display.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Colormap {
    pub text: Rgb,
    pub bg: Rgb,
    pub emph: Rgb,
    pub fade: Rgb,
}

impl Default for Colormap {
    fn default() -> Self {
        Colormap {
            text: Rgb(0x00, 0x00, 0x00),
            bg: Rgb(0xff, 0xff, 0xff),
            emph: Rgb(0xc8, 0x00, 0x00),
            fade: Rgb(0x7f, 0x7f, 0x7f),
        }
    }
}

/// Optional overrides for a colormap, as written in a box file.
#[derive(Clone, Default, Debug)]
pub struct ColorOverrides {
    pub text: Option<String>,
    pub bg: Option<String>,
    pub emph: Option<String>,
    pub fade: Option<String>,
}

impl Colormap {
    /// Apply overrides on top of `self`. Empty strings keep the base color.
    pub fn with(&self, overrides: &ColorOverrides) -> Result<Colormap, ConfigError> {
        fn pick(base: Rgb, over: &Option<String>) -> Result<Rgb, ConfigError> {
            match over.as_deref() {
                Some(s) if !s.trim().is_empty() => Rgb::parse(s),
                _ => Ok(base),
            }
        }
        Ok(Colormap {
            text: pick(self.text, &overrides.text)?,
            bg: pick(self.bg, &overrides.bg)?,
            emph: pick(self.emph, &overrides.emph)?,
            fade: pick(self.fade, &overrides.fade)?,
        })
    }
}

// ── Songs, sounds, effects ──

pub fn clamp_unit(v: f64) -> f64 {
    v.clamp(0.0, 1.0)
}

#[derive(Clone, PartialEq, Debug)]
pub struct Song {
    pub path: PathBuf,
    pub name: String,
    pub volume: f64,
}

impl Song {
    pub fn new(path: impl Into<PathBuf>, name: impl Into<String>, volume: f64) -> Self {
        Song { path: path.into(), name: name.into(), volume: clamp_unit(volume) }
    }
}

#[derive(Clone, PartialEq, Debug)]
pub struct Sound {
    pub path: PathBuf,
    pub name: String,
    pub volume: f64,
    /// Seconds after the end of playback before the sound may be drawn again.
    pub cooldown: f64,
    pub occurrence: f64,
    pub looped: bool,
}

impl Sound {
    pub fn new(
        path: impl Into<PathBuf>,
        name: impl Into<String>,
        volume: f64,
        cooldown: f64,
        occurrence: f64,
        looped: bool,
    ) -> Self {
        Sound {
            path: path.into(),
            name: name.into(),
            volume: clamp_unit(volume),
            cooldown: cooldown.max(0.0),
            occurrence: if looped { LOOP_OCCURRENCE } else { clamp_unit(occurrence) },
            looped,
        }
    }
}

#[derive(Clone, PartialEq, Debug)]
pub struct GlobalEffect {
    pub key: Hotkey,
    pub name: String,
    pub path: PathBuf,
    pub volume: f64,
    pub interrupting: bool,
}

#[derive(Clone, Debug)]
pub struct Theme {
    pub key: Hotkey,
    pub name: String,
    pub colors: Colormap,
    pub songs: Vec<Song>,
    pub sounds: Vec<Sound>,
    /// Cumulative table over the non-loop entries of `sounds`, in order.
    pub occurrences: OccurrenceTable,
}

impl Theme {
    pub fn new(key: Hotkey, name: impl Into<String>, colors: Colormap) -> Self {
        Theme {
            key,
            name: name.into(),
            colors,
            songs: Vec::new(),
            sounds: Vec::new(),
            occurrences: OccurrenceTable::empty(),
        }
    }

    /// Add sounds and rebuild the occurrence table from their occurrences.
    pub fn set_sounds(&mut self, sounds: Vec<Sound>) {
        self.occurrences = OccurrenceTable::from_occurrences(
            sounds.iter().filter(|s| !s.looped).map(|s| s.occurrence),
        );
        self.sounds = sounds;
    }
}

// ── MusicBox ──

/// The resolved configuration: every theme and global effect of an evening.
#[derive(Clone, Debug, Default)]
pub struct MusicBox {
    pub colors: Colormap,
    themes: BTreeMap<Hotkey, Theme>,
    global_effects: BTreeMap<Hotkey, GlobalEffect>,
}

impl MusicBox {
    pub fn new(colors: Colormap) -> Self {
        MusicBox { colors, ..Default::default() }
    }

    fn ensure_free(&self, key: Hotkey) -> Result<(), ConfigError> {
        if self.themes.contains_key(&key) || self.global_effects.contains_key(&key) {
            return Err(ConfigError::DuplicateKey(key.as_char()));
        }
        Ok(())
    }

    pub fn is_taken(&self, key: Hotkey) -> bool {
        self.ensure_free(key).is_err()
    }

    pub fn add_theme(&mut self, theme: Theme) -> Result<(), ConfigError> {
        self.ensure_free(theme.key)?;
        self.themes.insert(theme.key, theme);
        Ok(())
    }

    pub fn add_global_effect(&mut self, mut effect: GlobalEffect) -> Result<(), ConfigError> {
        self.ensure_free(effect.key)?;
        effect.volume = clamp_unit(effect.volume);
        self.global_effects.insert(effect.key, effect);
        Ok(())
    }

    pub fn theme(&self, key: Hotkey) -> Option<&Theme> {
        self.themes.get(&key)
    }

    #[cfg(test)]
    pub fn global_effect(&self, key: Hotkey) -> Option<&GlobalEffect> {
        self.global_effects.get(&key)
    }

    /// Themes in key order.
    pub fn themes(&self) -> impl Iterator<Item = &Theme> {
        self.themes.values()
    }

    /// Global effects in key order.
    pub fn global_effects(&self) -> impl Iterator<Item = &GlobalEffect> {
        self.global_effects.values()
    }

    pub fn has_theme(&self, key: Hotkey) -> bool {
        self.themes.contains_key(&key)
    }

    pub fn has_global_effect(&self, key: Hotkey) -> bool {
        self.global_effects.contains_key(&key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(c: char) -> Hotkey {
        Hotkey::new(c).unwrap()
    }

    fn effect(c: char) -> GlobalEffect {
        GlobalEffect {
            key: key(c),
            name: format!("effect {c}"),
            path: PathBuf::from("boom.wav"),
            volume: 1.0,
            interrupting: true,
        }
    }

    #[test]
    fn hotkey_accepts_lowercase_and_digits() {
        assert!(Hotkey::new('a').is_ok());
        assert!(Hotkey::new('z').is_ok());
        assert!(Hotkey::new('0').is_ok());
        assert!(Hotkey::new('9').is_ok());
    }

    #[test]
    fn hotkey_rejects_everything_else() {
        for c in ['A', ' ', '#', 'é', '\n'] {
            assert!(matches!(Hotkey::new(c), Err(ConfigError::InvalidKey(_))));
        }
    }

    #[test]
    fn keyspace_is_shared_between_themes_and_effects() {
        let mut mb = MusicBox::default();
        mb.add_theme(Theme::new(key('a'), "Forest", Colormap::default())).unwrap();
        let err = mb.add_global_effect(effect('a')).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateKey('a')));

        mb.add_global_effect(effect('1')).unwrap();
        let err = mb.add_theme(Theme::new(key('1'), "Cave", Colormap::default())).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateKey('1')));
    }

    #[test]
    fn loop_sounds_get_nominal_occurrence() {
        let s = Sound::new("wind.wav", "wind", 1.0, 10.0, 0.7, true);
        assert_eq!(s.occurrence, LOOP_OCCURRENCE);
    }

    #[test]
    fn volumes_are_clamped() {
        assert_eq!(Song::new("a.ogg", "a", 1.5).volume, 1.0);
        assert_eq!(Sound::new("a.wav", "a", -0.2, 10.0, 0.1, false).volume, 0.0);
    }

    #[test]
    fn occurrence_table_skips_loop_sounds() {
        let mut t = Theme::new(key('f'), "Forest", Colormap::default());
        t.set_sounds(vec![
            Sound::new("bird.wav", "bird", 1.0, 10.0, 0.1, false),
            Sound::new("wind.wav", "wind", 1.0, 10.0, 0.0, true),
            Sound::new("owl.wav", "owl", 1.0, 10.0, 0.2, false),
        ]);
        assert_eq!(t.occurrences.len(), 2);
    }

    #[test]
    fn colors_parse_and_override() {
        assert_eq!(Rgb::parse("#c80000").unwrap(), Rgb(200, 0, 0));
        assert!(Rgb::parse("red").is_err());

        let over = ColorOverrides { bg: Some("#000000".into()), text: Some(String::new()), ..Default::default() };
        let cm = Colormap::default().with(&over).unwrap();
        assert_eq!(cm.bg, Rgb(0, 0, 0));
        assert_eq!(cm.text, Colormap::default().text);
    }
}
