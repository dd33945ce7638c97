/// Box loader: turns a box description into a `MusicBox`.
///
/// Two sources are supported:
///   - a TOML box file (`--box`), with explicit themes, keys and volumes
///   - a plain directory tree (`--path`), where `globals/` holds global
///     effects and every other subdirectory becomes a theme
///
/// Volumes in box files are percentages. Global, theme and entry volume
/// multiply. Occurrences are "expected plays per basetime seconds" and are
/// turned into a per-draw probability here. Any problem aborts loading;
/// a box is never half-built.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::domain::model::{
    clamp_unit, ColorOverrides, Colormap, GlobalEffect, Hotkey, MusicBox, Song, Sound, Theme,
};
use crate::error::ConfigError;

// ── Limits and defaults ──

const DEFAULT_VOLUME: f64 = 100.0;
const DEFAULT_BASETIME: f64 = 3600.0; // 1 hour
const MIN_BASETIME: f64 = 1.0;
const MAX_BASETIME: f64 = 36000.0; // 10 hours
const DEFAULT_OCCURRENCE: f64 = 0.01; // share of the basetime
const DEFAULT_COOLDOWN: f64 = 10.0;
const MAX_PATH_GLOBALS: usize = 10;

const AUDIO_EXTENSIONS: &[&str] = &["ogg", "mp3", "wav", "flac"];
const SONG_EXTENSIONS: &[&str] = &["ogg", "mp3"];
const SOUND_EXTENSIONS: &[&str] = &["wav"];

// ── TOML Schema ──

#[derive(Deserialize, Debug, Default)]
struct TomlBox {
    #[serde(default)]
    config: Option<TomlColors>,
    #[serde(default)]
    globals: Option<TomlGlobals>,
    #[serde(default)]
    theme: Vec<TomlTheme>,
}

#[derive(Deserialize, Debug, Default)]
struct TomlColors {
    textcolor: Option<String>,
    bgcolor: Option<String>,
    emphcolor: Option<String>,
    fadecolor: Option<String>,
}

#[derive(Deserialize, Debug)]
struct TomlGlobals {
    #[serde(default = "default_volume")]
    volume: f64,
    #[serde(default)]
    effect: Vec<TomlGlobalEffect>,
}

#[derive(Deserialize, Debug)]
struct TomlGlobalEffect {
    name: Option<String>,
    key: Option<String>,
    file: Option<String>,
    #[serde(default = "default_volume")]
    volume: f64,
    #[serde(default)]
    interrupting: bool,
}

#[derive(Deserialize, Debug)]
struct TomlTheme {
    name: Option<String>,
    key: Option<String>,
    #[serde(default = "default_volume")]
    volume: f64,
    #[serde(default = "default_basetime")]
    basetime: f64,
    #[serde(default)]
    config: Option<TomlColors>,
    #[serde(default)]
    background: Vec<TomlSong>,
    #[serde(default)]
    effect: Vec<TomlSound>,
}

#[derive(Deserialize, Debug)]
struct TomlSong {
    file: Option<String>,
    #[serde(default = "default_volume")]
    volume: f64,
}

#[derive(Deserialize, Debug)]
struct TomlSound {
    file: Option<String>,
    #[serde(default = "default_volume")]
    volume: f64,
    occurrence: Option<f64>,
    #[serde(default = "default_cooldown")]
    cooldown: f64,
    #[serde(default, rename = "loop")]
    looped: bool,
}

fn default_volume() -> f64 { DEFAULT_VOLUME }
fn default_basetime() -> f64 { DEFAULT_BASETIME }
fn default_cooldown() -> f64 { DEFAULT_COOLDOWN }

impl TomlColors {
    fn overrides(&self) -> ColorOverrides {
        ColorOverrides {
            text: self.textcolor.clone(),
            bg: self.bgcolor.clone(),
            emph: self.emphcolor.clone(),
            fade: self.fadecolor.clone(),
        }
    }
}

// ── Helpers ──

/// File stem with underscores turned into spaces.
pub fn display_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().replace('_', " "))
        .unwrap_or_default()
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map_or(false, |e| extensions.iter().any(|x| x.eq_ignore_ascii_case(e)))
}

/// Directory entries, sorted by path.
fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let io = |source| ConfigError::Io { path: dir.to_path_buf(), source };
    let mut entries = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(io)? {
        entries.push(entry.map_err(io)?.path());
    }
    entries.sort();
    Ok(entries)
}

/// Resolve `file` against `base`. A directory stands for all audio files in it.
fn resolve_files(base: &Path, file: &str, owner: &str) -> Result<Vec<PathBuf>, ConfigError> {
    let path = base.join(file);
    let not_found = || ConfigError::FileNotFound { path: path.clone(), owner: owner.to_string() };

    if path.is_file() {
        return Ok(vec![path]);
    }
    if !path.is_dir() {
        return Err(not_found());
    }
    let files: Vec<PathBuf> = sorted_entries(&path)?
        .into_iter()
        .filter(|p| p.is_file() && has_extension(p, AUDIO_EXTENSIONS))
        .collect();
    if files.is_empty() {
        return Err(not_found());
    }
    Ok(files)
}

fn required<'a>(value: &'a Option<String>, what: &'static str) -> Result<&'a str, ConfigError> {
    value.as_deref().filter(|s| !s.trim().is_empty()).ok_or(ConfigError::MissingName(what))
}

/// Only the first character of a key counts, lowercased.
fn parse_key(key: &Option<String>, owner: &str) -> Result<Hotkey, ConfigError> {
    let c = key
        .as_deref()
        .and_then(|k| k.trim().chars().next())
        .ok_or_else(|| ConfigError::MissingKey(owner.to_string()))?;
    Hotkey::new(c.to_ascii_lowercase())
}

// ── Box files ──

/// Read a TOML box file. Relative media paths resolve against its directory.
pub fn load_box(path: &Path) -> Result<MusicBox, ConfigError> {
    let text = std::fs::read_to_string(path)
        .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
    let base = path.parent().unwrap_or(Path::new(""));
    parse_box(&text, path, base)
}

fn parse_box(text: &str, origin: &Path, base: &Path) -> Result<MusicBox, ConfigError> {
    let raw: TomlBox = toml::from_str(text)
        .map_err(|source| ConfigError::Parse { path: origin.to_path_buf(), source })?;

    let colors = match &raw.config {
        Some(c) => Colormap::default().with(&c.overrides())?,
        None => Colormap::default(),
    };
    let mut music_box = MusicBox::new(colors);

    let mut global_volume = 1.0;
    if let Some(globals) = &raw.globals {
        global_volume = globals.volume / 100.0;
        for effect in &globals.effect {
            music_box.add_global_effect(global_effect(effect, global_volume, base)?)?;
        }
    }

    if raw.theme.is_empty() {
        return Err(ConfigError::NoTheme);
    }
    for t in &raw.theme {
        let theme = theme(t, global_volume, colors, base)?;
        log::debug!(
            "Loaded theme {} with {} songs and {} sounds",
            theme.name,
            theme.songs.len(),
            theme.sounds.len()
        );
        music_box.add_theme(theme)?;
    }
    Ok(music_box)
}

fn global_effect(raw: &TomlGlobalEffect, global_volume: f64, base: &Path) -> Result<GlobalEffect, ConfigError> {
    let name = required(&raw.name, "global effect")?;
    let key = parse_key(&raw.key, name)?;
    let owner = format!("global effect {name}");
    let file = raw.file.as_deref().ok_or_else(|| ConfigError::MissingFile(owner.clone()))?;
    let path = base.join(file);
    if !path.is_file() {
        return Err(ConfigError::FileNotFound { path, owner });
    }
    Ok(GlobalEffect {
        key,
        name: name.to_string(),
        path,
        volume: clamp_unit(global_volume * raw.volume / 100.0),
        interrupting: raw.interrupting,
    })
}

fn theme(raw: &TomlTheme, global_volume: f64, box_colors: Colormap, base: &Path) -> Result<Theme, ConfigError> {
    let name = required(&raw.name, "theme")?;
    let key = parse_key(&raw.key, name)?;
    let volume = global_volume * raw.volume / 100.0;
    let basetime = raw.basetime.clamp(MIN_BASETIME, MAX_BASETIME);
    let colors = match &raw.config {
        Some(c) => box_colors.with(&c.overrides())?,
        None => box_colors,
    };

    let mut theme = Theme::new(key, name, colors);
    let owner = format!("theme {name}");

    for song in &raw.background {
        let file = song.file.as_deref().ok_or_else(|| ConfigError::MissingFile(owner.clone()))?;
        for path in resolve_files(base, file, &owner)? {
            let song_name = display_name(&path);
            theme.songs.push(Song::new(path, song_name, volume * song.volume / 100.0));
        }
    }

    let mut sounds = Vec::new();
    for sound in &raw.effect {
        let file = sound.file.as_deref().ok_or_else(|| ConfigError::MissingFile(owner.clone()))?;
        let occurrence = sound.occurrence.unwrap_or(DEFAULT_OCCURRENCE * basetime) / basetime;
        for path in resolve_files(base, file, &owner)? {
            let sound_name = display_name(&path);
            sounds.push(Sound::new(
                path,
                sound_name,
                volume * sound.volume / 100.0,
                sound.cooldown,
                occurrence,
                sound.looped,
            ));
        }
    }
    theme.set_sounds(sounds);
    Ok(theme)
}

// ── Path mode ──

/// Build a box from a directory tree. `globals/` gives up to ten interrupting
/// effects on keys 1..9, 0. Every other subdirectory is a theme keyed by the
/// last free letter of its name.
pub fn load_path(root: &Path) -> Result<MusicBox, ConfigError> {
    let mut music_box = MusicBox::new(Colormap::default());
    let globals_dir = root.join("globals");

    if globals_dir.is_dir() {
        let files = sorted_entries(&globals_dir)?.into_iter().filter(|p| !p.is_dir());
        for (n, path) in files.enumerate() {
            if n >= MAX_PATH_GLOBALS {
                return Err(ConfigError::TooManyGlobals);
            }
            let digit = char::from_digit(((n + 1) % 10) as u32, 10).unwrap_or('0');
            music_box.add_global_effect(GlobalEffect {
                key: Hotkey::new(digit)?,
                name: display_name(&path),
                path,
                volume: 1.0,
                interrupting: true,
            })?;
        }
    }

    for dir in sorted_entries(root)? {
        if dir == globals_dir || !dir.is_dir() {
            continue;
        }
        let theme = path_theme(&dir, &music_box)?;
        music_box.add_theme(theme)?;
    }

    if music_box.themes().next().is_none() {
        return Err(ConfigError::NoTheme);
    }
    Ok(music_box)
}

fn path_theme(dir: &Path, music_box: &MusicBox) -> Result<Theme, ConfigError> {
    let name = display_name(dir);
    let key = name
        .to_lowercase()
        .chars()
        .filter_map(|c| Hotkey::new(c).ok())
        .filter(|k| k.as_char().is_ascii_alphabetic() && !music_box.is_taken(*k))
        .last()
        .ok_or_else(|| ConfigError::NoFreeKey(name.clone()))?;

    let mut theme = Theme::new(key, name, Colormap::default());
    let mut sounds = Vec::new();
    for path in sorted_entries(dir)? {
        if has_extension(&path, SONG_EXTENSIONS) {
            let song_name = display_name(&path);
            theme.songs.push(Song::new(path, song_name, 1.0));
        } else if has_extension(&path, SOUND_EXTENSIONS) {
            let sound_name = display_name(&path);
            sounds.push(Sound::new(path, sound_name, 1.0, DEFAULT_COOLDOWN, 1.0, false));
        }
    }
    theme.set_sounds(sounds);
    Ok(theme)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::Rgb;
    use std::fs;

    fn touch(dir: &Path, rel: &str) {
        let path = dir.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, b"").unwrap();
    }

    fn key(c: char) -> Hotkey {
        Hotkey::new(c).unwrap()
    }

    fn write_box(dir: &Path, text: &str) -> PathBuf {
        let path = dir.join("box.toml");
        fs::write(&path, text).unwrap();
        path
    }

    const FOREST: &str = r##"
[config]
bgcolor = "#102030"

[globals]
volume = 50

[[globals.effect]]
name = "Thunder"
key = "T"
file = "thunder.wav"
volume = 80
interrupting = true

[[theme]]
name = "Forest"
key = "f"
volume = 50
basetime = 100

[theme.config]
emphcolor = "#00ff00"

[[theme.background]]
file = "music"

[[theme.effect]]
file = "bird.wav"
occurrence = 10
cooldown = 5

[[theme.effect]]
file = "wind.wav"
loop = true
"##;

    fn forest_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for f in ["thunder.wav", "music/b_song.ogg", "music/a_song.mp3", "music/notes.txt", "bird.wav", "wind.wav"] {
            touch(dir.path(), f);
        }
        dir
    }

    #[test]
    fn loads_a_complete_box() {
        let dir = forest_dir();
        let mb = load_box(&write_box(dir.path(), FOREST)).unwrap();

        assert_eq!(mb.colors.bg, Rgb(0x10, 0x20, 0x30));
        let thunder = mb.global_effect(key('t')).unwrap();
        assert!((thunder.volume - 0.4).abs() < 1e-9);
        assert!(thunder.interrupting);

        let forest = mb.theme(key('f')).unwrap();
        assert_eq!(forest.colors.bg, Rgb(0x10, 0x20, 0x30));
        assert_eq!(forest.colors.emph, Rgb(0, 0xff, 0));

        let names: Vec<&str> = forest.songs.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["a song", "b song"]);
        assert!((forest.songs[0].volume - 0.25).abs() < 1e-9);

        assert_eq!(forest.sounds.len(), 2);
        assert!((forest.sounds[0].occurrence - 0.1).abs() < 1e-9);
        assert_eq!(forest.sounds[0].cooldown, 5.0);
        assert!(forest.sounds[1].looped);
        assert_eq!(forest.occurrences.len(), 1);
    }

    #[test]
    fn defaults_apply_when_fields_are_missing() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "drip.wav");
        let text = "[[theme]]\nname = \"Cave\"\nkey = \"c\"\n[[theme.effect]]\nfile = \"drip.wav\"\n";
        let mb = load_box(&write_box(dir.path(), text)).unwrap();
        let cave = mb.theme(key('c')).unwrap();
        assert_eq!(cave.colors, Colormap::default());
        assert!((cave.sounds[0].occurrence - 0.01).abs() < 1e-9);
        assert_eq!(cave.sounds[0].cooldown, 10.0);
        assert_eq!(cave.sounds[0].volume, 1.0);
    }

    #[test]
    fn occurrence_is_clamped_and_basetime_bounded() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "a.wav");
        let text = "[[theme]]\nname = \"X\"\nkey = \"x\"\nbasetime = 0\n\
                    [[theme.effect]]\nfile = \"a.wav\"\noccurrence = 5\n";
        let mb = load_box(&write_box(dir.path(), text)).unwrap();
        assert_eq!(mb.theme(key('x')).unwrap().sounds[0].occurrence, 1.0);
    }

    #[test]
    fn box_without_theme_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_box(&write_box(dir.path(), "[config]\n")).unwrap_err();
        assert!(matches!(err, ConfigError::NoTheme));
    }

    #[test]
    fn configuration_errors() {
        let dir = forest_dir();
        let cases: &[(&str, fn(&ConfigError) -> bool)] = &[
            ("[[theme]]\nkey = \"a\"\n", |e| matches!(e, ConfigError::MissingName("theme"))),
            ("[[theme]]\nname = \"A\"\n", |e| matches!(e, ConfigError::MissingKey(_))),
            ("[[theme]]\nname = \"A\"\nkey = \"!\"\n", |e| matches!(e, ConfigError::InvalidKey('!'))),
            (
                "[[theme]]\nname = \"A\"\nkey = \"a\"\n[[theme]]\nname = \"B\"\nkey = \"A\"\n",
                |e| matches!(e, ConfigError::DuplicateKey('a')),
            ),
            (
                "[[theme]]\nname = \"A\"\nkey = \"a\"\n[[theme.background]]\nvolume = 3\n",
                |e| matches!(e, ConfigError::MissingFile(_)),
            ),
            (
                "[[theme]]\nname = \"A\"\nkey = \"a\"\n[[theme.effect]]\nfile = \"nope.wav\"\n",
                |e| matches!(e, ConfigError::FileNotFound { .. }),
            ),
            (
                "[config]\ntextcolor = \"red\"\n[[theme]]\nname = \"A\"\nkey = \"a\"\n",
                |e| matches!(e, ConfigError::InvalidColor(_)),
            ),
            ("[[theme]\n", |e| matches!(e, ConfigError::Parse { .. })),
        ];
        for (text, check) in cases {
            let err = load_box(&write_box(dir.path(), text)).unwrap_err();
            assert!(check(&err), "{text:?} gave {err:?}");
        }
    }

    #[test]
    fn global_effect_key_collides_with_theme() {
        let dir = forest_dir();
        let text = "[[globals.effect]]\nname = \"T\"\nkey = \"f\"\nfile = \"thunder.wav\"\n\
                    [[theme]]\nname = \"Forest\"\nkey = \"f\"\n";
        let err = load_box(&write_box(dir.path(), text)).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateKey('f')));
    }

    #[test]
    fn missing_box_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(load_box(&dir.path().join("none.toml")), Err(ConfigError::Io { .. })));
    }

    #[test]
    fn path_mode_builds_themes_and_globals() {
        let dir = tempfile::tempdir().unwrap();
        for f in [
            "globals/alarm.wav",
            "globals/horn.ogg",
            "dark_forest/theme.ogg",
            "dark_forest/song.mp3",
            "dark_forest/owl.wav",
            "dark_forest/crow.wav",
            "dark_forest/readme.txt",
            "tavern/cheer.wav",
        ] {
            touch(dir.path(), f);
        }
        let mb = load_path(dir.path()).unwrap();

        let globals: Vec<(char, &str)> =
            mb.global_effects().map(|g| (g.key.as_char(), g.name.as_str())).collect();
        assert_eq!(globals, [('1', "alarm"), ('2', "horn")]);
        assert!(mb.global_effects().all(|g| g.interrupting));

        // last letter of "dark forest" is 't'; "tavern" then takes 'n'
        let forest = mb.theme(key('t')).unwrap();
        assert_eq!(forest.name, "dark forest");
        assert_eq!(forest.songs.len(), 2);
        assert_eq!(forest.sounds.len(), 2);
        assert_eq!(forest.occurrences.values(), &[0.5, 1.0]);
        assert_eq!(mb.theme(key('n')).unwrap().occurrences.values(), &[1.0]);
    }

    #[test]
    fn path_mode_limits_globals() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..11 {
            touch(dir.path(), &format!("globals/{i:02}.wav"));
        }
        touch(dir.path(), "cave/drip.wav");
        assert!(matches!(load_path(dir.path()), Err(ConfigError::TooManyGlobals)));
    }

    #[test]
    fn path_mode_tenth_global_is_zero() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..10 {
            touch(dir.path(), &format!("globals/{i:02}.wav"));
        }
        touch(dir.path(), "cave/drip.wav");
        let mb = load_path(dir.path()).unwrap();
        assert_eq!(mb.global_effect(key('0')).unwrap().name, "09");
    }

    #[test]
    fn path_mode_needs_a_free_letter() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "aa/x.wav");
        touch(dir.path(), "ab/x.wav");
        touch(dir.path(), "ba/x.wav");
        assert!(matches!(load_path(dir.path()), Err(ConfigError::NoFreeKey(_))));
    }

    #[test]
    fn path_mode_without_themes() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "globals/a.wav");
        assert!(matches!(load_path(dir.path()), Err(ConfigError::NoTheme)));
    }

    #[test]
    fn display_names() {
        assert_eq!(display_name(Path::new("a/b/old_dark_house.ogg")), "old dark house");
        assert_eq!(display_name(Path::new("rain")), "rain");
    }
}
