/// View model: what the screen shows, computed from player state.
///
/// The renderer only lays these lines out. Each panel is an ordered list of
/// `Field`s; the emphasis tier picks the palette color.

use crate::domain::model::Colormap;
use crate::domain::playlist::SongView;
use crate::sim::audio::AudioBackend;
use crate::sim::event::Key;
use crate::sim::player::Player;
use crate::sim::session::LOOP_PREFIX;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Tier {
    Normal,
    Emphasized,
    Faded,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Field {
    pub text: String,
    pub tier: Tier,
}

impl Field {
    fn new(text: impl Into<String>, tier: Tier) -> Self {
        Field { text: text.into(), tier }
    }

    fn blank() -> Self {
        Field::new("", Tier::Normal)
    }
}

/// One footer entry: the control key, the current state and whether that
/// state is the "on" one.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Toggle {
    pub key: String,
    pub state: &'static str,
    pub on: bool,
}

/// Everything one redraw needs.
#[derive(Clone, Debug)]
pub struct Screen {
    pub palette: Colormap,
    pub global_effects: Vec<Field>,
    pub themes: Vec<Field>,
    pub now_playing: Vec<Field>,
    pub footer: Vec<Toggle>,
}

impl Screen {
    pub fn of<B: AudioBackend>(player: &Player<B>) -> Self {
        Screen {
            palette: player.palette(),
            global_effects: global_effects(player),
            themes: themes(player),
            now_playing: now_playing(player),
            footer: footer(player),
        }
    }
}

pub fn global_effects<B: AudioBackend>(player: &Player<B>) -> Vec<Field> {
    let active = player.effects().active_key();
    player
        .music_box()
        .global_effects()
        .map(|e| {
            let tier = if Some(e.key) == active { Tier::Emphasized } else { Tier::Normal };
            Field::new(format!("{} - {}", e.key, e.name), tier)
        })
        .collect()
}

pub fn themes<B: AudioBackend>(player: &Player<B>) -> Vec<Field> {
    let active = player.active_theme();
    player
        .music_box()
        .themes()
        .map(|t| {
            let tier = if Some(t.key) == active { Tier::Emphasized } else { Tier::Normal };
            Field::new(format!("{} - {}", t.key, t.name), tier)
        })
        .collect()
}

pub fn now_playing<B: AudioBackend>(player: &Player<B>) -> Vec<Field> {
    let Some(session) = player.session() else {
        return Vec::new();
    };

    let mut fields = match session.playlist().songs_for_viewing() {
        SongView::Empty => Vec::new(),
        SongView::Single(song) => {
            vec![Field::new(format!("{LOOP_PREFIX}{}", song.name), Tier::Emphasized)]
        }
        SongView::NotStarted { next } => {
            vec![Field::blank(), Field::new(next.name.as_str(), Tier::Normal)]
        }
        SongView::First { current, next } => vec![
            Field::new(current.name.as_str(), Tier::Emphasized),
            Field::new(next.name.as_str(), Tier::Normal),
        ],
        SongView::Playing { previous, current, next } => vec![
            Field::new(previous.name.as_str(), Tier::Faded),
            Field::new(current.name.as_str(), Tier::Emphasized),
            Field::new(next.name.as_str(), Tier::Normal),
        ],
    };

    let mut labels: Vec<&str> = session.channels().iter().map(|c| c.label.as_str()).collect();
    if !labels.is_empty() {
        labels.sort_unstable();
        fields.push(Field::blank());
        fields.extend(labels.into_iter().map(|l| Field::new(l, Tier::Emphasized)));
    }
    fields
}

pub fn footer<B: AudioBackend>(player: &Player<B>) -> Vec<Toggle> {
    fn toggle(key: &Key, on: bool, yes: &'static str, no: &'static str) -> Toggle {
        Toggle { key: key.to_string(), state: if on { yes } else { no }, on }
    }

    let keys = player.keys();
    vec![
        toggle(&keys.allow_music, player.allow_music, "allow music", "disallow music"),
        toggle(&keys.allow_sounds, player.allow_sounds, "allow sounds", "disallow sounds"),
        toggle(&keys.pause, !player.paused, "unpaused", "paused"),
        toggle(&keys.custom_colors, player.custom_colors, "custom colors", "standard colors"),
        toggle(&keys.debug, !player.debug, "no debug output", "debug output"),
        toggle(&keys.quit, true, "quit", "quit"),
    ]
}
