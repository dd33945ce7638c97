/// Player: the scheduler and state machine of the music box.
///
/// ## Event flow
///
/// Input, the audio backend and the player itself post `PlayerEvent`s into
/// one FIFO queue. `tick()` drains the events queued before it started, in
/// arrival order; anything posted while draining (the synthetic
/// song-finished after a theme change, for one) waits for the next tick.
///
/// ## Key precedence
///
/// quit → pause → next → previous → allow music → allow sounds →
/// custom colors → debug → active theme (deactivate) → active effect (stop)
/// → theme (activate) → global effect (trigger). Unbound keys are ignored.
///
/// ## Sound draws
///
/// Every `sound_interval_ticks` ticks cooldowns count down by the elapsed
/// interval, then one random sound draw is attempted.

use std::collections::VecDeque;

use crate::config::{ControlKeys, PlayerConfig, TimingConfig};
use crate::domain::model::{Colormap, Hotkey, MusicBox};
use crate::error::PlayerError;
use crate::sim::audio::{AudioBackend, ChannelId, EFFECT_CHANNEL};
use crate::sim::effects::GlobalEffectController;
use crate::sim::event::{Key, PlayerEvent};
use crate::sim::session::ThemeSession;

/// Whether the loop should keep going after handling an event.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Flow {
    Continue,
    Quit,
}

pub struct Player<B: AudioBackend> {
    music_box: MusicBox,
    audio: B,
    timing: TimingConfig,
    keys: ControlKeys,
    effects: GlobalEffectController,
    session: Option<ThemeSession>,
    queue: VecDeque<PlayerEvent>,
    cycle: u32,
    rng: fastrand::Rng,

    pub paused: bool,
    /// A song was loaded while paused; it starts on unpause.
    pub pending_song: bool,
    pub allow_music: bool,
    pub allow_sounds: bool,
    pub custom_colors: bool,
    pub debug: bool,
    palette: Colormap,
    /// Set whenever something visible changed since the last `take_dirty()`.
    dirty: bool,
}

impl<B: AudioBackend> Player<B> {
    pub fn new(music_box: MusicBox, audio: B, config: &PlayerConfig) -> Result<Self, PlayerError> {
        Self::with_rng(music_box, audio, config, fastrand::Rng::new())
    }

    pub fn with_rng(
        music_box: MusicBox,
        mut audio: B,
        config: &PlayerConfig,
        rng: fastrand::Rng,
    ) -> Result<Self, PlayerError> {
        let effects = GlobalEffectController::load(&music_box, &mut audio)?;
        let palette = if config.custom_colors { music_box.colors } else { Colormap::default() };
        Ok(Player {
            music_box,
            audio,
            timing: config.timing.clone(),
            keys: config.keys,
            effects,
            session: None,
            queue: VecDeque::new(),
            cycle: 0,
            rng,
            paused: false,
            pending_song: false,
            allow_music: true,
            allow_sounds: true,
            custom_colors: config.custom_colors,
            debug: config.debug,
            palette,
            dirty: true,
        })
    }

    // ── Accessors ──

    pub fn music_box(&self) -> &MusicBox {
        &self.music_box
    }

    pub fn session(&self) -> Option<&ThemeSession> {
        self.session.as_ref()
    }

    pub fn active_theme(&self) -> Option<Hotkey> {
        self.session.as_ref().map(ThemeSession::key)
    }

    pub fn effects(&self) -> &GlobalEffectController {
        &self.effects
    }

    pub fn keys(&self) -> &ControlKeys {
        &self.keys
    }

    pub fn palette(&self) -> Colormap {
        self.palette
    }

    #[cfg(test)]
    pub fn audio(&self) -> &B {
        &self.audio
    }

    #[cfg(test)]
    pub fn audio_mut(&mut self) -> &mut B {
        &mut self.audio
    }

    /// True once after anything visible changed.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    // ── Event loop ──

    pub fn post(&mut self, event: PlayerEvent) {
        self.queue.push_back(event);
    }

    /// Move backend notifications into the event queue.
    pub fn poll_audio(&mut self) {
        for event in self.audio.poll_events() {
            self.queue.push_back(match event {
                crate::sim::audio::AudioEvent::SongFinished => PlayerEvent::SongFinished,
                crate::sim::audio::AudioEvent::EffectFinished => PlayerEvent::EffectFinished,
            });
        }
    }

    /// Run one scheduler tick.
    pub fn tick(&mut self) -> Result<Flow, PlayerError> {
        let events = std::mem::take(&mut self.queue);
        for event in events {
            if self.handle(event)? == Flow::Quit {
                return Ok(Flow::Quit);
            }
        }

        self.cycle += 1;
        if self.cycle >= self.timing.sound_interval_ticks {
            self.cycle = 0;
            if let Some(session) = &mut self.session {
                session.elapse(self.timing.sound_interval_secs());
            }
            let r = self.rng.f64();
            self.try_sound(r);
        }
        Ok(Flow::Continue)
    }

    fn handle(&mut self, event: PlayerEvent) -> Result<Flow, PlayerError> {
        match event {
            PlayerEvent::Quit => return Ok(Flow::Quit),
            PlayerEvent::KeyDown(key) => return self.handle_key(key),
            PlayerEvent::SongFinished => self.play_music(false),
            PlayerEvent::EffectFinished => self.stop_effect(true),
            PlayerEvent::Resize(..) => self.dirty = true,
        }
        Ok(Flow::Continue)
    }

    fn handle_key(&mut self, key: Key) -> Result<Flow, PlayerError> {
        let keys = self.keys;
        if key == keys.quit {
            return Ok(Flow::Quit);
        } else if key == keys.pause {
            self.toggle_pause();
        } else if key == keys.next {
            self.play_music(false);
        } else if key == keys.previous {
            self.play_music(true);
        } else if key == keys.allow_music {
            self.toggle_allow_music();
        } else if key == keys.allow_sounds {
            self.toggle_allow_sounds();
        } else if key == keys.custom_colors {
            self.toggle_custom_colors();
        } else if key == keys.debug {
            self.toggle_debug();
        } else if let Some(hk) = key.hotkey() {
            if Some(hk) == self.active_theme() {
                self.deactivate_theme();
            } else if Some(hk) == self.effects.active_key() {
                self.stop_effect(false);
            } else if self.music_box.has_theme(hk) {
                self.activate_theme(hk)?;
            } else if self.music_box.has_global_effect(hk) {
                self.trigger_effect(hk);
            }
        }
        Ok(Flow::Continue)
    }

    // ── Toggles ──

    pub fn toggle_pause(&mut self) {
        if self.paused {
            log::debug!("Player unpaused");
            self.paused = false;
            if self.effects.is_interrupting() {
                self.audio.unpause_channel(EFFECT_CHANNEL);
            } else {
                self.audio.unpause_music();
                self.audio.unpause_all();
                self.start_pending_song();
            }
        } else {
            self.audio.pause_music();
            self.audio.pause_all();
            log::debug!("Player paused");
            self.paused = true;
        }
        self.dirty = true;
    }

    pub fn toggle_allow_music(&mut self) {
        self.allow_music = !self.allow_music;
        if self.allow_music {
            self.post(PlayerEvent::SongFinished);
            log::debug!("Music switched on");
        } else {
            self.audio.stop_music();
            self.pending_song = false;
            // step back so switching music on again resumes the same song
            if let Some(session) = &mut self.session {
                session.playlist_mut().previous_song();
            }
            log::debug!("Music switched off");
        }
        self.dirty = true;
    }

    pub fn toggle_allow_sounds(&mut self) {
        self.allow_sounds = !self.allow_sounds;
        if self.allow_sounds {
            log::debug!("Sound switched on");
        } else {
            if let Some(session) = &mut self.session {
                session.stop_one_shots(&mut self.audio);
            }
            log::debug!("Sound switched off");
        }
        self.dirty = true;
    }

    pub fn toggle_custom_colors(&mut self) {
        self.custom_colors = !self.custom_colors;
        self.palette = if !self.custom_colors {
            Colormap::default()
        } else {
            match &self.session {
                Some(session) => session.colors(),
                None => self.music_box.colors,
            }
        };
        self.dirty = true;
    }

    pub fn toggle_debug(&mut self) {
        self.debug = !self.debug;
        log::set_max_level(if self.debug { log::LevelFilter::Debug } else { log::LevelFilter::Warn });
        log::debug!("Debug printing activated");
        self.dirty = true;
    }

    // ── Music ──

    fn single_song(&self) -> bool {
        self.session.as_ref().map_or(false, |s| s.playlist().is_single())
    }

    fn start_pending_song(&mut self) {
        if self.pending_song {
            self.pending_song = false;
            let looped = self.single_song();
            self.audio.play_music(looped);
        }
    }

    /// Replace the current song by the next (or previous) one of the playlist.
    pub fn play_music(&mut self, previous: bool) {
        if !self.allow_music {
            return;
        }

        let song = self.session.as_mut().and_then(|s| {
            let pl = s.playlist_mut();
            let song = if previous { pl.previous_song() } else { pl.next_song() };
            song.cloned()
        });

        match song {
            Some(song) => {
                log::debug!("Now playing {} with volume {}", song.path.display(), song.volume);
                if let Err(e) = self.audio.load_music(&song.path, song.volume as f32) {
                    log::warn!("{e}");
                    self.audio.stop_music();
                    self.pending_song = false;
                } else if self.paused {
                    self.pending_song = true;
                } else {
                    self.pending_song = false;
                    let looped = self.single_song();
                    self.audio.play_music(looped);
                }
            }
            None => {
                self.audio.stop_music();
                self.pending_song = false;
                if let (false, Some(session)) = (previous, &self.session) {
                    log::debug!("No music available in theme {}", session.name());
                }
            }
        }
        self.dirty = true;
    }

    // ── Themes ──

    /// Switch to the theme bound to `key`. Everything of the previous theme
    /// is stopped before the new one is built.
    pub fn activate_theme(&mut self, key: Hotkey) -> Result<(), PlayerError> {
        let theme = self.music_box.theme(key).ok_or(PlayerError::ThemeNotFound(key.as_char()))?;
        log::debug!("New theme is {}", theme.name);

        if let Some(old) = self.session.take() {
            old.stop(&mut self.audio);
        }
        self.audio.stop_unreserved();
        self.audio.stop_music();
        self.pending_song = false;

        if self.custom_colors {
            self.palette = theme.colors;
        }

        let session = ThemeSession::start(
            theme,
            &mut self.audio,
            self.timing.remember,
            self.paused,
            self.rng.fork(),
        )?;
        self.session = Some(session);

        // the next tick starts the first song
        self.post(PlayerEvent::SongFinished);
        self.dirty = true;
        Ok(())
    }

    pub fn deactivate_theme(&mut self) {
        if let Some(session) = self.session.take() {
            log::debug!("Theme {} was deactivated", session.name());
            session.stop(&mut self.audio);
        }
        self.audio.stop_music();
        self.pending_song = false;
        if self.custom_colors {
            self.palette = self.music_box.colors;
        }
        self.dirty = true;
    }

    // ── Global effects ──

    pub fn trigger_effect(&mut self, key: Hotkey) {
        let one_shots: Vec<ChannelId> = self
            .session
            .as_ref()
            .map(|s| s.one_shot_channels().collect())
            .unwrap_or_default();
        if self.effects.trigger(key, &mut self.audio, &one_shots) {
            self.dirty = true;
        }
    }

    pub fn stop_effect(&mut self, by_end_event: bool) {
        if self.effects.stop(by_end_event, self.paused, &mut self.audio) {
            if !self.paused {
                self.start_pending_song();
            }
            self.dirty = true;
        }
    }

    // ── Sounds ──

    /// Attempt one sound draw with the uniform value `r`.
    pub fn try_sound(&mut self, r: f64) {
        let Some(session) = &mut self.session else {
            return;
        };
        let before = session.channels().len();
        session.prune_finished(&self.audio);
        if session.channels().len() != before {
            self.dirty = true;
        }

        if !self.allow_sounds
            || self.paused
            || self.effects.is_interrupting()
            || !session.has_drawable_sounds()
        {
            return;
        }
        if self.audio.find_free_channel().is_none() {
            log::debug!("No free channel for a sound");
            return;
        }
        if let Some(sound) = session.trigger(r, &mut self.audio) {
            log::debug!("Now playing sound {} with volume {}", sound.path.display(), sound.volume);
            self.dirty = true;
        }
    }
}
