/// ThemeSession: the runtime side of the active theme.
///
/// Created on activation, torn down on deactivation or when another theme
/// replaces it. Owns every backend handle it loads and releases them in
/// `stop()`. Nothing here outlives the theme: playlist, live occurrence
/// table, cooldowns and the active channel set all start empty.

use crate::domain::cooldown::{Cooldowns, FOREVER};
use crate::domain::model::{Colormap, Hotkey, Sound, Theme};
use crate::domain::occurrence::OccurrenceTable;
use crate::domain::playlist::Playlist;
use crate::error::AudioError;
use crate::sim::audio::{AudioBackend, ChannelId, SoundHandle};

/// Label prefix of looped sounds in the now-playing panel.
pub const LOOP_PREFIX: &str = ">> ";

/// A theme sound loaded into the backend.
#[derive(Clone, Debug)]
pub struct LoadedSound {
    pub sound: Sound,
    pub handle: SoundHandle,
}

/// A channel currently sounding on behalf of this theme.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ActiveChannel {
    pub label: String,
    pub channel: ChannelId,
    pub looped: bool,
}

#[derive(Debug)]
pub struct ThemeSession {
    key: Hotkey,
    name: String,
    colors: Colormap,
    sounds: Vec<LoadedSound>,
    /// `sounds` indices of the non-loop sounds, aligned with `occurrences`.
    drawable: Vec<usize>,
    occurrences: OccurrenceTable,
    playlist: Playlist,
    cooldowns: Cooldowns,
    channels: Vec<ActiveChannel>,
}

impl ThemeSession {
    /// Load the theme's sounds, start its loops and build a fresh playlist.
    /// When `paused`, loops are started and immediately paused so that
    /// unpausing the mixer brings them in.
    pub fn start<B: AudioBackend>(
        theme: &Theme,
        audio: &mut B,
        remember: usize,
        paused: bool,
        rng: fastrand::Rng,
    ) -> Result<Self, AudioError> {
        let mut sounds: Vec<LoadedSound> = Vec::with_capacity(theme.sounds.len());
        for sound in &theme.sounds {
            let handle = match audio.load(&sound.path) {
                Ok(h) => h,
                Err(e) => {
                    for loaded in &sounds {
                        audio.release(loaded.handle);
                    }
                    return Err(e);
                }
            };
            audio.set_volume(handle, sound.volume as f32);
            sounds.push(LoadedSound { sound: sound.clone(), handle });
        }

        let drawable = sounds
            .iter()
            .enumerate()
            .filter(|(_, s)| !s.sound.looped)
            .map(|(i, _)| i)
            .collect();

        let mut session = ThemeSession {
            key: theme.key,
            name: theme.name.clone(),
            colors: theme.colors,
            sounds,
            drawable,
            occurrences: theme.occurrences.clone(),
            playlist: Playlist::with_rng(&theme.songs, remember, rng),
            cooldowns: Cooldowns::new(),
            channels: Vec::new(),
        };
        session.start_loops(audio, paused);
        Ok(session)
    }

    fn start_loops<B: AudioBackend>(&mut self, audio: &mut B, paused: bool) {
        for loaded in self.sounds.iter().filter(|s| s.sound.looped) {
            match audio.play(loaded.handle, true) {
                Some(channel) => {
                    if paused {
                        audio.pause_channel(channel);
                    }
                    self.channels.push(ActiveChannel {
                        label: format!("{LOOP_PREFIX}{}", loaded.sound.name),
                        channel,
                        looped: true,
                    });
                    self.cooldowns.block(&loaded.sound.path, FOREVER);
                }
                None => log::warn!("No free channel to loop {}", loaded.sound.name),
            }
        }
    }

    /// Stop every channel of this theme and release all handles.
    pub fn stop<B: AudioBackend>(self, audio: &mut B) {
        for ch in &self.channels {
            audio.stop_channel(ch.channel);
        }
        for loaded in &self.sounds {
            audio.release(loaded.handle);
        }
    }

    pub fn key(&self) -> Hotkey {
        self.key
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn colors(&self) -> Colormap {
        self.colors
    }

    pub fn playlist(&self) -> &Playlist {
        &self.playlist
    }

    pub fn playlist_mut(&mut self) -> &mut Playlist {
        &mut self.playlist
    }

    #[cfg(test)]
    pub fn cooldowns(&self) -> &Cooldowns {
        &self.cooldowns
    }

    pub fn channels(&self) -> &[ActiveChannel] {
        &self.channels
    }

    pub fn has_drawable_sounds(&self) -> bool {
        !self.drawable.is_empty() && !self.occurrences.is_empty()
    }

    pub fn one_shot_channels(&self) -> impl Iterator<Item = ChannelId> + '_ {
        self.channels.iter().filter(|c| !c.looped).map(|c| c.channel)
    }

    /// Forget channels that finished playing.
    pub fn prune_finished<B: AudioBackend>(&mut self, audio: &B) {
        self.channels.retain(|c| audio.is_busy(c.channel));
    }

    /// Stop the one-shot sounds; loops keep running.
    pub fn stop_one_shots<B: AudioBackend>(&mut self, audio: &mut B) {
        self.channels.retain(|c| {
            if c.looped {
                true
            } else {
                audio.stop_channel(c.channel);
                false
            }
        });
    }

    pub fn elapse(&mut self, seconds: f64) {
        self.cooldowns.elapse(seconds);
    }

    /// Resolve the draw `r` against the occurrence table and play the
    /// selected sound unless it is cooling down. Returns the sound played.
    pub fn trigger<B: AudioBackend>(&mut self, r: f64, audio: &mut B) -> Option<&Sound> {
        let index = *self.drawable.get(self.occurrences.select(r)?)?;
        let loaded = &self.sounds[index];
        if self.cooldowns.is_blocked(&loaded.sound.path) {
            log::debug!("{} is cooling down", loaded.sound.name);
            return None;
        }

        let channel = audio.play(loaded.handle, false)?;
        let blocked_for = audio.length(loaded.handle).as_secs_f64() + loaded.sound.cooldown;
        self.cooldowns.block(&loaded.sound.path, blocked_for);
        self.channels.push(ActiveChannel {
            label: loaded.sound.name.clone(),
            channel,
            looped: false,
        });
        Some(&loaded.sound)
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::time::Duration;

    use super::*;
    use crate::domain::model::{Colormap, Song};
    use crate::sim::audio::mock::{ChannelState, MockBackend};

    fn theme() -> Theme {
        let mut t = Theme::new(Hotkey::new('f').unwrap(), "Forest", Colormap::default());
        t.songs = vec![Song::new("a.ogg", "A", 1.0), Song::new("b.ogg", "B", 1.0)];
        t.set_sounds(vec![
            Sound::new("bird.wav", "bird", 0.5, 10.0, 0.1, false),
            Sound::new("wind.wav", "wind", 1.0, 10.0, 0.0, true),
            Sound::new("owl.wav", "owl", 1.0, 5.0, 0.2, false),
        ]);
        t
    }

    fn start(audio: &mut MockBackend, paused: bool) -> ThemeSession {
        ThemeSession::start(&theme(), audio, 5, paused, fastrand::Rng::with_seed(1)).unwrap()
    }

    #[test]
    fn loads_sounds_and_starts_loops() {
        let mut audio = MockBackend::new(8);
        let s = start(&mut audio, false);
        assert_eq!(audio.sounds.len(), 3);
        assert_eq!(s.channels().len(), 1);
        assert_eq!(s.channels()[0].label, ">> wind");
        assert!(s.channels()[0].looped);
        assert!(s.cooldowns().is_blocked(Path::new("wind.wav")));
        assert_eq!(audio.played, vec![Path::new("wind.wav").to_path_buf()]);
    }

    #[test]
    fn loops_started_while_paused_are_paused() {
        let mut audio = MockBackend::new(8);
        let s = start(&mut audio, true);
        let ch = s.channels()[0].channel;
        assert!(matches!(audio.channel(ch), ChannelState::Paused { looped: true, .. }));
    }

    #[test]
    fn trigger_selects_from_non_loop_sounds() {
        let mut audio = MockBackend::new(8);
        let mut s = start(&mut audio, false);
        // table over [bird 0.1, owl 0.2] = [0.1, 0.3]
        assert_eq!(s.trigger(0.05, &mut audio).unwrap().name, "bird");
        assert_eq!(s.trigger(0.2, &mut audio).unwrap().name, "owl");
        assert!(s.trigger(0.3, &mut audio).is_none());
    }

    #[test]
    fn trigger_blocks_for_length_plus_cooldown() {
        let mut audio = MockBackend::new(8);
        audio.length = Duration::from_secs(4);
        let mut s = start(&mut audio, false);
        s.trigger(0.05, &mut audio).unwrap();
        assert_eq!(s.cooldowns().remaining(Path::new("bird.wav")), Some(14.0));
    }

    #[test]
    fn blocked_sound_is_never_reselected() {
        let mut audio = MockBackend::new(8);
        let mut s = start(&mut audio, false);
        assert!(s.trigger(0.05, &mut audio).is_some());
        for _ in 0..12 {
            s.elapse(1.0);
            assert!(s.trigger(0.05, &mut audio).is_none());
        }
        s.elapse(1.0);
        assert!(s.trigger(0.05, &mut audio).is_some());
    }

    #[test]
    fn no_channel_no_sound() {
        let mut audio = MockBackend::new(1);
        let mut s = start(&mut audio, false);
        assert!(s.trigger(0.05, &mut audio).is_none());
        assert!(!s.cooldowns().is_blocked(Path::new("bird.wav")));
    }

    #[test]
    fn stop_one_shots_keeps_loops() {
        let mut audio = MockBackend::new(8);
        let mut s = start(&mut audio, false);
        assert!(s.trigger(0.05, &mut audio).is_some());
        let bird = s.channels().last().cloned().unwrap();
        s.stop_one_shots(&mut audio);
        assert_eq!(s.channels().len(), 1);
        assert!(s.channels()[0].looped);
        assert_eq!(audio.channel(bird.channel), ChannelState::Idle);
    }

    #[test]
    fn prune_drops_finished_channels() {
        let mut audio = MockBackend::new(8);
        let mut s = start(&mut audio, false);
        s.trigger(0.05, &mut audio);
        let ch = s.channels().last().unwrap().channel;
        audio.finish_channel(ch);
        s.prune_finished(&audio);
        assert_eq!(s.channels().len(), 1);
    }

    #[test]
    fn only_loops_means_nothing_to_draw() {
        let mut audio = MockBackend::new(8);
        let mut t = theme();
        t.set_sounds(vec![Sound::new("wind.wav", "wind", 1.0, 10.0, 0.0, true)]);
        let s = ThemeSession::start(&t, &mut audio, 5, false, fastrand::Rng::with_seed(1)).unwrap();
        assert!(!s.has_drawable_sounds());
        assert!(start(&mut audio, false).has_drawable_sounds());
    }

    #[test]
    fn stop_silences_and_releases_everything() {
        let mut audio = MockBackend::new(8);
        let mut s = start(&mut audio, false);
        s.trigger(0.2, &mut audio);
        s.stop(&mut audio);
        assert!(audio.playing_paths().is_empty());
        assert_eq!(audio.released.len(), 3);
    }
}
