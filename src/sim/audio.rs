/// Audio backend seam.
///
/// The player never touches a sound device directly. It issues
/// fire-and-forget commands through `AudioBackend` and learns about finished
/// playback by polling `poll_events()`, whose results are fed into the same
/// event queue as keyboard input.
///
/// Channel model (mixer style):
///   - A fixed pool of channels plays loaded sounds.
///   - The first `reserve_channels(n)` channels are never handed out by
///     `play()`; they are addressed explicitly with `play_on()`.
///   - Music has its own stream, independent of the channel pool.

use std::path::Path;
use std::time::Duration;

use crate::error::AudioError;

/// Opaque id of a sound loaded into the backend.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct SoundHandle(pub u32);

/// Index of a mixer channel.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct ChannelId(pub usize);

/// The channel reserved for global effects.
pub const EFFECT_CHANNEL: ChannelId = ChannelId(0);

/// Notifications posted by the backend.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum AudioEvent {
    /// The music stream ran out on its own.
    SongFinished,
    /// The reserved effect channel ran out on its own.
    EffectFinished,
}

pub trait AudioBackend {
    // ── Sounds ──

    fn load(&mut self, path: &Path) -> Result<SoundHandle, AudioError>;
    fn release(&mut self, handle: SoundHandle);
    fn set_volume(&mut self, handle: SoundHandle, volume: f32);
    fn length(&self, handle: SoundHandle) -> Duration;

    // ── Channels ──

    fn reserve_channels(&mut self, count: usize);
    /// A channel `play()` would use right now, if any.
    fn find_free_channel(&self) -> Option<ChannelId>;
    /// Play on a free unreserved channel. `None` if every channel is busy.
    fn play(&mut self, handle: SoundHandle, looped: bool) -> Option<ChannelId>;
    /// Play on a specific (usually reserved) channel, replacing what it plays.
    fn play_on(&mut self, channel: ChannelId, handle: SoundHandle);
    fn is_busy(&self, channel: ChannelId) -> bool;
    fn pause_channel(&mut self, channel: ChannelId);
    fn unpause_channel(&mut self, channel: ChannelId);
    fn stop_channel(&mut self, channel: ChannelId);
    /// Pause every channel, reserved ones included.
    fn pause_all(&mut self);
    fn unpause_all(&mut self);
    /// Stop every unreserved channel.
    fn stop_unreserved(&mut self);

    // ── Music ──

    fn load_music(&mut self, path: &Path, volume: f32) -> Result<(), AudioError>;
    /// Start the loaded song from the beginning.
    fn play_music(&mut self, looped: bool);
    fn pause_music(&mut self);
    fn unpause_music(&mut self);
    fn stop_music(&mut self);

    // ── Notifications ──

    fn poll_events(&mut self) -> Vec<AudioEvent>;
}

/// Recording backend for tests: keeps channel state in memory and lets the
/// test finish playback by hand.
#[cfg(test)]
pub mod mock {
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};
    use std::time::Duration;

    use super::*;

    #[derive(Clone, Copy, PartialEq, Eq, Debug)]
    pub enum ChannelState {
        Idle,
        Playing { handle: SoundHandle, looped: bool },
        Paused { handle: SoundHandle, looped: bool },
    }

    #[derive(Clone, PartialEq, Eq, Debug)]
    pub enum MusicState {
        Stopped,
        Loaded(PathBuf),
        Playing { path: PathBuf, looped: bool },
        Paused { path: PathBuf, looped: bool },
    }

    pub struct MockBackend {
        pub sounds: HashMap<SoundHandle, PathBuf>,
        pub volumes: HashMap<SoundHandle, f32>,
        pub channels: Vec<ChannelState>,
        pub reserved: usize,
        pub music: MusicState,
        pub music_volume: f32,
        pub pending: Vec<AudioEvent>,
        /// Every sound started with `play()`, in order.
        pub played: Vec<PathBuf>,
        pub released: Vec<SoundHandle>,
        pub length: Duration,
        next_handle: u32,
    }

    impl MockBackend {
        pub fn new(channel_count: usize) -> Self {
            MockBackend {
                sounds: HashMap::new(),
                volumes: HashMap::new(),
                channels: vec![ChannelState::Idle; channel_count],
                reserved: 0,
                music: MusicState::Stopped,
                music_volume: 1.0,
                pending: Vec::new(),
                played: Vec::new(),
                released: Vec::new(),
                length: Duration::from_secs(3),
                next_handle: 1,
            }
        }


        pub fn channel(&self, ch: ChannelId) -> ChannelState {
            self.channels[ch.0]
        }

        pub fn playing_paths(&self) -> Vec<PathBuf> {
            self.channels
                .iter()
                .filter_map(|c| match c {
                    ChannelState::Playing { handle, .. } => Some(self.sounds[handle].clone()),
                    _ => None,
                })
                .collect()
        }

        /// Let a channel run out, posting the matching event.
        pub fn finish_channel(&mut self, ch: ChannelId) {
            self.channels[ch.0] = ChannelState::Idle;
            if ch.0 < self.reserved {
                self.pending.push(AudioEvent::EffectFinished);
            }
        }

        /// Let the current song run out.
        pub fn finish_song(&mut self) {
            self.music = MusicState::Stopped;
            self.pending.push(AudioEvent::SongFinished);
        }

        pub fn music_path(&self) -> Option<&Path> {
            match &self.music {
                MusicState::Stopped => None,
                MusicState::Loaded(p) => Some(p),
                MusicState::Playing { path, .. } | MusicState::Paused { path, .. } => Some(path),
            }
        }
    }

    impl AudioBackend for MockBackend {
        fn load(&mut self, path: &Path) -> Result<SoundHandle, AudioError> {
            let h = SoundHandle(self.next_handle);
            self.next_handle += 1;
            self.sounds.insert(h, path.to_path_buf());
            Ok(h)
        }

        fn release(&mut self, handle: SoundHandle) {
            self.released.push(handle);
        }

        fn set_volume(&mut self, handle: SoundHandle, volume: f32) {
            self.volumes.insert(handle, volume);
        }

        fn length(&self, _handle: SoundHandle) -> Duration {
            self.length
        }

        fn reserve_channels(&mut self, count: usize) {
            self.reserved = count;
        }

        fn find_free_channel(&self) -> Option<ChannelId> {
            (self.reserved..self.channels.len())
                .find(|&i| self.channels[i] == ChannelState::Idle)
                .map(ChannelId)
        }

        fn play(&mut self, handle: SoundHandle, looped: bool) -> Option<ChannelId> {
            let ch = self.find_free_channel()?;
            self.channels[ch.0] = ChannelState::Playing { handle, looped };
            self.played.push(self.sounds[&handle].clone());
            Some(ch)
        }

        fn play_on(&mut self, channel: ChannelId, handle: SoundHandle) {
            self.channels[channel.0] = ChannelState::Playing { handle, looped: false };
        }

        fn is_busy(&self, channel: ChannelId) -> bool {
            self.channels[channel.0] != ChannelState::Idle
        }

        fn pause_channel(&mut self, channel: ChannelId) {
            if let ChannelState::Playing { handle, looped } = self.channels[channel.0] {
                self.channels[channel.0] = ChannelState::Paused { handle, looped };
            }
        }

        fn unpause_channel(&mut self, channel: ChannelId) {
            if let ChannelState::Paused { handle, looped } = self.channels[channel.0] {
                self.channels[channel.0] = ChannelState::Playing { handle, looped };
            }
        }

        fn stop_channel(&mut self, channel: ChannelId) {
            self.channels[channel.0] = ChannelState::Idle;
        }

        fn pause_all(&mut self) {
            for i in 0..self.channels.len() {
                self.pause_channel(ChannelId(i));
            }
        }

        fn unpause_all(&mut self) {
            for i in 0..self.channels.len() {
                self.unpause_channel(ChannelId(i));
            }
        }

        fn stop_unreserved(&mut self) {
            for i in self.reserved..self.channels.len() {
                self.channels[i] = ChannelState::Idle;
            }
        }

        fn load_music(&mut self, path: &Path, volume: f32) -> Result<(), AudioError> {
            self.music = MusicState::Loaded(path.to_path_buf());
            self.music_volume = volume;
            Ok(())
        }

        fn play_music(&mut self, looped: bool) {
            if let Some(path) = self.music_path().map(Path::to_path_buf) {
                self.music = MusicState::Playing { path, looped };
            }
        }

        fn pause_music(&mut self) {
            if let MusicState::Playing { path, looped } = &self.music {
                self.music = MusicState::Paused { path: path.clone(), looped: *looped };
            }
        }

        fn unpause_music(&mut self) {
            if let MusicState::Paused { path, looped } = &self.music {
                self.music = MusicState::Playing { path: path.clone(), looped: *looped };
            }
        }

        fn stop_music(&mut self) {
            self.music = MusicState::Stopped;
        }

        fn poll_events(&mut self) -> Vec<AudioEvent> {
            std::mem::take(&mut self.pending)
        }
    }
}
