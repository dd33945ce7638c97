/// Sound engine: the rodio implementation of `AudioBackend`.
///
/// Sounds are decoded into memory once when loaded; every play builds a
/// fresh Sink over a copy of the samples. The channel pool is a fixed vector
/// of Sink slots, the first `reserved` of which are only reachable through
/// `play_on()`. Music streams from disk through its own Sink.
///
/// rodio has no end-of-playback callback, so `poll_events()` notices empty
/// Sinks and reports them once.
///
/// Compile without the "sound" feature to get a silent engine that accepts
/// every command and plays nothing.

#[cfg(feature = "sound")]
mod inner {
    use std::collections::HashMap;
    use std::fs::File;
    use std::io::BufReader;
    use std::path::{Path, PathBuf};
    use std::time::Duration;

    use rodio::buffer::SamplesBuffer;
    use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};

    use crate::error::AudioError;
    use crate::sim::audio::{AudioBackend, AudioEvent, ChannelId, SoundHandle};

    /// A decoded sound kept in memory.
    struct Buffer {
        samples: Vec<i16>,
        channels: u16,
        sample_rate: u32,
        volume: f32,
    }

    impl Buffer {
        fn duration(&self) -> Duration {
            let frames = self.samples.len() as f64 / self.channels.max(1) as f64;
            Duration::from_secs_f64(frames / self.sample_rate.max(1) as f64)
        }

        fn source(&self) -> SamplesBuffer<i16> {
            SamplesBuffer::new(self.channels, self.sample_rate, self.samples.clone())
        }
    }

    /// The song last passed to `load_music()`.
    struct Song {
        path: PathBuf,
        volume: f32,
    }

    pub struct SoundEngine {
        _stream: OutputStream,
        handle: OutputStreamHandle,
        buffers: HashMap<SoundHandle, Buffer>,
        next_handle: u32,
        channels: Vec<Option<Sink>>,
        reserved: usize,
        /// The reserved effect channel was started and has not been reported yet.
        effect_pending: bool,
        song: Option<Song>,
        music: Option<Sink>,
    }

    impl SoundEngine {
        pub fn new(channel_count: usize) -> Result<Self, AudioError> {
            let (stream, handle) = OutputStream::try_default().map_err(|_| AudioError::NoDevice)?;
            Ok(SoundEngine {
                _stream: stream,
                handle,
                buffers: HashMap::new(),
                next_handle: 1,
                channels: (0..channel_count).map(|_| None).collect(),
                reserved: 0,
                effect_pending: false,
                song: None,
                music: None,
            })
        }

        fn open(path: &Path) -> Result<BufReader<File>, AudioError> {
            File::open(path)
                .map(BufReader::new)
                .map_err(|source| AudioError::Open { path: path.to_path_buf(), source })
        }

        fn decode_error(path: &Path, e: impl std::fmt::Display) -> AudioError {
            AudioError::Decode { path: path.to_path_buf(), reason: e.to_string() }
        }

        fn sink(&self, channel: ChannelId) -> Option<&Sink> {
            self.channels.get(channel.0).and_then(Option::as_ref)
        }

        /// Start `handle` on `channel`, replacing whatever played there.
        fn start(&mut self, channel: ChannelId, handle: SoundHandle, looped: bool) -> bool {
            let Some(buffer) = self.buffers.get(&handle) else {
                log::warn!("{}", AudioError::UnknownHandle(handle.0));
                return false;
            };
            let sink = match Sink::try_new(&self.handle) {
                Ok(sink) => sink,
                Err(e) => {
                    log::warn!("Could not open a sound channel: {e}");
                    return false;
                }
            };
            sink.set_volume(buffer.volume);
            if looped {
                sink.append(buffer.source().repeat_infinite());
            } else {
                sink.append(buffer.source());
            }
            match self.channels.get_mut(channel.0) {
                Some(slot) => {
                    *slot = Some(sink);
                    true
                }
                None => false,
            }
        }

        fn start_music(&mut self, looped: bool) -> Result<(), AudioError> {
            let Some(song) = &self.song else {
                return Ok(());
            };
            let reader = Self::open(&song.path)?;
            let sink = Sink::try_new(&self.handle).map_err(|_| AudioError::NoDevice)?;
            sink.set_volume(song.volume);
            if looped {
                sink.append(Decoder::new_looped(reader).map_err(|e| Self::decode_error(&song.path, e))?);
            } else {
                sink.append(Decoder::new(reader).map_err(|e| Self::decode_error(&song.path, e))?);
            }
            self.music = Some(sink);
            Ok(())
        }
    }

    impl AudioBackend for SoundEngine {
        // ── Sounds ──

        fn load(&mut self, path: &Path) -> Result<SoundHandle, AudioError> {
            let decoder = Decoder::new(Self::open(path)?).map_err(|e| Self::decode_error(path, e))?;
            let channels = decoder.channels();
            let sample_rate = decoder.sample_rate();
            let samples: Vec<i16> = decoder.collect();

            let handle = SoundHandle(self.next_handle);
            self.next_handle += 1;
            self.buffers.insert(handle, Buffer { samples, channels, sample_rate, volume: 1.0 });
            Ok(handle)
        }

        fn release(&mut self, handle: SoundHandle) {
            self.buffers.remove(&handle);
        }

        fn set_volume(&mut self, handle: SoundHandle, volume: f32) {
            if let Some(buffer) = self.buffers.get_mut(&handle) {
                buffer.volume = volume.clamp(0.0, 1.0);
            }
        }

        fn length(&self, handle: SoundHandle) -> Duration {
            self.buffers.get(&handle).map_or(Duration::ZERO, Buffer::duration)
        }

        // ── Channels ──

        fn reserve_channels(&mut self, count: usize) {
            self.reserved = count.min(self.channels.len());
        }

        fn find_free_channel(&self) -> Option<ChannelId> {
            (self.reserved..self.channels.len())
                .map(ChannelId)
                .find(|&ch| !self.is_busy(ch))
        }

        fn play(&mut self, handle: SoundHandle, looped: bool) -> Option<ChannelId> {
            let channel = self.find_free_channel()?;
            self.start(channel, handle, looped).then_some(channel)
        }

        fn play_on(&mut self, channel: ChannelId, handle: SoundHandle) {
            if self.start(channel, handle, false) && channel.0 < self.reserved {
                self.effect_pending = true;
            }
        }

        fn is_busy(&self, channel: ChannelId) -> bool {
            self.sink(channel).map_or(false, |s| !s.empty())
        }

        fn pause_channel(&mut self, channel: ChannelId) {
            if let Some(sink) = self.sink(channel) {
                sink.pause();
            }
        }

        fn unpause_channel(&mut self, channel: ChannelId) {
            if let Some(sink) = self.sink(channel) {
                sink.play();
            }
        }

        fn stop_channel(&mut self, channel: ChannelId) {
            if let Some(slot) = self.channels.get_mut(channel.0) {
                if let Some(sink) = slot.take() {
                    sink.stop();
                }
            }
            if channel.0 < self.reserved {
                self.effect_pending = false;
            }
        }

        fn pause_all(&mut self) {
            for sink in self.channels.iter().flatten() {
                sink.pause();
            }
        }

        fn unpause_all(&mut self) {
            for sink in self.channels.iter().flatten() {
                sink.play();
            }
        }

        fn stop_unreserved(&mut self) {
            for slot in self.channels.iter_mut().skip(self.reserved) {
                if let Some(sink) = slot.take() {
                    sink.stop();
                }
            }
        }

        // ── Music ──

        fn load_music(&mut self, path: &Path, volume: f32) -> Result<(), AudioError> {
            self.stop_music();
            Self::open(path)?;
            self.song = Some(Song { path: path.to_path_buf(), volume: volume.clamp(0.0, 1.0) });
            Ok(())
        }

        fn play_music(&mut self, looped: bool) {
            if let Some(sink) = self.music.take() {
                sink.stop();
            }
            if let Err(e) = self.start_music(looped) {
                log::warn!("{e}");
            }
        }

        fn pause_music(&mut self) {
            if let Some(sink) = &self.music {
                sink.pause();
            }
        }

        fn unpause_music(&mut self) {
            if let Some(sink) = &self.music {
                sink.play();
            }
        }

        fn stop_music(&mut self) {
            if let Some(sink) = self.music.take() {
                sink.stop();
            }
        }

        // ── Notifications ──

        fn poll_events(&mut self) -> Vec<AudioEvent> {
            let mut events = Vec::new();
            if self.music.as_ref().map_or(false, Sink::empty) {
                self.music = None;
                events.push(AudioEvent::SongFinished);
            }
            if self.effect_pending && (0..self.reserved).all(|i| !self.is_busy(ChannelId(i))) {
                self.effect_pending = false;
                events.push(AudioEvent::EffectFinished);
            }
            events
        }
    }
}

#[cfg(feature = "sound")]
pub use inner::SoundEngine;

// ════════════════════════════════════════════════════════════
//  Silent engine, used when the sound feature is off
// ════════════════════════════════════════════════════════════

#[cfg(not(feature = "sound"))]
mod silent {
    use std::path::Path;
    use std::time::Duration;

    use crate::error::AudioError;
    use crate::sim::audio::{AudioBackend, AudioEvent, ChannelId, SoundHandle};

    /// Accepts every command; every sound ends the moment it starts.
    pub struct SoundEngine {
        channels: usize,
        reserved: usize,
        next_handle: u32,
        effect_started: bool,
    }

    impl SoundEngine {
        pub fn new(channel_count: usize) -> Result<Self, AudioError> {
            Ok(SoundEngine { channels: channel_count, reserved: 0, next_handle: 1, effect_started: false })
        }
    }

    impl AudioBackend for SoundEngine {
        fn load(&mut self, path: &Path) -> Result<SoundHandle, AudioError> {
            if !path.is_file() {
                return Err(AudioError::Open {
                    path: path.to_path_buf(),
                    source: std::io::Error::from(std::io::ErrorKind::NotFound),
                });
            }
            self.next_handle += 1;
            Ok(SoundHandle(self.next_handle))
        }
        fn release(&mut self, _handle: SoundHandle) {}
        fn set_volume(&mut self, _handle: SoundHandle, _volume: f32) {}
        fn length(&self, _handle: SoundHandle) -> Duration { Duration::ZERO }

        fn reserve_channels(&mut self, count: usize) { self.reserved = count.min(self.channels); }
        fn find_free_channel(&self) -> Option<ChannelId> {
            (self.reserved < self.channels).then_some(ChannelId(self.reserved))
        }
        fn play(&mut self, _handle: SoundHandle, _looped: bool) -> Option<ChannelId> {
            self.find_free_channel()
        }
        fn play_on(&mut self, channel: ChannelId, _handle: SoundHandle) {
            self.effect_started |= channel.0 < self.reserved;
        }
        fn is_busy(&self, _channel: ChannelId) -> bool { false }
        fn pause_channel(&mut self, _channel: ChannelId) {}
        fn unpause_channel(&mut self, _channel: ChannelId) {}
        fn stop_channel(&mut self, _channel: ChannelId) {}
        fn pause_all(&mut self) {}
        fn unpause_all(&mut self) {}
        fn stop_unreserved(&mut self) {}

        fn load_music(&mut self, _path: &Path, _volume: f32) -> Result<(), AudioError> { Ok(()) }
        fn play_music(&mut self, _looped: bool) {}
        fn pause_music(&mut self) {}
        fn unpause_music(&mut self) {}
        fn stop_music(&mut self) {}

        fn poll_events(&mut self) -> Vec<AudioEvent> {
            if std::mem::take(&mut self.effect_started) {
                vec![AudioEvent::EffectFinished]
            } else {
                Vec::new()
            }
        }
    }
}

#[cfg(not(feature = "sound"))]
pub use silent::SoundEngine;
