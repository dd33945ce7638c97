/// Global effects: one-shot sounds on the reserved channel.
///
/// At most one global effect sounds at a time. A second trigger while the
/// reserved channel is in use is rejected, never queued. Interrupting
/// effects pause the music and every one-shot theme sound; looped theme
/// sounds keep running underneath. Stopping an effect resumes the mixer
/// unless the player itself is paused.

use std::collections::BTreeMap;

use crate::domain::model::{Hotkey, MusicBox};
use crate::error::AudioError;
use crate::sim::audio::{AudioBackend, ChannelId, SoundHandle, EFFECT_CHANNEL};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum EffectState {
    Idle,
    PlayingNonInterrupting(Hotkey),
    PlayingInterrupting(Hotkey),
}

#[derive(Clone, Debug)]
struct LoadedEffect {
    name: String,
    handle: SoundHandle,
    interrupting: bool,
}

#[derive(Debug)]
pub struct GlobalEffectController {
    effects: BTreeMap<Hotkey, LoadedEffect>,
    state: EffectState,
}

impl GlobalEffectController {
    /// Reserve the effect channel and load every global effect of the box.
    pub fn load<B: AudioBackend>(music_box: &MusicBox, audio: &mut B) -> Result<Self, AudioError> {
        audio.reserve_channels(1);
        let mut effects = BTreeMap::new();
        for effect in music_box.global_effects() {
            let handle = audio.load(&effect.path)?;
            audio.set_volume(handle, effect.volume as f32);
            effects.insert(effect.key, LoadedEffect {
                name: effect.name.clone(),
                handle,
                interrupting: effect.interrupting,
            });
        }
        Ok(GlobalEffectController { effects, state: EffectState::Idle })
    }

    #[cfg(test)]
    pub fn state(&self) -> EffectState {
        self.state
    }

    pub fn active_key(&self) -> Option<Hotkey> {
        match self.state {
            EffectState::Idle => None,
            EffectState::PlayingNonInterrupting(k) | EffectState::PlayingInterrupting(k) => Some(k),
        }
    }

    pub fn is_interrupting(&self) -> bool {
        matches!(self.state, EffectState::PlayingInterrupting(_))
    }

    /// Start the effect bound to `key`. `one_shots` are the theme channels to
    /// pause if the effect interrupts. Returns false if the effect was not
    /// started.
    pub fn trigger<B: AudioBackend>(
        &mut self,
        key: Hotkey,
        audio: &mut B,
        one_shots: &[ChannelId],
    ) -> bool {
        let Some(effect) = self.effects.get(&key) else {
            return false;
        };

        if self.state != EffectState::Idle || audio.is_busy(EFFECT_CHANNEL) {
            match self.active_key() {
                Some(active) => log::debug!("Reserved channel is busy! Active key is {active}"),
                None => log::debug!("Reserved channel is busy!"),
            }
            return false;
        }

        if effect.interrupting {
            audio.pause_music();
            for &ch in one_shots {
                audio.pause_channel(ch);
            }
            self.state = EffectState::PlayingInterrupting(key);
        } else {
            self.state = EffectState::PlayingNonInterrupting(key);
        }

        audio.play_on(EFFECT_CHANNEL, effect.handle);
        log::debug!("Now playing {}", effect.name);
        true
    }

    /// Stop the active effect. `by_end_event` means the channel already ran
    /// out by itself. Returns false if nothing was active.
    pub fn stop<B: AudioBackend>(&mut self, by_end_event: bool, paused: bool, audio: &mut B) -> bool {
        if self.state == EffectState::Idle {
            return false;
        }
        self.state = EffectState::Idle;

        if !by_end_event {
            audio.stop_channel(EFFECT_CHANNEL);
        }
        if !paused {
            audio.unpause_music();
            audio.unpause_all();
        }
        log::debug!("Now stopping last global effect.");
        true
    }
}
