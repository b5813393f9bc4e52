// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
//! Drumkit instrument table and note dispatch.
//!
//! The [`SoundManager`] turns a note and velocity into a mixer voice: it picks
//! the velocity layer, blends the gain, applies choke groups and fill choke
//! exclusion, and enforces the instrument's polyphony limit.

mod blob;
mod effect;
mod error;
mod gain;

use std::ops::RangeInclusive;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};

use crate::mixer::{Mixer, SampleData, VoiceRequest, SAMPLE_RATE};

pub use blob::{Drumkit, Instrument, KitHeader, VelocityLayer, INSTRUMENT_COUNT, MAX_LAYERS};
pub use effect::{decode_effect, load_effect};
pub use error::DrumkitError;
pub use gain::GainTable;

/// Number of special effect slots, one per song part.
pub const EFFECT_SLOTS: usize = 32;

/// Number of choke groups whose last note is tracked.
const TRACKED_CHOKE_GROUPS: usize = 16;

/// Linear gain applied per velocity step to special effects.
const EFFECT_GAIN_FACTOR: u32 = 10_000;

/// Note id used for special effect voices.
pub const EFFECT_NOTE: u32 = 128;

/// Fill choke window lengths, as divisions of a quarter note.
const FILL_CHOKE_DIVIDERS: [u32; 3] = [4, 8, 16];

/// Ticks per quarter note.
const TICKS_PER_QUARTER: u32 = 480;

/// A note to be played.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NoteTrigger {
    pub note: u8,
    pub velocity: u8,
    /// Seconds to wait before the note sounds.
    pub delay: f32,
    /// Seconds per tick at the current tempo.
    pub tick_ratio: f32,
    /// Musical role of the track that produced the note.
    pub part_id: u32,
    /// Whether the note is a pickup played ahead of its part.
    pub pickup: bool,
}

/// Dispatches notes from the active kit to the mixer.
pub struct SoundManager {
    kit: Option<Drumkit>,
    gains: GainTable,
    choke_notes: [Option<u8>; TRACKED_CHOKE_GROUPS],
    effects: Vec<Option<SampleData>>,
    rng: StdRng,
}

impl Default for SoundManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SoundManager {
    pub fn new() -> SoundManager {
        Self::with_rng(StdRng::from_entropy())
    }

    /// A sound manager whose round robin layer choice is reproducible.
    pub fn with_seed(seed: u64) -> SoundManager {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> SoundManager {
        SoundManager {
            kit: None,
            gains: GainTable::new(),
            choke_notes: [None; TRACKED_CHOKE_GROUPS],
            effects: vec![None; EFFECT_SLOTS],
            rng,
        }
    }

    /// Installs a decoded kit, replacing the previous one.
    pub fn set_kit(&mut self, kit: Drumkit) {
        info!(
            kit = %kit.header,
            instruments = kit.instruments().count(),
            "Drumkit loaded"
        );
        self.kit = Some(kit);
        self.choke_notes = [None; TRACKED_CHOKE_GROUPS];
    }

    /// Decodes and installs a kit blob.
    pub fn load_kit(&mut self, blob: Vec<u8>) -> Result<(), DrumkitError> {
        self.set_kit(Drumkit::decode(blob)?);
        Ok(())
    }

    pub fn kit(&self) -> Option<&Drumkit> {
        self.kit.as_ref()
    }

    /// Sets or clears the special effect for a part. Out of range slots are
    /// ignored.
    pub fn set_effect(&mut self, slot: usize, effect: Option<SampleData>) {
        if let Some(entry) = self.effects.get_mut(slot) {
            *entry = effect;
        }
    }

    /// Plays the special effect of a part.
    pub fn play_effect(&mut self, mixer: &mut Mixer, velocity: u8, slot: usize) -> Option<u64> {
        let sample = self.effects.get(slot)?.as_ref()?;
        let request = VoiceRequest::new(
            sample.clone(),
            u32::from(velocity) * EFFECT_GAIN_FACTOR,
            EFFECT_NOTE,
        );
        debug!(slot, velocity, "Special effect triggered");
        Some(mixer.allocate(request))
    }

    /// Fades out every voice playing `note`.
    pub fn remove_note(&mut self, mixer: &mut Mixer, note: u8) {
        mixer.remove_note(u32::from(note));
    }

    /// Plays a note from the kit. Returns the mixer sequence id when a voice
    /// was started.
    pub fn play_note(&mut self, mixer: &mut Mixer, trigger: NoteTrigger) -> Option<u64> {
        let kit = self.kit.as_ref()?;
        let note = trigger.note;
        let instrument = kit.instrument(note)?;
        let velocity = trigger.velocity.min(127);
        let delay = (trigger.delay * SAMPLE_RATE as f32) as u32;

        if velocity < 1 && instrument.non_percussive {
            mixer.choke_note(u32::from(note));
            return None;
        }

        let layers = &instrument.layers;
        let Some(group) = layer_group(layers, velocity) else {
            warn!(note, velocity, "No velocity layer for note");
            return None;
        };
        let top = match layers.get(group.end() + 1) {
            Some(next) => next.lower_bound - 1,
            None => 127,
        };
        let gain = self.gains.gain(top, velocity) * instrument.volume;
        let chosen = self.rng.gen_range(group);

        let choke_group = instrument.choke_group;
        if choke_group != 0 {
            match self.choke_notes.get_mut(choke_group as usize) {
                Some(last) if *last == Some(note) => {}
                Some(last) => {
                    mixer.choke_group(choke_group, delay);
                    *last = Some(note);
                }
                None => mixer.choke_group(choke_group, delay),
            }
        }

        let fill_choke_group = instrument.fill_choke_group;
        let fill_choke_delay = if fill_choke_group != 0 {
            // Zero delay triggers always sound.
            if mixer.should_exclude(fill_choke_group, trigger.part_id) && trigger.delay != 0.0 {
                debug!(note, part = trigger.part_id, "Note excluded by fill choke");
                return None;
            }
            let code = usize::from(instrument.fill_choke_delay.min(2));
            let window = SAMPLE_RATE * (TICKS_PER_QUARTER / FILL_CHOKE_DIVIDERS[code]);
            (window as f32 * trigger.tick_ratio) as u32
        } else {
            0
        };

        let layer = &layers[chosen];
        debug!(
            note,
            velocity,
            layer = chosen,
            gain,
            delay,
            pickup = trigger.pickup,
            "Note triggered"
        );
        let id = mixer.allocate(VoiceRequest {
            sample: layer.sample.clone(),
            gain,
            delay,
            choke_group,
            note: u32::from(note),
            fill_choke_group,
            fill_choke_delay,
            part_id: trigger.part_id,
        });
        mixer.limit_polyphony(u32::from(note), instrument.polyphony, delay);
        Some(id)
    }
}

/// Indices of the layers selected by `velocity`: every layer sharing the
/// highest lower bound that does not exceed it.
fn layer_group(layers: &[VelocityLayer], velocity: u8) -> Option<RangeInclusive<usize>> {
    let high = layers.iter().rposition(|l| l.lower_bound <= velocity)?;
    let bound = layers[high].lower_bound;
    let first = layers[..high]
        .iter()
        .rposition(|l| l.lower_bound != bound)
        .map_or(0, |index| index + 1);
    Some(first..=high)
}
