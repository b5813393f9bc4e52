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
use std::collections::BTreeMap;
use std::io::Cursor;

use hound::{SampleFormat, WavSpec, WavWriter};

use crate::drumkit::INSTRUMENT_COUNT;

const HEADER_SIZE: usize = 12;
const INSTRUMENT_SIZE: usize = 468;
const LAYER_SIZE: usize = 28;

/// Value written into every generated sample.
pub const LAYER_VALUE: i16 = 1000;

#[derive(Clone, Default)]
pub struct InstrumentBuilder {
    choke_group: u16,
    polyphony: u16,
    volume: u8,
    fill_choke_group: u8,
    fill_choke_delay: u8,
    non_percussive: bool,
    /// (lower bound, stereo frames)
    layers: Vec<(u32, usize)>,
}

impl InstrumentBuilder {
    pub fn choke_group(mut self, group: u16) -> Self {
        self.choke_group = group;
        self
    }

    pub fn polyphony(mut self, limit: u16) -> Self {
        self.polyphony = limit;
        self
    }

    pub fn volume(mut self, volume: u8) -> Self {
        self.volume = volume;
        self
    }

    pub fn fill_choke(mut self, group: u8, delay_code: u8) -> Self {
        self.fill_choke_group = group;
        self.fill_choke_delay = delay_code;
        self
    }

    pub fn non_percussive(mut self) -> Self {
        self.non_percussive = true;
        self
    }

    /// Adds a 16-bit stereo layer of constant [`LAYER_VALUE`].
    pub fn layer(mut self, lower_bound: u32, frames: usize) -> Self {
        self.layers.push((lower_bound, frames));
        self
    }
}

/// Builds synthetic drumkit blobs.
#[derive(Default)]
pub struct KitBuilder {
    instruments: BTreeMap<u8, InstrumentBuilder>,
    offset_overrides: Vec<(u8, usize, u32)>,
}

impl KitBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn instrument<F>(mut self, note: u8, build: F) -> Self
    where
        F: FnOnce(InstrumentBuilder) -> InstrumentBuilder,
    {
        self.instruments
            .insert(note, build(InstrumentBuilder::default().volume(100)));
        self
    }

    /// Points a layer's data offset somewhere else.
    pub fn corrupt_layer_offset(&mut self, note: u8, layer: usize, offset: u32) {
        self.offset_overrides.push((note, layer, offset));
    }

    pub fn build(&self) -> Vec<u8> {
        let table = HEADER_SIZE + INSTRUMENT_COUNT * INSTRUMENT_SIZE;
        let mut blob = vec![0u8; table];
        blob[..4].copy_from_slice(b"DKIT");
        blob[4] = 1;
        blob[6..8].copy_from_slice(&1u16.to_le_bytes());

        for (&note, instrument) in &self.instruments {
            let base = HEADER_SIZE + note as usize * INSTRUMENT_SIZE;
            let put16 = |blob: &mut Vec<u8>, at: usize, value: u16| {
                blob[at..at + 2].copy_from_slice(&value.to_le_bytes())
            };
            let put32 = |blob: &mut Vec<u8>, at: usize, value: u32| {
                blob[at..at + 4].copy_from_slice(&value.to_le_bytes())
            };

            put16(&mut blob, base, instrument.choke_group);
            put16(&mut blob, base + 2, instrument.polyphony);
            put32(&mut blob, base + 4, instrument.layers.len() as u32);
            blob[base + 12] = instrument.volume;
            blob[base + 13] = instrument.fill_choke_group;
            blob[base + 14] = instrument.fill_choke_delay;
            blob[base + 15] = u8::from(instrument.non_percussive);

            let mut data_size = 0u32;
            for (index, &(lower_bound, frames)) in instrument.layers.iter().enumerate() {
                let layer = base + 20 + index * LAYER_SIZE;
                let mut offset = blob.len() as u32;
                if let Some(&(_, _, forced)) = self
                    .offset_overrides
                    .iter()
                    .find(|(n, l, _)| *n == note && *l == index)
                {
                    offset = forced;
                }
                let values = frames * 2;
                put16(&mut blob, layer, 16);
                put16(&mut blob, layer + 2, 2);
                put32(&mut blob, layer + 4, 44100);
                put32(&mut blob, layer + 8, lower_bound);
                put32(&mut blob, layer + 12, values as u32);
                put32(&mut blob, layer + 24, offset);
                for _ in 0..values {
                    blob.extend_from_slice(&LAYER_VALUE.to_le_bytes());
                }
                data_size += values as u32 * 2;
            }
            put32(&mut blob, base + 8, data_size);
        }
        blob
    }
}

/// Encodes integer PCM values as a WAV file in memory.
pub fn wav_bytes(sample_rate: u32, channels: u16, bits_per_sample: u16, values: &[i32]) -> Vec<u8> {
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(
            &mut cursor,
            WavSpec {
                channels,
                sample_rate,
                bits_per_sample,
                sample_format: SampleFormat::Int,
            },
        )
        .expect("wav writer");
        for &value in values {
            writer.write_sample(value).expect("write sample");
        }
        writer.finalize().expect("finalize wav");
    }
    cursor.into_inner()
}
