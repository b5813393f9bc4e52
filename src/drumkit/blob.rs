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
//! Decoder for the binary drumkit layout.
//!
//! A kit is a 12 byte header followed by 128 fixed size instruments. Every
//! instrument carries up to 16 velocity layers whose sample data lives at byte
//! offsets relative to the start of the blob.

use std::fmt;
use std::sync::Arc;

use tracing::warn;

use super::error::DrumkitError;
use crate::mixer::{SampleData, SampleFormat};

/// Number of instruments in a kit, one per MIDI note.
pub const INSTRUMENT_COUNT: usize = 128;

/// Maximum number of velocity layers per instrument.
pub const MAX_LAYERS: usize = 16;

const HEADER_SIZE: usize = 12;
const LAYER_SIZE: usize = 28;
const INSTRUMENT_HEADER_SIZE: usize = 20;
const INSTRUMENT_SIZE: usize = INSTRUMENT_HEADER_SIZE + MAX_LAYERS * LAYER_SIZE;

/// Minimum size of a valid blob.
pub const TABLE_SIZE: usize = HEADER_SIZE + INSTRUMENT_COUNT * INSTRUMENT_SIZE;

/// Kit header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KitHeader {
    pub file_type: [u8; 4],
    pub version: u8,
    pub revision: u8,
    pub build: u16,
    pub crc: u32,
}

impl fmt::Display for KitHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} v{}.{}.{}",
            String::from_utf8_lossy(&self.file_type),
            self.version,
            self.revision,
            self.build
        )
    }
}

/// One velocity layer of an instrument.
#[derive(Clone, Debug)]
pub struct VelocityLayer {
    /// Lowest velocity that selects this layer.
    pub lower_bound: u8,
    pub sample_rate: u32,
    pub sample: SampleData,
}

/// A playable instrument.
#[derive(Clone, Debug)]
pub struct Instrument {
    pub choke_group: u32,
    /// Maximum simultaneous voices. Zero is unlimited.
    pub polyphony: u32,
    /// Instrument gain, 1..=100.
    pub volume: u32,
    pub fill_choke_group: u32,
    /// Fill choke delay code, 0..=2.
    pub fill_choke_delay: u8,
    pub non_percussive: bool,
    /// Ordered by ascending lower bound.
    pub layers: Vec<VelocityLayer>,
}

/// The decoded instrument table.
#[derive(Clone, Debug)]
pub struct Drumkit {
    pub header: KitHeader,
    instruments: Vec<Option<Instrument>>,
}

/// Little endian reader over a byte slice. Callers check bounds up front.
struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8], pos: usize) -> Self {
        Self { bytes, pos }
    }

    fn u8(&mut self) -> u8 {
        let value = self.bytes[self.pos];
        self.pos += 1;
        value
    }

    fn u16(&mut self) -> u16 {
        let value = u16::from_le_bytes([self.bytes[self.pos], self.bytes[self.pos + 1]]);
        self.pos += 2;
        value
    }

    fn u32(&mut self) -> u32 {
        let mut word = [0u8; 4];
        word.copy_from_slice(&self.bytes[self.pos..self.pos + 4]);
        self.pos += 4;
        u32::from_le_bytes(word)
    }
}

impl Drumkit {
    /// Decodes a drumkit blob.
    ///
    /// Only a truncated table or an unreadable header fail the whole kit.
    /// Instruments with bad layers are left inactive.
    pub fn decode(blob: Vec<u8>) -> Result<Drumkit, DrumkitError> {
        if blob.len() < TABLE_SIZE {
            return Err(DrumkitError::Truncated {
                needed: TABLE_SIZE,
                actual: blob.len(),
            });
        }

        let mut reader = Reader::new(&blob, 0);
        let mut file_type = [0u8; 4];
        for byte in file_type.iter_mut() {
            *byte = reader.u8();
        }
        if !file_type.iter().all(|b| b.is_ascii_alphanumeric()) {
            return Err(DrumkitError::BadMagic(file_type));
        }
        let header = KitHeader {
            file_type,
            version: reader.u8(),
            revision: reader.u8(),
            build: reader.u16(),
            crc: reader.u32(),
        };

        let blob: Arc<[u8]> = blob.into();
        let instruments = (0..INSTRUMENT_COUNT)
            .map(|note| {
                let offset = HEADER_SIZE + note * INSTRUMENT_SIZE;
                match decode_instrument(&blob, offset) {
                    Ok(instrument) => instrument,
                    Err(reason) => {
                        warn!(note, %reason, "Skipping malformed instrument");
                        None
                    }
                }
            })
            .collect();

        Ok(Drumkit {
            header,
            instruments,
        })
    }

    /// The instrument for `note`, if it is active.
    pub fn instrument(&self, note: u8) -> Option<&Instrument> {
        self.instruments.get(note as usize).and_then(Option::as_ref)
    }

    /// Active instruments with their notes.
    pub fn instruments(&self) -> impl Iterator<Item = (u8, &Instrument)> {
        self.instruments
            .iter()
            .enumerate()
            .filter_map(|(note, instrument)| instrument.as_ref().map(|i| (note as u8, i)))
    }
}

fn decode_instrument(blob: &Arc<[u8]>, offset: usize) -> Result<Option<Instrument>, String> {
    let mut reader = Reader::new(blob, offset);
    let choke_group = u32::from(reader.u16());
    let polyphony = u32::from(reader.u16());
    let layer_count = reader.u32();
    let _data_size = reader.u32();
    let volume = reader.u8();
    let fill_choke_group = u32::from(reader.u8());
    let fill_choke_delay = reader.u8();
    let non_percussive = reader.u8() > 0;
    let _reserved = reader.u32();

    if layer_count == 0 {
        return Ok(None);
    }

    let volume = match volume {
        0 => 100,
        v => u32::from(v.min(100)),
    };

    let layer_count = (layer_count as usize).min(MAX_LAYERS);
    let mut layers = Vec::with_capacity(layer_count);
    for index in 0..layer_count {
        let mut reader = Reader::new(blob, offset + INSTRUMENT_HEADER_SIZE + index * LAYER_SIZE);
        let bits_per_sample = reader.u16();
        let channels = reader.u16();
        let sample_rate = reader.u32();
        let lower_bound = reader.u32();
        let values = reader.u32();
        let _ = (reader.u32(), reader.u32());
        let data_offset = reader.u32();

        let format = SampleFormat::from_layout(bits_per_sample, channels).ok_or_else(|| {
            format!("layer {index} has unsupported format {bits_per_sample}-bit/{channels}ch")
        })?;
        let sample = SampleData::new(blob.clone(), data_offset as usize, values as usize, format)
            .ok_or_else(|| format!("layer {index} points outside the blob"))?;
        if layers
            .last()
            .is_some_and(|last: &VelocityLayer| u32::from(last.lower_bound) > lower_bound)
        {
            return Err(format!("layer {index} is out of velocity order"));
        }
        layers.push(VelocityLayer {
            lower_bound: lower_bound.min(127) as u8,
            sample_rate,
            sample,
        });
    }

    Ok(Some(Instrument {
        choke_group,
        polyphony,
        volume,
        fill_choke_group,
        fill_choke_delay: fill_choke_delay.min(2),
        non_percussive,
        layers,
    }))
}
