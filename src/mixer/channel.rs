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
use std::fmt;
use std::sync::Arc;

use super::release::Release;

/// PCM layout of a sample.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SampleFormat {
    Pcm16Mono,
    Pcm16Stereo,
    Pcm24Mono,
    Pcm24Stereo,
}

impl SampleFormat {
    /// Resolves a format from bits per sample and channel count.
    pub fn from_layout(bits_per_sample: u16, channels: u16) -> Option<SampleFormat> {
        match (bits_per_sample, channels) {
            (16, 1) => Some(SampleFormat::Pcm16Mono),
            (16, 2) => Some(SampleFormat::Pcm16Stereo),
            (24, 1) => Some(SampleFormat::Pcm24Mono),
            (24, 2) => Some(SampleFormat::Pcm24Stereo),
            _ => None,
        }
    }

    /// Bytes per single PCM value.
    pub fn bytes_per_value(&self) -> usize {
        match self {
            SampleFormat::Pcm16Mono | SampleFormat::Pcm16Stereo => 2,
            SampleFormat::Pcm24Mono | SampleFormat::Pcm24Stereo => 3,
        }
    }

    /// Bytes consumed per output frame.
    pub fn frame_bytes(&self) -> i64 {
        match self {
            SampleFormat::Pcm16Stereo => 4,
            SampleFormat::Pcm16Mono => 2,
            SampleFormat::Pcm24Stereo => 6,
            SampleFormat::Pcm24Mono => 3,
        }
    }

    /// Byte distance between the left and right value of a frame. Mono feeds
    /// the same value to both sides.
    fn stereo_offset(&self) -> i64 {
        match self {
            SampleFormat::Pcm16Stereo => 2,
            SampleFormat::Pcm24Stereo => 3,
            SampleFormat::Pcm16Mono | SampleFormat::Pcm24Mono => 0,
        }
    }

    pub fn channels(&self) -> u16 {
        match self {
            SampleFormat::Pcm16Mono | SampleFormat::Pcm24Mono => 1,
            SampleFormat::Pcm16Stereo | SampleFormat::Pcm24Stereo => 2,
        }
    }

    pub fn bits_per_sample(&self) -> u16 {
        (self.bytes_per_value() * 8) as u16
    }
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-bit {}", self.bits_per_sample(), match self.channels() {
            1 => "mono",
            _ => "stereo",
        })
    }
}

/// A bounds-checked view of PCM data inside a shared buffer.
#[derive(Clone)]
pub struct SampleData {
    bytes: Arc<[u8]>,
    start: usize,
    values: usize,
    format: SampleFormat,
}

impl SampleData {
    /// Creates a view of `values` PCM values starting at `start`. Returns None
    /// when the view does not fit inside `bytes`.
    pub fn new(
        bytes: Arc<[u8]>,
        start: usize,
        values: usize,
        format: SampleFormat,
    ) -> Option<SampleData> {
        let len = values.checked_mul(format.bytes_per_value())?;
        let end = start.checked_add(len)?;
        if end > bytes.len() {
            return None;
        }
        Some(SampleData {
            bytes,
            start,
            values,
            format,
        })
    }

    /// Wraps an owned PCM buffer. Trailing bytes that do not make up a whole
    /// value are ignored.
    pub fn from_pcm(pcm: Vec<u8>, format: SampleFormat) -> SampleData {
        let values = pcm.len() / format.bytes_per_value();
        SampleData {
            bytes: pcm.into(),
            start: 0,
            values,
            format,
        }
    }

    pub fn format(&self) -> SampleFormat {
        self.format
    }

    /// Number of individual PCM values. Stereo counts left and right separately.
    pub fn value_count(&self) -> usize {
        self.values
    }

    /// Length of the sample data in bytes.
    pub fn byte_len(&self) -> i64 {
        (self.values * self.format.bytes_per_value()) as i64
    }

    /// Reads the value at the given byte index, scaled to 24 bits. Reads
    /// outside the sample return silence.
    #[inline]
    fn value_at(&self, index: i64) -> i64 {
        if index < 0 {
            return 0;
        }
        let index = self.start + index as usize;
        let bytes = &self.bytes[..];
        match self.format.bytes_per_value() {
            2 => match bytes.get(index..index + 2) {
                Some(b) => i64::from(i16::from_le_bytes([b[0], b[1]])) << 8,
                None => 0,
            },
            _ => match bytes.get(index..index + 3) {
                Some(b) => i64::from(i32::from_le_bytes([0, b[0], b[1], b[2]]) >> 8),
                None => 0,
            },
        }
    }
}

impl fmt::Debug for SampleData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SampleData")
            .field("start", &self.start)
            .field("values", &self.values)
            .field("format", &self.format)
            .finish()
    }
}

/// What a channel contributed to one output frame.
pub(super) enum Frame {
    /// The channel is finished.
    Done,
    /// The channel is still inside its trigger delay.
    Silent,
    /// Gain and release weighted left and right values.
    Sound(i64, i64),
}

/// One voice of the mixer pool.
#[derive(Clone, Debug, Default)]
pub(super) struct Channel {
    pub(super) sample: Option<SampleData>,
    pub(super) n_byte: i64,
    /// Negative while the trigger delay is counting down.
    pub(super) cursor: i64,
    pub(super) gain: i64,
    pub(super) sequence_id: u64,
    pub(super) choke_group: u32,
    pub(super) note: u32,
    pub(super) fill_choke_group: u32,
    /// In bytes of sample data.
    pub(super) fill_choke_delay: i64,
    pub(super) part_id: u32,
    pub(super) release: Release,
}

impl Channel {
    pub(super) fn is_active(&self) -> bool {
        self.cursor < self.n_byte
    }

    pub(super) fn frame_bytes(&self) -> i64 {
        self.sample
            .as_ref()
            .map(|sample| sample.format.frame_bytes())
            .unwrap_or(0)
    }

    /// Whether the sample would still be playing after `delay` frames.
    pub(super) fn reaches(&self, delay: u32) -> bool {
        self.cursor + i64::from(delay) * self.frame_bytes() <= self.n_byte
    }

    pub(super) fn free(&mut self) {
        self.n_byte = 0;
    }

    /// Produces the next frame and advances the cursor and release.
    #[inline]
    pub(super) fn next_frame(&mut self) -> Frame {
        if !self.is_active() {
            return Frame::Done;
        }
        let Some(sample) = &self.sample else {
            return Frame::Done;
        };
        let format = sample.format;
        if self.cursor < 0 {
            self.cursor += format.frame_bytes();
            return Frame::Silent;
        }

        let weight = self.release.coefficient() * self.gain;
        let left = weight * sample.value_at(self.cursor);
        let right = weight * sample.value_at(self.cursor + format.stereo_offset());
        self.cursor += format.frame_bytes();

        if self.release.advance() {
            self.free();
        }
        Frame::Sound(left, right)
    }
}
