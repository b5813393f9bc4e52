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
//! Fixed-pool drum sample mixer.
//!
//! The mixer owns a pool of [`MAX_CHANNELS`] voices. Voices are triggered with
//! an optional delay in frames, can be choked by group or note, and are mixed
//! into interleaved 16-bit stereo at 44.1 kHz. Pool exhaustion is resolved by
//! stealing the oldest voice, which keeps sounding briefly as a fade tail.

mod channel;
mod release;

use std::collections::VecDeque;

use channel::{Channel, Frame};

pub use channel::{SampleData, SampleFormat};
pub use release::RELEASE_LENGTH;

/// Number of voices in the pool.
pub const MAX_CHANNELS: usize = 64;

/// Output sample rate in Hz.
pub const SAMPLE_RATE: u32 = 44_100;

/// Divider applied to the accumulated gain weighted values.
const MASTER_DIVIDER: i64 = 1_000_000_000;

/// Largest 24-bit magnitude before the final shift to 16 bits.
const MAX_VALUE: i64 = 8_388_607;

/// Length in frames of the fade applied to stolen or removed voices.
pub const QUICK_RELEASE_FRAMES: u32 = 35_280;

/// Everything needed to start a voice.
#[derive(Clone, Debug)]
pub struct VoiceRequest {
    pub sample: SampleData,
    /// Combined velocity and instrument gain.
    pub gain: u32,
    /// Frames to wait before the sample starts.
    pub delay: u32,
    pub choke_group: u32,
    pub note: u32,
    pub fill_choke_group: u32,
    /// Frames during which this voice excludes other parts in its fill choke group.
    pub fill_choke_delay: u32,
    pub part_id: u32,
}

impl VoiceRequest {
    /// A request with no delay, choke or fill-choke settings.
    pub fn new(sample: SampleData, gain: u32, note: u32) -> VoiceRequest {
        VoiceRequest {
            sample,
            gain,
            delay: 0,
            choke_group: 0,
            note,
            fill_choke_group: 0,
            fill_choke_delay: 0,
            part_id: 0,
        }
    }
}

/// Diagnostic snapshot of a sounding voice.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelInfo {
    pub sequence_id: u64,
    pub note: u32,
    pub choke_group: u32,
    pub part_id: u32,
    pub gain: u32,
    /// Byte position in the sample. Negative while delayed.
    pub cursor: i64,
    pub releasing: bool,
}

/// A stolen voice finishing under a linear ramp.
#[derive(Debug)]
struct FadeTail {
    channel: Channel,
    frame: u32,
}

impl FadeTail {
    /// Mixes the next frame of the tail. Returns false once the tail is done.
    #[inline]
    fn mix(&mut self, left: &mut i64, right: &mut i64) -> bool {
        if self.frame >= QUICK_RELEASE_FRAMES {
            return false;
        }
        match self.channel.next_frame() {
            Frame::Done => false,
            Frame::Silent => {
                self.frame += 1;
                true
            }
            Frame::Sound(l, r) => {
                // A loud voice times the ramp length does not fit in i64.
                let remaining = i128::from(QUICK_RELEASE_FRAMES - self.frame);
                let frames = i128::from(QUICK_RELEASE_FRAMES);
                *left += (remaining * i128::from(l) / frames) as i64;
                *right += (remaining * i128::from(r) / frames) as i64;
                self.frame += 1;
                true
            }
        }
    }
}

/// The channel mixer.
pub struct Mixer {
    channels: Vec<Channel>,
    tails: VecDeque<FadeTail>,
    /// Last sequence id handed out.
    sequence: u64,
    level: f32,
    left: Vec<i64>,
    right: Vec<i64>,
}

impl Default for Mixer {
    fn default() -> Self {
        Self::new()
    }
}

impl Mixer {
    pub fn new() -> Mixer {
        Mixer {
            channels: vec![Channel::default(); MAX_CHANNELS],
            tails: VecDeque::with_capacity(MAX_CHANNELS),
            sequence: 0,
            level: 1.0,
            left: Vec::new(),
            right: Vec::new(),
        }
    }

    /// Starts a voice and returns its sequence id.
    ///
    /// The first free slot is used. When every slot is busy the voice with the
    /// smallest sequence id is stolen and continues as a fade tail.
    pub fn allocate(&mut self, request: VoiceRequest) -> u64 {
        let index = match self.channels.iter().position(|c| !c.is_active()) {
            Some(index) => index,
            None => {
                let oldest = self
                    .channels
                    .iter()
                    .enumerate()
                    .min_by_key(|(_, c)| c.sequence_id)
                    .map(|(index, _)| index)
                    .unwrap_or(0);
                self.quick_release(oldest);
                oldest
            }
        };

        self.sequence += 1;
        let format = request.sample.format();
        let frame_bytes = format.frame_bytes();
        self.channels[index] = Channel {
            n_byte: request.sample.byte_len(),
            cursor: -(frame_bytes * i64::from(request.delay)),
            gain: i64::from(request.gain),
            sequence_id: self.sequence,
            choke_group: request.choke_group,
            note: request.note,
            fill_choke_group: request.fill_choke_group,
            fill_choke_delay: frame_bytes * i64::from(request.fill_choke_delay),
            part_id: request.part_id,
            release: Default::default(),
            sample: Some(request.sample),
        };
        self.sequence
    }

    /// Releases every voice in `group` that would still sound after `delay`
    /// frames and is not already releasing. Group 0 is "no group".
    pub fn choke_group(&mut self, group: u32, delay: u32) {
        if group == 0 {
            return;
        }
        for channel in self.channels.iter_mut() {
            if channel.choke_group == group
                && channel.is_active()
                && channel.reaches(delay)
                && !channel.release.is_active()
            {
                channel.release.start(delay);
            }
        }
    }

    /// Releases every voice playing `note` immediately.
    pub fn choke_note(&mut self, note: u32) {
        for channel in self.channels.iter_mut() {
            if channel.note == note && channel.is_active() && !channel.release.is_active() {
                channel.release.start(0);
            }
        }
    }

    /// Releases the oldest voices of `note` until at most `limit` remain
    /// unreleased. A limit of 0 means unlimited.
    pub fn limit_polyphony(&mut self, note: u32, limit: u32, delay: u32) {
        if limit == 0 {
            return;
        }
        let mut sounding: Vec<usize> = self
            .channels
            .iter()
            .enumerate()
            .filter(|(_, c)| c.note == note && c.is_active() && !c.release.is_active())
            .map(|(index, _)| index)
            .collect();
        let limit = limit as usize;
        if sounding.len() <= limit {
            return;
        }
        sounding.sort_by_key(|&index| self.channels[index].sequence_id);
        let excess = sounding.len() - limit;
        for &index in &sounding[..excess] {
            let channel = &mut self.channels[index];
            // A voice that ends before the delay runs out needs no release.
            if channel.reaches(delay) {
                channel.release.start(delay);
            }
        }
    }

    /// Whether a voice from another part is still inside its fill choke window
    /// for `fill_choke_group`.
    pub fn should_exclude(&self, fill_choke_group: u32, part_id: u32) -> bool {
        self.channels.iter().any(|c| {
            c.is_active()
                && c.fill_choke_group == fill_choke_group
                && c.part_id != part_id
                && c.cursor < c.fill_choke_delay
        })
    }

    /// Silences everything and restarts the sequence counter.
    pub fn remove_all(&mut self) {
        for channel in self.channels.iter_mut() {
            channel.free();
        }
        self.tails.clear();
        self.sequence = 0;
    }

    /// Fades out and frees every voice playing `note`.
    pub fn remove_note(&mut self, note: u32) {
        for index in 0..self.channels.len() {
            if self.channels[index].note == note && self.channels[index].is_active() {
                self.quick_release(index);
                self.channels[index].free();
            }
        }
    }

    /// Moves a copy of the voice into the fade tails.
    fn quick_release(&mut self, index: usize) {
        let channel = &self.channels[index];
        if !channel.is_active() {
            return;
        }
        if self.tails.len() >= MAX_CHANNELS {
            self.tails.pop_front();
        }
        self.tails.push_back(FadeTail {
            channel: channel.clone(),
            frame: 0,
        });
    }

    /// Sets the output level, clamped to 0..=1.
    pub fn set_output_level(&mut self, level: f32) {
        self.level = level.clamp(0.0, 1.0);
    }

    pub fn output_level(&self) -> f32 {
        self.level
    }

    /// Number of voices still sounding, fade tails excluded.
    pub fn active_count(&self) -> usize {
        self.channels.iter().filter(|c| c.is_active()).count()
    }

    /// Snapshot of the sounding voices ordered by sequence id.
    pub fn active_channels(&self) -> Vec<ChannelInfo> {
        let mut infos: Vec<ChannelInfo> = self
            .channels
            .iter()
            .filter(|c| c.is_active())
            .map(|c| ChannelInfo {
                sequence_id: c.sequence_id,
                note: c.note,
                choke_group: c.choke_group,
                part_id: c.part_id,
                gain: c.gain as u32,
                cursor: c.cursor,
                releasing: c.release.is_active(),
            })
            .collect();
        infos.sort_by_key(|info| info.sequence_id);
        infos
    }

    /// Mixes the next `out.len() / 2` frames into `out` as interleaved
    /// left/right 16-bit samples.
    pub fn render(&mut self, out: &mut [i16]) {
        let frames = out.len() / 2;
        self.left.clear();
        self.left.resize(frames, 0);
        self.right.clear();
        self.right.resize(frames, 0);

        for channel in self.channels.iter_mut() {
            for k in 0..frames {
                match channel.next_frame() {
                    Frame::Done => break,
                    Frame::Silent => {}
                    Frame::Sound(l, r) => {
                        self.left[k] += l;
                        self.right[k] += r;
                    }
                }
            }
        }

        for tail in self.tails.iter_mut() {
            for k in 0..frames {
                if !tail.mix(&mut self.left[k], &mut self.right[k]) {
                    tail.frame = QUICK_RELEASE_FRAMES;
                    break;
                }
            }
        }
        self.tails.retain(|tail| tail.frame < QUICK_RELEASE_FRAMES);

        for (k, frame) in out.chunks_exact_mut(2).enumerate() {
            frame[0] = self.to_pcm(self.left[k]);
            frame[1] = self.to_pcm(self.right[k]);
        }
        if out.len() % 2 == 1 {
            out[out.len() - 1] = 0;
        }
    }

    #[inline]
    fn to_pcm(&self, accumulated: i64) -> i16 {
        let value = (accumulated / MASTER_DIVIDER).clamp(-MAX_VALUE, MAX_VALUE);
        (((self.level * value as f32) as i32) >> 8) as i16
    }
}
