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
//! Beat-count timing table that triggers fills and transitions on its own.

use std::collections::BTreeMap;

use serde::Deserialize;

use super::MAX_DRUM_FILLS;

/// Flags value marking a table that is present but switched off.
pub const AUTOPILOT_OFF_FLAG: u32 = 2;

/// When a slot fires and for how long it plays, both in beats. A `play_at` of
/// 0 disables the slot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct Slot {
    #[serde(default)]
    pub play_at: u32,
    #[serde(default)]
    pub play_for: u32,
}

impl Slot {
    pub fn new(play_at: u32, play_for: u32) -> Slot {
        Slot { play_at, play_for }
    }

    pub fn is_enabled(&self) -> bool {
        self.play_at > 0
    }
}

/// Autopilot slots of one song part.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct PartTiming {
    #[serde(default)]
    pub main_loop: Slot,
    #[serde(default)]
    pub transition_fill: Slot,
    #[serde(default)]
    pub drum_fills: Vec<Slot>,
}

impl PartTiming {
    /// The slot of a drum fill. Missing slots are disabled.
    pub fn drum_fill(&self, index: usize) -> Slot {
        self.drum_fills.get(index).copied().unwrap_or_default()
    }

    /// Enabled drum fill indices keyed by the beat they play at. Only the
    /// first `fill_count` fills of the part are considered. When two fills
    /// share a beat the later one wins.
    pub fn fill_queue(&self, fill_count: usize) -> BTreeMap<u32, usize> {
        self.drum_fills
            .iter()
            .take(fill_count.min(MAX_DRUM_FILLS))
            .enumerate()
            .filter(|(_, slot)| slot.is_enabled())
            .map(|(index, slot)| (slot.play_at, index))
            .collect()
    }
}

/// The autopilot table of a song.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct Autopilot {
    #[serde(default)]
    pub flags: u32,
    #[serde(default)]
    pub parts: Vec<PartTiming>,
}

impl Autopilot {
    pub fn new(parts: Vec<PartTiming>) -> Autopilot {
        Autopilot { flags: 0, parts }
    }

    pub fn is_enabled(&self) -> bool {
        self.flags != AUTOPILOT_OFF_FLAG
    }

    pub fn part(&self, index: usize) -> Option<&PartTiming> {
        self.parts.get(index)
    }

    /// Main loop slot of a part. Parts beyond the table are disabled.
    pub fn main_loop(&self, part: usize) -> Slot {
        self.part(part).map(|timing| timing.main_loop).unwrap_or_default()
    }

    pub fn transition_fill(&self, part: usize) -> Slot {
        self.part(part)
            .map(|timing| timing.transition_fill)
            .unwrap_or_default()
    }

    pub fn drum_fill(&self, part: usize, index: usize) -> Slot {
        self.part(part)
            .map(|timing| timing.drum_fill(index))
            .unwrap_or_default()
    }

    /// See [`PartTiming::fill_queue`].
    pub fn fill_queue(&self, part: usize, fill_count: usize) -> BTreeMap<u32, usize> {
        self.part(part)
            .map(|timing| timing.fill_queue(fill_count))
            .unwrap_or_default()
    }
}
