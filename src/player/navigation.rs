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
//! Moves between the sections of a song.

use tracing::{debug, info};

use super::state::Section;
use super::timing::{round_up, INTRO_PICKUP_STEP};
use super::{BeatCount, PlayerState, SongPlayer};

impl SongPlayer {
    /// Rewinds to the top of the song without starting it.
    pub(super) fn reset_position(&mut self) {
        self.part_index = 0;
        self.fill_queue();
        self.drum_fill_index = if self.autopilot.is_some() {
            self.next_queued_fill()
        } else {
            0
        };
        self.master_tick = 0;
        self.next_tick = 0;
        self.section = Section::None;
        self.state = if self.song.is_some() {
            PlayerState::Stopped
        } else {
            PlayerState::NoSongLoaded
        };
    }

    pub(super) fn reset_beats(&mut self) {
        self.beats.counter = 0;
    }

    /// The 1-based part requested by an external transition, if it exists.
    fn requested_part(&self) -> Option<usize> {
        match self.next_part {
            0 => None,
            part if part <= self.part_count() => Some(part - 1),
            _ => None,
        }
    }

    /// Picks the drum fill a freshly entered part starts with.
    fn enter_part_fill(&mut self) {
        if self.shuffle() {
            if self.drum_fill_count() > 0 {
                self.drum_fill_index = self.random_fill();
            }
        } else {
            self.drum_fill_index = self.first_fill();
        }
    }

    /// Moves on to the requested part or the one after the current part.
    pub(super) fn next_part(&mut self) {
        self.next_tick = 0;
        self.master_tick = 0;
        self.beats.counter = 0;
        self.flags.was_paused = false;
        self.sync.drum_fill_pickup = 0;

        let count = self.part_count();
        if count == 0 {
            self.stop_song();
            return;
        }
        // A pending pedal fill keeps the current part.
        if !self.flags.fill_pressed {
            self.part_index = match self.requested_part() {
                Some(part) => part,
                None => (self.part_index + 1) % count,
            };
        }
        self.next_part = 0;
        self.section = Section::Part;
        self.state = PlayerState::PlayingMain;
        self.enter_part_fill();
        debug!(part = self.part_index, "Next part");
    }

    /// Restarts the current part's main loop, optionally advancing to the
    /// next drum fill.
    pub(super) fn same_part(&mut self, next_fill: bool) {
        self.next_tick = 0;
        self.master_tick = 0;
        self.flags.was_paused = false;
        self.sync.drum_fill_pickup = 0;
        self.section = Section::Part;
        self.state = PlayerState::PlayingMain;

        if self.flags.fill_pressed {
            self.reset_beats();
            self.flags.fill_pressed = false;
            return;
        }
        let count = self.drum_fill_count();
        if next_fill && count > 0 {
            self.drum_fill_index = if self.shuffle() {
                self.random_fill()
            } else if self.autopilot.is_some() {
                self.next_queued_fill()
            } else {
                (self.drum_fill_index + 1) % count
            };
        }
    }

    /// Rewinds into the outro, used when pausing while the outro waits.
    pub(super) fn outro_part(&mut self) {
        self.next_tick = 0;
        self.master_tick = 0;
        self.beats.counter = 0;
        self.sync.part_stop = 0;
        self.sync.part_stop_pickup = 0;
        if self.song.as_ref().and_then(|song| song.outro_index()).is_some() {
            self.section = Section::Outro;
        }
    }

    /// Jumps straight into the outro, keeping the position within the bar.
    pub(super) fn swap_to_outro(&mut self) {
        self.drum_fill_index = 0;
        self.sync.part_stop = 0;
        self.sync.part_stop_pickup = 0;
        match self.outro_info() {
            Some(outro) => {
                self.section = Section::Outro;
                self.master_tick = self.master_tick.rem_euclid(outro.bar_length);
                self.state = PlayerState::Outro;
            }
            None => self.stop_song(),
        }
    }

    /// Enters the requested part, or the first one, skipping the intro.
    pub(super) fn first_part(&mut self) {
        self.next_tick = 0;
        self.master_tick = 0;
        self.flags.was_paused = false;
        self.beats.counter = 0;

        if self.part_count() == 0 {
            self.stop_song();
            return;
        }
        self.part_index = self.requested_part().unwrap_or(0);
        self.next_part = 0;
        self.section = Section::Part;
        if self.drum_fill_count() > 0 {
            self.enter_part_fill();
        }
        self.state = PlayerState::PlayingMain;
    }

    /// Starts the song from its intro, or from the first part without one.
    pub(super) fn intro_part(&mut self) {
        self.drum_fill_index = 0;
        self.master_tick = 0;
        self.flags.was_paused = false;
        self.part_index = 0;

        match self.intro_info() {
            Some(intro) => {
                self.state = PlayerState::Intro;
                self.section = Section::Intro;
                // Intro pickups start ahead of the first bar.
                self.master_tick = -round_up(intro.pickup_length, INTRO_PICKUP_STEP);
                if let Some(cursor) = self.cursors.get_mut(intro.index) {
                    *cursor = 0;
                }
            }
            None => {
                self.part_index = self.requested_part().unwrap_or(0);
                self.next_part = 0;
                self.section = Section::Part;
                self.enter_part_fill();
                self.state = PlayerState::PlayingMain;
            }
        }
        info!(state = %self.state, "Playback started");
    }

    /// Stops the song. A pedal fill still pending restarts the main loop
    /// instead.
    pub(super) fn stop_song(&mut self) {
        if self.flags.fill_pressed && self.flags.multi_taps == 0 {
            self.master_tick = 0;
            self.reset_beats();
            self.flags.fill_pressed = false;
            self.state = PlayerState::PlayingMain;
            return;
        }
        self.drum_fill_index = 0;
        self.part_index = 0;
        self.master_tick = 0;
        self.next_tick = 0;
        self.beats = BeatCount::default();
        self.next_part = 0;
        self.request = None;
        self.autopilot_action = false;
        self.section = Section::None;
        self.state = if self.song.is_some() {
            PlayerState::Stopped
        } else {
            PlayerState::NoSongLoaded
        };
        info!("Playback stopped");
    }
}
