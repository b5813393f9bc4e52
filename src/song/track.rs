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
use std::str::FromStr;

use serde::Deserialize;

use super::SongError;

/// Tick resolution every track is stored in.
pub const TICKS_PER_QUARTER: i32 = 480;

/// A note-on in a track. Ticks are relative to the start of the track and are
/// negative for pickup notes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Event {
    pub tick: i32,
    pub note: u8,
    pub velocity: u8,
}

impl Event {
    pub fn new(tick: i32, note: u8, velocity: u8) -> Event {
        Event {
            tick,
            note,
            velocity,
        }
    }
}

/// A musical time signature such as 6/8.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub struct TimeSignature {
    pub numerator: u8,
    pub denominator: u8,
}

impl TimeSignature {
    pub const COMMON: TimeSignature = TimeSignature {
        numerator: 4,
        denominator: 4,
    };

    pub fn new(numerator: u8, denominator: u8) -> Result<TimeSignature, SongError> {
        if numerator == 0 || denominator == 0 || denominator > 32 || !denominator.is_power_of_two() {
            return Err(SongError::TimeSignature(format!(
                "{}/{}",
                numerator, denominator
            )));
        }
        Ok(TimeSignature {
            numerator,
            denominator,
        })
    }

    /// Length of one beat in ticks.
    pub fn beat_length(&self) -> i32 {
        4 * TICKS_PER_QUARTER / i32::from(self.denominator)
    }

    /// Length of one bar in ticks.
    pub fn bar_length(&self) -> i32 {
        self.beat_length() * i32::from(self.numerator)
    }
}

impl Default for TimeSignature {
    fn default() -> Self {
        TimeSignature::COMMON
    }
}

impl fmt::Display for TimeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

impl FromStr for TimeSignature {
    type Err = SongError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || SongError::TimeSignature(s.to_string());
        let (numerator, denominator) = s.split_once('/').ok_or_else(invalid)?;
        let numerator = numerator.trim().parse().map_err(|_| invalid())?;
        let denominator = denominator.trim().parse().map_err(|_| invalid())?;
        TimeSignature::new(numerator, denominator)
    }
}

impl TryFrom<String> for TimeSignature {
    type Error = SongError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// An immutable sequence of note events with its timing metadata.
#[derive(Clone, Debug, PartialEq)]
pub struct Track {
    name: String,
    events: Vec<Event>,
    n_tick: i32,
    time_signature: TimeSignature,
    bar_length: i32,
    pickup_length: i32,
    trigger_position: i32,
}

impl Track {
    /// Creates a track. Events are ordered by tick; the pickup length is
    /// derived from a negative first event.
    pub fn new(
        name: &str,
        mut events: Vec<Event>,
        n_tick: i32,
        time_signature: TimeSignature,
    ) -> Result<Track, SongError> {
        if events.is_empty() {
            return Err(SongError::EmptyTrack(name.to_string()));
        }
        if n_tick <= 0 {
            return Err(SongError::TrackLength {
                name: name.to_string(),
                ticks: n_tick,
            });
        }
        events.sort_by_key(|event| event.tick);
        let pickup_length = (-events[0].tick).max(0);
        let bar_length = time_signature.bar_length();
        Ok(Track {
            name: name.to_string(),
            events,
            n_tick,
            time_signature,
            bar_length,
            pickup_length,
            trigger_position: bar_length,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Length of the track in ticks, pickup excluded.
    pub fn n_tick(&self) -> i32 {
        self.n_tick
    }

    pub fn time_signature(&self) -> TimeSignature {
        self.time_signature
    }

    pub fn bar_length(&self) -> i32 {
        self.bar_length
    }

    /// Ticks of pickup notes played ahead of the track start.
    pub fn pickup_length(&self) -> i32 {
        self.pickup_length
    }

    /// Position within a bar up to which a request still targets the
    /// upcoming bar.
    pub fn trigger_position(&self) -> i32 {
        self.trigger_position
    }

    pub(crate) fn set_trigger_fraction(&mut self, fraction: f32) {
        self.trigger_position = (fraction * self.bar_length as f32) as i32;
    }

    /// Pads the length up to a whole number of bars.
    pub(crate) fn pad_to_bars(&mut self) {
        let beat = self.time_signature.beat_length();
        let beats_per_bar = i32::from(self.time_signature.numerator);
        let partial = (self.n_tick / beat) % beats_per_bar;
        if partial != 0 {
            self.n_tick += (beats_per_bar - partial) * beat;
        }
    }
}
