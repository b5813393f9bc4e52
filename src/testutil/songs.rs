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
use crate::drumkit::NoteTrigger;
use crate::player::{PartRole, SongPlayer, Voices};
use crate::song::{Autopilot, Event, Part, Song, TimeSignature, Track};

/// Seconds per tick at 125 BPM.
pub const TICK_RATIO: f32 = 0.001;

/// Notes used by the generated tracks, one per role.
pub const MAIN_NOTE: u8 = 36;
pub const FILL_NOTE: u8 = 38;
pub const TRANSITION_NOTE: u8 = 40;
pub const INTRO_NOTE: u8 = 37;
pub const OUTRO_NOTE: u8 = 49;

/// A 4/4 track with one `note` per beat over `bars` bars.
pub fn beat_track(name: &str, note: u8, bars: i32) -> Track {
    let n_tick = bars * 1920;
    let events = (0..n_tick / 480)
        .map(|beat| Event::new(beat * 480, note, 100))
        .collect();
    Track::new(name, events, n_tick, TimeSignature::COMMON).expect("valid test track")
}

/// Options for a generated song. Every part loops a two bar main track.
#[derive(Clone)]
pub struct TestSong {
    pub parts: usize,
    pub intro: bool,
    pub outro: bool,
    pub drum_fills: usize,
    pub transition: bool,
    pub loop_song: bool,
    pub autopilot: Option<Autopilot>,
    /// Pickup ticks given to drum fills.
    pub fill_pickup: i32,
}

impl Default for TestSong {
    fn default() -> Self {
        TestSong {
            parts: 2,
            intro: true,
            outro: true,
            drum_fills: 2,
            transition: true,
            loop_song: false,
            autopilot: None,
            fill_pickup: 0,
        }
    }
}

impl TestSong {
    pub fn build(&self) -> Song {
        let mut builder = Song::builder("test", 125);
        if self.intro {
            let intro = builder.track(beat_track("intro", INTRO_NOTE, 1));
            builder.intro(intro);
        }
        if self.outro {
            let outro = builder.track(beat_track("outro", OUTRO_NOTE, 1));
            builder.outro(outro);
        }
        for index in 0..self.parts {
            let main = builder.track(beat_track(&format!("main {}", index), MAIN_NOTE, 2));
            let fills = (0..self.drum_fills)
                .map(|fill| {
                    let mut track = beat_track(&format!("fill {}", fill), FILL_NOTE, 1);
                    if self.fill_pickup > 0 {
                        let mut events = track.events().to_vec();
                        events.push(Event::new(-self.fill_pickup, FILL_NOTE, 90));
                        track = Track::new(track.name(), events, 1920, TimeSignature::COMMON)
                            .expect("valid fill");
                    }
                    builder.track(track)
                })
                .collect();
            let mut part = Part::new(main).with_drum_fills(fills);
            if self.transition {
                part = part.with_transition_fill(
                    builder.track(beat_track("transition", TRANSITION_NOTE, 1)),
                );
            }
            builder.part(part);
        }
        builder.loop_song(self.loop_song);
        if let Some(autopilot) = &self.autopilot {
            builder.autopilot(autopilot.clone());
        }
        builder.build().expect("valid test song")
    }
}

/// Records everything the player schedules.
#[derive(Default)]
pub struct Recorder {
    pub notes: Vec<NoteTrigger>,
    pub accents: Vec<(u8, usize)>,
}

impl Recorder {
    pub fn clear(&mut self) {
        self.notes.clear();
        self.accents.clear();
    }

    /// Notes recorded for a role.
    pub fn count(&self, role: PartRole) -> usize {
        self.notes.iter().filter(|n| n.part_id == role.id()).count()
    }

    /// Advances `player` by `ticks` in steps of five ticks.
    pub fn run(&mut self, player: &mut SongPlayer, ticks: i32) {
        for _ in 0..ticks / 5 {
            player.process(TICK_RATIO, 5, self);
        }
    }
}

impl Voices for Recorder {
    fn note(&mut self, trigger: NoteTrigger) {
        self.notes.push(trigger);
    }

    fn accent(&mut self, velocity: u8, part: usize) {
        self.accents.push((velocity, part));
    }
}
