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
//! Songs: tracks arranged into an intro, parts and an outro.

mod autopilot;
mod error;
mod file;
mod midi;
mod track;

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

pub use autopilot::{Autopilot, PartTiming, Slot, AUTOPILOT_OFF_FLAG};
pub use error::SongError;
pub use midi::{import_midi, ImportedTrack};
pub use track::{Event, TimeSignature, Track, TICKS_PER_QUARTER};

/// Largest number of parts in a song.
pub const MAX_PARTS: usize = 32;

/// Largest number of drum fills in a part.
pub const MAX_DRUM_FILLS: usize = 8;

/// Default fraction of a bar after which requests wait for the following bar.
pub const DEFAULT_TRIGGER_FRACTION: f32 = 0.70;

const MIN_BPM: u32 = 40;
const MAX_BPM: u32 = 300;

/// One section of a song. Track fields are indices into the song's tracks.
#[derive(Clone, Debug, PartialEq)]
pub struct Part {
    pub main_loop: usize,
    pub transition_fill: Option<usize>,
    pub drum_fills: Vec<usize>,
    pub shuffle: bool,
    pub repeat: bool,
    pub tempo_delta: i32,
    pub time_signature: TimeSignature,
    pub loop_count: u32,
    /// WAV file played by the accent hit while this part is current.
    pub effect: Option<PathBuf>,
    pub effect_volume: u8,
}

impl Part {
    /// A part that only loops the given track.
    pub fn new(main_loop: usize) -> Part {
        Part {
            main_loop,
            transition_fill: None,
            drum_fills: Vec::new(),
            shuffle: false,
            repeat: false,
            tempo_delta: 0,
            time_signature: TimeSignature::COMMON,
            loop_count: 0,
            effect: None,
            effect_volume: 100,
        }
    }

    pub fn with_drum_fills(mut self, drum_fills: Vec<usize>) -> Part {
        self.drum_fills = drum_fills;
        self
    }

    pub fn with_transition_fill(mut self, transition_fill: usize) -> Part {
        self.transition_fill = Some(transition_fill);
        self
    }

    pub fn with_shuffle(mut self, shuffle: bool) -> Part {
        self.shuffle = shuffle;
        self
    }
}

/// A validated song ready for playback.
#[derive(Clone, Debug)]
pub struct Song {
    name: String,
    bpm: u32,
    loop_song: bool,
    tracks: Vec<Track>,
    intro: Option<usize>,
    outro: Option<usize>,
    parts: Vec<Part>,
    autopilot: Option<Autopilot>,
}

impl Song {
    pub fn builder(name: &str, bpm: u32) -> SongBuilder {
        SongBuilder {
            name: name.to_string(),
            bpm,
            loop_song: false,
            tracks: Vec::new(),
            intro: None,
            outro: None,
            parts: Vec::new(),
            autopilot: None,
            trigger_fraction: DEFAULT_TRIGGER_FRACTION,
        }
    }

    /// Loads a song description from disk. Relative MIDI and effect paths
    /// resolve against the file's directory.
    pub fn load(path: &Path, trigger_fraction: f32) -> Result<Song, SongError> {
        let text = std::fs::read_to_string(path).map_err(|source| SongError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        let song = file::parse(&text, base, trigger_fraction)?;
        info!(
            song = song.name(),
            path = %path.display(),
            parts = song.parts().len(),
            tracks = song.tracks().len(),
            "Song loaded"
        );
        Ok(song)
    }

    /// Parses a song description. Relative paths resolve against `base`.
    pub fn from_yaml(text: &str, base: &Path, trigger_fraction: f32) -> Result<Song, SongError> {
        file::parse(text, base, trigger_fraction)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bpm(&self) -> u32 {
        self.bpm
    }

    pub fn loop_song(&self) -> bool {
        self.loop_song
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// A track by index. Indices held by a validated song are always in range.
    pub fn track(&self, index: usize) -> &Track {
        &self.tracks[index]
    }

    pub fn intro(&self) -> Option<&Track> {
        self.intro.map(|index| &self.tracks[index])
    }

    pub fn outro(&self) -> Option<&Track> {
        self.outro.map(|index| &self.tracks[index])
    }

    pub fn intro_index(&self) -> Option<usize> {
        self.intro
    }

    pub fn outro_index(&self) -> Option<usize> {
        self.outro
    }

    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    pub fn part(&self, index: usize) -> Option<&Part> {
        self.parts.get(index)
    }

    pub fn autopilot(&self) -> Option<&Autopilot> {
        self.autopilot.as_ref()
    }
}

impl fmt::Display for Song {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} ({} bpm)", self.name, self.bpm)?;
        if let Some(intro) = self.intro() {
            writeln!(f, "  intro: {} ({} ticks)", intro.name(), intro.n_tick())?;
        }
        for (index, part) in self.parts.iter().enumerate() {
            let main = &self.tracks[part.main_loop];
            write!(
                f,
                "  part {}: {} {} ({} ticks), {} drum fills",
                index + 1,
                main.name(),
                main.time_signature(),
                main.n_tick(),
                part.drum_fills.len()
            )?;
            match part.transition_fill {
                Some(fill) => writeln!(f, ", transition {}", self.tracks[fill].name())?,
                None => writeln!(f, ", no transition")?,
            }
        }
        if let Some(outro) = self.outro() {
            writeln!(f, "  outro: {} ({} ticks)", outro.name(), outro.n_tick())?;
        }
        match &self.autopilot {
            Some(autopilot) if autopilot.is_enabled() => writeln!(f, "  autopilot: on"),
            Some(_) => writeln!(f, "  autopilot: off"),
            None => Ok(()),
        }
    }
}

/// Collects the pieces of a song and validates them.
pub struct SongBuilder {
    name: String,
    bpm: u32,
    loop_song: bool,
    tracks: Vec<Track>,
    intro: Option<usize>,
    outro: Option<usize>,
    parts: Vec<Part>,
    autopilot: Option<Autopilot>,
    trigger_fraction: f32,
}

impl SongBuilder {
    /// Adds a track and returns its index.
    pub fn track(&mut self, track: Track) -> usize {
        self.tracks.push(track);
        self.tracks.len() - 1
    }

    pub fn intro(&mut self, index: usize) -> &mut Self {
        self.intro = Some(index);
        self
    }

    pub fn outro(&mut self, index: usize) -> &mut Self {
        self.outro = Some(index);
        self
    }

    pub fn part(&mut self, part: Part) -> &mut Self {
        self.parts.push(part);
        self
    }

    pub fn loop_song(&mut self, loop_song: bool) -> &mut Self {
        self.loop_song = loop_song;
        self
    }

    pub fn autopilot(&mut self, autopilot: Autopilot) -> &mut Self {
        self.autopilot = Some(autopilot);
        self
    }

    pub fn trigger_fraction(&mut self, fraction: f32) -> &mut Self {
        self.trigger_fraction = fraction;
        self
    }

    /// Validates the structure and applies the load-time track adjustments.
    pub fn build(self) -> Result<Song, SongError> {
        if !(MIN_BPM..=MAX_BPM).contains(&self.bpm) {
            return Err(SongError::Tempo(self.bpm));
        }
        if self.parts.is_empty() || self.parts.len() > MAX_PARTS {
            return Err(SongError::PartCount {
                count: self.parts.len(),
                max: MAX_PARTS,
            });
        }

        let count = self.tracks.len();
        let check = |role: String, index: usize| {
            if index < count {
                Ok(())
            } else {
                Err(SongError::TrackIndex { role, index, count })
            }
        };
        if let Some(intro) = self.intro {
            check("intro".to_string(), intro)?;
        }
        if let Some(outro) = self.outro {
            check("outro".to_string(), outro)?;
        }
        for (number, part) in self.parts.iter().enumerate().map(|(i, p)| (i + 1, p)) {
            check(format!("part {} main loop", number), part.main_loop)?;
            if let Some(fill) = part.transition_fill {
                check(format!("part {} transition fill", number), fill)?;
            }
            if part.drum_fills.len() > MAX_DRUM_FILLS {
                return Err(SongError::TooManyDrumFills {
                    part: number,
                    count: part.drum_fills.len(),
                    max: MAX_DRUM_FILLS,
                });
            }
            for &fill in &part.drum_fills {
                check(format!("part {} drum fill", number), fill)?;
            }
            if part.transition_fill.is_none() {
                warn!(part = number, "Part has no transition fill");
            }
        }

        let mut tracks = self.tracks;
        for track in tracks.iter_mut() {
            track.set_trigger_fraction(self.trigger_fraction);
        }
        let mut main_loops: Vec<usize> = self.parts.iter().map(|part| part.main_loop).collect();
        main_loops.sort_unstable();
        main_loops.dedup();
        for index in main_loops {
            tracks[index].pad_to_bars();
        }

        let autopilot = match self.autopilot {
            Some(autopilot) if !autopilot.is_enabled() => {
                warn!(song = %self.name, "Autopilot table is switched off");
                Some(autopilot)
            }
            other => other,
        };

        Ok(Song {
            name: self.name,
            bpm: self.bpm,
            loop_song: self.loop_song,
            tracks,
            intro: self.intro,
            outro: self.outro,
            parts: self.parts,
            autopilot,
        })
    }
}
