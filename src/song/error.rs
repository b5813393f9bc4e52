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
use std::io;
use std::path::PathBuf;

/// Reasons a song is rejected before playback.
#[derive(Debug, thiserror::Error)]
pub enum SongError {
    #[error("unable to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid song description: {0}")]
    Yaml(#[from] serde_yml::Error),
    #[error("invalid MIDI file: {0}")]
    Midi(#[from] midly::Error),
    #[error("MIDI file timing must be metrical with a non-zero resolution")]
    MidiTiming,
    #[error("invalid time signature {0}")]
    TimeSignature(String),
    #[error("track {0} has no events")]
    EmptyTrack(String),
    #[error("track {name} has a length of {ticks} ticks")]
    TrackLength { name: String, ticks: i32 },
    #[error("part {part} has no main loop")]
    MissingMainLoop { part: usize },
    #[error("part {part} has {count} drum fills, the maximum is {max}")]
    TooManyDrumFills {
        part: usize,
        count: usize,
        max: usize,
    },
    #[error("{role} refers to track {index} but the song has {count} tracks")]
    TrackIndex {
        role: String,
        index: usize,
        count: usize,
    },
    #[error("a song needs between 1 and {max} parts, found {count}")]
    PartCount { count: usize, max: usize },
    #[error("bpm {0} is out of range")]
    Tempo(u32),
}
