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

use thiserror::Error;
use tracing::warn;

use crate::drumkit::{load_effect, Drumkit};
use crate::mixer::SampleData;
use crate::player::ButtonEvent;
use crate::song::{Song, Track};

/// Something the control thread wants the engine to do.
pub enum Command {
    Button(ButtonEvent),
    Start,
    Stop,
    Pause,
    DrumFill,
    Outro,
    /// Transition to a part, counted from 1. Zero quits a transition.
    Transition(usize),
    /// Tempo override in BPM. `None` follows the song.
    Tempo(Option<u32>),
    OutputLevel(f32),
    Kit(Box<Drumkit>),
    Song(Box<PreparedSong>),
    Preview(Box<Track>),
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Button(event) => write!(f, "Button({:?})", event),
            Command::Start => f.write_str("Start"),
            Command::Stop => f.write_str("Stop"),
            Command::Pause => f.write_str("Pause"),
            Command::DrumFill => f.write_str("DrumFill"),
            Command::Outro => f.write_str("Outro"),
            Command::Transition(part) => write!(f, "Transition({})", part),
            Command::Tempo(tempo) => write!(f, "Tempo({:?})", tempo),
            Command::OutputLevel(level) => write!(f, "OutputLevel({})", level),
            Command::Kit(kit) => write!(f, "Kit({})", kit.header),
            Command::Song(song) => write!(f, "Song({})", song.song.name()),
            Command::Preview(track) => write!(f, "Preview({})", track.name()),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown command \"{0}\"")]
pub struct UnknownCommand(pub String);

impl FromStr for Command {
    type Err = UnknownCommand;

    /// Parses the words accepted on the pedal console and in render scripts.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut words = s.split_whitespace();
        let command = match (words.next(), words.next(), words.next()) {
            (Some("press"), None, _) => Command::Button(ButtonEvent::PedalPress),
            (Some("release"), None, _) => Command::Button(ButtonEvent::PedalRelease),
            (Some("long"), None, _) => Command::Button(ButtonEvent::PedalLongPress),
            (Some("tap"), None, _) => Command::Button(ButtonEvent::PedalMultiTap),
            (Some("foot1"), None, _) => Command::Button(ButtonEvent::FootPrimary),
            (Some("foot2"), None, _) => Command::Button(ButtonEvent::FootSecondary),
            (Some("start"), None, _) => Command::Start,
            (Some("stop"), None, _) => Command::Stop,
            (Some("pause"), None, _) => Command::Pause,
            (Some("fill"), None, _) => Command::DrumFill,
            (Some("outro"), None, _) => Command::Outro,
            (Some("transition"), part, None) => match part.map(str::parse) {
                None => Command::Transition(0),
                Some(Ok(part)) => Command::Transition(part),
                Some(Err(_)) => return Err(UnknownCommand(s.trim().to_string())),
            },
            (Some("tempo"), Some(tempo), None) => match tempo {
                "song" => Command::Tempo(None),
                bpm => match bpm.parse() {
                    Ok(bpm) => Command::Tempo(Some(bpm)),
                    Err(_) => return Err(UnknownCommand(s.trim().to_string())),
                },
            },
            _ => return Err(UnknownCommand(s.trim().to_string())),
        };
        Ok(command)
    }
}

/// A song together with the special effects of its parts, decoded ahead of
/// time so that the engine thread never touches the disk.
pub struct PreparedSong {
    pub(super) song: Song,
    pub(super) effects: Vec<Option<SampleData>>,
}

impl PreparedSong {
    /// Loads the effect of every part. Effects that fail to load are left
    /// out.
    pub fn new(song: Song) -> PreparedSong {
        let effects = song
            .parts()
            .iter()
            .enumerate()
            .map(|(index, part)| {
                let path = part.effect.as_ref()?;
                match load_effect(path) {
                    Ok(sample) => Some(sample),
                    Err(e) => {
                        warn!(
                            part = index + 1,
                            path = %path.display(),
                            err = %e,
                            "Special effect not loaded"
                        );
                        None
                    }
                }
            })
            .collect();
        PreparedSong { song, effects }
    }

    /// Uses already decoded effects, one per part.
    pub fn with_effects(song: Song, effects: Vec<Option<SampleData>>) -> PreparedSong {
        PreparedSong { song, effects }
    }

    pub fn song(&self) -> &Song {
        &self.song
    }
}
