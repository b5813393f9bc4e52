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
//! The YAML song description.

use std::path::Path;

use serde::Deserialize;

use super::{
    import_midi, Autopilot, Event, Part, Song, SongError, TimeSignature, Track,
};

#[derive(Deserialize)]
struct SongFile {
    name: String,
    bpm: u32,
    #[serde(default)]
    loop_song: bool,
    tracks: Vec<TrackFile>,
    intro: Option<usize>,
    outro: Option<usize>,
    parts: Vec<PartFile>,
    autopilot: Option<Autopilot>,
}

/// A track given inline as `[tick, note, velocity]` triples or read from a MIDI file.
#[derive(Deserialize)]
struct TrackFile {
    name: String,
    events: Option<Vec<(i32, u8, u8)>>,
    midi: Option<String>,
    /// Length in ticks. Defaults to the last event rounded up to a whole bar.
    ticks: Option<i32>,
    time_signature: Option<TimeSignature>,
    /// Ticks at the start of a MIDI file that are played as pickup notes.
    #[serde(default)]
    pickup: i32,
}

#[derive(Deserialize)]
struct PartFile {
    main_loop: Option<usize>,
    transition_fill: Option<usize>,
    #[serde(default)]
    drum_fills: Vec<usize>,
    #[serde(default)]
    shuffle: bool,
    #[serde(default)]
    repeat: bool,
    #[serde(default)]
    tempo_delta: i32,
    time_signature: Option<TimeSignature>,
    #[serde(default)]
    loop_count: u32,
    effect: Option<String>,
    effect_volume: Option<u8>,
}

pub(super) fn parse(text: &str, base: &Path, trigger_fraction: f32) -> Result<Song, SongError> {
    let file: SongFile = serde_yml::from_str(text)?;

    let mut builder = Song::builder(&file.name, file.bpm);
    builder.loop_song(file.loop_song).trigger_fraction(trigger_fraction);
    for track in file.tracks {
        builder.track(track.into_track(base)?);
    }
    if let Some(intro) = file.intro {
        builder.intro(intro);
    }
    if let Some(outro) = file.outro {
        builder.outro(outro);
    }
    for (index, part) in file.parts.into_iter().enumerate() {
        let main_loop = part
            .main_loop
            .ok_or(SongError::MissingMainLoop { part: index + 1 })?;
        builder.part(Part {
            main_loop,
            transition_fill: part.transition_fill,
            drum_fills: part.drum_fills,
            shuffle: part.shuffle,
            repeat: part.repeat,
            tempo_delta: part.tempo_delta,
            time_signature: part.time_signature.unwrap_or_default(),
            loop_count: part.loop_count,
            effect: part.effect.map(|effect| base.join(effect)),
            effect_volume: part.effect_volume.unwrap_or(100).min(100),
        });
    }
    if let Some(autopilot) = file.autopilot {
        builder.autopilot(autopilot);
    }
    builder.build()
}

impl TrackFile {
    fn into_track(self, base: &Path) -> Result<Track, SongError> {
        let (events, time_signature, length) = match (&self.midi, self.events) {
            (Some(midi), _) => {
                let path = base.join(midi);
                let bytes = std::fs::read(&path).map_err(|source| SongError::Io { path, source })?;
                let imported = import_midi(&bytes, self.pickup)?;
                (
                    imported.events,
                    self.time_signature.unwrap_or(imported.time_signature),
                    imported.length,
                )
            }
            (None, Some(events)) => {
                let events: Vec<Event> = events
                    .into_iter()
                    .map(|(tick, note, velocity)| Event::new(tick, note, velocity))
                    .collect();
                let length = events.iter().map(|e| e.tick + 1).max().unwrap_or(0);
                (events, self.time_signature.unwrap_or_default(), length)
            }
            (None, None) => return Err(SongError::EmptyTrack(self.name)),
        };

        let n_tick = match self.ticks {
            Some(ticks) => ticks,
            None => {
                let bar = time_signature.bar_length();
                ((length.max(1) + bar - 1) / bar) * bar
            }
        };
        Track::new(&self.name, events, n_tick, time_signature)
    }
}
