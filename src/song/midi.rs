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
//! Standard MIDI File import.

use midly::{MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};

use super::{Event, SongError, TimeSignature, TICKS_PER_QUARTER};

/// Note data read from a Standard MIDI File.
#[derive(Debug)]
pub struct ImportedTrack {
    pub events: Vec<Event>,
    /// The first time signature in the file, 4/4 when there is none.
    pub time_signature: TimeSignature,
    /// Tick of the last event in any track, pickup removed.
    pub length: i32,
}

/// Reads every note-on of every track, rescaled to 480 ticks per quarter.
/// `pickup` ticks at the start of the file are played ahead of the track.
pub fn import_midi(bytes: &[u8], pickup: i32) -> Result<ImportedTrack, SongError> {
    let smf = Smf::parse(bytes)?;
    let resolution = match smf.header.timing {
        Timing::Metrical(ticks) if ticks.as_int() > 0 => i64::from(ticks.as_int()),
        _ => return Err(SongError::MidiTiming),
    };
    let rescale = |tick: u64| (tick as i64 * i64::from(TICKS_PER_QUARTER) / resolution) as i32;

    let mut events = Vec::new();
    let mut time_signature = None;
    let mut end = 0u64;
    for track in smf.tracks.iter() {
        let mut tick = 0u64;
        for event in track.iter() {
            tick += u64::from(event.delta.as_int());
            match event.kind {
                TrackEventKind::Midi {
                    message: MidiMessage::NoteOn { key, vel },
                    ..
                } if vel.as_int() > 0 => {
                    events.push(Event::new(rescale(tick) - pickup, key.as_int(), vel.as_int()));
                }
                TrackEventKind::Meta(MetaMessage::TimeSignature(numerator, power, _, _))
                    if time_signature.is_none() =>
                {
                    let denominator = 1u8.checked_shl(u32::from(power)).unwrap_or(0);
                    time_signature = Some(TimeSignature::new(numerator, denominator)?);
                }
                _ => {}
            }
        }
        end = end.max(tick);
    }

    Ok(ImportedTrack {
        events,
        time_signature: time_signature.unwrap_or_default(),
        length: rescale(end) - pickup,
    })
}

#[cfg(test)]
mod tests {
    use midly::num::{u15, u28, u4, u7};
    use midly::{Format, Header, TrackEvent};

    use super::*;

    fn event(delta: u32, kind: TrackEventKind<'static>) -> TrackEvent<'static> {
        TrackEvent {
            delta: u28::new(delta),
            kind,
        }
    }

    fn note_on(delta: u32, key: u8, vel: u8) -> TrackEvent<'static> {
        event(
            delta,
            TrackEventKind::Midi {
                channel: u4::new(9),
                message: MidiMessage::NoteOn {
                    key: u7::new(key),
                    vel: u7::new(vel),
                },
            },
        )
    }

    fn smf_bytes(resolution: u16, events: Vec<TrackEvent<'static>>) -> Vec<u8> {
        let smf = Smf {
            header: Header::new(Format::SingleTrack, Timing::Metrical(u15::new(resolution))),
            tracks: vec![events],
        };
        let mut bytes = Vec::new();
        smf.write_std(&mut bytes).expect("write midi");
        bytes
    }

    #[test]
    fn test_import_rescales_ticks() {
        let bytes = smf_bytes(
            96,
            vec![
                event(0, TrackEventKind::Meta(MetaMessage::TimeSignature(3, 2, 24, 8))),
                note_on(0, 36, 100),
                note_on(96, 38, 0),
                note_on(0, 42, 80),
                event(192, TrackEventKind::Meta(MetaMessage::EndOfTrack)),
            ],
        );
        let imported = import_midi(&bytes, 0).expect("imports");
        assert_eq!(
            imported.events,
            vec![Event::new(0, 36, 100), Event::new(480, 42, 80)]
        );
        assert_eq!(imported.time_signature, TimeSignature::new(3, 4).expect("valid"));
        assert_eq!(imported.length, 1440);
    }

    #[test]
    fn test_import_pickup_shifts_events() {
        let bytes = smf_bytes(
            480,
            vec![
                note_on(0, 38, 90),
                note_on(240, 36, 100),
                event(1920, TrackEventKind::Meta(MetaMessage::EndOfTrack)),
            ],
        );
        let imported = import_midi(&bytes, 240).expect("imports");
        assert_eq!(imported.events[0], Event::new(-240, 38, 90));
        assert_eq!(imported.events[1], Event::new(0, 36, 100));
        assert_eq!(imported.time_signature, TimeSignature::COMMON);
        assert_eq!(imported.length, 1920);
    }

    #[test]
    fn test_import_rejects_garbage() {
        assert!(matches!(
            import_midi(b"not a midi file", 0),
            Err(SongError::Midi(_))
        ));
    }
}
