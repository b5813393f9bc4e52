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
//! Tick arithmetic shared by the song player.

use crate::drumkit::NoteTrigger;
use crate::song::Track;

use super::{PartRole, Voices};

/// Ticks after the end of a track during which trailing notes still sound.
pub const POST_EVENT_MAX_TICK: i32 = 200;

/// Granularity the intro pickup is rounded to.
pub(super) const INTRO_PICKUP_STEP: i32 = 20;

/// The bar at which a pending fill or outro starts.
///
/// A request at or before `trigger_limit` within its bar targets the next bar
/// line. A later request targets the bar line after that.
pub fn start_bar_sync_tick(position: i32, bar_length: i32, trigger_limit: i32) -> i32 {
    let bar = position.div_euclid(bar_length);
    if position.rem_euclid(bar_length) <= trigger_limit {
        (bar + 1) * bar_length
    } else {
        (bar + 2) * bar_length
    }
}

/// The bar line `play_for` bars after the bar containing `position`.
pub fn quit_sync_tick(position: i32, bar_length: i32, play_for: i32) -> i32 {
    (play_for + position.div_euclid(bar_length)) * bar_length
}

/// Rounds a pickup length up to a multiple of `step`.
pub fn round_up(length: i32, step: i32) -> i32 {
    if step <= 0 || length % step == 0 {
        length
    } else {
        (1 + length / step) * step
    }
}

/// Ticks to wait before previewing a track so that it ends on a bar line.
/// Returns -1 for an invalid bar length.
pub fn single_track_offset(n_tick: i32, bar_length: i32) -> i32 {
    if bar_length < 1 {
        return -1;
    }
    match n_tick.rem_euclid(bar_length) {
        0 => 0,
        rest => bar_length - rest,
    }
}

/// Sends every event of `track` with `start <= tick < end` to `voices`.
///
/// `cursor` remembers the position between calls and rewinds when `start`
/// moves backwards. Returns the tick of the next unplayed event, or None when
/// the track has nothing left after `start`.
#[allow(clippy::too_many_arguments)]
pub(super) fn play_range<V: Voices + ?Sized>(
    track: &Track,
    cursor: &mut usize,
    start: i32,
    end: i32,
    ratio: f32,
    manual_offset: i32,
    role: PartRole,
    voices: &mut V,
) -> Option<i32> {
    let events = track.events();
    let last = events.last()?;
    if *cursor >= events.len() {
        *cursor = events.len() - 1;
    }
    if start > last.tick {
        return None;
    }
    if start < events[*cursor].tick {
        *cursor = 0;
    }
    while events[*cursor].tick < start {
        *cursor += 1;
        if *cursor >= events.len() {
            return None;
        }
    }
    let pickup = start < 0;
    while events[*cursor].tick < end {
        let event = events[*cursor];
        voices.note(NoteTrigger {
            note: event.note,
            velocity: event.velocity,
            delay: ratio * (manual_offset + event.tick - start) as f32,
            tick_ratio: ratio,
            part_id: role.id(),
            pickup,
        });
        *cursor += 1;
        if *cursor >= events.len() {
            return None;
        }
    }
    Some(events[*cursor].tick)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::song::{Event, TimeSignature};

    #[derive(Default)]
    struct Notes(Vec<NoteTrigger>);

    impl Voices for Notes {
        fn note(&mut self, trigger: NoteTrigger) {
            self.0.push(trigger);
        }

        fn accent(&mut self, _velocity: u8, _part: usize) {}
    }

    #[test]
    fn test_start_bar_sync_tick() {
        let limit = 1440;
        assert_eq!(start_bar_sync_tick(1000, 1920, limit), 1920);
        assert_eq!(start_bar_sync_tick(1500, 1920, limit), 3840);
        assert_eq!(start_bar_sync_tick(1440, 1920, limit), 1920);
        assert_eq!(start_bar_sync_tick(0, 1920, limit), 1920);
        assert_eq!(start_bar_sync_tick(2000, 1920, limit), 3840);
        // A limit of a whole bar always targets the next bar line.
        assert_eq!(start_bar_sync_tick(1915, 1920, 1920), 1920);
    }

    #[test]
    fn test_quit_sync_tick() {
        assert_eq!(quit_sync_tick(100, 1920, 1), 1920);
        assert_eq!(quit_sync_tick(1920, 1920, 1), 3840);
        assert_eq!(quit_sync_tick(100, 1920, 3), 5760);
    }

    #[test]
    fn test_round_up() {
        assert_eq!(round_up(0, 5), 0);
        assert_eq!(round_up(240, 5), 240);
        assert_eq!(round_up(241, 5), 245);
        assert_eq!(round_up(30, 20), 40);
    }

    #[test]
    fn test_single_track_offset() {
        assert_eq!(single_track_offset(1920, 1920), 0);
        assert_eq!(single_track_offset(2400, 1920), 1440);
        assert_eq!(single_track_offset(480, 0), -1);
    }

    #[test]
    fn test_play_range() {
        let track = Track::new(
            "groove",
            vec![
                Event::new(-120, 49, 90),
                Event::new(0, 36, 100),
                Event::new(480, 38, 100),
                Event::new(960, 36, 100),
            ],
            1920,
            TimeSignature::COMMON,
        )
        .expect("valid track");
        let mut cursor = 0;
        let mut notes = Notes::default();

        let next = play_range(&track, &mut cursor, -200, 5, 0.01, 0, PartRole::Main, &mut notes);
        assert_eq!(next, Some(480));
        assert_eq!(notes.0.len(), 2);
        assert!(notes.0[0].pickup);
        assert!((notes.0[0].delay - 0.8).abs() < 1e-5);
        assert!((notes.0[1].delay - 2.0).abs() < 1e-5);
        assert_eq!(notes.0[1].part_id, 1);

        // Nothing between 5 and 480.
        let next = play_range(&track, &mut cursor, 5, 480, 0.01, 0, PartRole::Main, &mut notes);
        assert_eq!(next, Some(480));
        assert_eq!(notes.0.len(), 2);

        // Playing past the last event exhausts the track.
        let next = play_range(&track, &mut cursor, 480, 2000, 0.01, 0, PartRole::Main, &mut notes);
        assert_eq!(next, None);
        assert_eq!(notes.0.len(), 4);

        // Moving backwards rewinds.
        play_range(&track, &mut cursor, 0, 1, 0.01, 7, PartRole::DrumFill, &mut notes);
        assert_eq!(notes.0.len(), 5);
        assert_eq!(notes.0[4].note, 36);
        assert!((notes.0[4].delay - 0.07).abs() < 1e-5);
        assert_eq!(notes.0[4].part_id, 2);

        // After the last event nothing is played.
        assert_eq!(
            play_range(&track, &mut cursor, 1000, 1200, 0.01, 0, PartRole::Main, &mut notes),
            None
        );
        assert_eq!(notes.0.len(), 5);
    }
}
