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
use super::*;
use crate::config::{ActivePause, FootswitchAction, UnpauseHold};
use crate::song::{Autopilot, PartTiming, Slot};
use crate::testutil::{beat_track, Recorder, TestSong, TICK_RATIO};

fn player(song: &TestSong) -> SongPlayer {
    let mut player = SongPlayer::with_seed(PedalConfig::default(), 7);
    player.load_song(song.build());
    player
}

fn tap(player: &mut SongPlayer, rec: &mut Recorder, time_ms: u64) {
    player.button(ButtonEvent::PedalPress, time_ms, rec);
    player.button(ButtonEvent::PedalRelease, time_ms + 50, rec);
}

/// Starts the song and plays through the one bar intro.
fn started(song: &TestSong) -> (SongPlayer, Recorder) {
    let mut player = player(song);
    let mut rec = Recorder::default();
    tap(&mut player, &mut rec, 0);
    rec.run(&mut player, 1920);
    (player, rec)
}

#[test]
fn test_no_song_loaded() {
    let mut player = SongPlayer::new(PedalConfig::default());
    let mut rec = Recorder::default();
    assert_eq!(player.state(), PlayerState::NoSongLoaded);
    assert_eq!(player.beat_in_bar(), -2);
    assert_eq!(player.tempo(), None);

    tap(&mut player, &mut rec, 0);
    player.button(ButtonEvent::FootPrimary, 100, &mut rec);
    rec.run(&mut player, 100);
    assert_eq!(player.state(), PlayerState::NoSongLoaded);
    assert_eq!(player.master_tick(), 100);
    assert!(rec.notes.is_empty());
    assert!(rec.accents.is_empty());
}

#[test]
fn test_loaded_song_is_stopped() {
    let player = player(&TestSong::default());
    assert_eq!(
        player.status(),
        PlayerStatus {
            state: PlayerState::Stopped,
            part_index: 0,
            drum_fill_index: 0,
        }
    );
    assert!(!player.is_playing());
    assert_eq!(player.beat_in_bar(), -2);
    assert_eq!(player.bar_length(), Some(1920));
    assert_eq!(player.tempo(), None);
}

#[test]
fn test_intro_leads_into_first_part() {
    let mut player = player(&TestSong::default());
    let mut rec = Recorder::default();
    tap(&mut player, &mut rec, 0);
    assert_eq!(player.pending_request(), Some(Request::Start));

    rec.run(&mut player, 5);
    assert_eq!(player.state(), PlayerState::Intro);
    assert_eq!(player.tempo(), Some(125));

    rec.run(&mut player, 1915);
    assert_eq!(player.status().state, PlayerState::PlayingMain);
    assert_eq!(player.status().part_index, 0);
    assert_eq!(rec.count(PartRole::Intro), 4);
    assert_eq!(rec.count(PartRole::Main), 0);

    rec.run(&mut player, 5);
    assert_eq!(rec.count(PartRole::Main), 1);
    assert_eq!(rec.notes.last().map(|n| n.part_id), Some(PartRole::Main.id()));
}

#[test]
fn test_song_without_intro_starts_main_loop() {
    let mut player = player(&TestSong {
        intro: false,
        ..Default::default()
    });
    let mut rec = Recorder::default();
    tap(&mut player, &mut rec, 0);
    rec.run(&mut player, 5);
    assert_eq!(player.state(), PlayerState::PlayingMain);
    assert_eq!(rec.count(PartRole::Main), 1);
    assert_eq!(rec.count(PartRole::Intro), 0);
}

#[test]
fn test_start_on_press() {
    let mut player = player(&TestSong::default());
    let mut rec = Recorder::default();
    let mut pedal = PedalConfig::default();
    pedal.start_on_press = true;
    player.set_pedal(pedal);

    player.button(ButtonEvent::PedalPress, 0, &mut rec);
    assert_eq!(player.pending_request(), Some(Request::Start));
    rec.run(&mut player, 5);
    assert_eq!(player.state(), PlayerState::Intro);

    // The release of the starting press does nothing.
    player.button(ButtonEvent::PedalRelease, 50, &mut rec);
    assert_eq!(player.pending_request(), None);
}

#[test]
fn test_main_loop_repeats() {
    let (mut player, mut rec) = started(&TestSong::default());
    rec.run(&mut player, 3840 * 2);
    assert_eq!(player.state(), PlayerState::PlayingMain);
    assert_eq!(rec.count(PartRole::Main), 16);
    assert_eq!(player.master_tick(), 0);
}

#[test]
fn test_drum_fill_waits_for_bar_line() {
    let (mut player, mut rec) = started(&TestSong::default());
    rec.run(&mut player, 1000);
    tap(&mut player, &mut rec, 5000);
    assert_eq!(player.pending_request(), Some(Request::DrumFill));

    rec.run(&mut player, 5);
    assert_eq!(player.state(), PlayerState::DrumFillWaiting);

    // The main loop keeps playing up to the bar line.
    rec.run(&mut player, 915);
    assert_eq!(player.state(), PlayerState::DrumFillWaiting);
    assert_eq!(player.master_tick(), 1920);
    assert_eq!(rec.count(PartRole::DrumFill), 0);

    rec.run(&mut player, 5);
    assert_eq!(player.state(), PlayerState::DrumFillActive);
    assert_eq!(rec.count(PartRole::DrumFill), 1);

    rec.run(&mut player, 1915);
    assert_eq!(player.state(), PlayerState::PlayingMain);
    assert_eq!(player.status().drum_fill_index, 1);
    assert_eq!(rec.count(PartRole::DrumFill), 4);
    assert_eq!(player.master_tick(), 0);
}

#[test]
fn test_late_drum_fill_request_waits_another_bar() {
    let (mut player, mut rec) = started(&TestSong::default());
    rec.run(&mut player, 1500);
    tap(&mut player, &mut rec, 5000);
    rec.run(&mut player, 5);
    assert_eq!(player.state(), PlayerState::DrumFillWaiting);

    rec.run(&mut player, 415);
    assert_eq!(player.master_tick(), 1920);
    rec.run(&mut player, 5);
    assert_eq!(player.state(), PlayerState::DrumFillWaiting);

    rec.run(&mut player, 1915);
    assert_eq!(player.state(), PlayerState::DrumFillWaiting);
    rec.run(&mut player, 5);
    assert_eq!(player.state(), PlayerState::DrumFillActive);
}

#[test]
fn test_drum_fill_pickup_is_played_first() {
    let (mut player, mut rec) = started(&TestSong {
        fill_pickup: 240,
        ..Default::default()
    });
    rec.run(&mut player, 1000);
    tap(&mut player, &mut rec, 5000);
    rec.run(&mut player, 925);
    assert_eq!(player.state(), PlayerState::DrumFillActive);

    let fills: Vec<_> = rec
        .notes
        .iter()
        .filter(|n| n.part_id == PartRole::DrumFill.id())
        .collect();
    assert_eq!(fills.len(), 1);
    assert!(fills[0].pickup);
    assert_eq!(fills[0].velocity, 90);

    rec.run(&mut player, 3840);
    assert_eq!(player.state(), PlayerState::PlayingMain);
    assert_eq!(rec.count(PartRole::DrumFill), 5);
}

#[test]
fn test_part_without_fills_ignores_fill_request() {
    let (mut player, mut rec) = started(&TestSong {
        drum_fills: 0,
        ..Default::default()
    });
    rec.run(&mut player, 100);
    tap(&mut player, &mut rec, 5000);
    rec.run(&mut player, 5);
    assert_eq!(player.state(), PlayerState::PlayingMain);
}

#[test]
fn test_transition_moves_to_next_part() {
    let (mut player, mut rec) = started(&TestSong::default());
    rec.run(&mut player, 500);
    player.button(ButtonEvent::PedalPress, 1000, &mut rec);
    player.button(ButtonEvent::PedalLongPress, 1800, &mut rec);
    assert_eq!(player.pending_request(), Some(Request::Transition));
    rec.run(&mut player, 5);
    assert_eq!(player.state(), PlayerState::TransitionWaiting);

    player.button(ButtonEvent::PedalRelease, 2000, &mut rec);
    rec.run(&mut player, 5);
    assert_eq!(player.state(), PlayerState::TransitionQuitting);

    rec.run(&mut player, 3325);
    assert_eq!(player.state(), PlayerState::TransitionQuitting);
    rec.run(&mut player, 5);
    assert_eq!(player.state(), PlayerState::PlayingMain);
    assert_eq!(player.status().part_index, 1);
    assert_eq!(rec.count(PartRole::Transition), 4);
}

#[test]
fn test_transition_fill_loops_while_held() {
    let (mut player, mut rec) = started(&TestSong::default());
    rec.run(&mut player, 100);
    player.button(ButtonEvent::PedalPress, 1000, &mut rec);
    player.button(ButtonEvent::PedalLongPress, 1800, &mut rec);
    rec.run(&mut player, 1825);
    assert_eq!(player.state(), PlayerState::TransitionActive);

    rec.run(&mut player, 1920 * 2);
    assert_eq!(player.state(), PlayerState::TransitionActive);
    assert_eq!(rec.count(PartRole::Transition), 9);
}

#[test]
fn test_transition_without_fill_loops_main() {
    let (mut player, mut rec) = started(&TestSong {
        transition: false,
        ..Default::default()
    });
    rec.run(&mut player, 100);
    player.button(ButtonEvent::PedalPress, 1000, &mut rec);
    player.button(ButtonEvent::PedalLongPress, 1800, &mut rec);
    rec.run(&mut player, 5);
    assert_eq!(player.state(), PlayerState::NoFillTransition);

    rec.run(&mut player, 3840);
    assert_eq!(player.state(), PlayerState::NoFillTransition);

    player.button(ButtonEvent::PedalRelease, 2000, &mut rec);
    rec.run(&mut player, 5);
    assert_eq!(player.state(), PlayerState::NoFillQuitting);
    rec.run(&mut player, 1920);
    assert_eq!(player.state(), PlayerState::PlayingMain);
    assert_eq!(player.status().part_index, 1);
}

#[test]
fn test_external_transition_to_part() {
    let mut player = player(&TestSong {
        parts: 3,
        ..Default::default()
    });
    let mut rec = Recorder::default();
    player.external_transition(3);
    assert_eq!(player.pending_request(), Some(Request::ExternalStart));
    rec.run(&mut player, 1920);
    assert_eq!(player.state(), PlayerState::PlayingMain);
    assert_eq!(player.status().part_index, 2);

    player.external_transition(2);
    rec.run(&mut player, 5);
    assert_eq!(player.state(), PlayerState::TransitionWaiting);
    player.external_transition(0);
    rec.run(&mut player, 3840);
    assert_eq!(player.state(), PlayerState::PlayingMain);
    assert_eq!(player.status().part_index, 1);
}

#[test]
fn test_stop_plays_outro() {
    let (mut player, mut rec) = started(&TestSong::default());
    rec.run(&mut player, 100);
    player.button(ButtonEvent::PedalMultiTap, 1000, &mut rec);
    assert_eq!(player.pending_request(), Some(Request::Stop));
    rec.run(&mut player, 5);
    assert_eq!(player.state(), PlayerState::OutroWaiting);

    rec.run(&mut player, 1820);
    assert_eq!(player.state(), PlayerState::Outro);
    rec.run(&mut player, 2000);
    assert_eq!(player.state(), PlayerState::Stopped);
    assert_eq!(rec.count(PartRole::Outro), 4);
    assert!(!player.is_playing());
    assert_eq!(player.beat_in_bar(), -2);
}

#[test]
fn test_outro_can_be_canceled() {
    let (mut player, mut rec) = started(&TestSong::default());
    player.button(ButtonEvent::PedalMultiTap, 1000, &mut rec);
    rec.run(&mut player, 5);
    assert_eq!(player.state(), PlayerState::OutroWaiting);

    player.button(ButtonEvent::PedalPress, 1500, &mut rec);
    rec.run(&mut player, 5);
    assert_eq!(player.state(), PlayerState::PlayingMain);

    // The release of the canceling press is ignored.
    player.button(ButtonEvent::PedalRelease, 1600, &mut rec);
    assert_eq!(player.pending_request(), None);
}

#[test]
fn test_stop_without_outro_ends_at_bar() {
    let (mut player, mut rec) = started(&TestSong {
        outro: false,
        ..Default::default()
    });
    rec.run(&mut player, 100);
    player.external_outro();
    rec.run(&mut player, 5);
    assert_eq!(player.state(), PlayerState::PlayingMainToEnd);
    rec.run(&mut player, 1810);
    assert_eq!(player.state(), PlayerState::PlayingMainToEnd);
    rec.run(&mut player, 5);
    assert_eq!(player.state(), PlayerState::Stopped);
}

#[test]
fn test_external_stop_is_immediate() {
    let (mut player, mut rec) = started(&TestSong::default());
    rec.run(&mut player, 700);
    tap(&mut player, &mut rec, 5000);
    player.external_stop();
    assert_eq!(player.state(), PlayerState::Stopped);
    assert_eq!(player.master_tick(), 0);
    let before = rec.notes.len();
    rec.run(&mut player, 1000);
    assert_eq!(rec.notes.len(), before);
}

#[test]
fn test_active_pause_keeps_position() {
    let (mut player, mut rec) = started(&TestSong::default());
    rec.run(&mut player, 1000);
    player.external_pause();
    rec.run(&mut player, 5);
    assert_eq!(player.state(), PlayerState::Paused);
    assert_eq!(player.master_tick(), 1005);

    let before = rec.count(PartRole::Main);
    rec.run(&mut player, 1000);
    assert_eq!(rec.count(PartRole::Main), before);
    assert_eq!(player.beat_in_bar(), 0);

    player.external_pause();
    rec.run(&mut player, 5);
    assert_eq!(player.state(), PlayerState::PlayingMain);
    assert_eq!(player.master_tick(), 2010);

    // After an unpause a multi tap goes straight to the outro.
    player.button(ButtonEvent::PedalMultiTap, 9000, &mut rec);
    assert_eq!(player.pending_request(), Some(Request::SwapToOutro));
    rec.run(&mut player, 5);
    assert_eq!(player.state(), PlayerState::Outro);
}

#[test]
fn test_unpause_with_pedal_plays_fill() {
    let (mut player, mut rec) = started(&TestSong::default());
    let mut pedal = PedalConfig::default();
    pedal.active_pause = ActivePause::Disable;
    player.set_pedal(pedal);

    rec.run(&mut player, 1000);
    player.external_pause();
    rec.run(&mut player, 5);
    assert_eq!(player.state(), PlayerState::Paused);
    assert_eq!(player.beat_in_bar(), -2);

    tap(&mut player, &mut rec, 5000);
    rec.run(&mut player, 5);
    assert_eq!(player.state(), PlayerState::DrumFillWaiting);
    assert_eq!(player.master_tick(), 5);
}

#[test]
fn test_paused_hold_stops() {
    let (mut player, mut rec) = started(&TestSong::default());
    let mut pedal = PedalConfig::default();
    pedal.unpause_hold = UnpauseHold::Stop;
    player.set_pedal(pedal);

    player.external_pause();
    rec.run(&mut player, 5);
    player.button(ButtonEvent::PedalPress, 100, &mut rec);
    player.button(ButtonEvent::PedalLongPress, 900, &mut rec);
    assert_eq!(player.state(), PlayerState::Stopped);
    player.button(ButtonEvent::PedalRelease, 1000, &mut rec);
    assert_eq!(player.pending_request(), None);
}

#[test]
fn test_pause_during_intro_resumes_first_part() {
    let mut player = player(&TestSong::default());
    let mut rec = Recorder::default();
    tap(&mut player, &mut rec, 0);
    rec.run(&mut player, 500);
    player.external_pause();
    rec.run(&mut player, 5);
    assert_eq!(player.state(), PlayerState::Paused);

    player.external_pause();
    rec.run(&mut player, 5);
    assert_eq!(player.state(), PlayerState::PlayingMain);
    assert_eq!(player.status().part_index, 0);
}

#[test]
fn test_release_without_press_is_ignored() {
    let mut player = player(&TestSong::default());
    let mut rec = Recorder::default();
    player.button(ButtonEvent::PedalRelease, 0, &mut rec);
    player.button(ButtonEvent::PedalLongPress, 10, &mut rec);
    assert_eq!(player.pending_request(), None);
    rec.run(&mut player, 100);
    assert_eq!(player.state(), PlayerState::Stopped);
}

#[test]
fn test_triple_tap_stops_immediately() {
    let (mut player, mut rec) = started(&TestSong::default());
    let mut pedal = PedalConfig::default();
    pedal.triple_tap_stop = true;
    player.set_pedal(pedal);

    player.button(ButtonEvent::PedalMultiTap, 1000, &mut rec);
    assert_eq!(player.pending_request(), Some(Request::Stop));
    player.button(ButtonEvent::PedalMultiTap, 1200, &mut rec);
    assert_eq!(player.state(), PlayerState::Stopped);
}

#[test]
fn test_slow_second_tap_does_not_stop() {
    let (mut player, mut rec) = started(&TestSong::default());
    let mut pedal = PedalConfig::default();
    pedal.triple_tap_stop = true;
    player.set_pedal(pedal);

    player.button(ButtonEvent::PedalMultiTap, 1000, &mut rec);
    player.button(ButtonEvent::PedalMultiTap, 2000, &mut rec);
    assert_eq!(player.state(), PlayerState::PlayingMain);
}

#[test]
fn test_foot_switch_actions() {
    let (mut player, mut rec) = started(&TestSong::default());
    player.button(ButtonEvent::FootPrimary, 0, &mut rec);
    assert_eq!(rec.accents, vec![(100, 0)]);

    let mut pedal = PedalConfig::default();
    pedal.secondary.playing = FootswitchAction::PauseUnpause;
    pedal.primary.playing = FootswitchAction::Outro;
    player.set_pedal(pedal);

    player.button(ButtonEvent::FootSecondary, 10, &mut rec);
    assert_eq!(player.pending_request(), Some(Request::Pause));
    rec.run(&mut player, 5);
    assert_eq!(player.state(), PlayerState::Paused);
    player.button(ButtonEvent::FootSecondary, 20, &mut rec);
    rec.run(&mut player, 5);
    assert_eq!(player.state(), PlayerState::PlayingMain);

    player.button(ButtonEvent::FootPrimary, 30, &mut rec);
    assert_eq!(player.pending_request(), Some(Request::SwapToOutro));
}

#[test]
fn test_autopilot_plays_fill_on_beat() {
    let autopilot = Autopilot::new(vec![PartTiming {
        drum_fills: vec![Slot::new(3, 0)],
        ..Default::default()
    }]);
    let mut player = player(&TestSong {
        intro: false,
        drum_fills: 1,
        autopilot: Some(autopilot),
        ..Default::default()
    });
    let mut rec = Recorder::default();
    tap(&mut player, &mut rec, 0);
    rec.run(&mut player, 5);
    assert_eq!(player.state(), PlayerState::PlayingMain);

    let mut cycles = 0;
    while player.state() == PlayerState::PlayingMain && cycles < 2000 {
        player.process(TICK_RATIO, 5, &mut rec);
        cycles += 1;
    }
    // Beat three starts at tick 960. The fill waits for the next bar line.
    assert_eq!(player.state(), PlayerState::DrumFillWaiting);
    assert_eq!(player.master_tick(), 965);

    rec.run(&mut player, 960);
    assert_eq!(player.state(), PlayerState::DrumFillActive);
    rec.run(&mut player, 1920);
    assert_eq!(player.state(), PlayerState::PlayingMain);
    assert_eq!(rec.count(PartRole::DrumFill), 4);
}

#[test]
fn test_autopilot_can_be_disallowed() {
    let autopilot = Autopilot::new(vec![PartTiming {
        drum_fills: vec![Slot::new(2, 0)],
        ..Default::default()
    }]);
    let song = TestSong {
        intro: false,
        autopilot: Some(autopilot),
        ..Default::default()
    };
    let mut player = SongPlayer::with_seed(PedalConfig::default(), 1);
    player.set_autopilot_allowed(false);
    player.load_song(song.build());
    let mut rec = Recorder::default();
    tap(&mut player, &mut rec, 0);
    rec.run(&mut player, 3000);
    assert_eq!(player.state(), PlayerState::PlayingMain);
    assert_eq!(rec.count(PartRole::DrumFill), 0);
}

#[test]
fn test_beat_in_bar_follows_main_loop() {
    let (mut player, mut rec) = started(&TestSong::default());
    rec.run(&mut player, 1000);
    assert_eq!(player.beat_in_bar(), 2);
    rec.run(&mut player, 1000);
    assert_eq!(player.beat_in_bar(), 0);
    assert_eq!(player.time_signature(), Some(crate::song::TimeSignature::COMMON));
}

#[test]
fn test_single_track_preview() {
    let mut player = SongPlayer::new(PedalConfig::default());
    let mut rec = Recorder::default();
    player.set_single_track(beat_track("preview", 42, 1));
    assert_eq!(player.state(), PlayerState::SingleTrackPreview);
    assert_eq!(player.bar_length(), Some(1920));

    rec.run(&mut player, 1915);
    assert_eq!(player.state(), PlayerState::SingleTrackPreview);
    assert_eq!(rec.notes.len(), 4);
    rec.run(&mut player, 5);
    assert_eq!(player.state(), PlayerState::NoSongLoaded);
    assert!(rec.notes.iter().all(|n| n.note == 42));
}

#[test]
fn test_single_track_preview_returns_to_song() {
    let mut player = player(&TestSong::default());
    let mut rec = Recorder::default();
    player.set_single_track(beat_track("preview", 42, 1));
    rec.run(&mut player, 1920);
    assert_eq!(player.state(), PlayerState::Stopped);
}

#[test]
fn test_sound_effect_lookup() {
    let mut builder = Song::builder("effects", 120);
    let main = builder.track(beat_track("main", 36, 1));
    let mut part = Part::new(main);
    part.effect = Some(std::path::PathBuf::from("crash.wav"));
    builder.part(part);

    let mut player = SongPlayer::new(PedalConfig::default());
    assert_eq!(player.sound_effect_for(0), None);
    player.load_song(builder.build().expect("valid song"));
    assert_eq!(player.sound_effect_for(0), Some(Path::new("crash.wav")));
    assert_eq!(player.sound_effect_for(1), None);
}
