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
use hound::WavReader;

use super::*;
use crate::drumkit::EFFECT_NOTE;
use crate::mixer::{SampleData, SampleFormat};
use crate::player::ButtonEvent;
use crate::song::{Part, Song};
use crate::testutil::songs::{FILL_NOTE, INTRO_NOTE, MAIN_NOTE, OUTRO_NOTE, TRANSITION_NOTE};
use crate::testutil::{beat_track, KitBuilder, TestSong};

fn kit() -> Drumkit {
    let blob = [INTRO_NOTE, MAIN_NOTE, FILL_NOTE, TRANSITION_NOTE, OUTRO_NOTE]
        .iter()
        .fold(KitBuilder::new(), |builder, &note| {
            builder.instrument(note, |i| i.layer(1, 2205))
        })
        .build();
    Drumkit::decode(blob).expect("valid kit")
}

fn engine_with(config: &PlayerConfig, song: Song) -> Engine {
    let mut engine = Engine::with_seed(config, 7);
    engine.set_kit(kit());
    engine.load_song(PreparedSong::with_effects(song, Vec::new()));
    engine
}

fn engine() -> Engine {
    engine_with(&PlayerConfig::default(), TestSong::default().build())
}

fn run(engine: &mut Engine, seconds: f64) -> Vec<i16> {
    let mut out = vec![0i16; (seconds * f64::from(SAMPLE_RATE)) as usize * 2];
    engine.process(&mut out);
    out
}

#[test]
fn test_refresh_timing() {
    assert_eq!(frames_per_refresh(125), 220.5);
    assert!((tick_ratio(125) - 0.001).abs() < 1e-9);

    // 125 BPM is a thousand ticks a second.
    let mut engine = engine();
    run(&mut engine, 1.0);
    assert_eq!(engine.handle().status().ticks, 1000);
    assert_eq!(engine.clock_ms(), 1000);
}

#[test]
fn test_remainder_carries_over() {
    let mut engine = engine();
    let mut out = [0i16; 100];
    for _ in 0..441 {
        engine.process(&mut out);
    }
    // 22050 frames are exactly 100 refreshes.
    assert_eq!(engine.handle().status().ticks, 500);
}

#[test]
fn test_start_plays_and_stop_fades() {
    let mut engine = engine();
    let handle = engine.handle();
    handle.send(Command::Start).expect("engine alive");

    let out = run(&mut engine, 0.5);
    assert!(out.iter().any(|sample| sample.unsigned_abs() > 100));
    let status = handle.status();
    assert_eq!(status.player.state, PlayerState::Intro);
    assert_eq!(status.song.as_deref(), Some("test"));
    assert_eq!(status.tempo, 125);
    assert!(!status.finished);

    handle.send(Command::Stop).expect("engine alive");
    let mut finished = false;
    for _ in 0..100 {
        run(&mut engine, 0.05);
        if handle.status().finished {
            finished = true;
            break;
        }
    }
    assert!(finished);
    assert_eq!(engine.player().state(), PlayerState::Stopped);
    assert_eq!(engine.mixer().active_count(), 0);
    assert_eq!(engine.mixer().output_level(), 1.0);
}

#[test]
fn test_pedal_starts_song() {
    let mut engine = engine();
    engine.queue(Command::Button(ButtonEvent::PedalPress));
    engine.queue(Command::Button(ButtonEvent::PedalRelease));
    run(&mut engine, 0.1);
    assert_eq!(engine.player().state(), PlayerState::Intro);
    assert!(!engine.is_finished());
}

#[test]
fn test_one_button_per_refresh() {
    let mut engine = engine();
    engine.queue(Command::Tempo(Some(100)));
    engine.queue(Command::Button(ButtonEvent::PedalPress));
    engine.queue(Command::Button(ButtonEvent::PedalRelease));
    engine.queue(Command::Tempo(Some(90)));

    let mut out = [0i16; 2];
    engine.process(&mut out);
    assert_eq!(engine.tempo(), 100);
    assert_eq!(engine.pending_commands(), 2);

    run(&mut engine, 0.1);
    assert_eq!(engine.pending_commands(), 0);
    assert_eq!(engine.tempo(), 90);
}

#[test]
fn test_queue_without_receiver() {
    let (sender, receiver) = crossbeam_channel::unbounded();
    assert!(queue_command(&sender, Command::Start));
    assert_eq!(receiver.len(), 1);

    drop(receiver);
    assert!(!queue_command(&sender, Command::Stop));
}

#[test]
fn test_tempo_override() {
    let config = PlayerConfig::from_yaml("tempo: 90").expect("valid config");
    let mut engine = engine_with(&config, TestSong::default().build());
    assert_eq!(engine.tempo(), 90);

    engine.set_tempo(None);
    assert_eq!(engine.tempo(), 125);
    engine.set_tempo(Some(1000));
    assert_eq!(engine.tempo(), MAX_TEMPO);
}

#[test]
fn test_accent_uses_effect_volume() {
    let mut builder = Song::builder("accent", 120);
    let main = builder.track(beat_track("main", MAIN_NOTE, 1));
    let mut part = Part::new(main);
    part.effect_volume = 50;
    builder.part(part);
    let song = builder.build().expect("valid song");

    let mut engine = Engine::with_seed(&PlayerConfig::default(), 3);
    let effect = SampleData::from_pcm(vec![0x10; 4000], SampleFormat::Pcm16Stereo);
    engine.load_song(PreparedSong::with_effects(song, vec![Some(effect)]));
    engine.queue(Command::Button(ButtonEvent::FootPrimary));
    run(&mut engine, 0.01);

    let channels = engine.active_channels();
    assert_eq!(channels.len(), 1);
    assert_eq!(channels[0].note, EFFECT_NOTE);
    assert_eq!(channels[0].gain, 50 * 10_000);
}

#[test]
fn test_scripted_event_parsing() {
    let event: ScriptedEvent = "1.5:tap".parse().expect("valid event");
    assert_eq!(event.at, 1.5);
    assert!(matches!(
        event.command,
        Command::Button(ButtonEvent::PedalMultiTap)
    ));
    assert!(" 2 : transition 2".parse::<ScriptedEvent>().is_ok());
    assert!("x:tap".parse::<ScriptedEvent>().is_err());
    assert!("-1:stop".parse::<ScriptedEvent>().is_err());
    assert!("2:".parse::<ScriptedEvent>().is_err());
    assert!("stop".parse::<ScriptedEvent>().is_err());
}

#[test]
fn test_render_to_wav() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("render.wav");
    let events = vec![
        "0.3:stop".parse().expect("valid event"),
        "0:start".parse().expect("valid event"),
    ];

    let mut engine = engine();
    let summary = render_to_wav(&mut engine, &path, events, 10.0).expect("render");
    assert!(summary.finished);
    assert!(summary.frames > 13_230);
    assert!(summary.frames < 10 * 44_100);

    let mut reader = WavReader::open(&path).expect("readable wav");
    let spec = reader.spec();
    assert_eq!(spec.channels, 2);
    assert_eq!(spec.sample_rate, SAMPLE_RATE);
    assert_eq!(spec.bits_per_sample, 16);
    let samples: Vec<i16> = reader
        .samples::<i16>()
        .collect::<Result<_, _>>()
        .expect("samples");
    assert_eq!(samples.len() as u64, summary.frames * 2);
    assert!(samples.iter().any(|sample| *sample != 0));
}
