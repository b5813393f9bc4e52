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
//! The playback engine.
//!
//! An [`Engine`] owns a song player, a sound manager and a mixer and turns
//! them into interleaved 16-bit stereo frames. The song advances in refreshes
//! of [`TICKS_PER_REFRESH`] ticks. Control threads reach the engine through an
//! [`EngineHandle`], which queues [`Command`]s and reads the last published
//! [`EngineStatus`].

mod command;
mod render;
#[cfg(test)]
mod tests;

use std::collections::VecDeque;
use std::sync::Arc;

use crossbeam_channel::{Receiver, SendError, Sender};
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::config::PlayerConfig;
use crate::drumkit::{Drumkit, NoteTrigger, SoundManager, EFFECT_SLOTS};
use crate::mixer::{ChannelInfo, Mixer, SAMPLE_RATE};
use crate::player::{PlayerState, PlayerStatus, SongPlayer, Voices};
use crate::song::TICKS_PER_QUARTER;

pub use command::{Command, PreparedSong, UnknownCommand};
pub use render::{render_to_wav, RenderSummary, ScriptedEvent};

/// Ticks the song advances per refresh.
pub const TICKS_PER_REFRESH: i32 = 5;

/// Tempo used while no song is loaded.
pub const DEFAULT_TEMPO: u32 = 120;

pub const MIN_TEMPO: u32 = 40;
pub const MAX_TEMPO: u32 = 300;

/// Output level factor applied per refresh while the stop fades out.
const STOP_FADE: f32 = 0.982;

/// Largest sample magnitude still considered silence.
const SILENCE_LEVEL: u16 = 5;

/// Seconds per tick at `bpm`.
pub fn tick_ratio(bpm: u32) -> f32 {
    60.0 / bpm.max(1) as f32 / TICKS_PER_QUARTER as f32
}

/// Output frames per refresh at `bpm`. Usually fractional.
pub fn frames_per_refresh(bpm: u32) -> f64 {
    f64::from(SAMPLE_RATE) * 60.0 * f64::from(TICKS_PER_REFRESH)
        / (f64::from(bpm.max(1)) * f64::from(TICKS_PER_QUARTER))
}

/// What the engine last reported.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EngineStatus {
    pub player: PlayerStatus,
    pub song: Option<String>,
    pub beat_in_bar: i32,
    pub master_tick: i32,
    pub tempo: u32,
    pub active_voices: usize,
    /// Ticks processed since the engine was created.
    pub ticks: u64,
    /// Playback stopped and its tail has faded out.
    pub finished: bool,
}

/// Where the engine is in the play and fade out cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Playback {
    Idle,
    Playing,
    Fading,
    Finished,
}

/// Sends the player's notes to the kit.
struct KitVoices<'a> {
    sounds: &'a mut SoundManager,
    mixer: &'a mut Mixer,
    effect_volumes: &'a [u8],
}

impl Voices for KitVoices<'_> {
    fn note(&mut self, trigger: NoteTrigger) {
        self.sounds.play_note(self.mixer, trigger);
    }

    fn accent(&mut self, velocity: u8, part: usize) {
        let volume = self.effect_volumes.get(part).copied().unwrap_or(100);
        let velocity = (u32::from(velocity) * u32::from(volume) / 100) as u8;
        self.sounds.play_effect(self.mixer, velocity, part);
    }
}

/// Queues commands for an engine and reads its status.
#[derive(Clone)]
pub struct EngineHandle {
    commands: Sender<Command>,
    status: Arc<RwLock<EngineStatus>>,
}

impl EngineHandle {
    /// Queues a command. Fails once the engine is gone.
    pub fn send(&self, command: Command) -> Result<(), SendError<Command>> {
        self.commands.send(command)
    }

    pub fn status(&self) -> EngineStatus {
        self.status.read().clone()
    }
}

/// Sends a command, logging it if nobody is left to receive it.
fn queue_command(sender: &Sender<Command>, command: Command) -> bool {
    match sender.send(command) {
        Ok(()) => true,
        Err(SendError(command)) => {
            warn!(?command, "Engine is gone, command dropped");
            false
        }
    }
}

/// The song player, sound manager and mixer driven together.
pub struct Engine {
    player: SongPlayer,
    sounds: SoundManager,
    mixer: Mixer,
    sender: Sender<Command>,
    commands: Receiver<Command>,
    status: Arc<RwLock<EngineStatus>>,
    tempo_override: Option<u32>,
    output_level: f32,
    effect_volumes: Vec<u8>,
    playback: Playback,
    /// Fraction of a frame carried over between refreshes.
    frame_fraction: f64,
    /// Frames rendered by the last refresh, interleaved.
    block: Vec<i16>,
    /// Rendered samples not yet handed out.
    backlog: VecDeque<i16>,
    frames: u64,
    ticks: u64,
}

impl Engine {
    pub fn new(config: &PlayerConfig) -> Engine {
        Self::with_parts(
            config,
            SongPlayer::new(config.pedal().clone()),
            SoundManager::new(),
        )
    }

    /// An engine whose random choices are reproducible.
    pub fn with_seed(config: &PlayerConfig, seed: u64) -> Engine {
        Self::with_parts(
            config,
            SongPlayer::with_seed(config.pedal().clone(), seed),
            SoundManager::with_seed(seed),
        )
    }

    fn with_parts(config: &PlayerConfig, mut player: SongPlayer, sounds: SoundManager) -> Engine {
        player.set_autopilot_allowed(config.autopilot());
        let mut mixer = Mixer::new();
        mixer.set_output_level(config.output_level());
        let (sender, commands) = crossbeam_channel::unbounded();
        Engine {
            player,
            sounds,
            mixer,
            sender,
            commands,
            status: Arc::new(RwLock::new(EngineStatus::default())),
            tempo_override: config.tempo(),
            output_level: config.output_level(),
            effect_volumes: Vec::new(),
            playback: Playback::Idle,
            frame_fraction: 0.0,
            block: Vec::new(),
            backlog: VecDeque::new(),
            frames: 0,
            ticks: 0,
        }
    }

    pub fn handle(&self) -> EngineHandle {
        EngineHandle {
            commands: self.sender.clone(),
            status: self.status.clone(),
        }
    }

    /// Queues a command as if it came from a handle.
    pub fn queue(&self, command: Command) {
        queue_command(&self.sender, command);
    }

    /// Commands waiting for a refresh.
    pub fn pending_commands(&self) -> usize {
        self.commands.len()
    }

    pub fn set_kit(&mut self, kit: Drumkit) {
        self.mixer.remove_all();
        self.sounds.set_kit(kit);
    }

    pub fn load_song(&mut self, prepared: PreparedSong) {
        let PreparedSong { song, effects } = prepared;
        self.effect_volumes = song.parts().iter().map(|part| part.effect_volume).collect();
        let mut effects = effects.into_iter();
        for slot in 0..EFFECT_SLOTS {
            self.sounds.set_effect(slot, effects.next().flatten());
        }
        self.mixer.remove_all();
        self.mixer.set_output_level(self.output_level);
        self.playback = Playback::Idle;
        self.player.load_song(song);
    }

    /// Sets the tempo override. `None` follows the song.
    pub fn set_tempo(&mut self, tempo: Option<u32>) {
        self.tempo_override = tempo.map(|bpm| bpm.clamp(MIN_TEMPO, MAX_TEMPO));
        info!(tempo = self.tempo(), "Tempo set");
    }

    /// Current tempo in BPM.
    pub fn tempo(&self) -> u32 {
        self.tempo_override
            .or_else(|| self.player.tempo())
            .unwrap_or(DEFAULT_TEMPO)
    }

    pub fn set_output_level(&mut self, level: f32) {
        self.output_level = level.clamp(0.0, 1.0);
        if self.playback != Playback::Fading {
            self.mixer.set_output_level(self.output_level);
        }
    }

    pub fn player(&self) -> &SongPlayer {
        &self.player
    }

    pub fn mixer(&self) -> &Mixer {
        &self.mixer
    }

    /// Voices currently sounding.
    pub fn active_channels(&self) -> Vec<ChannelInfo> {
        self.mixer.active_channels()
    }

    /// Whether a playback has stopped and faded out since the last start.
    pub fn is_finished(&self) -> bool {
        self.playback == Playback::Finished
    }

    /// Milliseconds of audio rendered so far. Pedal timing is measured on
    /// this clock.
    pub fn clock_ms(&self) -> u64 {
        self.frames * 1000 / u64::from(SAMPLE_RATE)
    }

    /// Fills `out` with interleaved stereo samples and publishes the status.
    pub fn process(&mut self, out: &mut [i16]) {
        let mut written = 0;
        while written < out.len() {
            if self.backlog.is_empty() {
                self.refresh();
            }
            let count = (out.len() - written).min(self.backlog.len());
            for (sample, value) in out[written..written + count]
                .iter_mut()
                .zip(self.backlog.drain(..count))
            {
                *sample = value;
            }
            written += count;
        }
        self.publish();
    }

    fn split(&mut self) -> (&mut SongPlayer, KitVoices<'_>) {
        (
            &mut self.player,
            KitVoices {
                sounds: &mut self.sounds,
                mixer: &mut self.mixer,
                effect_volumes: &self.effect_volumes,
            },
        )
    }

    /// Runs one refresh: commands, the song and the mixer.
    fn refresh(&mut self) {
        self.next_commands();

        let tempo = self.tempo();
        let exact = self.frame_fraction + frames_per_refresh(tempo);
        let frames = exact.floor();
        self.frame_fraction = exact - frames;
        let frames = (frames as usize).max(1);

        let (player, mut voices) = self.split();
        player.process(tick_ratio(tempo), TICKS_PER_REFRESH, &mut voices);
        self.ticks += TICKS_PER_REFRESH as u64;

        self.block.clear();
        self.block.resize(frames * 2, 0);
        self.mixer.render(&mut self.block);
        self.update_playback();
        self.frames += frames as u64;
        self.backlog.extend(self.block.iter().copied());
    }

    /// Applies queued commands up to and including the first button event.
    fn next_commands(&mut self) {
        while let Ok(command) = self.commands.try_recv() {
            let button = matches!(command, Command::Button(_));
            self.apply(command);
            if button {
                break;
            }
        }
    }

    fn apply(&mut self, command: Command) {
        debug!(?command, "Engine command");
        match command {
            Command::Button(event) => {
                let time_ms = self.clock_ms();
                let (player, mut voices) = self.split();
                player.button(event, time_ms, &mut voices);
            }
            Command::Start => self.player.external_start(),
            Command::Stop => self.player.external_stop(),
            Command::Pause => self.player.external_pause(),
            Command::DrumFill => self.player.external_drum_fill(),
            Command::Outro => self.player.external_outro(),
            Command::Transition(part) => self.player.external_transition(part),
            Command::Tempo(tempo) => self.set_tempo(tempo),
            Command::OutputLevel(level) => self.set_output_level(level),
            Command::Kit(kit) => self.set_kit(*kit),
            Command::Song(song) => self.load_song(*song),
            Command::Preview(track) => self.player.set_single_track(*track),
        }
    }

    /// Fades the mixer out once the player has stopped and restores the
    /// level on the next start.
    fn update_playback(&mut self) {
        let stopped = matches!(
            self.player.state(),
            PlayerState::Stopped | PlayerState::NoSongLoaded
        );
        if !stopped {
            if self.playback != Playback::Playing {
                self.mixer.set_output_level(self.output_level);
                self.playback = Playback::Playing;
            }
            return;
        }
        if !matches!(self.playback, Playback::Playing | Playback::Fading) {
            return;
        }
        let audible = self
            .block
            .iter()
            .any(|sample| sample.unsigned_abs() > SILENCE_LEVEL);
        if audible {
            self.playback = Playback::Fading;
            let level = self.mixer.output_level() * STOP_FADE;
            self.mixer.set_output_level(level);
        } else {
            self.mixer.remove_all();
            self.mixer.set_output_level(self.output_level);
            self.playback = Playback::Finished;
            info!("Playback finished");
        }
    }

    fn publish(&self) {
        let mut status = self.status.write();
        status.player = self.player.status();
        status.song = self.player.song().map(|song| song.name().to_string());
        status.beat_in_bar = self.player.beat_in_bar();
        status.master_tick = self.player.master_tick();
        status.tempo = self.tempo();
        status.active_voices = self.mixer.active_count();
        status.ticks = self.ticks;
        status.finished = self.is_finished();
    }
}
