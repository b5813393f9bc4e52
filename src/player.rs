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
//! The song state machine.
//!
//! [`SongPlayer`] walks a song tick by tick: intro, the main loop of each
//! part, drum fills, transition fills and the outro. Pedal events and external
//! commands queue a request that the next [`SongPlayer::process`] call
//! resolves against a bar-aligned sync tick. Notes are handed to a [`Voices`]
//! implementation, normally the sound manager and mixer of the engine.

mod buttons;
mod navigation;
mod process;
mod state;
#[cfg(test)]
mod tests;
mod timing;

use std::collections::BTreeMap;
use std::path::Path;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;

use crate::config::PedalConfig;
use crate::drumkit::NoteTrigger;
use crate::song::{Autopilot, Part, Slot, Song, TimeSignature, Track};

pub use state::{ButtonEvent, PartRole, PlayerState, PlayerStatus, Request};
pub use timing::{
    quit_sync_tick, round_up, single_track_offset, start_bar_sync_tick, POST_EVENT_MAX_TICK,
};

use state::Section;

/// Receives the sounds scheduled by the player.
pub trait Voices {
    fn note(&mut self, trigger: NoteTrigger);

    /// Plays the special effect of `part`.
    fn accent(&mut self, velocity: u8, part: usize);
}

/// Sync ticks computed for the pending fill, transition or outro.
#[derive(Clone, Copy, Debug, Default)]
struct SyncTicks {
    part_stop: i32,
    part_stop_pickup: i32,
    drum_fill_start: i32,
    drum_fill_pickup: i32,
    transition_start: i32,
    transition_stop: i32,
    transition_pickup: i32,
}

/// Autopilot beat counting.
#[derive(Clone, Copy, Debug)]
struct BeatCount {
    counter: u32,
    /// Position within the beat at the previous count.
    loop_tick: i32,
    new_end: i32,
    added: i32,
    playing_pickup: bool,
}

impl Default for BeatCount {
    fn default() -> Self {
        BeatCount {
            counter: 0,
            loop_tick: i32::MAX,
            new_end: 0,
            added: 0,
            playing_pickup: false,
        }
    }
}

/// Pedal history used to interpret the next event.
#[derive(Clone, Copy, Debug, Default)]
struct PedalFlags {
    pressed: bool,
    /// A drum fill was asked for with the pedal.
    fill_pressed: bool,
    /// A transition was asked for with the pedal.
    transition_pressed: bool,
    was_paused: bool,
    multi_taps: u8,
    long_pressed: bool,
    last_tap_ms: u64,
}

/// The timing figures of a track.
#[derive(Clone, Copy, Debug)]
struct TrackInfo {
    index: usize,
    n_tick: i32,
    bar_length: i32,
    trigger_position: i32,
    pickup_length: i32,
    first_tick: i32,
    numerator: i32,
}

impl TrackInfo {
    fn of(index: usize, track: &Track) -> TrackInfo {
        TrackInfo {
            index,
            n_tick: track.n_tick(),
            bar_length: track.bar_length(),
            trigger_position: track.trigger_position(),
            pickup_length: track.pickup_length(),
            first_tick: track.events().first().map_or(0, |event| event.tick),
            numerator: i32::from(track.time_signature().numerator).max(1),
        }
    }

    fn beat_length(&self) -> i32 {
        (self.bar_length / self.numerator).max(1)
    }
}

/// Which event list a play call reads.
#[derive(Clone, Copy, Debug)]
enum TrackRef {
    Song(TrackInfo),
    Single,
}

struct SingleTrack {
    track: Track,
    cursor: usize,
    offset: i32,
}

/// Plays a song on a pedal driven timeline.
pub struct SongPlayer {
    song: Option<Song>,
    /// The song's autopilot table when it is present and enabled.
    autopilot: Option<Autopilot>,
    autopilot_allowed: bool,
    pedal: PedalConfig,
    rng: StdRng,

    state: PlayerState,
    section: Section,
    part_index: usize,
    drum_fill_index: usize,
    master_tick: i32,
    /// Master tick at the end of the cycle being processed.
    next_tick: i32,
    request: Option<Request>,
    /// 1-based part requested by an external transition, 0 for none.
    next_part: usize,

    autopilot_action: bool,
    autopilot_cue: bool,
    /// Drum fill indices keyed by the beat the autopilot plays them at.
    fill_queue: BTreeMap<u32, usize>,
    sync: SyncTicks,
    beats: BeatCount,
    flags: PedalFlags,
    paused_from: PlayerState,
    resume_to: PlayerState,

    /// Event cursor of every song track.
    cursors: Vec<usize>,
    single: Option<SingleTrack>,
}

impl SongPlayer {
    pub fn new(pedal: PedalConfig) -> SongPlayer {
        Self::with_rng(pedal, StdRng::from_entropy())
    }

    /// A player whose shuffled drum fills are reproducible.
    pub fn with_seed(pedal: PedalConfig, seed: u64) -> SongPlayer {
        Self::with_rng(pedal, StdRng::seed_from_u64(seed))
    }

    fn with_rng(pedal: PedalConfig, rng: StdRng) -> SongPlayer {
        SongPlayer {
            song: None,
            autopilot: None,
            autopilot_allowed: true,
            pedal,
            rng,
            state: PlayerState::NoSongLoaded,
            section: Section::None,
            part_index: 0,
            drum_fill_index: 0,
            master_tick: 0,
            next_tick: 0,
            request: None,
            next_part: 0,
            autopilot_action: false,
            autopilot_cue: false,
            fill_queue: BTreeMap::new(),
            sync: SyncTicks::default(),
            beats: BeatCount::default(),
            flags: PedalFlags::default(),
            paused_from: PlayerState::NoSongLoaded,
            resume_to: PlayerState::NoSongLoaded,
            cursors: Vec::new(),
            single: None,
        }
    }

    /// Whether an autopilot table in the next loaded song is honoured.
    pub fn set_autopilot_allowed(&mut self, allowed: bool) {
        self.autopilot_allowed = allowed;
    }

    pub fn set_pedal(&mut self, pedal: PedalConfig) {
        self.pedal = pedal;
    }

    pub fn pedal(&self) -> &PedalConfig {
        &self.pedal
    }

    /// Replaces the current song and resets the position.
    pub fn load_song(&mut self, song: Song) {
        self.autopilot = match song.autopilot() {
            Some(autopilot) if autopilot.is_enabled() && self.autopilot_allowed => {
                Some(autopilot.clone())
            }
            _ => None,
        };
        info!(
            song = song.name(),
            autopilot = self.autopilot.is_some(),
            "Song ready to play"
        );
        self.cursors = vec![0; song.tracks().len()];
        self.song = Some(song);
        self.single = None;
        self.request = None;
        self.next_part = 0;
        self.beats = BeatCount::default();
        self.flags = PedalFlags::default();
        self.sync = SyncTicks::default();
        self.reset_position();
    }

    pub fn song(&self) -> Option<&Song> {
        self.song.as_ref()
    }

    /// Current state, part and drum fill.
    pub fn status(&self) -> PlayerStatus {
        PlayerStatus {
            state: self.state,
            part_index: self.part_index,
            drum_fill_index: self.drum_fill_index,
        }
    }

    pub fn state(&self) -> PlayerState {
        self.state
    }

    pub fn pending_request(&self) -> Option<Request> {
        self.request
    }

    pub fn is_playing(&self) -> bool {
        !matches!(
            self.state,
            PlayerState::NoSongLoaded | PlayerState::Stopped
        )
    }

    /// Master tick, shifted during the intro so that bar lines of a partial
    /// intro line up with the following part.
    pub fn master_tick(&self) -> i32 {
        if self.state == PlayerState::Intro {
            if let Some(main) = self.main_info() {
                return self.master_tick + main.bar_length - main.n_tick % main.bar_length;
            }
        }
        self.master_tick
    }

    /// Beat within the current bar, or -2 when nothing is playing.
    pub fn beat_in_bar(&self) -> i32 {
        let beat = |tick: i32, info: TrackInfo| (tick / info.beat_length()) % info.numerator;
        if self.section != Section::None {
            match self.state {
                PlayerState::NoSongLoaded | PlayerState::Stopped => -2,
                PlayerState::Intro => match self.main_info() {
                    Some(main) => {
                        let offset = main.bar_length - main.n_tick % main.bar_length;
                        beat(self.master_tick + offset, main)
                    }
                    None => 0,
                },
                PlayerState::Paused => match self.main_info() {
                    Some(main) if self.pedal.active_pause.is_enabled() => {
                        beat(self.master_tick, main)
                    }
                    _ => -2,
                },
                PlayerState::TransitionActive
                | PlayerState::TransitionQuitting
                | PlayerState::TransitionCanceled => self
                    .transition_info()
                    .map_or(-2, |fill| beat(self.master_tick, fill)),
                PlayerState::DrumFillActive => self
                    .drum_fill_info()
                    .map_or(-2, |fill| beat(self.master_tick, fill)),
                PlayerState::SingleTrackPreview => -2,
                _ => self
                    .main_info()
                    .map_or(-2, |main| beat(self.master_tick, main)),
            }
        } else if self.state == PlayerState::SingleTrackPreview {
            match &self.single {
                Some(single) => beat(self.master_tick, TrackInfo::of(0, &single.track)),
                None => -2,
            }
        } else {
            -2
        }
    }

    /// The track whose bar structure is current: the playing section's main
    /// loop, else the intro, else the first part.
    fn reference_track(&self) -> Option<&Track> {
        if self.state == PlayerState::SingleTrackPreview {
            if let Some(single) = &self.single {
                return Some(&single.track);
            }
        }
        let song = self.song.as_ref()?;
        if let Some(main) = self.main_info() {
            return Some(song.track(main.index));
        }
        song.intro()
            .or_else(|| song.part(0).map(|part| song.track(part.main_loop)))
    }

    pub fn bar_length(&self) -> Option<i32> {
        self.reference_track().map(Track::bar_length)
    }

    pub fn time_signature(&self) -> Option<TimeSignature> {
        self.reference_track().map(Track::time_signature)
    }

    /// The song's tempo while a section is playing.
    pub fn tempo(&self) -> Option<u32> {
        match (&self.song, self.section) {
            (Some(song), section) if section != Section::None => Some(song.bpm()),
            _ => None,
        }
    }

    /// Special effect file of a part.
    pub fn sound_effect_for(&self, part: usize) -> Option<&Path> {
        self.song.as_ref()?.part(part)?.effect.as_deref()
    }

    pub fn external_start(&mut self) {
        if self.state == PlayerState::Stopped && self.song.is_some() {
            self.request = Some(Request::ExternalStart);
        }
    }

    pub fn external_stop(&mut self) {
        self.flags.fill_pressed = false;
        self.stop_song();
    }

    /// Toggles pause while playing.
    pub fn external_pause(&mut self) {
        self.request_pause();
    }

    /// Requests a drum fill when the main loop plays and nothing is pending.
    pub fn external_drum_fill(&mut self) {
        if self.state == PlayerState::PlayingMain && self.request.is_none() {
            self.request = Some(Request::DrumFill);
        }
    }

    pub fn external_outro(&mut self) {
        if self.request.is_some() {
            return;
        }
        if self.state == PlayerState::Intro
            || (self.flags.was_paused && self.state == PlayerState::PlayingMain)
        {
            self.request = Some(Request::SwapToOutro);
        } else if matches!(
            self.state,
            PlayerState::PlayingMain
                | PlayerState::NoFillTransition
                | PlayerState::NoFillQuitting
                | PlayerState::TransitionWaiting
                | PlayerState::TransitionActive
                | PlayerState::TransitionQuitting
                | PlayerState::DrumFillWaiting
                | PlayerState::DrumFillActive
        ) {
            self.request = Some(Request::Stop);
        }
    }

    /// Requests a transition to the 1-based `part`. Part 0 quits a pending
    /// or active transition. A part beyond the song moves to the next part.
    /// From stopped the song starts and enters `part` after the intro.
    pub fn external_transition(&mut self, part: usize) {
        if self.request.is_some() {
            return;
        }
        if part == 0 {
            if matches!(
                self.state,
                PlayerState::NoFillTransition
                    | PlayerState::TransitionWaiting
                    | PlayerState::TransitionActive
            ) {
                self.request = Some(Request::TransitionQuit);
            }
        } else if matches!(
            self.state,
            PlayerState::Paused
                | PlayerState::DrumFillWaiting
                | PlayerState::DrumFillActive
                | PlayerState::PlayingMain
        ) {
            self.next_part = part;
            self.request = Some(Request::Transition);
        } else if self.state == PlayerState::Stopped {
            self.next_part = part;
            self.external_start();
        }
    }

    /// Previews a single track, independent of the loaded song.
    pub fn set_single_track(&mut self, track: Track) {
        let offset = single_track_offset(track.n_tick(), track.bar_length());
        self.single = Some(SingleTrack {
            track,
            cursor: 0,
            offset,
        });
        self.master_tick = 0;
        self.state = PlayerState::SingleTrackPreview;
    }

    /// Advances a single track preview by `n_tick` ticks, starting `offset`
    /// ticks late. The track plays once, then the player stops.
    pub fn process_single_track<V: Voices + ?Sized>(
        &mut self,
        ratio: f32,
        n_tick: i32,
        offset: i32,
        voices: &mut V,
    ) {
        self.next_tick = self.master_tick + n_tick;
        let mut pickup = 0;
        if self.state == PlayerState::NoSongLoaded {
            return;
        }
        if self.state == PlayerState::SingleTrackPreview {
            let Some(single) = &self.single else {
                return;
            };
            let first = single.track.events().first().map_or(0, |event| event.tick);
            let length = single.track.n_tick();
            if first < 0 && self.master_tick == 0 {
                pickup = first;
            }
            self.track_play(
                TrackRef::Single,
                self.master_tick - offset + pickup,
                self.next_tick - offset + pickup,
                ratio,
                0,
                PartRole::Main,
                voices,
            );
            if self.next_tick >= length + offset {
                self.track_play(
                    TrackRef::Single,
                    length,
                    length + POST_EVENT_MAX_TICK,
                    ratio,
                    n_tick,
                    PartRole::Main,
                    voices,
                );
                self.state = if self.song.is_some() {
                    PlayerState::Stopped
                } else {
                    PlayerState::NoSongLoaded
                };
            }
        }
        self.master_tick = self.next_tick + pickup;
    }

    fn request_pause(&mut self) {
        if self.is_playing() {
            self.request = Some(Request::Pause);
        }
    }

    fn info(&self, index: usize) -> Option<TrackInfo> {
        let song = self.song.as_ref()?;
        song.tracks()
            .get(index)
            .map(|track| TrackInfo::of(index, track))
    }

    fn current_part(&self) -> Option<&Part> {
        match self.section {
            Section::Part => self.song.as_ref()?.part(self.part_index),
            _ => None,
        }
    }

    /// The looping track of the current section.
    fn main_info(&self) -> Option<TrackInfo> {
        let song = self.song.as_ref()?;
        let index = match self.section {
            Section::None => None,
            Section::Intro => song.intro_index(),
            Section::Part => song.part(self.part_index).map(|part| part.main_loop),
            Section::Outro => song.outro_index(),
        }?;
        self.info(index)
    }

    fn transition_info(&self) -> Option<TrackInfo> {
        self.info(self.current_part()?.transition_fill?)
    }

    fn drum_fill_info(&self) -> Option<TrackInfo> {
        let index = *self.current_part()?.drum_fills.get(self.drum_fill_index)?;
        self.info(index)
    }

    fn outro_info(&self) -> Option<TrackInfo> {
        self.info(self.song.as_ref()?.outro_index()?)
    }

    fn intro_info(&self) -> Option<TrackInfo> {
        self.info(self.song.as_ref()?.intro_index()?)
    }

    fn drum_fill_count(&self) -> usize {
        self.current_part().map_or(0, |part| part.drum_fills.len())
    }

    fn shuffle(&self) -> bool {
        self.current_part().is_some_and(|part| part.shuffle)
    }

    fn part_count(&self) -> usize {
        self.song.as_ref().map_or(0, |song| song.parts().len())
    }

    fn random_fill(&mut self) -> usize {
        let count = self.drum_fill_count();
        if count == 0 {
            0
        } else {
            self.rng.gen_range(0..count)
        }
    }

    fn autopilot_main(&self) -> Slot {
        self.autopilot
            .as_ref()
            .map(|autopilot| autopilot.main_loop(self.part_index))
            .unwrap_or_default()
    }

    fn autopilot_transition(&self) -> Slot {
        self.autopilot
            .as_ref()
            .map(|autopilot| autopilot.transition_fill(self.part_index))
            .unwrap_or_default()
    }

    fn autopilot_fill(&self, index: usize) -> Slot {
        self.autopilot
            .as_ref()
            .map(|autopilot| autopilot.drum_fill(self.part_index, index))
            .unwrap_or_default()
    }

    /// Refills the autopilot drum fill queue for the current part.
    fn fill_queue(&mut self) {
        let count = self
            .song
            .as_ref()
            .and_then(|song| song.part(self.part_index))
            .map_or(0, |part| part.drum_fills.len());
        if let Some(autopilot) = &self.autopilot {
            self.fill_queue = autopilot.fill_queue(self.part_index, count);
        }
    }

    /// Takes the next queued autopilot drum fill, 0 once the queue is empty.
    fn next_queued_fill(&mut self) -> usize {
        self.fill_queue
            .pop_first()
            .map_or(0, |(_, index)| index)
    }

    /// The drum fill to start a part with.
    fn first_fill(&mut self) -> usize {
        if self.autopilot.is_some() {
            self.fill_queue();
            self.next_queued_fill()
        } else {
            0
        }
    }

    /// Plays the events of a track in `[start, end)`.
    #[allow(clippy::too_many_arguments)]
    fn track_play<V: Voices + ?Sized>(
        &mut self,
        track: TrackRef,
        start: i32,
        end: i32,
        ratio: f32,
        manual_offset: i32,
        role: PartRole,
        voices: &mut V,
    ) {
        self.beats.playing_pickup = start < 0;
        let next = match track {
            TrackRef::Song(info) => match (&self.song, self.cursors.get_mut(info.index)) {
                (Some(song), Some(cursor)) => timing::play_range(
                    song.track(info.index),
                    cursor,
                    start,
                    end,
                    ratio,
                    manual_offset,
                    role,
                    voices,
                ),
                _ => None,
            },
            TrackRef::Single => match &mut self.single {
                Some(single) => timing::play_range(
                    &single.track,
                    &mut single.cursor,
                    start,
                    end,
                    ratio,
                    manual_offset,
                    role,
                    voices,
                ),
                None => None,
            },
        };

        // Once a drum fill's pickup has been played the bar is pulled back
        // so the beat stays in place.
        if let Some(next) = next {
            if self.sync.drum_fill_pickup > 0
                && next >= 0
                && self.state != PlayerState::DrumFillWaiting
            {
                self.next_tick -= self.sync.drum_fill_pickup;
                self.sync.drum_fill_pickup = 0;
                if self.beats.playing_pickup {
                    self.beats.loop_tick = 0;
                }
            }
        }
    }
}
