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
//! The per-cycle tick advance.

use crate::config::UnpauseTap;

use super::state::Section;
use super::timing::{quit_sync_tick, round_up, start_bar_sync_tick, POST_EVENT_MAX_TICK};
use super::{PartRole, PlayerState, Request, SongPlayer, TrackInfo, TrackRef, Voices};

impl SongPlayer {
    /// Advances the song by `n_tick` ticks of `ratio` seconds each.
    ///
    /// The pending request is resolved first, then every event of the active
    /// tracks inside the elapsed window is sent to `voices` with its delay in
    /// seconds from the start of the window.
    pub fn process<V: Voices + ?Sized>(&mut self, ratio: f32, n_tick: i32, voices: &mut V) {
        if self.state == PlayerState::SingleTrackPreview {
            let offset = self.single.as_ref().map_or(0, |single| single.offset);
            self.process_single_track(ratio, n_tick, offset, voices);
            return;
        }
        if self.state == PlayerState::NoSongLoaded {
            self.master_tick += n_tick;
            return;
        }

        self.autopilot_cue = false;
        self.run_autopilot();

        if self.state == PlayerState::Paused {
            self.resolve_unpause();
        }
        if matches!(self.request, Some(Request::Start | Request::ExternalStart))
            && self.state == PlayerState::Stopped
        {
            self.intro_part();
        }
        if self.request == Some(Request::Pause) {
            self.resolve_pause();
        } else {
            self.resolve_request(n_tick);
        }

        self.request = None;
        self.next_tick = self.master_tick + n_tick;

        self.run_triggers(ratio, voices);
        self.play_state(ratio, n_tick, voices);

        self.master_tick = self.next_tick;
    }

    /// Queues the requests the autopilot table schedules for this cycle.
    fn run_autopilot(&mut self) {
        if self.autopilot.is_none() || self.section == Section::None {
            return;
        }
        self.count_beat();

        let counter = self.beats.counter;
        let extra = match (self.state, self.transition_info()) {
            (PlayerState::TransitionActive, Some(fill)) if fill.n_tick / fill.bar_length > 1 => {
                self.autopilot_transition().play_for
            }
            _ => 0,
        };

        match self.state {
            PlayerState::PlayingMain => {
                let main = self.autopilot_main();
                let beat = if main.play_for > 0 {
                    counter % main.play_for
                } else {
                    counter
                };
                let fill = self.autopilot_fill(self.drum_fill_index);
                if fill.play_at > 0 && fill.play_at == beat && self.drum_fill_count() > 0 {
                    self.request = Some(Request::DrumFill);
                    self.autopilot_cue = true;
                } else if main.play_at > 0 && main.play_at <= counter {
                    let last = self.part_index + 1 >= self.part_count();
                    let loop_song = self.song.as_ref().is_some_and(|song| song.loop_song());
                    self.autopilot_cue = true;
                    if last && !loop_song {
                        self.request = Some(Request::Stop);
                    } else {
                        self.request = Some(Request::Transition);
                        self.autopilot_action = true;
                    }
                }
            }
            PlayerState::NoFillTransition | PlayerState::TransitionActive
                if self.autopilot_action
                    && (self.state == PlayerState::NoFillTransition || counter >= extra) =>
            {
                self.request = Some(Request::TransitionQuit);
                self.autopilot_cue = true;
                self.autopilot_action = false;
            }
            PlayerState::NoFillQuitting if self.part_index + 1 >= self.part_count() => {
                self.request = Some(Request::Stop);
                self.autopilot_cue = true;
            }
            _ => {}
        }
    }

    /// Counts a beat each time the position crosses a beat line.
    fn count_beat(&mut self) {
        if self.beats.playing_pickup {
            return;
        }
        let Some(main) = self.main_info() else {
            return;
        };
        let per_count = main.beat_length();
        let position = self.master_tick.rem_euclid(per_count);
        self.trim_main(main, per_count, position);

        if position <= self.beats.loop_tick || self.beats.counter == 0 {
            self.beats.counter += 1;
        }
        self.beats.loop_tick = if self.beats.new_end != 0 {
            position + self.beats.added
        } else {
            position
        };
        self.beats.added = 0;
    }

    /// Jumps to the next beat when the upcoming autopilot drum fill has more
    /// pickup than the current beat has room left for.
    fn trim_main(&mut self, main: TrackInfo, per_count: i32, position: i32) {
        let Some(fill) = self.drum_fill_info() else {
            return;
        };
        let slot = self.autopilot_fill(self.drum_fill_index);
        let has_pickup = fill.first_tick < 0 && slot.play_at > 0;
        let last_beat = if fill.n_tick < main.bar_length {
            self.state == PlayerState::DrumFillWaiting
                && self.next_tick + self.sync.drum_fill_pickup > self.sync.drum_fill_start
        } else {
            slot.play_at.checked_sub(1) == Some(self.beats.counter) && self.drum_fill_count() > 0
        };
        self.beats.added = per_count - position;

        if self.beats.added < fill.first_tick.abs() && last_beat && has_pickup {
            self.beats.new_end = fill.first_tick;
            self.master_tick += self.beats.added;
        } else {
            self.beats.new_end = 0;
        }
    }

    /// Moves the position back into the main loop after a pause.
    fn resume_position(&mut self) {
        if self.pedal.active_pause.is_enabled() {
            if let Some(main) = self.main_info() {
                self.master_tick = self.master_tick.rem_euclid(main.n_tick.max(1));
            }
        } else {
            self.master_tick = 0;
        }
    }

    fn resolve_unpause(&mut self) {
        match self.request {
            Some(Request::Start) => match self.pedal.unpause_tap {
                UnpauseTap::Fill => {
                    if self.paused_from.resumes_with_fill() && self.drum_fill_count() > 0 {
                        self.resume_position();
                        self.request = Some(Request::DrumFill);
                    } else {
                        self.same_part(false);
                    }
                }
                UnpauseTap::Intro => self.intro_part(),
            },
            Some(Request::Pause) => {
                self.state = self.resume_to;
                self.resume_position();
                self.flags.was_paused = true;
                self.request = None;
            }
            _ => {}
        }
    }

    fn pause_into(&mut self, resume_to: PlayerState) {
        self.resume_to = resume_to;
        self.state = PlayerState::Paused;
    }

    /// Pauses playback. The paused-from state decides where playback resumes.
    fn resolve_pause(&mut self) {
        let saved = (self.master_tick, self.next_tick);
        self.paused_from = self.state;

        match self.state {
            PlayerState::PlayingMain
            | PlayerState::TransitionCanceled
            | PlayerState::NoFillCanceled
            | PlayerState::OutroCanceled => {
                self.same_part(false);
                self.pause_into(PlayerState::PlayingMain);
            }
            PlayerState::DrumFillActive | PlayerState::DrumFillWaiting => {
                self.same_part(true);
                self.pause_into(PlayerState::PlayingMain);
            }
            PlayerState::TransitionWaiting
            | PlayerState::TransitionActive
            | PlayerState::TransitionQuitting
            | PlayerState::NoFillTransition
            | PlayerState::NoFillQuitting => {
                self.next_part();
                self.pause_into(PlayerState::PlayingMain);
            }
            PlayerState::PlayingMainToEnd => self.stop_song(),
            PlayerState::OutroWaiting => {
                self.outro_part();
                self.pause_into(PlayerState::Outro);
            }
            PlayerState::Intro => {
                self.first_part();
                self.pause_into(self.state);
            }
            PlayerState::Outro => {
                self.drum_fill_index = 0;
                self.same_part(false);
                self.pause_into(self.state);
            }
            _ => {}
        }

        if self.pedal.active_pause.is_enabled() && self.state == PlayerState::Paused {
            (self.master_tick, self.next_tick) = saved;
        }
    }

    /// Bar line limit for a sync tick. Autopilot cues always take the next
    /// bar line.
    fn trigger_limit(&self, main: &TrackInfo) -> i32 {
        if self.autopilot_cue {
            main.bar_length
        } else {
            main.trigger_position
        }
    }

    fn resolve_request(&mut self, n_tick: i32) {
        let Some(request) = self.request else {
            return;
        };
        let Some(main) = self.main_info() else {
            return;
        };

        match request {
            Request::DrumFill => {
                if self.drum_fill_count() == 0 {
                    return;
                }
                if !self.autopilot_action && !self.autopilot_cue && self.autopilot.is_some() {
                    if self.shuffle() {
                        self.drum_fill_index = self.random_fill();
                    } else {
                        self.fill_queue();
                    }
                    // A manual fill right after one the autopilot skips plays
                    // the skipped one.
                    if self.drum_fill_index != 0
                        && self.autopilot_fill(self.drum_fill_index - 1).play_at == 0
                    {
                        self.drum_fill_index -= 1;
                    }
                }
                let Some(fill) = self.drum_fill_info() else {
                    return;
                };
                let mut start =
                    start_bar_sync_tick(self.master_tick, main.bar_length, self.trigger_limit(&main));
                if fill.n_tick < main.bar_length {
                    start += main.bar_length - fill.n_tick % main.bar_length;
                }
                self.sync.drum_fill_start = start;
                self.sync.drum_fill_pickup = if fill.first_tick < 0 {
                    -fill.first_tick
                } else {
                    0
                };
                self.state = PlayerState::DrumFillWaiting;
            }
            Request::Transition => match self.transition_info() {
                Some(fill) => {
                    let pickup = round_up(fill.pickup_length, n_tick);
                    self.sync.transition_pickup = pickup;
                    let start = if self.state == PlayerState::Paused
                        && !self.pedal.active_pause.is_enabled()
                    {
                        self.master_tick = fill.n_tick - pickup;
                        self.master_tick
                    } else {
                        start_bar_sync_tick(
                            self.master_tick,
                            main.bar_length,
                            self.trigger_limit(&main),
                        ) - pickup
                    };
                    self.sync.transition_start = start;
                    if fill.n_tick < fill.bar_length {
                        self.sync.transition_start +=
                            main.bar_length - fill.n_tick % fill.bar_length;
                    }
                    let skipped = self.autopilot_action
                        && self.autopilot_cue
                        && self.autopilot_transition().play_at == 0;
                    self.state = if skipped {
                        PlayerState::NoFillTransition
                    } else {
                        PlayerState::TransitionWaiting
                    };
                }
                None => self.state = PlayerState::NoFillTransition,
            },
            Request::TransitionQuit => {
                let waiting_or_active = matches!(
                    self.state,
                    PlayerState::TransitionWaiting | PlayerState::TransitionActive
                );
                match self.transition_info() {
                    Some(fill) if waiting_or_active => {
                        // A fill that has not started yet plays at least its
                        // first bar.
                        let from = self
                            .master_tick
                            .max(self.sync.transition_start + self.sync.transition_pickup);
                        let mut stop = quit_sync_tick(from, main.bar_length, 1);
                        // A fill longer than a bar quit from the first bar of
                        // the loop plays out whole.
                        let beat = (main.bar_length / fill.numerator).max(1);
                        if fill.n_tick > fill.bar_length
                            && self.master_tick / beat < fill.numerator
                            && self.autopilot_cue
                        {
                            stop *= fill.n_tick / fill.bar_length;
                        }
                        let play_for = self.autopilot_transition().play_for;
                        if self.autopilot.is_some()
                            && !self.autopilot_action
                            && self.autopilot_cue
                            && play_for > 1
                        {
                            stop = quit_sync_tick(
                                self.master_tick,
                                main.bar_length,
                                play_for as i32,
                            );
                        }
                        self.sync.transition_stop = stop;
                        self.state = PlayerState::TransitionQuitting;
                    }
                    _ => {
                        self.sync.part_stop = quit_sync_tick(self.master_tick, main.bar_length, 1);
                        self.state = PlayerState::NoFillQuitting;
                    }
                }
            }
            Request::TransitionCancel => match self.state {
                PlayerState::TransitionQuitting => self.state = PlayerState::TransitionCanceled,
                PlayerState::NoFillQuitting => self.state = PlayerState::NoFillCanceled,
                _ => {}
            },
            Request::Stop => match self.outro_info() {
                Some(outro) => {
                    let mut stop =
                        start_bar_sync_tick(self.master_tick, main.bar_length, self.trigger_limit(&main));
                    if outro.n_tick < main.bar_length {
                        stop += main.bar_length - outro.n_tick % main.bar_length;
                    }
                    self.sync.part_stop_pickup = round_up(outro.pickup_length, n_tick);
                    self.sync.part_stop = stop - self.sync.part_stop_pickup;
                    self.state = PlayerState::OutroWaiting;
                }
                None => {
                    self.sync.part_stop = quit_sync_tick(self.master_tick, main.bar_length, 1);
                    self.state = PlayerState::PlayingMainToEnd;
                }
            },
            Request::SwapToOutro => self.swap_to_outro(),
            Request::OutroCancel => match self.state {
                PlayerState::PlayingMainToEnd | PlayerState::OutroWaiting => {
                    self.state = PlayerState::PlayingMain;
                }
                PlayerState::Outro => self.state = PlayerState::OutroCanceled,
                _ => {}
            },
            Request::Start | Request::ExternalStart | Request::Pause => {}
        }
    }

    /// Keeps the main loop playing until a waiting fill or outro reaches its
    /// sync tick.
    fn run_triggers<V: Voices + ?Sized>(&mut self, ratio: f32, voices: &mut V) {
        let (sync, next) = match self.state {
            PlayerState::DrumFillWaiting => (self.sync.drum_fill_start, PlayerState::DrumFillActive),
            PlayerState::TransitionWaiting => {
                (self.sync.transition_start, PlayerState::TransitionActive)
            }
            PlayerState::OutroWaiting => (self.sync.part_stop, PlayerState::Outro),
            _ => return,
        };
        let Some(main) = self.main_info() else {
            return;
        };

        if self.next_tick <= sync {
            self.play_main(main, ratio, voices);
            if self.next_tick >= main.n_tick {
                let wrapped = sync - main.n_tick;
                match self.state {
                    PlayerState::DrumFillWaiting => self.sync.drum_fill_start = wrapped,
                    PlayerState::TransitionWaiting => self.sync.transition_start = wrapped,
                    _ => self.sync.part_stop = wrapped,
                }
                self.next_tick = 0;
            }
        } else {
            self.state = next;
            if next == PlayerState::Outro {
                self.section = Section::Outro;
            }
        }
    }

    fn play_main<V: Voices + ?Sized>(&mut self, main: TrackInfo, ratio: f32, voices: &mut V) {
        self.track_play(
            TrackRef::Song(main),
            self.master_tick,
            self.next_tick,
            ratio,
            0,
            PartRole::Main,
            voices,
        );
    }

    /// Plays `track` shifted so that its tick 0 lands on `offset`.
    fn play_shifted<V: Voices + ?Sized>(
        &mut self,
        track: TrackInfo,
        offset: i32,
        ratio: f32,
        role: PartRole,
        voices: &mut V,
    ) {
        self.track_play(
            TrackRef::Song(track),
            self.master_tick - offset,
            self.next_tick - offset,
            ratio,
            0,
            role,
            voices,
        );
    }

    /// Plays the notes hanging past the end of `track`.
    fn play_tail<V: Voices + ?Sized>(
        &mut self,
        track: TrackInfo,
        ratio: f32,
        n_tick: i32,
        role: PartRole,
        voices: &mut V,
    ) {
        self.track_play(
            TrackRef::Song(track),
            track.n_tick,
            track.n_tick + POST_EVENT_MAX_TICK,
            ratio,
            n_tick,
            role,
            voices,
        );
    }

    fn play_state<V: Voices + ?Sized>(&mut self, ratio: f32, n_tick: i32, voices: &mut V) {
        let Some(main) = self.main_info() else {
            return;
        };

        match self.state {
            PlayerState::Intro => {
                self.track_play(
                    TrackRef::Song(main),
                    self.master_tick,
                    self.next_tick,
                    ratio,
                    0,
                    PartRole::Intro,
                    voices,
                );
                if self.next_tick >= main.n_tick {
                    self.play_tail(main, ratio, n_tick, PartRole::Intro, voices);
                    self.next_tick = 0;
                    self.part_index = match self.next_part {
                        part if part > 0 && part <= self.part_count() => part - 1,
                        _ => 0,
                    };
                    self.next_part = 0;
                    self.section = Section::Part;
                    self.drum_fill_index = self.first_fill();
                    self.state = PlayerState::PlayingMain;
                    self.beats.counter = 0;
                }
            }
            PlayerState::DrumFillActive => {
                let Some(fill) = self.drum_fill_info() else {
                    self.same_part(false);
                    return;
                };
                let offset = self.sync.drum_fill_start + self.sync.drum_fill_pickup;
                self.play_shifted(fill, offset, ratio, PartRole::DrumFill, voices);

                let position =
                    self.next_tick - self.sync.drum_fill_start - self.sync.drum_fill_pickup;
                if position >= fill.n_tick {
                    self.play_tail(fill, ratio, n_tick, PartRole::DrumFill, voices);
                    if self.flags.fill_pressed {
                        self.reset_beats();
                        self.flags.fill_pressed = false;
                    }
                    self.same_part(true);
                }
            }
            PlayerState::TransitionActive => {
                let Some(fill) = self.transition_info() else {
                    self.state = PlayerState::NoFillTransition;
                    return;
                };
                let offset = self.sync.transition_start + self.sync.transition_pickup;
                self.play_shifted(fill, offset, ratio, PartRole::Transition, voices);
                if self.next_tick >= fill.n_tick + self.sync.transition_start {
                    self.sync.transition_start += fill.n_tick;
                }
            }
            PlayerState::TransitionCanceled | PlayerState::TransitionQuitting => {
                let Some(fill) = self.transition_info() else {
                    self.next_part();
                    return;
                };
                // A quit can land before the fill started.
                if self.next_tick <= self.sync.transition_start {
                    self.play_main(main, ratio, voices);
                } else {
                    let offset = self.sync.transition_start + self.sync.transition_pickup;
                    self.play_shifted(fill, offset, ratio, PartRole::Transition, voices);
                }
                if self.next_tick
                    >= fill.n_tick + self.sync.transition_start + self.sync.transition_pickup
                {
                    self.sync.transition_start += fill.n_tick;
                }
                if self.next_tick >= self.sync.transition_stop {
                    self.play_tail(fill, ratio, n_tick, PartRole::Transition, voices);
                    if self.state == PlayerState::TransitionCanceled {
                        self.same_part(false);
                    } else {
                        self.next_part();
                        self.flags.fill_pressed = false;
                    }
                }
            }
            PlayerState::NoFillTransition => {
                self.play_main(main, ratio, voices);
                if self.next_tick >= main.n_tick {
                    self.next_tick = 0;
                }
            }
            PlayerState::PlayingMain => {
                self.play_main(main, ratio, voices);
                if self.pedal_fill_bar_done(main) {
                    self.reset_beats();
                    self.flags.fill_pressed = false;
                }
                if self.next_tick >= main.n_tick {
                    self.same_part(false);
                }
                if self.fill_queue.is_empty() && self.autopilot.is_some() {
                    self.fill_queue();
                }
            }
            PlayerState::NoFillCanceled => {
                self.play_main(main, ratio, voices);
                if self.next_tick >= self.sync.part_stop {
                    self.same_part(false);
                }
            }
            PlayerState::NoFillQuitting => {
                self.play_main(main, ratio, voices);
                let last = self.part_index + 1 >= self.part_count();
                let loop_song = self.song.as_ref().is_some_and(|song| song.loop_song());
                if self.pedal_fill_bar_done(main) {
                    self.reset_beats();
                    self.flags.fill_pressed = false;
                    self.state = PlayerState::PlayingMain;
                } else if !last || loop_song {
                    if self.next_tick >= self.sync.part_stop {
                        self.next_part();
                        self.flags.fill_pressed = false;
                    }
                } else if self.next_tick >= main.n_tick {
                    // The last part loops until a stop concludes it.
                    self.next_tick = 0;
                }
            }
            PlayerState::PlayingMainToEnd => {
                self.play_main(main, ratio, voices);
                if self.next_tick >= self.sync.part_stop {
                    if self.flags.transition_pressed {
                        self.next_part();
                        self.flags.transition_pressed = false;
                    } else {
                        self.stop_song();
                    }
                }
            }
            PlayerState::Outro | PlayerState::OutroCanceled => {
                let offset = self.sync.part_stop + self.sync.part_stop_pickup;
                self.play_shifted(main, offset, ratio, PartRole::Outro, voices);
                if self.next_tick >= main.n_tick + offset {
                    self.play_tail(main, ratio, n_tick, PartRole::Outro, voices);
                    if self.state == PlayerState::OutroCanceled {
                        self.same_part(false);
                    } else {
                        self.flags.fill_pressed = false;
                        self.stop_song();
                    }
                }
            }
            PlayerState::NoSongLoaded
            | PlayerState::Stopped
            | PlayerState::Paused
            | PlayerState::OutroWaiting
            | PlayerState::TransitionWaiting
            | PlayerState::DrumFillWaiting
            | PlayerState::SingleTrackPreview => {}
        }
    }

    /// A pedal fill that found nothing to play restarts the beat count at
    /// the next bar.
    fn pedal_fill_bar_done(&self, main: TrackInfo) -> bool {
        let counter = self.beats.counter;
        self.flags.fill_pressed && counter > 1 && (counter - 1) % main.numerator as u32 == 0
    }
}
