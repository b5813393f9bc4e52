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
//! Pedal and foot switch handling.
//!
//! Events are first gated against the pedal history, then handed to the
//! handler of the current state. Handlers only queue requests. The next
//! [`SongPlayer::process`] call acts on them.

use tracing::debug;

use crate::config::{FootswitchAction, UnpauseHold};

use super::{ButtonEvent, PlayerState, Request, SongPlayer, Voices};

/// Velocity of an accent hit played from a foot switch.
const ACCENT_VELOCITY: u8 = 100;

impl SongPlayer {
    /// Handles a pedal or foot switch event that happened at `time_ms`.
    pub fn button<V: Voices + ?Sized>(&mut self, event: ButtonEvent, time_ms: u64, voices: &mut V) {
        debug!(?event, state = %self.state, "Button event");
        let Some(event) = self.gate(event, time_ms, voices) else {
            return;
        };
        if self.flags.multi_taps > 1 {
            return;
        }

        match self.state {
            PlayerState::Stopped => self.on_stopped(event),
            PlayerState::Paused => self.on_paused(event),
            PlayerState::Intro => {
                if event == ButtonEvent::PedalMultiTap {
                    self.request = Some(Request::SwapToOutro);
                    self.reset_taps();
                }
            }
            PlayerState::PlayingMain => self.on_playing_main(event),
            PlayerState::PlayingMainToEnd => {
                if event == ButtonEvent::PedalRelease {
                    self.request = Some(Request::OutroCancel);
                    self.flags.fill_pressed = true;
                }
            }
            PlayerState::NoFillTransition
            | PlayerState::TransitionWaiting
            | PlayerState::TransitionActive => match event {
                ButtonEvent::PedalRelease => self.request = Some(Request::TransitionQuit),
                ButtonEvent::PedalMultiTap => self.request_stop(),
                _ => {}
            },
            PlayerState::NoFillQuitting => match event {
                ButtonEvent::PedalRelease => self.quitting_release(event),
                ButtonEvent::PedalMultiTap => self.request_stop(),
                _ => {}
            },
            PlayerState::TransitionQuitting => {
                if matches!(event, ButtonEvent::PedalRelease | ButtonEvent::PedalMultiTap) {
                    self.quitting_release(event);
                    if self.request == Some(Request::TransitionCancel) {
                        self.flags.long_pressed = true;
                    }
                }
            }
            PlayerState::DrumFillWaiting | PlayerState::DrumFillActive => match event {
                ButtonEvent::PedalLongPress => {
                    if self.state == PlayerState::DrumFillWaiting {
                        self.next_part = 0;
                    }
                    self.request = Some(Request::Transition);
                }
                ButtonEvent::PedalMultiTap => self.request_stop(),
                ButtonEvent::PedalRelease if self.state == PlayerState::DrumFillActive => {
                    self.request = Some(Request::DrumFill);
                    self.flags.fill_pressed = true;
                }
                _ => {}
            },
            PlayerState::Outro | PlayerState::OutroWaiting => {
                if matches!(event, ButtonEvent::PedalPress | ButtonEvent::PedalMultiTap) {
                    self.request = Some(Request::OutroCancel);
                    // The release of this press must not trigger anything.
                    self.flags.pressed = false;
                    self.flags.long_pressed = true;
                    if self.state == PlayerState::OutroWaiting {
                        self.reset_taps();
                    }
                }
            }
            PlayerState::NoSongLoaded
            | PlayerState::NoFillCanceled
            | PlayerState::TransitionCanceled
            | PlayerState::OutroCanceled
            | PlayerState::SingleTrackPreview => {}
        }
    }

    /// Updates the pedal history and resolves foot switches. Returns the
    /// event the state handlers should see, if any.
    fn gate<V: Voices + ?Sized>(
        &mut self,
        event: ButtonEvent,
        time_ms: u64,
        voices: &mut V,
    ) -> Option<ButtonEvent> {
        match event {
            ButtonEvent::PedalPress => {
                self.flags.multi_taps = 0;
                self.flags.was_paused = false;
                self.flags.pressed = true;
                self.flags.long_pressed = false;
                Some(event)
            }
            ButtonEvent::PedalRelease => self.flags.pressed.then_some(event),
            ButtonEvent::PedalLongPress => {
                self.flags.long_pressed = true;
                self.flags.pressed.then_some(event)
            }
            ButtonEvent::PedalMultiTap => {
                let mut event = event;
                if self.flags.multi_taps > 0 {
                    let elapsed = time_ms.saturating_sub(self.flags.last_tap_ms);
                    if elapsed < self.pedal.multi_tap_window_ms && self.pedal.triple_tap_stop {
                        self.flags.fill_pressed = false;
                        self.stop_song();
                    }
                } else if self.flags.long_pressed {
                    // A tap right after a long press is a fresh press.
                    event = ButtonEvent::PedalPress;
                    self.flags.was_paused = false;
                    self.flags.pressed = true;
                    self.flags.long_pressed = false;
                }
                self.flags.last_tap_ms = time_ms;
                self.flags.multi_taps = self.flags.multi_taps.saturating_add(1);
                Some(event)
            }
            ButtonEvent::FootPrimary | ButtonEvent::FootSecondary => {
                let switch = if event == ButtonEvent::FootPrimary {
                    self.pedal.primary
                } else {
                    self.pedal.secondary
                };
                match self.state {
                    PlayerState::NoSongLoaded => Some(event),
                    PlayerState::Stopped => {
                        if switch.stopped == FootswitchAction::AccentHit {
                            voices.accent(ACCENT_VELOCITY, self.part_index);
                        }
                        Some(event)
                    }
                    _ => match switch.playing {
                        FootswitchAction::PauseUnpause => {
                            self.flags.pressed = false;
                            self.request_pause();
                            Some(event)
                        }
                        FootswitchAction::AccentHit => {
                            voices.accent(ACCENT_VELOCITY, self.part_index);
                            Some(event)
                        }
                        FootswitchAction::Outro => Some(ButtonEvent::PedalMultiTap),
                        FootswitchAction::None => Some(event),
                    },
                }
            }
        }
    }

    fn reset_taps(&mut self) {
        if !self.pedal.triple_tap_stop {
            self.flags.multi_taps = 0;
        }
    }

    fn request_stop(&mut self) {
        self.request = Some(Request::Stop);
        self.flags.pressed = false;
        self.reset_taps();
    }

    fn on_stopped(&mut self, event: ButtonEvent) {
        let start_on_press = self.pedal.start_on_press;
        match event {
            ButtonEvent::PedalPress if start_on_press && self.flags.pressed => {
                self.request = Some(Request::Start);
                self.flags.pressed = false;
            }
            ButtonEvent::PedalRelease if !start_on_press && self.flags.pressed => {
                self.request = Some(Request::Start);
            }
            _ => {}
        }
    }

    fn on_paused(&mut self, event: ButtonEvent) {
        let start_on_press = self.pedal.start_on_press;
        match event {
            ButtonEvent::PedalPress if start_on_press => {
                self.request = Some(Request::Start);
                self.flags.pressed = false;
            }
            ButtonEvent::PedalRelease if !start_on_press => {
                self.request = Some(Request::Start);
            }
            ButtonEvent::PedalLongPress => match self.pedal.unpause_hold {
                UnpauseHold::Transition => {
                    self.next_part = 0;
                    self.request = Some(Request::Transition);
                }
                UnpauseHold::Stop => {
                    // The coming release must not start the song again.
                    self.flags.pressed = false;
                    self.stop_song();
                }
            },
            ButtonEvent::PedalMultiTap => self.stop_song(),
            _ => {}
        }
    }

    fn on_playing_main(&mut self, event: ButtonEvent) {
        match event {
            ButtonEvent::PedalRelease => {
                self.request = Some(Request::DrumFill);
                self.flags.fill_pressed = true;
            }
            ButtonEvent::PedalLongPress => {
                self.next_part = 0;
                self.request = Some(Request::Transition);
                self.flags.transition_pressed = true;
            }
            ButtonEvent::PedalMultiTap => {
                if self.flags.was_paused {
                    self.request = Some(Request::SwapToOutro);
                } else {
                    self.request_stop();
                }
            }
            _ => {}
        }
    }

    /// A release while quitting a transition asks for a drum fill, unless
    /// it ends a long press or a tap, in which case the quit is canceled.
    fn quitting_release(&mut self, event: ButtonEvent) {
        if !self.flags.long_pressed && self.flags.multi_taps == 0 {
            self.on_playing_main(event);
        } else {
            self.request = Some(Request::TransitionCancel);
        }
    }
}
