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

/// Phase of the song player. The discriminants are stable and reported in
/// status displays.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PlayerState {
    #[default]
    NoSongLoaded = 0,
    Stopped = 1,
    Paused = 2,
    Intro = 3,
    PlayingMain = 4,
    /// Playing out the bar before stopping in a song without an outro.
    PlayingMainToEnd = 5,
    /// A transition was requested but the part has no transition fill. The
    /// main loop keeps looping until the transition is quit.
    NoFillTransition = 6,
    NoFillQuitting = 7,
    NoFillCanceled = 8,
    Outro = 9,
    OutroWaiting = 10,
    OutroCanceled = 11,
    TransitionWaiting = 12,
    TransitionActive = 13,
    TransitionQuitting = 14,
    TransitionCanceled = 15,
    DrumFillWaiting = 16,
    DrumFillActive = 17,
    SingleTrackPreview = 18,
}

impl PlayerState {
    pub fn code(&self) -> u8 {
        *self as u8
    }

    /// States from which an unpause may resume with a drum fill.
    pub(super) fn resumes_with_fill(&self) -> bool {
        matches!(
            self,
            PlayerState::PlayingMain
                | PlayerState::DrumFillActive
                | PlayerState::DrumFillWaiting
                | PlayerState::TransitionWaiting
                | PlayerState::TransitionActive
                | PlayerState::TransitionCanceled
                | PlayerState::TransitionQuitting
                | PlayerState::NoFillTransition
                | PlayerState::NoFillCanceled
                | PlayerState::NoFillQuitting
        )
    }
}

impl fmt::Display for PlayerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PlayerState::NoSongLoaded => "no song loaded",
            PlayerState::Stopped => "stopped",
            PlayerState::Paused => "paused",
            PlayerState::Intro => "intro",
            PlayerState::PlayingMain => "main loop",
            PlayerState::PlayingMainToEnd => "main loop to end",
            PlayerState::NoFillTransition => "transition without fill",
            PlayerState::NoFillQuitting => "quitting transition without fill",
            PlayerState::NoFillCanceled => "canceled transition without fill",
            PlayerState::Outro => "outro",
            PlayerState::OutroWaiting => "waiting for outro",
            PlayerState::OutroCanceled => "canceled outro",
            PlayerState::TransitionWaiting => "waiting for transition fill",
            PlayerState::TransitionActive => "transition fill",
            PlayerState::TransitionQuitting => "quitting transition fill",
            PlayerState::TransitionCanceled => "canceled transition fill",
            PlayerState::DrumFillWaiting => "waiting for drum fill",
            PlayerState::DrumFillActive => "drum fill",
            PlayerState::SingleTrackPreview => "track preview",
        };
        f.write_str(name)
    }
}

/// A pending request, resolved on the next processing cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Request {
    Start,
    ExternalStart,
    Stop,
    DrumFill,
    Transition,
    TransitionQuit,
    TransitionCancel,
    OutroCancel,
    Pause,
    SwapToOutro,
}

/// Pedal and foot switch events.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ButtonEvent {
    PedalPress,
    PedalRelease,
    PedalLongPress,
    PedalMultiTap,
    FootPrimary,
    FootSecondary,
}

/// Musical role of the track a note comes from. Fill choke groups compare
/// roles to keep overlapping fills from doubling.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum PartRole {
    Main = 1,
    DrumFill = 2,
    Transition = 3,
    Intro = 4,
    Outro = 5,
}

impl PartRole {
    pub fn id(&self) -> u32 {
        *self as u32
    }
}

/// Snapshot of where the player is.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PlayerStatus {
    pub state: PlayerState,
    pub part_index: usize,
    pub drum_fill_index: usize,
}

/// The section whose main loop drives the song position.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(super) enum Section {
    #[default]
    None,
    Intro,
    Part,
    Outro,
}
