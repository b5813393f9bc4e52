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
use serde::Deserialize;

/// What a plain tap does while paused.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UnpauseTap {
    /// Restart the song from its intro.
    Intro,
    /// Resume with a drum fill when the part has one.
    #[default]
    Fill,
}

/// What holding the pedal does while paused.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UnpauseHold {
    Stop,
    #[default]
    Transition,
}

/// Whether the song position keeps running while paused.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActivePause {
    Disable,
    Enable,
    #[default]
    MidiActivated,
}

impl ActivePause {
    pub fn is_enabled(&self) -> bool {
        !matches!(self, ActivePause::Disable)
    }
}

/// Action bound to a foot switch.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FootswitchAction {
    None,
    #[default]
    AccentHit,
    PauseUnpause,
    Outro,
}

/// Foot switch actions while playing and while stopped.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Footswitch {
    pub playing: FootswitchAction,
    pub stopped: FootswitchAction,
}

/// Pedal and foot switch behaviour.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct PedalConfig {
    /// Start the song on press instead of on release.
    pub start_on_press: bool,
    pub unpause_tap: UnpauseTap,
    pub unpause_hold: UnpauseHold,
    pub active_pause: ActivePause,
    /// A quick third tap stops the song immediately.
    pub triple_tap_stop: bool,
    pub multi_tap_window_ms: u64,
    pub primary: Footswitch,
    pub secondary: Footswitch,
}

impl Default for PedalConfig {
    fn default() -> Self {
        PedalConfig {
            start_on_press: false,
            unpause_tap: UnpauseTap::default(),
            unpause_hold: UnpauseHold::default(),
            active_pause: ActivePause::default(),
            triple_tap_stop: false,
            multi_tap_window_ms: 350,
            primary: Footswitch::default(),
            secondary: Footswitch::default(),
        }
    }
}
