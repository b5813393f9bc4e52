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
//! A pedal driven drum accompaniment player.
//!
//! Songs are built from parts, each with a looping main groove, drum fills
//! and a transition fill. A [`player::SongPlayer`] walks the song in ticks in
//! response to pedal events, a [`drumkit::SoundManager`] turns notes into
//! voices and a [`mixer::Mixer`] renders them. [`engine::Engine`] drives the
//! three together.

pub mod audio;
pub mod config;
pub mod drumkit;
pub mod engine;
pub mod mixer;
pub mod player;
pub mod song;
#[cfg(test)]
mod testutil;
