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
use std::io;

/// Errors raised while decoding a drumkit blob or loading a special effect.
#[derive(Debug, thiserror::Error)]
pub enum DrumkitError {
    #[error("Drumkit blob is truncated: need {needed} bytes, have {actual}")]
    Truncated { needed: usize, actual: usize },
    #[error("Drumkit blob has unexpected file type {0:?}")]
    BadMagic([u8; 4]),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("WAV decode error: {0}")]
    Wav(#[from] hound::Error),
    #[error("Unsupported effect format: {0}")]
    UnsupportedEffect(String),
}
