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
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("no output device named \"{0}\"")]
    NoDevice(String),

    #[error("no default output device")]
    NoDefaultDevice,

    #[error("device does not support 16-bit stereo at {0} Hz")]
    UnsupportedConfig(u32),

    #[error(transparent)]
    Host(#[from] cpal::HostUnavailable),

    #[error(transparent)]
    Devices(#[from] cpal::DevicesError),

    #[error(transparent)]
    DeviceName(#[from] cpal::DeviceNameError),

    #[error(transparent)]
    Configs(#[from] cpal::SupportedStreamConfigsError),

    #[error(transparent)]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error(transparent)]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
