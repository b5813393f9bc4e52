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
//! Audio output.
//!
//! The engine renders on its own high priority thread into a bounded sample
//! ring. A cpal output stream drains the ring into the device.

mod device;
mod error;
mod output;
mod ring;
mod thread_priority;

pub use device::{find_device, list_devices, DeviceInfo};
pub use error::AudioError;
pub use output::Output;
