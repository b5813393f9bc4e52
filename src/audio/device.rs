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

use cpal::traits::{DeviceTrait, HostTrait};
use tracing::error;

use super::AudioError;

/// An output device as reported by its host.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceInfo {
    pub name: String,
    pub host: String,
    pub max_channels: u16,
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (Channels={}) ({})",
            self.name, self.max_channels, self.host
        )
    }
}

/// Output devices of every available host, sorted by name.
pub fn list_devices() -> Result<Vec<DeviceInfo>, AudioError> {
    Ok(output_devices()?
        .into_iter()
        .map(|(info, _)| info)
        .collect())
}

/// Finds an output device by name, or the default device when no name is
/// given.
pub fn find_device(name: Option<&str>) -> Result<cpal::Device, AudioError> {
    let Some(name) = name else {
        return cpal::default_host()
            .default_output_device()
            .ok_or(AudioError::NoDefaultDevice);
    };
    output_devices()?
        .into_iter()
        .find(|(info, _)| info.name.trim() == name)
        .map(|(_, device)| device)
        .ok_or_else(|| AudioError::NoDevice(name.to_string()))
}

fn output_devices() -> Result<Vec<(DeviceInfo, cpal::Device)>, AudioError> {
    // Some hosts print noise while probing.
    let _shh_stdout = shh::stdout()?;
    let _shh_stderr = shh::stderr()?;

    let mut devices = Vec::new();
    for host_id in cpal::available_hosts() {
        let host_devices = match cpal::host_from_id(host_id)?.devices() {
            Ok(host_devices) => host_devices,
            Err(e) => {
                error!(
                    err = e.to_string(),
                    host = host_id.name(),
                    "Unable to list devices for host"
                );
                continue;
            }
        };

        for device in host_devices {
            let Ok(configs) = device.supported_output_configs() else {
                continue;
            };
            let max_channels = configs.map(|config| config.channels()).max().unwrap_or(0);
            if max_channels > 0 {
                devices.push((
                    DeviceInfo {
                        name: device.name()?,
                        host: host_id.name().to_string(),
                        max_channels,
                    },
                    device,
                ));
            }
        }
    }

    devices.sort_by(|(a, _), (b, _)| a.name.cmp(&b.name));
    Ok(devices)
}
