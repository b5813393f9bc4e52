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
//! Player configuration.

mod error;
mod pedal;

use std::path::Path;

use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;

pub use error::ConfigError;
pub use pedal::{ActivePause, Footswitch, FootswitchAction, PedalConfig, UnpauseHold, UnpauseTap};

/// Prefix of environment variables that override configuration values.
/// Nested keys are separated by a double underscore, e.g.
/// `DRUMTRACK_PEDAL__TRIPLE_TAP_STOP=true`.
pub const ENV_PREFIX: &str = "DRUMTRACK";

/// The configuration for the playback engine.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct PlayerConfig {
    /// Length of the output ring buffer in milliseconds.
    buffer_time_ms: u32,
    /// Output level between 0 and 1.
    output_level: f32,
    /// Tempo override in BPM. The song's tempo is used when absent.
    tempo: Option<u32>,
    /// Whether a song's autopilot table is honoured.
    autopilot: bool,
    /// Fraction of a bar after which a request waits for the following bar.
    trigger_fraction: f32,
    pedal: PedalConfig,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        PlayerConfig {
            buffer_time_ms: 100,
            output_level: 1.0,
            tempo: None,
            autopilot: true,
            trigger_fraction: crate::song::DEFAULT_TRIGGER_FRACTION,
            pedal: PedalConfig::default(),
        }
    }
}

impl PlayerConfig {
    /// Loads the configuration from an optional YAML file layered with
    /// environment overrides.
    pub fn load(path: Option<&Path>) -> Result<PlayerConfig, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }
        let config: PlayerConfig = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Parses a YAML configuration without environment overrides.
    pub fn from_yaml(yaml: &str) -> Result<PlayerConfig, ConfigError> {
        let config: PlayerConfig = Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(50..=500).contains(&self.buffer_time_ms) {
            return Err(ConfigError::Invalid {
                field: "buffer_time_ms",
                reason: format!("{} is outside 50..=500", self.buffer_time_ms),
            });
        }
        if !(0.0..=1.0).contains(&self.output_level) {
            return Err(ConfigError::Invalid {
                field: "output_level",
                reason: format!("{} is outside 0..=1", self.output_level),
            });
        }
        if let Some(tempo) = self.tempo {
            if !(40..=300).contains(&tempo) {
                return Err(ConfigError::Invalid {
                    field: "tempo",
                    reason: format!("{} is outside 40..=300", tempo),
                });
            }
        }
        if !(0.0..=1.0).contains(&self.trigger_fraction) {
            return Err(ConfigError::Invalid {
                field: "trigger_fraction",
                reason: format!("{} is outside 0..=1", self.trigger_fraction),
            });
        }
        Ok(())
    }

    pub fn buffer_time_ms(&self) -> u32 {
        self.buffer_time_ms
    }

    pub fn output_level(&self) -> f32 {
        self.output_level
    }

    pub fn tempo(&self) -> Option<u32> {
        self.tempo
    }

    pub fn autopilot(&self) -> bool {
        self.autopilot
    }

    pub fn trigger_fraction(&self) -> f32 {
        self.trigger_fraction
    }

    pub fn pedal(&self) -> &PedalConfig {
        &self.pedal
    }

    /// Replaces the tempo override.
    pub fn set_tempo(&mut self, tempo: Option<u32>) {
        self.tempo = tempo;
    }
}
