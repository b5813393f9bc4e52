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
//! Offline rendering to a WAV file.

use std::path::Path;
use std::str::FromStr;

use hound::{SampleFormat, WavSpec, WavWriter};
use tracing::info;

use super::{Command, Engine, UnknownCommand};
use crate::audio::AudioError;
use crate::mixer::SAMPLE_RATE;

/// Frames rendered between checks of the event script.
const RENDER_BLOCK_FRAMES: usize = 441;

/// A command scheduled at a point in the rendered audio.
#[derive(Debug)]
pub struct ScriptedEvent {
    /// Seconds from the start of the render.
    pub at: f64,
    pub command: Command,
}

impl FromStr for ScriptedEvent {
    type Err = UnknownCommand;

    /// Parses `<seconds>:<command>`, e.g. `2.5:release`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (at, command) = s
            .split_once(':')
            .ok_or_else(|| UnknownCommand(s.to_string()))?;
        let at: f64 = at
            .trim()
            .parse()
            .map_err(|_| UnknownCommand(s.to_string()))?;
        if !at.is_finite() || at < 0.0 {
            return Err(UnknownCommand(s.to_string()));
        }
        Ok(ScriptedEvent {
            at,
            command: command.parse()?,
        })
    }
}

/// How an offline render ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderSummary {
    pub frames: u64,
    /// Playback ran to its end before the time limit.
    pub finished: bool,
}

/// Renders the engine into a 16-bit stereo WAV file, feeding it `events` at
/// their scheduled times. Rendering ends once every event has been sent and
/// playback has finished, or after `max_seconds`.
pub fn render_to_wav(
    engine: &mut Engine,
    path: &Path,
    mut events: Vec<ScriptedEvent>,
    max_seconds: f64,
) -> Result<RenderSummary, AudioError> {
    events.sort_by(|a, b| a.at.total_cmp(&b.at));
    let mut events = events.into_iter().peekable();

    let spec = WavSpec {
        channels: 2,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut writer = WavWriter::create(path, spec)?;
    let max_frames = (max_seconds.max(0.0) * f64::from(SAMPLE_RATE)) as u64;
    let mut block = vec![0i16; RENDER_BLOCK_FRAMES * 2];
    let mut frames = 0u64;
    let mut finished = false;

    while frames < max_frames {
        let now = frames as f64 / f64::from(SAMPLE_RATE);
        while let Some(event) = events.next_if(|event| event.at <= now) {
            engine.queue(event.command);
        }

        engine.process(&mut block);
        for &sample in &block {
            writer.write_sample(sample)?;
        }
        frames += RENDER_BLOCK_FRAMES as u64;

        if engine.is_finished() && events.peek().is_none() {
            finished = true;
            break;
        }
    }
    writer.finalize()?;

    info!(
        path = %path.display(),
        seconds = frames as f64 / f64::from(SAMPLE_RATE),
        finished,
        "Render complete"
    );
    Ok(RenderSummary { frames, finished })
}
