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
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use cpal::traits::{DeviceTrait, StreamTrait};
use tracing::{error, info};

use super::ring::SampleRing;
use super::thread_priority::{configure_engine_thread, engine_thread_priority, rt_audio_enabled};
use super::{find_device, AudioError};
use crate::engine::Engine;
use crate::mixer::SAMPLE_RATE;

/// Frames the engine renders per pass into the ring.
const ENGINE_BLOCK_FRAMES: usize = 256;

/// Live playback: the engine thread and the device stream. Dropping it stops
/// both.
pub struct Output {
    stream: cpal::Stream,
    running: Arc<AtomicBool>,
    engine_thread: Option<thread::JoinHandle<()>>,
}

impl Output {
    /// Moves `engine` onto a dedicated thread and starts streaming to the
    /// named device, or the default device.
    pub fn start(
        device_name: Option<&str>,
        engine: Engine,
        buffer_time_ms: u32,
    ) -> Result<Output, AudioError> {
        let device = find_device(device_name)?;
        let capacity = (SAMPLE_RATE as usize * buffer_time_ms as usize / 1000) * 2;
        let ring = Arc::new(SampleRing::new(capacity.max(ENGINE_BLOCK_FRAMES * 2)));
        let running = Arc::new(AtomicBool::new(true));

        let engine_thread = spawn_engine(engine, ring.clone(), running.clone())?;

        let config = cpal::StreamConfig {
            channels: 2,
            sample_rate: SAMPLE_RATE,
            buffer_size: cpal::BufferSize::Default,
        };
        let reader = ring;
        let stream = match device.build_output_stream(
            &config,
            move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                let read = reader.read(data);
                data[read..].fill(0);
            },
            |err| error!(err = %err, "Output stream error"),
            None,
        ) {
            Ok(stream) => stream,
            Err(cpal::BuildStreamError::StreamConfigNotSupported) => {
                running.store(false, Ordering::Relaxed);
                return Err(AudioError::UnsupportedConfig(SAMPLE_RATE));
            }
            Err(e) => {
                running.store(false, Ordering::Relaxed);
                return Err(e.into());
            }
        };
        if let Err(e) = stream.play() {
            running.store(false, Ordering::Relaxed);
            return Err(e.into());
        }
        info!(buffer_time_ms, "Output stream started");

        Ok(Output {
            stream,
            running,
            engine_thread: Some(engine_thread),
        })
    }
}

impl Drop for Output {
    fn drop(&mut self) {
        let _ = self.stream.pause();
        self.running.store(false, Ordering::Relaxed);
        if let Some(thread) = self.engine_thread.take() {
            let _ = thread.join();
        }
    }
}

/// Runs the engine whenever the ring has room for another block.
fn spawn_engine(
    mut engine: Engine,
    ring: Arc<SampleRing>,
    running: Arc<AtomicBool>,
) -> Result<thread::JoinHandle<()>, AudioError> {
    let handle = thread::Builder::new()
        .name("drumtrack-engine".to_string())
        .spawn(move || {
            configure_engine_thread(engine_thread_priority(), rt_audio_enabled());
            let mut block = vec![0i16; ENGINE_BLOCK_FRAMES * 2];
            while running.load(Ordering::Relaxed) {
                if ring.space() >= block.len() {
                    engine.process(&mut block);
                    ring.write(&block);
                } else {
                    thread::sleep(Duration::from_micros(500));
                }
            }
        })?;
    Ok(handle)
}
