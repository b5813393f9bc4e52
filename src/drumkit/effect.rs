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
use std::io::Read;
use std::path::Path;

use hound::WavReader;
use tracing::info;

use super::error::DrumkitError;
use crate::mixer::{SampleData, SampleFormat, SAMPLE_RATE};

/// Decodes PCM WAV data into a special effect sample.
///
/// Only integer 16 or 24-bit data at 44.1 kHz with one or two channels is
/// accepted.
pub fn decode_effect<R: Read>(reader: R) -> Result<SampleData, DrumkitError> {
    let mut reader = WavReader::new(reader)?;
    let spec = reader.spec();

    if spec.sample_format != hound::SampleFormat::Int {
        return Err(DrumkitError::UnsupportedEffect(
            "floating point samples".to_string(),
        ));
    }
    if spec.sample_rate != SAMPLE_RATE {
        return Err(DrumkitError::UnsupportedEffect(format!(
            "sample rate {} Hz",
            spec.sample_rate
        )));
    }
    let format = SampleFormat::from_layout(spec.bits_per_sample, spec.channels).ok_or_else(|| {
        DrumkitError::UnsupportedEffect(format!(
            "{}-bit with {} channels",
            spec.bits_per_sample, spec.channels
        ))
    })?;

    let width = format.bytes_per_value();
    let mut pcm = Vec::with_capacity(reader.len() as usize * width);
    for sample in reader.samples::<i32>() {
        let bytes = sample?.to_le_bytes();
        pcm.extend_from_slice(&bytes[..width]);
    }
    Ok(SampleData::from_pcm(pcm, format))
}

/// Loads a special effect from a WAV file.
pub fn load_effect(path: &Path) -> Result<SampleData, DrumkitError> {
    let file = std::fs::File::open(path)?;
    let sample = decode_effect(std::io::BufReader::new(file))?;
    info!(
        path = ?path,
        format = %sample.format(),
        values = sample.value_count(),
        "Loaded special effect"
    );
    Ok(sample)
}
