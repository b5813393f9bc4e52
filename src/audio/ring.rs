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
use std::collections::VecDeque;

use parking_lot::Mutex;

/// Bounded FIFO of interleaved samples between the engine thread and the
/// output callback.
pub(super) struct SampleRing {
    samples: Mutex<VecDeque<i16>>,
    capacity: usize,
}

impl SampleRing {
    pub(super) fn new(capacity: usize) -> SampleRing {
        SampleRing {
            samples: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Room left, in samples.
    pub(super) fn space(&self) -> usize {
        self.capacity - self.samples.lock().len()
    }

    /// Appends as many samples as fit and returns how many were written.
    pub(super) fn write(&self, samples: &[i16]) -> usize {
        let mut ring = self.samples.lock();
        let count = (self.capacity - ring.len()).min(samples.len());
        ring.extend(&samples[..count]);
        count
    }

    /// Moves up to `output.len()` samples out and returns how many were read.
    pub(super) fn read(&self, output: &mut [i16]) -> usize {
        let mut ring = self.samples.lock();
        let count = ring.len().min(output.len());
        for (sample, value) in output.iter_mut().zip(ring.drain(..count)) {
            *sample = value;
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_is_bounded() {
        let ring = SampleRing::new(4);
        assert_eq!(ring.space(), 4);
        assert_eq!(ring.write(&[1, 2, 3]), 3);
        assert_eq!(ring.write(&[4, 5, 6]), 1);
        assert_eq!(ring.space(), 0);
    }

    #[test]
    fn test_read_in_order() {
        let ring = SampleRing::new(8);
        ring.write(&[1, 2, 3]);
        let mut out = [0i16; 2];
        assert_eq!(ring.read(&mut out), 2);
        assert_eq!(out, [1, 2]);

        let mut out = [9i16; 4];
        assert_eq!(ring.read(&mut out), 1);
        assert_eq!(out, [3, 9, 9, 9]);
        assert_eq!(ring.space(), 8);
    }
}
