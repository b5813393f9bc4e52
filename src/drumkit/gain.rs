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
/// Velocity gain blending table.
///
/// `gain(top, velocity)` is the linear gain, scaled by 10000, that brings a
/// sample recorded at velocity `top` down to `velocity`. Both are expressed on
/// the 1..=127 MIDI scale; entries with `velocity > top` are zero.
pub struct GainTable {
    gains: Box<[[u32; 128]; 128]>,
}

impl Default for GainTable {
    fn default() -> Self {
        Self::new()
    }
}

impl GainTable {
    pub fn new() -> GainTable {
        let mut gains = Box::new([[0u32; 128]; 128]);
        for top in 1..128usize {
            let top_db = -20.0f32 * (127.0f32 / top as f32).log10();
            for velocity in 1..=top {
                let requested_db = -20.0f32 * (127.0f32 / velocity as f32).log10();
                let difference = requested_db - top_db;
                gains[top][velocity] = (10000.0f32 * 10.0f32.powf(difference / 20.0)) as u32;
            }
        }
        GainTable { gains }
    }

    /// Gain for `velocity` within a layer group topped at `top`.
    pub fn gain(&self, top: u8, velocity: u8) -> u32 {
        self.gains
            .get(top as usize)
            .and_then(|row| row.get(velocity as usize))
            .copied()
            .unwrap_or(0)
    }
}
