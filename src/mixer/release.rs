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
//! The release envelope applied to choked channels.

/// Number of rendered frames after which a releasing channel is freed.
pub const RELEASE_LENGTH: u32 = 11_025;

/// Number of non-zero steps in the release curve.
const CURVE_STEPS: u32 = 100;

/// Unity coefficient. Gains are expressed against this fixed point.
pub const UNITY: i64 = 1_000;

/// Returns the release coefficient for the given curve position.
///
/// Position 0 is the unreleased state. The curve falls linearly over the
/// first hundred positions and stays silent until the channel is freed.
#[inline]
pub fn coefficient(position: u32) -> i64 {
    if position < CURVE_STEPS {
        UNITY * i64::from(CURVE_STEPS - position) / i64::from(CURVE_STEPS)
    } else {
        0
    }
}

/// Release state of a single channel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Release {
    /// Index into the release curve. Zero means not releasing.
    position: u32,
    /// Frames to wait before the curve starts moving.
    delay: u32,
}

impl Release {
    /// Starts the release after the given number of frames.
    pub fn start(&mut self, delay: u32) {
        self.delay = delay;
        self.position = 1;
    }

    /// Whether the release has been started.
    pub fn is_active(&self) -> bool {
        self.position != 0
    }

    pub fn coefficient(&self) -> i64 {
        coefficient(self.position)
    }

    /// Advances the release by one frame. Returns true once the curve is
    /// exhausted and the channel should be freed.
    #[inline]
    pub fn advance(&mut self) -> bool {
        if self.position == 0 {
            return false;
        }
        if self.delay > 0 {
            self.delay -= 1;
            false
        } else {
            self.position += 1;
            self.position >= RELEASE_LENGTH
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_curve_is_monotonic() {
        assert_eq!(coefficient(0), 1000);
        assert_eq!(coefficient(1), 990);
        assert_eq!(coefficient(99), 10);
        assert_eq!(coefficient(100), 0);
        assert_eq!(coefficient(5000), 0);
        for position in 1..200 {
            assert!(coefficient(position) <= coefficient(position - 1));
        }
    }

    #[test]
    fn test_release_waits_for_delay() {
        let mut release = Release::default();
        assert!(!release.is_active());
        assert!(!release.advance());

        release.start(3);
        assert!(release.is_active());
        for _ in 0..3 {
            assert!(!release.advance());
            assert_eq!(release.coefficient(), 990);
        }
        assert!(!release.advance());
        assert_eq!(release.coefficient(), 980);
    }

    #[test]
    fn test_release_finishes() {
        let mut release = Release::default();
        release.start(0);
        let mut frames = 0;
        while !release.advance() {
            frames += 1;
        }
        assert_eq!(frames, RELEASE_LENGTH - 2);
    }
}
