//! Discrete heading-bin grid over the full circle.

use crate::util::math::wrap_two_pi;
use crate::util::{VoteBoxError, VoteBoxResult};
use std::f32::consts::TAU;

/// Uniform circular grid of heading bins covering [0, 2π).
///
/// Bin `i` spans `[i*w, (i+1)*w)` with width `w = 2π / len`; its center is
/// `i * w`, so bin 0 is centered on heading 0.
#[derive(Clone, Copy, Debug)]
pub struct HeadingGrid {
    len: usize,
}

impl HeadingGrid {
    /// Creates a grid with `num_bins` bins.
    pub fn new(num_bins: usize) -> VoteBoxResult<Self> {
        if num_bins == 0 {
            return Err(VoteBoxError::InvalidConfig {
                reason: "num_heading_bin must be >= 1",
            });
        }
        Ok(Self { len: num_bins })
    }

    /// Returns the number of bins.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the grid has no bins (never, by construction).
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the angular width of one bin in radians.
    pub fn bin_width(&self) -> f32 {
        TAU / self.len as f32
    }

    /// Returns the center angle of bin `idx` in [0, 2π).
    pub fn bin_center(&self, idx: usize) -> f32 {
        debug_assert!(idx < self.len);
        wrap_two_pi(idx as f32 * self.bin_width())
    }

    /// Returns the bin whose center is circularly nearest to `angle`.
    ///
    /// Used when deriving training targets from ground-truth headings.
    pub fn nearest_bin(&self, angle: f32) -> usize {
        let shifted = wrap_two_pi(angle + self.bin_width() / 2.0);
        let idx = (shifted / self.bin_width()) as usize;
        idx.min(self.len - 1)
    }

    /// Decodes a bin index and residual into a heading in [0, 2π).
    pub fn decode(&self, idx: usize, residual: f32) -> f32 {
        wrap_two_pi(self.bin_center(idx) + residual)
    }
}
