//! Structured extents.
//!
//! An [`Extent`] is a half-open box of integer sample indices over up to
//! three axes: `[min, max)` per axis. One-dimensional extents keep the unused
//! axes at `[0, 1)`. A box with any axis where `min >= max` is empty.

use std::fmt;

/// Half-open integer box over three axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Extent {
    /// Inclusive lower corner.
    pub min: [i64; 3],
    /// Exclusive upper corner.
    pub max: [i64; 3],
}

impl Extent {
    /// The canonical empty extent.
    pub const EMPTY: Extent = Extent { min: [0; 3], max: [0; 3] };

    /// Create an extent from its corners.
    #[must_use]
    pub const fn new(min: [i64; 3], max: [i64; 3]) -> Self {
        Self { min, max }
    }

    /// Create a one-dimensional extent `[start, end)`.
    #[must_use]
    pub const fn new_1d(start: i64, end: i64) -> Self {
        Self { min: [start, 0, 0], max: [end, 1, 1] }
    }

    /// Returns true if the extent covers no samples.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        (0..3).any(|axis| self.min[axis] >= self.max[axis])
    }

    /// Number of samples covered, saturating at `u64::MAX`.
    #[must_use]
    pub fn len(&self) -> u64 {
        if self.is_empty() {
            return 0;
        }
        self.dimensions().iter().fold(1u64, |acc, &d| acc.saturating_mul(d))
    }

    /// Size along each axis (zero for empty axes).
    #[must_use]
    pub fn dimensions(&self) -> [u64; 3] {
        let mut dims = [0u64; 3];
        for axis in 0..3 {
            if self.max[axis] > self.min[axis] {
                dims[axis] = self.max[axis].abs_diff(self.min[axis]);
            }
        }
        dims
    }

    /// Returns true if `other` lies entirely inside this extent.
    ///
    /// Every extent contains the empty extent.
    #[must_use]
    pub fn contains(&self, other: &Extent) -> bool {
        if other.is_empty() {
            return true;
        }
        (0..3).all(|axis| self.min[axis] <= other.min[axis] && other.max[axis] <= self.max[axis])
    }

    /// Overlap of two extents, or [`Extent::EMPTY`] if they do not overlap.
    #[must_use]
    pub fn intersection(&self, other: &Extent) -> Extent {
        let mut out = Extent::EMPTY;
        for axis in 0..3 {
            out.min[axis] = self.min[axis].max(other.min[axis]);
            out.max[axis] = self.max[axis].min(other.max[axis]);
        }
        if out.is_empty() {
            Extent::EMPTY
        } else {
            out
        }
    }

    /// Smallest extent covering both. Empty operands are ignored.
    #[must_use]
    pub fn union(&self, other: &Extent) -> Extent {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        let mut out = *self;
        for axis in 0..3 {
            out.min[axis] = self.min[axis].min(other.min[axis]);
            out.max[axis] = self.max[axis].max(other.max[axis]);
        }
        out
    }

    /// Flatten to `[x0, x1, y0, y1, z0, z1]`, the layout stored in information.
    #[must_use]
    pub fn to_vec(&self) -> Vec<i64> {
        vec![self.min[0], self.max[0], self.min[1], self.max[1], self.min[2], self.max[2]]
    }

    /// Inverse of [`Extent::to_vec`]. Returns `None` unless given six values.
    #[must_use]
    pub fn from_slice(values: &[i64]) -> Option<Extent> {
        match *values {
            [x0, x1, y0, y1, z0, z1] => Some(Extent { min: [x0, y0, z0], max: [x1, y1, z1] }),
            _ => None,
        }
    }
}

impl Default for Extent {
    fn default() -> Self {
        Extent::EMPTY
    }
}

impl fmt::Display for Extent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.min[1..] == [0, 0] && self.max[1..] == [1, 1] {
            return write!(f, "[{}, {})", self.min[0], self.max[0]);
        }
        write!(
            f,
            "[{}, {}) x [{}, {}) x [{}, {})",
            self.min[0], self.max[0], self.min[1], self.max[1], self.min[2], self.max[2]
        )
    }
}
