//! Modification timestamps.
//!
//! Every stamp draws from one process-wide counter, so stamps taken on
//! different objects can be compared: a stamp modified later is strictly
//! greater. The executive relies on this to decide whether a cached output is
//! older than anything it depends on.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide counter. Zero is reserved for "never modified".
static GLOBAL_TIME: AtomicU64 = AtomicU64::new(0);

/// A monotonically increasing modification time.
#[derive(Default)]
pub struct TimeStamp {
    time: AtomicU64,
}

impl TimeStamp {
    /// Create a stamp that has never been modified (reads as 0).
    #[must_use]
    pub const fn new() -> Self {
        Self { time: AtomicU64::new(0) }
    }

    /// Create a stamp that is already marked modified.
    #[must_use]
    pub fn modified_now() -> Self {
        let stamp = Self::new();
        stamp.modified();
        stamp
    }

    /// Advance this stamp to a fresh value of the global counter.
    ///
    /// Returns the new value.
    pub fn modified(&self) -> u64 {
        let next = GLOBAL_TIME.fetch_add(1, Ordering::AcqRel) + 1;
        self.time.fetch_max(next, Ordering::AcqRel);
        next
    }

    /// Current value of this stamp.
    #[must_use]
    pub fn get(&self) -> u64 {
        self.time.load(Ordering::Acquire)
    }

    /// Last value handed out by the global counter.
    #[must_use]
    pub fn current() -> u64 {
        GLOBAL_TIME.load(Ordering::Acquire)
    }
}

impl Clone for TimeStamp {
    fn clone(&self) -> Self {
        Self { time: AtomicU64::new(self.get()) }
    }
}

impl fmt::Debug for TimeStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TimeStamp").field(&self.get()).finish()
    }
}

impl PartialEq for TimeStamp {
    fn eq(&self, other: &Self) -> bool {
        self.get() == other.get()
    }
}

impl Eq for TimeStamp {}

impl PartialOrd for TimeStamp {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimeStamp {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.get().cmp(&other.get())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_stamp_is_zero() {
        assert_eq!(TimeStamp::new().get(), 0);
    }

    #[test]
    fn test_modified_increases() {
        let stamp = TimeStamp::new();
        let first = stamp.modified();
        let second = stamp.modified();
        assert!(second > first);
        assert_eq!(stamp.get(), second);
    }

    #[test]
    fn test_stamps_are_globally_ordered() {
        let a = TimeStamp::modified_now();
        let b = TimeStamp::modified_now();
        assert!(b > a);
        a.modified();
        assert!(a > b);
    }

    #[test]
    fn test_current_tracks_latest() {
        let stamp = TimeStamp::new();
        let value = stamp.modified();
        assert!(TimeStamp::current() >= value);
    }
}
