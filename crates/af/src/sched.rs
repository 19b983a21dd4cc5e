//! Priorities and the ready set.
//!
//! Scheduling state is a single 64-bit word: bit `n` set means the active
//! object at priority `n` has events pending. Picking the next object to run
//! is one leading-zeros instruction away, so the scheduler costs the same
//! whether two or sixty objects are ready.

use thiserror::Error;

/// Identifier assigned to an active object at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AoId(pub u8);

/// A scheduling priority in `1..=63`; higher value wins.
///
/// Zero is reserved so "nothing ready" has a natural encoding in the
/// ready-set word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Priority(u8);

/// Priority outside the supported `1..=63` band.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("priority {0} outside 1..=63")]
pub struct PriorityRange(pub u8);

impl Priority {
    pub const MIN: Priority = Priority(1);
    pub const MAX: Priority = Priority(63);

    pub fn new(value: u8) -> Result<Self, PriorityRange> {
        if (1..=63).contains(&value) {
            Ok(Self(value))
        } else {
            Err(PriorityRange(value))
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

/// Bitmap of priorities with pending work.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReadySet {
    bits: u64,
}

impl ReadySet {
    pub const fn new() -> Self {
        Self { bits: 0 }
    }

    pub fn insert(&mut self, prio: Priority) {
        self.bits |= 1u64 << prio.get();
    }

    pub fn remove(&mut self, prio: Priority) {
        self.bits &= !(1u64 << prio.get());
    }

    pub fn contains(&self, prio: Priority) -> bool {
        self.bits & (1u64 << prio.get()) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }

    /// Highest ready priority, if any.
    pub fn max(&self) -> Option<Priority> {
        if self.bits == 0 {
            None
        } else {
            Some(Priority((63 - self.bits.leading_zeros()) as u8))
        }
    }

    pub fn clear(&mut self) {
        self.bits = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(v: u8) -> Priority {
        Priority::new(v).unwrap()
    }

    #[test]
    fn rejects_out_of_band_priorities() {
        assert!(Priority::new(0).is_err());
        assert!(Priority::new(64).is_err());
        assert_eq!(Priority::new(1).unwrap(), Priority::MIN);
        assert_eq!(Priority::new(63).unwrap(), Priority::MAX);
    }

    #[test]
    fn max_tracks_highest_set_bit() {
        let mut set = ReadySet::new();
        assert_eq!(set.max(), None);

        set.insert(p(3));
        set.insert(p(41));
        set.insert(p(7));
        assert_eq!(set.max(), Some(p(41)));

        set.remove(p(41));
        assert_eq!(set.max(), Some(p(7)));

        set.remove(p(7));
        set.remove(p(3));
        assert!(set.is_empty());
        assert_eq!(set.max(), None);
    }

    #[test]
    fn insert_is_idempotent() {
        let mut set = ReadySet::new();
        set.insert(p(5));
        set.insert(p(5));
        assert!(set.contains(p(5)));
        set.remove(p(5));
        assert!(!set.contains(p(5)));
        assert!(set.is_empty());
    }
}
