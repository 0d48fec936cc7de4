//! Paddle slots and the vacant slot pool

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Side of the field a joined player controls
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Slot {
    Left,
    Right,
}

impl Slot {
    /// Both valid slots, in pool order
    pub const ALL: [Slot; 2] = [Slot::Left, Slot::Right];

    pub fn opposite(self) -> Self {
        match self {
            Slot::Left => Slot::Right,
            Slot::Right => Slot::Left,
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Slot::Left => f.write_str("left"),
            Slot::Right => f.write_str("right"),
        }
    }
}

/// Set-backed pool of slots not currently held by a player
#[derive(Debug, Clone)]
pub struct SlotPool {
    vacant: BTreeSet<Slot>,
}

impl SlotPool {
    /// A pool holding every slot
    pub fn full() -> Self {
        Self {
            vacant: Slot::ALL.into_iter().collect(),
        }
    }

    /// Take a vacant slot out of the pool
    pub fn take(&mut self) -> Option<Slot> {
        self.vacant.pop_first()
    }

    /// Return a slot to the pool. Returns false if it was already vacant.
    pub fn release(&mut self, slot: Slot) -> bool {
        self.vacant.insert(slot)
    }

    pub fn is_vacant(&self, slot: Slot) -> bool {
        self.vacant.contains(&slot)
    }

    pub fn vacant_count(&self) -> usize {
        self.vacant.len()
    }

    pub fn capacity(&self) -> usize {
        Slot::ALL.len()
    }
}

impl Default for SlotPool {
    fn default() -> Self {
        Self::full()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_hands_out_each_slot_once() {
        let mut pool = SlotPool::full();
        let first = pool.take().unwrap();
        let second = pool.take().unwrap();

        assert_ne!(first, second);
        assert_eq!(pool.take(), None);
        assert_eq!(pool.vacant_count(), 0);
    }

    #[test]
    fn release_refuses_double_free() {
        let mut pool = SlotPool::full();
        let slot = pool.take().unwrap();

        assert!(!pool.is_vacant(slot));
        assert!(pool.release(slot));
        assert!(!pool.release(slot));
        assert_eq!(pool.vacant_count(), pool.capacity());
    }

    #[test]
    fn opposite_is_an_involution() {
        for slot in Slot::ALL {
            assert_ne!(slot, slot.opposite());
            assert_eq!(slot, slot.opposite().opposite());
        }
    }
}
