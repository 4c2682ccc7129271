//! Sparse set of tracked calls addressed by stable slot ids.
//!
//! Slot ids only ever increase, so removing a call never moves another one
//! and iteration order is admission order.

use std::collections::{BTreeMap, HashMap};

use crate::call::CallId;
use crate::error::ServiceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct SlotId(u64);

#[derive(Debug)]
pub(crate) struct PendingSet<T> {
    next_slot: u64,
    slots: BTreeMap<SlotId, T>,
    index: HashMap<CallId, SlotId>,
}

impl<T> Default for PendingSet<T> {
    fn default() -> Self {
        Self {
            next_slot: 0,
            slots: BTreeMap::new(),
            index: HashMap::new(),
        }
    }
}

impl<T> PendingSet<T> {
    /// Track `item` under a fresh slot. A call may hold at most one slot.
    pub(crate) fn insert(&mut self, id: CallId, item: T) -> Result<SlotId, ServiceError> {
        if self.index.contains_key(&id) {
            return Err(ServiceError::AlreadyPending(id));
        }
        let slot = SlotId(self.next_slot);
        self.next_slot += 1;
        self.slots.insert(slot, item);
        self.index.insert(id, slot);
        Ok(slot)
    }

    pub(crate) fn remove(&mut self, id: CallId) -> Option<T> {
        let slot = self.index.remove(&id)?;
        self.slots.remove(&slot)
    }

    pub(crate) fn get(&self, id: CallId) -> Option<&T> {
        self.index.get(&id).and_then(|slot| self.slots.get(slot))
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    /// Tracked items in slot (admission) order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = &T> {
        self.slots.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u64) -> CallId {
        CallId(n)
    }

    #[test]
    fn insert_assigns_increasing_slots() {
        let mut set = PendingSet::default();
        let a = set.insert(id(1), "a").unwrap();
        let b = set.insert(id(2), "b").unwrap();
        assert!(b > a);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn same_call_cannot_take_two_slots() {
        let mut set = PendingSet::default();
        set.insert(id(1), "a").unwrap();
        assert_eq!(
            set.insert(id(1), "again"),
            Err(ServiceError::AlreadyPending(id(1)))
        );
        assert_eq!(set.len(), 1);
        assert_eq!(set.get(id(1)), Some(&"a"));
    }

    #[test]
    fn removal_keeps_remaining_order() {
        let mut set = PendingSet::default();
        for (n, name) in [(1, "a"), (2, "b"), (3, "c")] {
            set.insert(id(n), name).unwrap();
        }
        assert_eq!(set.remove(id(2)), Some("b"));
        assert_eq!(set.remove(id(2)), None);
        assert_eq!(set.iter().copied().collect::<Vec<_>>(), vec!["a", "c"]);
        assert!(set.get(id(2)).is_none());
    }

    #[test]
    fn reinsert_after_removal_goes_to_the_end() {
        let mut set = PendingSet::default();
        set.insert(id(1), "a").unwrap();
        set.insert(id(2), "b").unwrap();
        set.remove(id(1));
        set.insert(id(1), "a2").unwrap();
        assert_eq!(set.iter().copied().collect::<Vec<_>>(), vec!["b", "a2"]);
    }

    #[test]
    fn empty_set() {
        let mut set: PendingSet<&str> = PendingSet::default();
        assert_eq!(set.len(), 0);
        assert!(set.get(id(9)).is_none());
        assert!(set.remove(id(9)).is_none());
    }
}
