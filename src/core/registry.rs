//! # Stable-slot registry with lock-free snapshots.
//!
//! [`SlotRegistry`] stores subscribers and interceptors in a slot array. An entry keeps
//! its index until removed; a removal leaves a hole that the next `add` fills, so
//! registration order is observable only through slot indices.
//!
//! ## Architecture
//! ```text
//! writers ──► gate (parking_lot::Mutex) ──► copy slots ──► mutate ──► ArcSwap::store
//! readers ──────────────────────────────────────────────────────────► ArcSwap::load_full
//! ```
//!
//! ## Rules
//! - Mutations are serialized by `gate` and publish a fresh [`Slots`] (copy-on-write).
//! - A [`Slots`] snapshot is immutable: a dispatch iterating it never observes a
//!   concurrent add/remove, and never blocks writers.
//! - Growth is `max(cap + cap / 2, cap + 1)`; `clear` keeps the capacity.
//! - `last` is the highest occupied index (`None` when empty) and bounds iteration.

use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;

use crate::error::RouteError;

/// Immutable view of a registry at one point in time.
pub(crate) struct Slots<T: ?Sized> {
    entries: Box<[Option<Arc<T>>]>,
    last: Option<usize>,
}

impl<T: ?Sized> Slots<T> {
    fn with_capacity(capacity: usize) -> Self {
        Self::from_vec((0..capacity).map(|_| None).collect())
    }

    fn from_vec(entries: Vec<Option<Arc<T>>>) -> Self {
        let last = entries.iter().rposition(Option::is_some);
        Self {
            entries: entries.into_boxed_slice(),
            last,
        }
    }

    /// Slots up to and including the last occupied one (holes included).
    pub(crate) fn live(&self) -> &[Option<Arc<T>>] {
        match self.last {
            Some(last) => &self.entries[..=last],
            None => &[],
        }
    }

    #[cfg(test)]
    /// Iterates the live range, yielding `None` for holes.
    pub(crate) fn iter(&self) -> impl Iterator<Item = Option<&Arc<T>>> {
        self.live().iter().map(Option::as_ref)
    }

    /// Iterates occupied slots in index order.
    pub(crate) fn occupied(&self) -> impl Iterator<Item = &Arc<T>> {
        self.live().iter().flatten()
    }

    #[cfg(test)]
    pub(crate) fn get(&self, index: usize) -> Option<&Arc<T>> {
        self.entries.get(index).and_then(Option::as_ref)
    }

    #[cfg(test)]
    pub(crate) fn capacity(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    pub(crate) fn last_index(&self) -> Option<usize> {
        self.last
    }

    /// Number of occupied slots.
    pub(crate) fn count(&self) -> usize {
        self.occupied().count()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.last.is_none()
    }
}

/// Returns `true` if both handles point at the same allocation.
///
/// Compares data addresses only, so an `Arc<Concrete>` matches the
/// `Arc<dyn Trait>` it was coerced into.
pub(crate) fn same_allocation<A: ?Sized, B: ?Sized>(a: &Arc<A>, b: &Arc<B>) -> bool {
    std::ptr::eq(Arc::as_ptr(a).cast::<()>(), Arc::as_ptr(b).cast::<()>())
}

/// Concurrent registry of shared entries addressed by stable slot index.
pub(crate) struct SlotRegistry<T: ?Sized> {
    slots: ArcSwap<Slots<T>>,
    gate: Mutex<()>,
}

impl<T: ?Sized> SlotRegistry<T> {
    /// Creates an empty registry with `capacity` slots (at least one).
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            slots: ArcSwap::from_pointee(Slots::with_capacity(capacity.max(1))),
            gate: Mutex::new(()),
        }
    }

    /// Current snapshot; cheap, never blocks.
    pub(crate) fn snapshot(&self) -> Arc<Slots<T>> {
        self.slots.load_full()
    }

    /// Stores `item` in the lowest free slot and returns its index.
    pub(crate) fn add(&self, item: Arc<T>) -> usize {
        self.mutate(|entries| {
            let index = match entries.iter().position(Option::is_none) {
                Some(free) => free,
                None => {
                    let cap = entries.len();
                    let grown = (cap + cap / 2).max(cap + 1);
                    entries.resize_with(grown, || None);
                    cap
                }
            };
            entries[index] = Some(item);
            index
        })
    }

    /// Clears the first slot holding the same allocation as `item`.
    ///
    /// Returns `false` if `item` was not registered.
    pub(crate) fn remove(&self, item: &Arc<T>) -> bool {
        self.remove_first(|entry| same_allocation(entry, item))
    }

    /// Clears the first slot matching `pred`.
    pub(crate) fn remove_first(&self, mut pred: impl FnMut(&Arc<T>) -> bool) -> bool {
        let current = self.snapshot();
        if !current.occupied().any(&mut pred) {
            return false;
        }
        self.mutate(|entries| {
            let found = entries
                .iter()
                .position(|slot| slot.as_ref().is_some_and(&mut pred));
            match found {
                Some(index) => {
                    entries[index] = None;
                    true
                }
                None => false,
            }
        })
    }

    /// Clears every slot matching `pred`; returns how many were cleared.
    pub(crate) fn remove_where(&self, mut pred: impl FnMut(&Arc<T>) -> bool) -> usize {
        self.mutate(|entries| {
            let mut removed = 0;
            for slot in entries.iter_mut() {
                if slot.as_ref().is_some_and(&mut pred) {
                    *slot = None;
                    removed += 1;
                }
            }
            removed
        })
    }

    /// Clears the slot at `index`.
    ///
    /// # Errors
    /// [`RouteError::SlotNotFound`] if the slot is out of range or already empty.
    pub(crate) fn remove_at(&self, index: usize) -> Result<(), RouteError> {
        self.mutate(|entries| match entries.get_mut(index) {
            Some(slot) if slot.is_some() => {
                *slot = None;
                Ok(())
            }
            _ => Err(RouteError::SlotNotFound { index }),
        })
    }

    /// Empties every slot; capacity is unchanged.
    pub(crate) fn clear(&self) {
        self.mutate(|entries| entries.iter_mut().for_each(|slot| *slot = None));
    }

    /// Runs `f` over a private copy of the slots and publishes the result.
    fn mutate<R>(&self, f: impl FnOnce(&mut Vec<Option<Arc<T>>>) -> R) -> R {
        let _gate = self.gate.lock();
        let mut entries = self.slots.load().entries.to_vec();
        let out = f(&mut entries);
        self.slots.store(Arc::new(Slots::from_vec(entries)));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(slots: &Slots<str>) -> Vec<Option<String>> {
        slots.iter().map(|s| s.map(|v| v.to_string())).collect()
    }

    fn item(s: &str) -> Arc<str> {
        Arc::from(s)
    }

    #[test]
    fn test_remove_leaves_hole_and_keeps_indices() {
        let reg = SlotRegistry::<str>::new(8);
        let (a, b, c, d) = (item("a"), item("b"), item("c"), item("d"));
        for it in [&a, &b, &c, &d] {
            reg.add(Arc::clone(it));
        }

        assert!(reg.remove(&b));
        let snap = reg.snapshot();
        assert_eq!(
            names(&snap),
            vec![Some("a".into()), None, Some("c".into()), Some("d".into())]
        );
        assert_eq!(snap.last_index(), Some(3));
        assert_eq!(snap.count(), 3);
    }

    #[test]
    fn test_add_fills_lowest_free_slot() {
        let reg = SlotRegistry::<str>::new(8);
        let b = item("b");
        reg.add(item("a"));
        reg.add(Arc::clone(&b));
        reg.add(item("c"));
        reg.add(item("d"));
        reg.remove(&b);

        assert_eq!(reg.add(item("e")), 1);
        let snap = reg.snapshot();
        assert_eq!(snap.get(1).map(|e| e.to_string()), Some("e".to_string()));
        assert_eq!(snap.count(), 4);
    }

    #[test]
    fn test_clear_empties_and_keeps_capacity() {
        let reg = SlotRegistry::<str>::new(2);
        for s in ["a", "b", "c"] {
            reg.add(item(s));
        }
        let cap = reg.snapshot().capacity();
        reg.clear();

        let snap = reg.snapshot();
        assert!(snap.is_empty());
        assert_eq!(snap.iter().count(), 0);
        assert_eq!(snap.capacity(), cap);
    }

    #[test]
    fn test_growth_factor() {
        let reg = SlotRegistry::<str>::new(2);
        reg.add(item("a"));
        reg.add(item("b"));
        assert_eq!(reg.add(item("c")), 2);
        assert_eq!(reg.snapshot().capacity(), 3);

        let reg = SlotRegistry::<str>::new(1);
        reg.add(item("a"));
        reg.add(item("b"));
        assert_eq!(reg.snapshot().capacity(), 2);
    }

    #[test]
    fn test_remove_at_empty_slot_fails() {
        let reg = SlotRegistry::<str>::new(4);
        reg.add(item("a"));
        assert_eq!(reg.remove_at(0), Ok(()));
        assert_eq!(reg.remove_at(0), Err(RouteError::SlotNotFound { index: 0 }));
        assert_eq!(reg.remove_at(99), Err(RouteError::SlotNotFound { index: 99 }));
    }

    #[test]
    fn test_last_index_recomputed_backwards() {
        let reg = SlotRegistry::<str>::new(4);
        let c = item("c");
        reg.add(item("a"));
        reg.add(item("b"));
        reg.add(Arc::clone(&c));
        reg.remove(&c);
        assert_eq!(reg.snapshot().last_index(), Some(1));
    }

    #[test]
    fn test_snapshot_is_isolated_from_later_writes() {
        let reg = SlotRegistry::<str>::new(4);
        reg.add(item("a"));
        let before = reg.snapshot();
        reg.add(item("b"));
        reg.clear();
        assert_eq!(before.count(), 1);
        assert!(reg.snapshot().is_empty());
    }

    #[test]
    fn test_remove_unknown_and_remove_where() {
        let reg = SlotRegistry::<str>::new(4);
        reg.add(item("keep"));
        reg.add(item("drop"));
        reg.add(item("drop"));
        assert!(!reg.remove(&item("keep")));
        assert_eq!(reg.remove_where(|e| &**e == "drop"), 2);
        assert_eq!(reg.snapshot().count(), 1);
    }
}
