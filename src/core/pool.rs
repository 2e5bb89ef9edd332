//! # Object pool with a single-slot fast path.
//!
//! [`Pool`] keeps recycled values so that hot paths (one publish context per
//! `publish`, one fan-out state per asynchronous fan-out) do not allocate on every
//! call.
//!
//! ## Rules
//! - `take` tries the fast slot first (`try_lock`, never blocks on contention),
//!   then the overflow queue (FIFO).
//! - `put` fills the fast slot if it is free and uncontended, otherwise appends to
//!   the overflow queue; beyond `limit` queued values the value is dropped.
//! - [`Rented`] returns its value exactly once, from `Drop`, so every exit path
//!   (completion, error, cancellation by dropping a future, unwinding) recycles it.

use std::collections::VecDeque;
use std::ops::{Deref, DerefMut};

use parking_lot::{Mutex, const_mutex};

/// Hook run on a value when its [`Rented`] guard gives it back.
pub(crate) trait Recycle {
    /// Clears per-use state before the value is stored for reuse.
    fn recycle(&mut self);
}

/// Concurrent pool of reusable values.
pub(crate) struct Pool<T> {
    fast: Mutex<Option<T>>,
    overflow: Mutex<VecDeque<T>>,
    limit: usize,
}

impl<T> Pool<T> {
    /// Creates an empty pool keeping at most `limit` values in the overflow queue.
    pub(crate) const fn new(limit: usize) -> Self {
        Self {
            fast: const_mutex(None),
            overflow: const_mutex(VecDeque::new()),
            limit,
        }
    }

    /// Takes a pooled value, if any.
    pub(crate) fn take(&self) -> Option<T> {
        if let Some(mut slot) = self.fast.try_lock() {
            if let Some(value) = slot.take() {
                return Some(value);
            }
        }
        self.overflow.lock().pop_front()
    }

    /// Stores a value for reuse.
    pub(crate) fn put(&self, value: T) {
        let value = match self.fast.try_lock() {
            Some(mut slot) if slot.is_none() => {
                *slot = Some(value);
                return;
            }
            _ => value,
        };

        let mut overflow = self.overflow.lock();
        if overflow.len() < self.limit {
            overflow.push_back(value);
        }
    }

    /// Number of values currently pooled.
    pub(crate) fn len(&self) -> usize {
        let fast = usize::from(self.fast.lock().is_some());
        fast + self.overflow.lock().len()
    }
}

impl<T: Recycle> Pool<T> {
    /// Rents a value, creating one with `create` when the pool is empty.
    pub(crate) fn rent(&self, create: impl FnOnce() -> T) -> Rented<'_, T> {
        let value = self.take().unwrap_or_else(create);
        Rented {
            pool: self,
            value: Some(value),
        }
    }
}

/// RAII guard for a rented value; returns it to its pool on drop.
pub(crate) struct Rented<'p, T: Recycle> {
    pool: &'p Pool<T>,
    value: Option<T>,
}

impl<T: Recycle> Deref for Rented<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // Only `Drop` empties the slot.
        self.value.as_ref().unwrap_or_else(|| unreachable!("rented value already returned"))
    }
}

impl<T: Recycle> DerefMut for Rented<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.value.as_mut().unwrap_or_else(|| unreachable!("rented value already returned"))
    }
}

impl<T: Recycle> Drop for Rented<'_, T> {
    fn drop(&mut self) {
        if let Some(mut value) = self.value.take() {
            value.recycle();
            self.pool.put(value);
        }
    }
}
