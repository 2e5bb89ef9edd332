//! # Reusable command payloads.
//!
//! High-rate publishers can avoid allocating a fresh payload per publish by renting
//! it from a [`CommandPool`]. The pool is keyed by concrete type: [`CommandPool::shared`]
//! returns the process-wide pool for `T`, while [`CommandPool::new`] builds a private one.
//!
//! ## Flow
//! ```text
//! rent(factory) ──► fill fields ──► publish(&cmd) ──► give_back(cmd)
//!        ▲                                               │
//!        └──────────── on_return_to_pool() ◄─────────────┘
//! ```
//!
//! [`PooledCommand`] wraps the same cycle in a guard that gives the payload back when
//! dropped, after every subscriber has finished with it.
//!
//! ## Example
//! ```rust
//! use cmdrouter::{Command, CommandPool, PoolableCommand};
//!
//! #[derive(Default)]
//! struct Tick { frame: u64, tags: Vec<String> }
//! impl Command for Tick {}
//! impl PoolableCommand for Tick {
//!     fn on_return_to_pool(&mut self) {
//!         self.tags.clear();
//!     }
//! }
//!
//! let pool = CommandPool::<Tick>::new();
//! let mut tick = pool.rent(Tick::default);
//! tick.frame = 1;
//! tick.tags.push("hot".into());
//! pool.give_back(tick);
//!
//! let reused = pool.rent(Tick::default);
//! assert_eq!(reused.frame, 1);
//! assert!(reused.tags.is_empty());
//! ```

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;

use super::Command;
use crate::core::pool::Pool;

/// Upper bound of idle payloads kept per pool (beyond the fast slot).
const IDLE_LIMIT: usize = 256;

/// A command that can be recycled through a [`CommandPool`].
pub trait PoolableCommand: Command {
    /// Resets per-use state before the payload is stored for reuse.
    fn on_return_to_pool(&mut self) {}
}

/// Pool of reusable payloads of one concrete command type.
pub struct CommandPool<T: PoolableCommand> {
    idle: Pool<T>,
}

impl<T: PoolableCommand> CommandPool<T> {
    /// Creates an empty private pool.
    pub const fn new() -> Self {
        Self {
            idle: Pool::new(IDLE_LIMIT),
        }
    }

    /// Returns the process-wide pool for `T`.
    pub fn shared() -> Arc<Self> {
        static POOLS: OnceLock<Mutex<HashMap<TypeId, Box<dyn Any + Send + Sync>>>> =
            OnceLock::new();

        let mut pools = POOLS.get_or_init(|| Mutex::new(HashMap::new())).lock();
        let entry = pools
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(Arc::new(Self::new())) as Box<dyn Any + Send + Sync>);

        match entry.downcast_ref::<Arc<Self>>() {
            Some(pool) => Arc::clone(pool),
            // Keyed by `TypeId::of::<T>()`, so the entry is always `Arc<CommandPool<T>>`.
            None => unreachable!("command pool registered under a foreign type id"),
        }
    }

    /// Takes an idle payload, or builds one with `factory` when none is available.
    pub fn rent(&self, factory: impl FnOnce() -> T) -> T {
        self.idle.take().unwrap_or_else(factory)
    }

    /// Resets the payload via [`PoolableCommand::on_return_to_pool`] and stores it.
    ///
    /// Call only after every consumer is done with the payload.
    pub fn give_back(&self, mut command: T) {
        command.on_return_to_pool();
        self.idle.put(command);
    }

    /// Rents a payload wrapped in a guard that gives it back on drop.
    pub fn rent_pooled(self: &Arc<Self>, factory: impl FnOnce() -> T) -> PooledCommand<T> {
        PooledCommand {
            pool: Arc::clone(self),
            command: Some(self.rent(factory)),
        }
    }

    /// Number of idle payloads.
    pub fn len(&self) -> usize {
        self.idle.len()
    }

    /// Returns `true` if no payload is idle.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: PoolableCommand> Default for CommandPool<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Rented payload that returns itself to its [`CommandPool`] when dropped.
///
/// Publish it by reference (`router.publish_ref(&*guard, token)`) so the guard
/// outlives the dispatch.
pub struct PooledCommand<T: PoolableCommand> {
    pool: Arc<CommandPool<T>>,
    command: Option<T>,
}

impl<T: PoolableCommand> PooledCommand<T> {
    /// Detaches the payload from the pool; it will not be given back.
    pub fn into_inner(mut self) -> T {
        match self.command.take() {
            Some(command) => command,
            None => unreachable!("pooled command already released"),
        }
    }
}

impl<T: PoolableCommand> Deref for PooledCommand<T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.command.as_ref().unwrap_or_else(|| unreachable!("pooled command already released"))
    }
}

impl<T: PoolableCommand> DerefMut for PooledCommand<T> {
    fn deref_mut(&mut self) -> &mut T {
        self.command.as_mut().unwrap_or_else(|| unreachable!("pooled command already released"))
    }
}

impl<T: PoolableCommand> Drop for PooledCommand<T> {
    fn drop(&mut self) {
        if let Some(command) = self.command.take() {
            self.pool.give_back(command);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Spawn {
        id: u32,
        resets: u32,
    }
    impl Command for Spawn {}
    impl PoolableCommand for Spawn {
        fn on_return_to_pool(&mut self) {
            self.resets += 1;
        }
    }

    #[derive(Default)]
    struct Despawn;
    impl Command for Despawn {}
    impl PoolableCommand for Despawn {}

    #[test]
    fn test_rent_reuses_returned_payload() {
        let pool = CommandPool::<Spawn>::new();
        let mut cmd = pool.rent(Spawn::default);
        cmd.id = 4;
        pool.give_back(cmd);
        assert_eq!(pool.len(), 1);

        let again = pool.rent(Spawn::default);
        assert_eq!(again.id, 4);
        assert_eq!(again.resets, 1);
        assert!(pool.is_empty());
    }

    #[test]
    fn test_shared_pool_is_per_type() {
        let a = CommandPool::<Spawn>::shared();
        let b = CommandPool::<Spawn>::shared();
        assert!(Arc::ptr_eq(&a, &b));

        // Distinct type, distinct pool; must not panic on lookup.
        let _other = CommandPool::<Despawn>::shared();
    }

    #[test]
    fn test_pooled_guard_gives_back_on_drop() {
        let pool = Arc::new(CommandPool::<Spawn>::new());
        {
            let mut guard = pool.rent_pooled(Spawn::default);
            guard.id = 11;
            assert!(pool.is_empty());
        }
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.rent(Spawn::default).resets, 1);
    }

    #[test]
    fn test_into_inner_detaches() {
        let pool = Arc::new(CommandPool::<Spawn>::new());
        let guard = pool.rent_pooled(Spawn::default);
        let cmd = guard.into_inner();
        assert_eq!(cmd.resets, 0);
        assert!(pool.is_empty());
    }
}
