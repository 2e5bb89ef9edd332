//! # Command ordering policy
//!
//! A router (or one filter slot of it) decides what happens when a publish arrives
//! while an earlier one is still in flight.
//!
//! ## Variants
//! - `Parallel`: every publish proceeds concurrently (default, no interceptor).
//! - `Sequential`: publishes **queue** (FIFO) behind the one in flight.
//! - `Drop`: a publish arriving while one is in flight is **ignored**.
//! - `Switch`: the in-flight publish is **cancelled** and the new one proceeds.
//!
//! ## Invariants
//! - Each call to [`CommandOrdering::interceptor`] creates a fresh policy instance;
//!   state (lock, flag, token) is scoped to that instance, not shared globally.
//! - `Drop` never reports an error for the discarded publish.
//! - `Switch` cancels cooperatively: the previous dispatch sees its token cancelled.

use std::sync::Arc;

use super::{DropOrdering, SequentialOrdering, SwitchOrdering};
use crate::pipeline::Interceptor;

/// Policy controlling how overlapping publishes are handled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum CommandOrdering {
    /// Run every publish concurrently.
    ///
    /// Use when:
    /// - Commands are independent
    /// - Throughput matters more than order
    #[default]
    Parallel,

    /// Queue publishes and run them one at a time, in arrival order.
    ///
    /// Use when:
    /// - All commands must be handled
    /// - Order matters
    /// - Example: scripted cut-scene steps
    Sequential,

    /// Skip a publish if one is already running.
    ///
    /// Use when:
    /// - Redundant work should be avoided
    /// - Example: a "jump" button mashed during the jump
    Drop,

    /// Cancel the running publish and start the new one.
    ///
    /// Use when:
    /// - The new command invalidates the old one
    /// - Example: pathfinding to a newly clicked target
    Switch,
}

impl CommandOrdering {
    /// Builds the interceptor enforcing this policy (`None` for `Parallel`).
    pub fn interceptor(self) -> Option<Arc<dyn Interceptor>> {
        match self {
            CommandOrdering::Parallel => None,
            CommandOrdering::Sequential => Some(Arc::new(SequentialOrdering::new())),
            CommandOrdering::Drop => Some(Arc::new(DropOrdering::new())),
            CommandOrdering::Switch => Some(Arc::new(SwitchOrdering::new())),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(self) -> &'static str {
        match self {
            CommandOrdering::Parallel => "parallel",
            CommandOrdering::Sequential => "sequential",
            CommandOrdering::Drop => "drop",
            CommandOrdering::Switch => "switch",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parallel_has_no_interceptor() {
        assert!(CommandOrdering::Parallel.interceptor().is_none());
        assert_eq!(CommandOrdering::default(), CommandOrdering::Parallel);
    }

    #[test]
    fn test_each_call_builds_a_fresh_instance() {
        let a = CommandOrdering::Drop.interceptor();
        let b = CommandOrdering::Drop.interceptor();
        match (a, b) {
            (Some(a), Some(b)) => assert!(!Arc::ptr_eq(&a, &b)),
            _ => panic!("drop ordering must build an interceptor"),
        }
    }
}
