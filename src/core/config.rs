//! # Router configuration.
//!
//! Provides [`RouterConfig`] the construction-time settings of a [`Router`](crate::Router).
//!
//! Config is used in two ways:
//! 1. **Router creation**: `Router::with_config(config)`
//! 2. **Builder**: `Router::builder(config).with_subscriber(..).build()`
//!
//! ## Sentinel values
//! - `initial_capacity = 0` → treated as 1 (registries always hold at least one slot)

use crate::policies::CommandOrdering;

/// Construction-time settings for a router.
///
/// ## Field semantics
/// - `initial_capacity`: starting slot count of each registry (grows by half when full)
/// - `ordering`: policy installed as the first filter (`Parallel` installs nothing)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RouterConfig {
    /// Starting slot count of the subscriber, async-subscriber and filter registries.
    pub initial_capacity: usize,

    /// Ordering applied to every publish on this router.
    ///
    /// Installed as the first interceptor; more policies can be layered with
    /// [`Router::add_ordering`](crate::Router::add_ordering).
    pub ordering: CommandOrdering,
}

impl RouterConfig {
    /// Returns the registry capacity clamped to a minimum of 1.
    #[inline]
    pub fn initial_capacity_clamped(&self) -> usize {
        self.initial_capacity.max(1)
    }

    /// Returns a copy with `ordering` replaced.
    pub fn with_ordering(mut self, ordering: CommandOrdering) -> Self {
        self.ordering = ordering;
        self
    }
}

impl Default for RouterConfig {
    /// Default configuration:
    ///
    /// - `initial_capacity = 8`
    /// - `ordering = CommandOrdering::Parallel`
    fn default() -> Self {
        Self {
            initial_capacity: 8,
            ordering: CommandOrdering::Parallel,
        }
    }
}
