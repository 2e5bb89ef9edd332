//! # Command capability
//!
//! A command is any `'static`, thread-safe value tagged with [`Command`]. There are
//! no required fields. [`Router::publish`](crate::Router::publish) is generic over the
//! concrete type; once inside the pipeline the value travels as `&dyn Command` and
//! typed adapters narrow it back with [`downcast_ref`](trait.Command.html#method.downcast_ref).
//!
//! ## Example
//! ```rust
//! use cmdrouter::Command;
//!
//! struct Move { x: i32 }
//! impl Command for Move {}
//!
//! let cmd = Move { x: 3 };
//! let erased: &dyn Command = &cmd;
//! assert!(erased.is::<Move>());
//! assert_eq!(erased.downcast_ref::<Move>().map(|m| m.x), Some(3));
//! ```

use std::any::Any;

/// Capability tag for routable values.
pub trait Command: AsAny + Send + Sync + 'static {
    /// Human-readable name (for logs).
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Upcast helper so `dyn Command` can be narrowed without unsafe code.
#[doc(hidden)]
pub trait AsAny {
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any> AsAny for T {
    #[inline]
    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl dyn Command {
    /// Returns `true` if the erased command is a `T`.
    #[inline]
    pub fn is<T: Command>(&self) -> bool {
        self.as_any().is::<T>()
    }

    /// Narrows the erased command to `T`.
    #[inline]
    pub fn downcast_ref<T: Command>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Ping;
    impl Command for Ping {}

    struct Pong(u8);
    impl Command for Pong {
        fn name(&self) -> &'static str {
            "pong"
        }
    }

    #[test]
    fn test_downcast_matches_concrete_type_only() {
        let ping = Ping;
        let erased: &dyn Command = &ping;
        assert!(erased.is::<Ping>());
        assert!(!erased.is::<Pong>());
        assert!(erased.downcast_ref::<Pong>().is_none());
    }

    #[test]
    fn test_name_dispatches_through_trait_object() {
        let pong = Pong(7);
        let erased: &dyn Command = &pong;
        assert_eq!(erased.name(), "pong");
        assert_eq!(erased.downcast_ref::<Pong>().map(|p| p.0), Some(7));

        let ping: &dyn Command = &Ping;
        assert!(ping.name().ends_with("Ping"));
    }
}
