//! Commands: the routed payload values.
//!
//! ## Contents
//! - [`Command`] capability tag implemented by every routed type
//! - [`CommandPool`], [`PoolableCommand`], [`PooledCommand`] optional payload reuse

mod command;
mod pool;

pub use command::Command;
pub use pool::{CommandPool, PoolableCommand, PooledCommand};
