//! Ordering policies.
//!
//! This module groups the interceptors that control **how overlapping publishes**
//! to the same router (or filter slot) interact.
//!
//! ## Contents
//! - [`CommandOrdering`]     which policy to apply (parallel / sequential / drop / switch)
//! - [`SequentialOrdering`]  FIFO, one dispatch at a time
//! - [`DropOrdering`]        discard while busy
//! - [`SwitchOrdering`]      cancel the previous dispatch
//!
//! ## Quick wiring
//! ```text
//! RouterConfig { ordering: CommandOrdering }
//!      └─► Router::with_config installs ordering.interceptor() as the first filter
//! Router::add_ordering(ordering)
//!      └─► appends another policy instance to the chain
//! ```
//!
//! ## Defaults
//! - `CommandOrdering::Parallel`: no interceptor, zero overhead.

mod drop;
mod ordering;
mod sequential;
mod switch;

pub use drop::DropOrdering;
pub use ordering::CommandOrdering;
pub use sequential::SequentialOrdering;
pub use switch::SwitchOrdering;
