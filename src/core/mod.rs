//! Runtime core: registration, dispatch and resource reuse.
//!
//! This module contains the dispatch engine of the router. The public API from this
//! module is [`Router`] (with [`RouterBuilder`], [`RouterConfig`] and
//! [`Subscription`]); the rest is internal.
//!
//! Internal modules:
//! - [`router`]: owns the registries, drives one dispatch per publish;
//! - [`dispatch`]: terminal fan-out to sync and async subscribers;
//! - [`registry`]: stable-slot, copy-on-write registry with lock-free snapshots;
//! - [`fan_out`]: pooled "join N futures" source, last failure wins;
//! - [`pool`]: single-fast-slot object pool with an RAII rental guard;
//! - [`subscription`]: disposable registration handle.

mod builder;
mod config;
mod dispatch;
mod fan_out;
pub(crate) mod pool;
pub(crate) mod registry;
mod router;
mod subscription;

pub use builder::RouterBuilder;
pub use config::RouterConfig;
pub use router::Router;
pub use subscription::Subscription;

pub(crate) use dispatch::Dispatch;
pub(crate) use fan_out::FanOutSource;
