//! # Command subscribers.
//!
//! This module provides the receiving end of the router: the [`Subscriber`] and
//! [`AsyncSubscriber`] traits and their closure-backed typed adapters.
//!
//! ## Architecture
//! ```text
//! publish(cmd) ──► … interceptors … ──► terminal dispatch
//!                                          │
//!                                          ├──► Subscriber::receive(&dyn Command)      sync, in order
//!                                          │
//!                                          └──► AsyncSubscriber::receive_async(…)      all started,
//!                                                     │                                joined by fan-out
//!                                               ┌─────┴──────┬──────────┐
//!                                               ▼            ▼          ▼
//!                                         AsyncSubscriberFn  Audio    Custom …
//! ```
//!
//! ## Subscriber types
//! - **Trait implementations** receive every command and narrow it themselves.
//! - **Typed adapters** ([`SubscriberFn`], [`AsyncSubscriberFn`]) handle one command type
//!   and ignore the rest.

mod subscriber;
mod subscriber_fn;

pub use subscriber::{AsyncSubscriber, Subscriber};
pub use subscriber_fn::{AsyncSubscriberFn, SubscriberFn};
