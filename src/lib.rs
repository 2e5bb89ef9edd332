//! # cmdrouter
//!
//! **cmdrouter** is an in-process, typed command router for Rust.
//!
//! Producers publish plain values (commands); the router delivers each one through
//! an ordered interceptor pipeline to every registered subscriber, synchronous
//! subscribers inline and asynchronous ones joined into a single awaitable result.
//! Ordering policies decide what happens when publishes overlap.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │  publish(A)  │   │  publish(B)  │   │  enqueue(C)  │
//!     │ (caller #1)  │   │ (caller #2)  │   │ (spawned)    │
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            ▼                  ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Router                                                           │
//! │  - SlotRegistry<dyn Subscriber>       (copy-on-write snapshots)   │
//! │  - SlotRegistry<dyn AsyncSubscriber>                              │
//! │  - SlotRegistry<dyn Interceptor>      + "has interceptors" flag   │
//! └──────┬──────────────────┬──────────────────┬──────────────────────┘
//!        ▼                  ▼                  ▼
//!   PublishContext     PublishContext     PublishContext     (pooled, one per publish)
//!        │                  │                  │
//!        ▼                  ▼                  ▼
//!   Next::run ─► ordering policy ─► InterceptorFn ─► … ─► Dispatch
//!                                                           │
//!                              ┌────────────────────────────┴──────────┐
//!                              ▼                                       ▼
//!                   Subscriber::receive (in order)      AsyncSubscriber::receive_async
//!                                                          └─► FanOutSource (join, pooled)
//! ```
//!
//! ### Lifecycle of one publish
//! ```text
//! publish(cmd, token)
//!   ├─► disposed? ─► Err(Disposed)
//!   ├─► rent PublishContext { token, caller, extensions, cursor = 0 }
//!   ├─► interceptors? ─ no ─► deliver to subscribers
//!   │                  └ yes ─► I₀ ─► I₁ ─► … ─► deliver to subscribers
//!   ├─► await async subscribers (all of them; last failure wins)
//!   └─► context returned to the pool (every exit path)
//! ```
//!
//! ## Features
//! | Area               | Description                                                   | Key types / traits                                   |
//! |--------------------|---------------------------------------------------------------|------------------------------------------------------|
//! | **Commands**       | Any `'static + Send + Sync` value tagged as routable.         | [`Command`], [`CommandPool`]                         |
//! | **Subscribers**    | Receive commands synchronously or asynchronously.             | [`Subscriber`], [`AsyncSubscriber`], [`SubscriberFn`] |
//! | **Pipeline**       | Middleware around every dispatch.                             | [`Interceptor`], [`Next`], [`InterceptorFn`]         |
//! | **Policies**       | Parallel / sequential / drop / switch handling of overlaps.   | [`CommandOrdering`]                                  |
//! | **Routing**        | Registration, dispatch, fan-out to other routers.             | [`Router`], [`Subscription`], [`FanOutInterceptor`]  |
//! | **Context**        | Cancellation, caller info, key/value side-channel.            | [`PublishContext`], [`Extensions`]                   |
//! | **Errors**         | Typed errors, cancellation kept distinct from failures.       | [`RouteError`]                                       |
//! | **Configuration**  | Construction-time settings.                                   | [`RouterConfig`], [`RouterBuilder`]                  |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in `LogWriter` interceptor _(demo/reference only)_.
//!
//! ## Example
//! ```rust
//! use cmdrouter::{Command, CommandOrdering, PublishContext, RouteError, Router, RouterConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! struct Move { x: i32, y: i32 }
//! impl Command for Move {}
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), RouteError> {
//!     let router = Router::builder(RouterConfig::default().with_ordering(CommandOrdering::Sequential))
//!         .build();
//!
//!     let _sync = router.subscribe_fn(|m: &Move, _ctx: &PublishContext| {
//!         println!("move to ({}, {})", m.x, m.y);
//!         Ok(())
//!     });
//!     let _async = router.subscribe_await(|m: &Move, ctx: &PublishContext| {
//!         Box::pin(async move {
//!             if ctx.is_cancelled() {
//!                 return Err(RouteError::Canceled);
//!             }
//!             tokio::task::yield_now().await;
//!             println!("animated to ({}, {})", m.x, m.y);
//!             Ok(())
//!         })
//!     });
//!
//!     router.publish(Move { x: 1, y: 2 }, CancellationToken::new()).await?;
//!     Ok(())
//! }
//! ```
mod command;
mod context;
mod core;
mod error;
mod pipeline;
mod policies;
mod subscribers;

// ---- Public re-exports ----

pub use command::{Command, CommandPool, PoolableCommand, PooledCommand};
pub use context::{Caller, Extensions, PublishContext};
pub use crate::core::{Router, RouterBuilder, RouterConfig, Subscription};
pub use error::RouteError;
pub use pipeline::{FanOutInterceptor, Interceptor, InterceptorFn, Next};
pub use policies::{CommandOrdering, DropOrdering, SequentialOrdering, SwitchOrdering};
pub use subscribers::{AsyncSubscriber, AsyncSubscriberFn, Subscriber, SubscriberFn};

// Optional: expose a simple built-in logging interceptor (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use pipeline::LogWriter;
