//! # Interceptor pipeline.
//!
//! Interceptors wrap every dispatch of a router, in registration order, before
//! the subscribers run.
//!
//! ## Architecture
//! ```text
//! publish(cmd) ──► I₀.invoke(cmd, ctx, next) ──► I₁.invoke(…) ──► … ──► subscribers
//!                        │                            │
//!                        └── may short-circuit        └── may wrap / convert errors
//! ```
//!
//! ## Contents
//! - [`Interceptor`] the middleware trait; [`Next`] the continuation it receives
//! - [`InterceptorFn`] closure adapter for one command type
//! - [`FanOutInterceptor`] republishes to downstream routers
//! - `LogWriter` tracing interceptor (feature `logging`)
//!
//! Ordering policies (sequential / drop / switch) are interceptors too; see
//! [`CommandOrdering`](crate::CommandOrdering).

mod fan_out;
mod interceptor;
mod interceptor_fn;
#[cfg(feature = "logging")]
mod log;

pub use fan_out::FanOutInterceptor;
pub use interceptor::{Interceptor, Next};
pub use interceptor_fn::InterceptorFn;
#[cfg(feature = "logging")]
pub use log::LogWriter;
