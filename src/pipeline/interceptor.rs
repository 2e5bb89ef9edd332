//! # Interceptor trait and the [`Next`] continuation.
//!
//! Interceptors form a chain of responsibility in front of the subscribers. Each one
//! receives `(command, ctx, next)` and decides what happens next:
//!
//! - **pass through**: `next.run(command, ctx).await`
//! - **wrap**: call through and inspect/convert the result (error handling, logging)
//! - **short-circuit**: return `Ok(())` without calling `next`; nothing downstream runs
//! - **gate**: call through later or conditionally (ordering, rate limiting)
//!
//! ## Architecture
//! ```text
//! Next::run ─► ctx.advance() ─► slot i occupied? ─► interceptor[i].invoke(cmd, ctx, next)
//!                 │                  └─ hole ─► advance again
//!                 └─ past the end ─► terminal dispatch (subscribers)
//! ```
//!
//! ## Rules
//! - The interceptor list seen by one dispatch is a snapshot taken at publish time;
//!   filters added or removed meanwhile affect only later publishes.
//! - The position in the chain lives in the [`PublishContext`] cursor, so one
//!   snapshot is shared by concurrent dispatches without a shared cursor.
//! - `next` is `Copy`; calling it more than once continues from the current cursor.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::command::Command;
use crate::context::PublishContext;
use crate::core::Dispatch;
use crate::error::RouteError;

/// Middleware stage wrapping the delivery of every command.
///
/// ## Example
/// ```rust
/// use async_trait::async_trait;
/// use cmdrouter::{Command, Interceptor, Next, PublishContext, RouteError};
///
/// /// Turns subscriber failures into log lines.
/// struct Swallow;
///
/// #[async_trait]
/// impl Interceptor for Swallow {
///     async fn invoke(
///         &self,
///         command: &dyn Command,
///         ctx: &mut PublishContext,
///         next: Next<'_>,
///     ) -> Result<(), RouteError> {
///         if let Err(err) = next.run(command, ctx).await {
///             eprintln!("{} failed: {err}", command.name());
///         }
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Interceptor: Send + Sync + 'static {
    /// Handles one command; call `next.run(command, ctx)` to continue the chain.
    async fn invoke(
        &self,
        command: &dyn Command,
        ctx: &mut PublishContext,
        next: Next<'_>,
    ) -> Result<(), RouteError>;

    /// Returns the interceptor name used in logs.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Continuation to the rest of the chain.
#[derive(Clone, Copy)]
pub struct Next<'a> {
    interceptors: &'a [Option<Arc<dyn Interceptor>>],
    terminal: &'a Dispatch,
}

impl<'a> Next<'a> {
    pub(crate) fn new(
        interceptors: &'a [Option<Arc<dyn Interceptor>>],
        terminal: &'a Dispatch,
    ) -> Self {
        Self {
            interceptors,
            terminal,
        }
    }

    /// Runs the next interceptor, or the subscribers once the chain is exhausted.
    pub fn run<'b>(
        self,
        command: &'b dyn Command,
        ctx: &'b mut PublishContext,
    ) -> BoxFuture<'b, Result<(), RouteError>>
    where
        'a: 'b,
    {
        let len = self.interceptors.len();
        while let Some(index) = ctx.advance(len) {
            if let Some(interceptor) = &self.interceptors[index] {
                return interceptor.invoke(command, ctx, self);
            }
        }
        Box::pin(self.terminal.deliver(command, ctx))
    }

    /// Number of interceptors not yet reached (holes included).
    pub fn remaining(&self, ctx: &PublishContext) -> usize {
        self.interceptors.len().saturating_sub(ctx.cursor())
    }
}

impl fmt::Debug for Next<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next")
            .field("interceptors", &self.interceptors.len())
            .finish_non_exhaustive()
    }
}
