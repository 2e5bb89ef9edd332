//! # Closure-backed typed interceptor (`InterceptorFn`)
//!
//! [`InterceptorFn`] wraps a closure handling commands of one concrete type `T`.
//! Commands of any other type pass straight through to the rest of the chain.
//!
//! ## Example
//! ```rust
//! use cmdrouter::{Command, Next, PublishContext, RouteError, Router};
//!
//! struct Chat(String);
//! impl Command for Chat {}
//!
//! let router = Router::new();
//! // Drop empty chat lines before any subscriber sees them.
//! router.filter_fn(|chat: &Chat, ctx: &mut PublishContext, next: Next<'_>| {
//!     Box::pin(async move {
//!         if chat.0.trim().is_empty() {
//!             return Ok(());
//!         }
//!         next.run(chat, ctx).await
//!     })
//! });
//! assert_eq!(router.interceptor_count(), 1);
//! ```

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;

use super::interceptor::{Interceptor, Next};
use crate::command::Command;
use crate::context::PublishContext;
use crate::error::RouteError;

/// Interceptor for commands of type `T`.
pub struct InterceptorFn<T, F> {
    name: &'static str,
    f: F,
    _command: PhantomData<fn(&T)>,
}

impl<T: Command, F> InterceptorFn<T, F>
where
    F: for<'a> Fn(
            &'a T,
            &'a mut PublishContext,
            Next<'a>,
        ) -> BoxFuture<'a, Result<(), RouteError>>
        + Send
        + Sync
        + 'static,
{
    /// Wraps `f`; the interceptor is named after `T`.
    pub fn new(f: F) -> Self {
        Self {
            name: std::any::type_name::<T>(),
            f,
            _command: PhantomData,
        }
    }

    /// Creates the interceptor and returns it as a shared handle.
    pub fn arc(f: F) -> Arc<Self> {
        Arc::new(Self::new(f))
    }

    /// Overrides the name reported in logs.
    pub fn named(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }
}

#[async_trait]
impl<T: Command, F> Interceptor for InterceptorFn<T, F>
where
    F: for<'a> Fn(
            &'a T,
            &'a mut PublishContext,
            Next<'a>,
        ) -> BoxFuture<'a, Result<(), RouteError>>
        + Send
        + Sync
        + 'static,
{
    async fn invoke(
        &self,
        command: &dyn Command,
        ctx: &mut PublishContext,
        next: Next<'_>,
    ) -> Result<(), RouteError> {
        match command.downcast_ref::<T>() {
            Some(typed) => (self.f)(typed, ctx, next).await,
            None => next.run(command, ctx).await,
        }
    }

    fn name(&self) -> &'static str {
        self.name
    }
}

impl<T, F> fmt::Debug for InterceptorFn<T, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterceptorFn").field("name", &self.name).finish()
    }
}
