//! # Closure-backed typed subscribers.
//!
//! [`SubscriberFn`] and [`AsyncSubscriberFn`] wrap a closure that handles one concrete
//! command type `T`. Commands of any other type are ignored (`Ok(())`), so a typed
//! subscriber can sit on a router that carries many command types.
//!
//! Usually created through [`Router::subscribe_fn`](crate::Router::subscribe_fn) and
//! [`Router::subscribe_await`](crate::Router::subscribe_await).
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use cmdrouter::{Command, PublishContext, Subscriber, SubscriberFn};
//!
//! struct Heal(u32);
//! impl Command for Heal {}
//! struct Noise;
//! impl Command for Noise {}
//!
//! let sub = SubscriberFn::arc(|heal: &Heal, _ctx: &PublishContext| {
//!     assert_eq!(heal.0, 5);
//!     Ok(())
//! });
//!
//! let ctx = PublishContext::new(Default::default());
//! assert!(sub.receive(&Heal(5), &ctx).is_ok());
//! assert!(sub.receive(&Noise, &ctx).is_ok()); // ignored
//! ```

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;

use super::subscriber::{AsyncSubscriber, Subscriber};
use crate::command::Command;
use crate::context::PublishContext;
use crate::error::RouteError;

/// Synchronous subscriber for commands of type `T`.
pub struct SubscriberFn<T, F> {
    name: &'static str,
    f: F,
    _command: PhantomData<fn(&T)>,
}

impl<T: Command, F> SubscriberFn<T, F>
where
    F: Fn(&T, &PublishContext) -> Result<(), RouteError> + Send + Sync + 'static,
{
    /// Wraps `f`; the subscriber is named after `T`.
    pub fn new(f: F) -> Self {
        Self {
            name: std::any::type_name::<T>(),
            f,
            _command: PhantomData,
        }
    }

    /// Creates the subscriber and returns it as a shared handle.
    pub fn arc(f: F) -> Arc<Self> {
        Arc::new(Self::new(f))
    }

    /// Overrides the name reported in logs.
    pub fn named(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }
}

impl<T: Command, F> Subscriber for SubscriberFn<T, F>
where
    F: Fn(&T, &PublishContext) -> Result<(), RouteError> + Send + Sync + 'static,
{
    fn receive(&self, command: &dyn Command, ctx: &PublishContext) -> Result<(), RouteError> {
        match command.downcast_ref::<T>() {
            Some(command) => (self.f)(command, ctx),
            None => Ok(()),
        }
    }

    fn name(&self) -> &'static str {
        self.name
    }
}

impl<T, F> fmt::Debug for SubscriberFn<T, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriberFn").field("name", &self.name).finish()
    }
}

/// Asynchronous subscriber for commands of type `T`.
///
/// The closure returns a boxed future borrowing both arguments:
/// `|cmd: &T, ctx: &PublishContext| Box::pin(async move { ... })`.
pub struct AsyncSubscriberFn<T, F> {
    name: &'static str,
    f: F,
    _command: PhantomData<fn(&T)>,
}

impl<T: Command, F> AsyncSubscriberFn<T, F>
where
    F: for<'a> Fn(&'a T, &'a PublishContext) -> BoxFuture<'a, Result<(), RouteError>>
        + Send
        + Sync
        + 'static,
{
    /// Wraps `f`; the subscriber is named after `T`.
    pub fn new(f: F) -> Self {
        Self {
            name: std::any::type_name::<T>(),
            f,
            _command: PhantomData,
        }
    }

    /// Creates the subscriber and returns it as a shared handle.
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
impl<T: Command, F> AsyncSubscriber for AsyncSubscriberFn<T, F>
where
    F: for<'a> Fn(&'a T, &'a PublishContext) -> BoxFuture<'a, Result<(), RouteError>>
        + Send
        + Sync
        + 'static,
{
    async fn receive_async(
        &self,
        command: &dyn Command,
        ctx: &PublishContext,
    ) -> Result<(), RouteError> {
        match command.downcast_ref::<T>() {
            Some(command) => (self.f)(command, ctx).await,
            None => Ok(()),
        }
    }

    fn name(&self) -> &'static str {
        self.name
    }
}

impl<T, F> fmt::Debug for AsyncSubscriberFn<T, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncSubscriberFn").field("name", &self.name).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    use tokio_util::sync::CancellationToken;

    struct Attack(u32);
    impl Command for Attack {}
    struct Other;
    impl Command for Other {}

    #[test]
    fn test_sync_fn_filters_by_type() {
        let hits = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&hits);
        let sub = SubscriberFn::new(move |a: &Attack, _: &PublishContext| {
            seen.fetch_add(a.0 as usize, Ordering::SeqCst);
            Ok(())
        })
        .named("attack");

        let ctx = PublishContext::new(CancellationToken::new());
        sub.receive(&Attack(2), &ctx).unwrap();
        sub.receive(&Other, &ctx).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert_eq!(Subscriber::name(&sub), "attack");
    }

    #[tokio::test]
    async fn test_async_fn_propagates_error() {
        let sub = AsyncSubscriberFn::new(|a: &Attack, ctx: &PublishContext| {
            Box::pin(async move {
                ctx.check_cancelled()?;
                if a.0 == 0 {
                    return Err(RouteError::failed("zero damage"));
                }
                Ok(())
            })
        });

        let ctx = PublishContext::new(CancellationToken::new());
        assert!(sub.receive_async(&Attack(1), &ctx).await.is_ok());
        assert_eq!(
            sub.receive_async(&Attack(0), &ctx).await,
            Err(RouteError::failed("zero damage"))
        );
        assert!(sub.receive_async(&Other, &ctx).await.is_ok());
        assert!(AsyncSubscriber::name(&sub).ends_with("Attack"));
    }
}
