//! # Router: registers subscribers and interceptors, dispatches commands.
//!
//! The [`Router`] owns three slot registries (synchronous subscribers, asynchronous
//! subscribers, interceptors) and drives one dispatch per `publish` call.
//!
//! ## Key responsibilities
//! - register/unregister subscribers and return [`Subscription`] handles
//! - maintain the interceptor chain and its "has interceptors" fast-path flag
//! - rent a [`PublishContext`] per publish and return it exactly once
//! - reject publishes after [`dispose`](Router::dispose)
//!
//! ## High-level architecture
//! ```text
//! publish(cmd, token)
//!   ├─ disposed? ──────────────────────────────► Err(Disposed)
//!   ├─ snapshots: subscribers, async subscribers ─► Dispatch
//!   ├─ rent PublishContext(token, caller)              (guard returns it on every path)
//!   │
//!   ├─ no interceptors ──► Dispatch::deliver ──────────────────────────┐
//!   └─ interceptors ─────► Next::run ─► I₀ ─► I₁ ─► … ─► Dispatch::deliver
//!                                                                      ▼
//!                                            sync subscribers ─► async fan-out ─► Ok / Err
//! ```
//!
//! ## Concurrency
//! - Registries are copy-on-write: a publish iterates an immutable snapshot and
//!   never blocks, or is blocked by, subscribe/unsubscribe.
//! - Each publish owns its context; concurrent publishes share no cursor.
//! - `Router` is a cheap `Clone` handle over shared state.
//!
//! ## Example
//! ```rust
//! use cmdrouter::{Command, PublishContext, Router};
//! use tokio_util::sync::CancellationToken;
//!
//! struct Greet(&'static str);
//! impl Command for Greet {}
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), cmdrouter::RouteError> {
//!     let router = Router::new();
//!     let mut sub = router.subscribe_fn(|g: &Greet, _ctx: &PublishContext| {
//!         println!("hello, {}", g.0);
//!         Ok(())
//!     });
//!
//!     router.publish(Greet("world"), CancellationToken::new()).await?;
//!
//!     sub.dispose();
//!     assert_eq!(router.subscriber_count(), 0);
//!     Ok(())
//! }
//! ```

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use futures::future::BoxFuture;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use super::builder::RouterBuilder;
use super::config::RouterConfig;
use super::dispatch::Dispatch;
use super::registry::{SlotRegistry, same_allocation};
use super::subscription::Subscription;
use crate::command::Command;
use crate::context::{Caller, PublishContext};
use crate::error::RouteError;
use crate::pipeline::{Interceptor, InterceptorFn, Next};
use crate::policies::CommandOrdering;
use crate::subscribers::{AsyncSubscriber, AsyncSubscriberFn, Subscriber, SubscriberFn};

/// Shared state behind every clone of a [`Router`].
pub(crate) struct RouterInner {
    pub(crate) subscribers: SlotRegistry<dyn Subscriber>,
    pub(crate) async_subscribers: SlotRegistry<dyn AsyncSubscriber>,
    interceptors: SlotRegistry<dyn Interceptor>,
    /// Serializes interceptor mutations with the flag update.
    filters: Mutex<()>,
    has_interceptors: AtomicBool,
    disposed: AtomicBool,
}

/// In-process command router.
#[derive(Clone)]
pub struct Router {
    inner: Arc<RouterInner>,
}

impl Router {
    /// Creates a router with [`RouterConfig::default`].
    pub fn new() -> Self {
        Self::with_config(RouterConfig::default())
    }

    /// Creates a router; a non-parallel `cfg.ordering` becomes the first filter.
    pub fn with_config(cfg: RouterConfig) -> Self {
        let capacity = cfg.initial_capacity_clamped();
        let router = Self {
            inner: Arc::new(RouterInner {
                subscribers: SlotRegistry::new(capacity),
                async_subscribers: SlotRegistry::new(capacity),
                interceptors: SlotRegistry::new(capacity),
                filters: Mutex::new(()),
                has_interceptors: AtomicBool::new(false),
                disposed: AtomicBool::new(false),
            }),
        };
        router.add_ordering(cfg.ordering);
        router
    }

    /// Starts a [`RouterBuilder`].
    pub fn builder(cfg: RouterConfig) -> RouterBuilder {
        RouterBuilder::new(cfg)
    }

    /// Process-wide default router, created on first use.
    pub fn global() -> &'static Router {
        static GLOBAL: OnceLock<Router> = OnceLock::new();
        GLOBAL.get_or_init(Router::new)
    }

    // ---- subscribers ----

    /// Registers a synchronous subscriber.
    ///
    /// On a disposed router nothing is registered and the returned handle is
    /// already disposed.
    pub fn subscribe(&self, subscriber: Arc<dyn Subscriber>) -> Subscription {
        if self.rejects_registration(subscriber.name()) {
            return Subscription::new(&self.inner, None, None);
        }
        let index = self.inner.subscribers.add(Arc::clone(&subscriber));
        debug!(subscriber = subscriber.name(), index, "subscribed");
        Subscription::new(&self.inner, Some(subscriber), None)
    }

    /// Registers an asynchronous subscriber.
    pub fn subscribe_async(&self, subscriber: Arc<dyn AsyncSubscriber>) -> Subscription {
        if self.rejects_registration(subscriber.name()) {
            return Subscription::new(&self.inner, None, None);
        }
        let index = self.inner.async_subscribers.add(Arc::clone(&subscriber));
        debug!(subscriber = subscriber.name(), index, "subscribed (async)");
        Subscription::new(&self.inner, None, Some(subscriber))
    }

    /// Registers an object implementing both subscriber traits under one handle.
    pub fn subscribe_both<S>(&self, subscriber: Arc<S>) -> Subscription
    where
        S: Subscriber + AsyncSubscriber,
    {
        let sync: Arc<dyn Subscriber> = subscriber.clone();
        let async_: Arc<dyn AsyncSubscriber> = subscriber;
        if self.rejects_registration(Subscriber::name(&*sync)) {
            return Subscription::new(&self.inner, None, None);
        }
        self.inner.subscribers.add(Arc::clone(&sync));
        self.inner.async_subscribers.add(Arc::clone(&async_));
        debug!(subscriber = Subscriber::name(&*sync), "subscribed (sync + async)");
        Subscription::new(&self.inner, Some(sync), Some(async_))
    }

    /// Registers a synchronous closure for commands of type `T`.
    pub fn subscribe_fn<T, F>(&self, f: F) -> Subscription
    where
        T: Command,
        F: Fn(&T, &PublishContext) -> Result<(), RouteError> + Send + Sync + 'static,
    {
        self.subscribe(SubscriberFn::arc(f))
    }

    /// Registers an asynchronous closure for commands of type `T`.
    ///
    /// ```rust
    /// # use cmdrouter::{Command, PublishContext, RouteError, Router};
    /// # struct Save;
    /// # impl Command for Save {}
    /// let router = Router::new();
    /// let _sub = router.subscribe_await(|_: &Save, ctx: &PublishContext| {
    ///     Box::pin(async move {
    ///         if ctx.is_cancelled() {
    ///             return Err(RouteError::Canceled);
    ///         }
    ///         Ok(())
    ///     })
    /// });
    /// ```
    pub fn subscribe_await<T, F>(&self, f: F) -> Subscription
    where
        T: Command,
        F: for<'a> Fn(&'a T, &'a PublishContext) -> BoxFuture<'a, Result<(), RouteError>>
            + Send
            + Sync
            + 'static,
    {
        self.subscribe_async(AsyncSubscriberFn::arc(f))
    }

    /// Removes `subscriber` from both subscriber registries.
    ///
    /// Matches by allocation, so the `Arc` used to subscribe (or any clone of it,
    /// typed or erased) works. Returns `false` if it was not registered.
    pub fn unsubscribe<S: ?Sized>(&self, subscriber: &Arc<S>) -> bool {
        let sync = self
            .inner
            .subscribers
            .remove_first(|s| same_allocation(s, subscriber));
        let async_ = self
            .inner
            .async_subscribers
            .remove_first(|s| same_allocation(s, subscriber));
        debug!(removed = sync || async_, "unsubscribed");
        sync || async_
    }

    /// Removes every subscriber and interceptor; the router stays usable.
    pub fn unsubscribe_all(&self) {
        self.inner.subscribers.clear();
        self.inner.async_subscribers.clear();
        let _filters = self.inner.filters.lock();
        self.inner.interceptors.clear();
        self.inner.has_interceptors.store(false, Ordering::Release);
        debug!("all registrations cleared");
    }

    fn rejects_registration(&self, name: &'static str) -> bool {
        let disposed = self.is_disposed();
        if disposed {
            warn!(registration = name, "router disposed; registration ignored");
        }
        disposed
    }

    // ---- interceptors ----

    /// Appends an interceptor to the chain.
    ///
    /// Ignored on a disposed router.
    pub fn add_filter(&self, interceptor: Arc<dyn Interceptor>) -> &Self {
        let name = interceptor.name();
        if self.rejects_registration(name) {
            return self;
        }
        let _filters = self.inner.filters.lock();
        let index = self.inner.interceptors.add(interceptor);
        self.inner.has_interceptors.store(true, Ordering::Release);
        debug!(interceptor = name, index, "filter added");
        self
    }

    /// Appends the policy for `ordering` (no-op for `Parallel`).
    pub fn add_ordering(&self, ordering: CommandOrdering) -> &Self {
        if let Some(interceptor) = ordering.interceptor() {
            self.add_filter(interceptor);
        }
        self
    }

    /// Appends a closure interceptor for commands of type `T`; others pass through.
    pub fn filter_fn<T, F>(&self, f: F) -> &Self
    where
        T: Command,
        F: for<'a> Fn(
                &'a T,
                &'a mut PublishContext,
                Next<'a>,
            ) -> BoxFuture<'a, Result<(), RouteError>>
            + Send
            + Sync
            + 'static,
    {
        self.add_filter(InterceptorFn::arc(f))
    }

    /// Removes every interceptor matching `pred`; returns how many were removed.
    pub fn remove_filter(&self, mut pred: impl FnMut(&dyn Interceptor) -> bool) -> usize {
        let _filters = self.inner.filters.lock();
        let removed = self.inner.interceptors.remove_where(|i| pred(&**i));
        let any = !self.inner.interceptors.snapshot().is_empty();
        self.inner.has_interceptors.store(any, Ordering::Release);
        debug!(removed, remaining = any, "filters removed");
        removed
    }

    /// Removes the interceptor in filter slot `index`.
    ///
    /// Slot 0 holds the ordering policy from [`RouterConfig`], when one was configured.
    ///
    /// # Errors
    /// [`RouteError::SlotNotFound`] if the slot is empty or out of range.
    pub fn remove_filter_at(&self, index: usize) -> Result<(), RouteError> {
        let _filters = self.inner.filters.lock();
        self.inner.interceptors.remove_at(index)?;
        let any = !self.inner.interceptors.snapshot().is_empty();
        self.inner.has_interceptors.store(any, Ordering::Release);
        debug!(index, remaining = any, "filter removed");
        Ok(())
    }

    // ---- publishing ----

    /// Publishes `command` to every subscriber through the interceptor chain.
    ///
    /// Resolves once synchronous subscribers have run and every asynchronous
    /// subscriber has finished.
    ///
    /// # Errors
    /// - [`RouteError::Disposed`] if the router was disposed.
    /// - The first synchronous subscriber failure, or the last asynchronous one.
    /// - Whatever an interceptor returns.
    #[track_caller]
    pub fn publish<T: Command>(
        &self,
        command: T,
        cancel: CancellationToken,
    ) -> impl Future<Output = Result<(), RouteError>> + Send + '_ {
        let caller = Caller::here();
        async move { self.dispatch(&command, cancel, Some(caller)).await }
    }

    /// Publishes with explicit caller metadata, e.g. `Caller::here().with_member("spawn_wave")`.
    pub fn publish_with<T: Command>(
        &self,
        command: T,
        cancel: CancellationToken,
        caller: Caller,
    ) -> impl Future<Output = Result<(), RouteError>> + Send + '_ {
        async move { self.dispatch(&command, cancel, Some(caller)).await }
    }

    /// Publishes an already-erased command (e.g. a [`PooledCommand`](crate::PooledCommand)).
    #[track_caller]
    pub fn publish_ref<'a>(
        &'a self,
        command: &'a dyn Command,
        cancel: CancellationToken,
    ) -> impl Future<Output = Result<(), RouteError>> + Send + 'a {
        let caller = Caller::here();
        async move { self.dispatch(command, cancel, Some(caller)).await }
    }

    /// Publishes on a spawned tokio task; failures are logged, not returned.
    ///
    /// Must be called from within a tokio runtime.
    #[track_caller]
    pub fn enqueue<T: Command>(&self, command: T) -> JoinHandle<()> {
        let router = self.clone();
        let caller = Caller::here();
        tokio::spawn(async move {
            let outcome = router
                .dispatch(&command, CancellationToken::new(), Some(caller))
                .await;
            if let Err(err) = outcome {
                warn!(
                    command = command.name(),
                    label = err.as_label(),
                    error = %err,
                    caller = %caller,
                    "enqueued publish failed"
                );
            }
        })
    }

    async fn dispatch(
        &self,
        command: &dyn Command,
        cancel: CancellationToken,
        caller: Option<Caller>,
    ) -> Result<(), RouteError> {
        if self.is_disposed() {
            return Err(RouteError::Disposed);
        }

        let dispatch = Dispatch::new(
            self.inner.subscribers.snapshot(),
            self.inner.async_subscribers.snapshot(),
        );
        let mut ctx = PublishContext::rent(cancel, caller);
        trace!(command = command.name(), caller = ?ctx.caller(), "publish");

        if !self.inner.has_interceptors.load(Ordering::Acquire) {
            return dispatch.deliver(command, &ctx).await;
        }

        let interceptors = self.inner.interceptors.snapshot();
        Next::new(interceptors.live(), &dispatch)
            .run(command, &mut ctx)
            .await
    }

    // ---- lifecycle & diagnostics ----

    /// Clears every registry and rejects further publishes. Idempotent.
    pub fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.unsubscribe_all();
        debug!("router disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::Acquire)
    }

    /// Number of registered synchronous subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.snapshot().count()
    }

    /// Number of registered asynchronous subscribers.
    pub fn async_subscriber_count(&self) -> usize {
        self.inner.async_subscribers.snapshot().count()
    }

    /// Number of registered interceptors (ordering policies included).
    pub fn interceptor_count(&self) -> usize {
        self.inner.interceptors.snapshot().count()
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("subscribers", &self.subscriber_count())
            .field("async_subscribers", &self.async_subscriber_count())
            .field("interceptors", &self.interceptor_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::{Notify, Semaphore};

    use crate::command::CommandPool;
    use crate::pipeline::FanOutInterceptor;

    #[derive(Debug, Default)]
    struct Cmd(u32);
    impl Command for Cmd {}
    impl crate::command::PoolableCommand for Cmd {}

    struct Other;
    impl Command for Other {}

    struct Counting {
        calls: AtomicUsize,
        call_through: bool,
    }

    impl Counting {
        fn arc(call_through: bool) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                call_through,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Interceptor for Counting {
        async fn invoke(
            &self,
            command: &dyn Command,
            ctx: &mut PublishContext,
            next: Next<'_>,
        ) -> Result<(), RouteError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.call_through {
                next.run(command, ctx).await
            } else {
                Ok(())
            }
        }
    }

    /// Swallows downstream failures.
    struct ErrorHandling {
        caught: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Interceptor for ErrorHandling {
        async fn invoke(
            &self,
            command: &dyn Command,
            ctx: &mut PublishContext,
            next: Next<'_>,
        ) -> Result<(), RouteError> {
            if let Err(err) = next.run(command, ctx).await {
                self.caught.lock().push(err.to_string());
            }
            Ok(())
        }
    }

    fn ordered(ordering: CommandOrdering) -> Router {
        Router::with_config(RouterConfig::default().with_ordering(ordering))
    }

    fn received_log() -> Arc<Mutex<Vec<u32>>> {
        Arc::new(Mutex::new(Vec::new()))
    }

    fn counter() -> Arc<AtomicUsize> {
        Arc::new(AtomicUsize::new(0))
    }

    /// Lets spawned tasks on the current-thread runtime make progress.
    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_subscribers_receive_only_their_type() {
        let router = Router::new();
        let sync_hits = counter();
        let async_hits = counter();

        let seen = Arc::clone(&sync_hits);
        let _s = router.subscribe_fn(move |c: &Cmd, _: &PublishContext| {
            seen.fetch_add(c.0 as usize, Ordering::SeqCst);
            Ok(())
        });
        let seen = Arc::clone(&async_hits);
        let _a = router.subscribe_await(move |c: &Cmd, _: &PublishContext| {
            let seen = Arc::clone(&seen);
            let n = c.0 as usize;
            Box::pin(async move {
                seen.fetch_add(n, Ordering::SeqCst);
                Ok(())
            })
        });

        router.publish(Cmd(2), CancellationToken::new()).await.unwrap();
        router.publish(Other, CancellationToken::new()).await.unwrap();

        assert_eq!(sync_hits.load(Ordering::SeqCst), 2);
        assert_eq!(async_hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_fan_out_waits_for_every_async_subscriber() {
        let router = Router::new();
        let gate = Arc::new(Notify::new());
        let started = counter();
        let finished = counter();

        for _ in 0..3 {
            let (gate, started, finished) =
                (Arc::clone(&gate), Arc::clone(&started), Arc::clone(&finished));
            let _ = router.subscribe_await(move |_: &Cmd, _: &PublishContext| {
                let (gate, started, finished) =
                    (Arc::clone(&gate), Arc::clone(&started), Arc::clone(&finished));
                Box::pin(async move {
                    started.fetch_add(1, Ordering::SeqCst);
                    gate.notified().await;
                    finished.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                })
            });
        }

        let publish = router.publish(Cmd(1), CancellationToken::new());
        tokio::pin!(publish);
        assert!(futures::poll!(&mut publish).is_pending());
        assert_eq!(started.load(Ordering::SeqCst), 3);
        assert_eq!(finished.load(Ordering::SeqCst), 0);

        gate.notify_waiters();
        assert_eq!(publish.await, Ok(()));
        assert_eq!(finished.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_sync_subscribers_run_before_publish_suspends() {
        let router = Router::new();
        let gate = Arc::new(Notify::new());
        let sync_hits = counter();

        let seen = Arc::clone(&sync_hits);
        let _s = router.subscribe_fn(move |_: &Cmd, _: &PublishContext| {
            seen.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        let waiter = Arc::clone(&gate);
        let _a = router.subscribe_await(move |_: &Cmd, _: &PublishContext| {
            let waiter = Arc::clone(&waiter);
            Box::pin(async move {
                waiter.notified().await;
                Ok(())
            })
        });

        let publish = router.publish(Cmd(1), CancellationToken::new());
        tokio::pin!(publish);
        assert!(futures::poll!(&mut publish).is_pending());
        assert_eq!(sync_hits.load(Ordering::SeqCst), 1);

        gate.notify_waiters();
        assert_eq!(publish.await, Ok(()));
    }

    #[tokio::test]
    async fn test_interceptors_propagate() {
        let router = Router::new();
        let received = counter();
        let seen = Arc::clone(&received);
        let _s = router.subscribe_fn(move |_: &Cmd, _: &PublishContext| {
            seen.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let (i1, i2) = (Counting::arc(true), Counting::arc(true));
        router.add_filter(i1.clone()).add_filter(i2.clone());
        router.publish(Cmd(1), CancellationToken::new()).await.unwrap();

        assert_eq!(i1.calls(), 1);
        assert_eq!(i2.calls(), 1);
        assert_eq!(received.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_interceptor_stops_propagation() {
        let router = Router::new();
        let received = counter();
        let seen = Arc::clone(&received);
        let _s = router.subscribe_fn(move |_: &Cmd, _: &PublishContext| {
            seen.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let (i1, i2) = (Counting::arc(true), Counting::arc(false));
        router.add_filter(i1.clone()).add_filter(i2.clone());
        assert_eq!(router.publish(Cmd(1), CancellationToken::new()).await, Ok(()));

        assert_eq!(i1.calls(), 1);
        assert_eq!(i2.calls(), 1);
        assert_eq!(received.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_error_handling_interceptor_swallows_failures() {
        let router = Router::new();
        let handler = Arc::new(ErrorHandling {
            caught: Mutex::new(Vec::new()),
        });
        router.add_filter(handler.clone());
        let _s =
            router.subscribe_fn(|_: &Cmd, _: &PublishContext| Err(RouteError::failed("boom")));

        assert_eq!(router.publish(Cmd(1), CancellationToken::new()).await, Ok(()));
        assert_eq!(*handler.caught.lock(), vec!["dispatch failed: boom".to_string()]);
    }

    #[tokio::test]
    async fn test_sync_failure_propagates_without_interceptors() {
        let router = Router::new();
        let later = counter();
        let seen = Arc::clone(&later);
        let _a =
            router.subscribe_fn(|_: &Cmd, _: &PublishContext| Err(RouteError::failed("first")));
        let _b = router.subscribe_fn(move |_: &Cmd, _: &PublishContext| {
            seen.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let out = router.publish(Cmd(1), CancellationToken::new()).await;
        assert_eq!(out, Err(RouteError::failed("first")));
        assert_eq!(later.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_async_failures_last_one_wins() {
        let router = Router::new();
        let _a = router.subscribe_await(|_: &Cmd, _: &PublishContext| {
            Box::pin(async { Err(RouteError::failed("first")) })
        });
        let _b = router.subscribe_await(|_: &Cmd, _: &PublishContext| {
            Box::pin(async {
                tokio::task::yield_now().await;
                Err(RouteError::failed("second"))
            })
        });

        let out = router.publish(Cmd(1), CancellationToken::new()).await;
        assert_eq!(out, Err(RouteError::failed("second")));
    }

    #[tokio::test]
    async fn test_sequential_ordering_serializes() {
        let router = ordered(CommandOrdering::Sequential);
        let log: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let signal = Arc::new(Semaphore::new(0));

        let (l, s) = (Arc::clone(&log), Arc::clone(&signal));
        let _a = router.subscribe_await(move |c: &Cmd, _: &PublishContext| {
            let (log, signal, id) = (Arc::clone(&l), Arc::clone(&s), c.0);
            Box::pin(async move {
                log.lock().push(format!("start {id}"));
                match signal.acquire().await {
                    // Consumed, so every step needs its own permit.
                    Ok(permit) => permit.forget(),
                    Err(err) => return Err(RouteError::failed(err)),
                }
                log.lock().push(format!("end {id}"));
                Ok(())
            })
        });

        let spawn = |id| {
            let router = router.clone();
            tokio::spawn(async move { router.publish(Cmd(id), CancellationToken::new()).await })
        };

        let first = spawn(1);
        settle().await;
        let second = spawn(2);
        settle().await;
        assert_eq!(*log.lock(), vec!["start 1"]);

        signal.add_permits(1);
        settle().await;
        assert_eq!(*log.lock(), vec!["start 1", "end 1", "start 2"]);

        signal.add_permits(1);
        assert_eq!(first.await.unwrap(), Ok(()));
        assert_eq!(second.await.unwrap(), Ok(()));
        assert_eq!(log.lock().len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_ordering_keeps_first() {
        let router = ordered(CommandOrdering::Drop);
        let received = received_log();
        let sink = Arc::clone(&received);
        let _a = router.subscribe_await(move |c: &Cmd, _: &PublishContext| {
            let (sink, id) = (Arc::clone(&sink), c.0);
            Box::pin(async move {
                tokio::time::sleep(Duration::from_millis(100)).await;
                sink.lock().push(id);
                Ok(())
            })
        });

        let (a, b) = tokio::join!(
            router.publish(Cmd(1), CancellationToken::new()),
            router.publish(Cmd(2), CancellationToken::new()),
        );
        assert_eq!(a, Ok(()));
        assert_eq!(b, Ok(()));
        assert_eq!(*received.lock(), vec![1]);

        // Flag cleared: the next publish goes through.
        router.publish(Cmd(3), CancellationToken::new()).await.unwrap();
        assert_eq!(*received.lock(), vec![1, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_switch_ordering_cancels_previous() {
        let router = ordered(CommandOrdering::Switch);
        let received = received_log();
        let sink = Arc::clone(&received);
        let _a = router.subscribe_await(move |c: &Cmd, ctx: &PublishContext| {
            let (sink, id) = (Arc::clone(&sink), c.0);
            Box::pin(async move {
                tokio::select! {
                    _ = ctx.cancellation().cancelled() => Err(RouteError::Canceled),
                    _ = tokio::time::sleep(Duration::from_millis(100)) => {
                        sink.lock().push(id);
                        Ok(())
                    }
                }
            })
        });

        let (a, b) = tokio::join!(
            router.publish(Cmd(1), CancellationToken::new()),
            router.publish(Cmd(2), CancellationToken::new()),
        );
        assert_eq!(a, Err(RouteError::Canceled));
        assert_eq!(b, Ok(()));
        assert_eq!(*received.lock(), vec![2]);
    }

    #[tokio::test]
    async fn test_switch_links_caller_token() {
        let router = ordered(CommandOrdering::Switch);
        let _a = router.subscribe_await(|_: &Cmd, ctx: &PublishContext| {
            Box::pin(async move {
                ctx.cancellation().cancelled().await;
                Err(RouteError::Canceled)
            })
        });

        let caller = CancellationToken::new();
        let publish = router.publish(Cmd(1), caller.clone());
        tokio::pin!(publish);
        assert!(futures::poll!(&mut publish).is_pending());
        caller.cancel();
        assert_eq!(publish.await, Err(RouteError::Canceled));
    }

    #[tokio::test]
    async fn test_dispose_rejects_publish_and_is_idempotent() {
        let router = Router::new();
        let _s = router.subscribe_fn(|_: &Cmd, _: &PublishContext| Ok(()));
        let _a = router.subscribe_await(|_: &Cmd, _: &PublishContext| Box::pin(async { Ok(()) }));
        router.add_filter(Counting::arc(true));
        assert_eq!(router.async_subscriber_count(), 1);

        router.dispose();
        router.dispose();

        assert!(router.is_disposed());
        assert_eq!(router.subscriber_count(), 0);
        assert_eq!(router.async_subscriber_count(), 0);
        assert_eq!(router.interceptor_count(), 0);
        assert_eq!(
            router.publish(Cmd(1), CancellationToken::new()).await,
            Err(RouteError::Disposed)
        );
    }

    #[tokio::test]
    async fn test_registration_after_dispose_is_ignored() {
        let router = Router::new();
        router.dispose();

        let sub = router.subscribe_fn(|_: &Cmd, _: &PublishContext| Ok(()));
        let both = router.subscribe_await(|_: &Cmd, _: &PublishContext| Box::pin(async { Ok(()) }));
        router.add_filter(Counting::arc(true));

        assert!(sub.is_disposed());
        assert!(both.is_disposed());
        assert_eq!(router.subscriber_count(), 0);
        assert_eq!(router.async_subscriber_count(), 0);
        assert_eq!(router.interceptor_count(), 0);
    }

    #[tokio::test]
    async fn test_publish_with_carries_member_name() {
        let router = Router::new();
        let member = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&member);
        let _s = router.subscribe_fn(move |_: &Cmd, ctx: &PublishContext| {
            *sink.lock() = ctx.caller().and_then(Caller::member);
            Ok(())
        });

        let caller = Caller::here().with_member("spawn_wave");
        router
            .publish_with(Cmd(1), CancellationToken::new(), caller)
            .await
            .unwrap();
        assert_eq!(*member.lock(), Some("spawn_wave"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_publish_with_registry_churn() {
        const TASKS: usize = 8;
        const PUBLISHES: usize = 250;

        let router = Router::new();
        router.filter_fn(|c: &Cmd, ctx: &mut PublishContext, next: Next<'_>| {
            Box::pin(async move {
                if !ctx.extensions().is_empty() {
                    return Err(RouteError::failed("context rented with stale extensions"));
                }
                ctx.extensions().insert("id", c.0);
                next.run(c, ctx).await
            })
        });

        let hits = counter();
        let seen = Arc::clone(&hits);
        let mut stable = router.subscribe_await(move |_: &Cmd, ctx: &PublishContext| {
            let seen = Arc::clone(&seen);
            let tagged = ctx.extensions().contains_key("id");
            Box::pin(async move {
                if !tagged {
                    return Err(RouteError::failed("extension missing"));
                }
                tokio::task::yield_now().await;
                seen.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        });

        let churn = {
            let router = router.clone();
            tokio::spawn(async move {
                for _ in 0..PUBLISHES {
                    let mut sub = router.subscribe_fn(|_: &Other, _: &PublishContext| Ok(()));
                    tokio::task::yield_now().await;
                    sub.dispose();
                }
            })
        };

        let publishers: Vec<_> = (0..TASKS)
            .map(|_| {
                let router = router.clone();
                tokio::spawn(async move {
                    for i in 0..PUBLISHES {
                        router.publish(Cmd(i as u32), CancellationToken::new()).await?;
                    }
                    Ok::<(), RouteError>(())
                })
            })
            .collect();

        for publisher in publishers {
            assert_eq!(publisher.await.unwrap(), Ok(()));
        }
        churn.await.unwrap();

        assert_eq!(hits.load(Ordering::SeqCst), TASKS * PUBLISHES);
        assert_eq!(router.subscriber_count(), 0);
        stable.dispose();
        assert_eq!(router.async_subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_subscription_dispose_and_unsubscribe() {
        let router = Router::new();
        let mut sub = router.subscribe_fn(|_: &Cmd, _: &PublishContext| Ok(()));
        assert_eq!(router.subscriber_count(), 1);

        sub.dispose();
        sub.dispose();
        assert!(sub.is_disposed());
        assert_eq!(router.subscriber_count(), 0);

        let typed = SubscriberFn::arc(|_: &Cmd, _: &PublishContext| Ok(()));
        let _keep = router.subscribe(typed.clone());
        assert!(router.unsubscribe(&typed));
        assert!(!router.unsubscribe(&typed));
    }

    #[tokio::test]
    async fn test_subscription_outlives_router() {
        let router = Router::new();
        let mut sub = router.subscribe_fn(|_: &Cmd, _: &PublishContext| Ok(()));
        drop(router);
        sub.dispose();
        assert!(sub.is_disposed());
    }

    #[tokio::test]
    async fn test_remove_filter_restores_fast_path() {
        let router = Router::new();
        let received = counter();
        let seen = Arc::clone(&received);
        let _s = router.subscribe_fn(move |_: &Cmd, _: &PublishContext| {
            seen.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        router.add_filter(Counting::arc(false));
        router.publish(Cmd(1), CancellationToken::new()).await.unwrap();
        assert_eq!(received.load(Ordering::SeqCst), 0);

        let removed = router.remove_filter(|_| true);
        assert_eq!(removed, 1);
        assert!(!router.inner.has_interceptors.load(Ordering::Acquire));

        router.publish(Cmd(1), CancellationToken::new()).await.unwrap();
        assert_eq!(received.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_remove_filter_at_drops_configured_ordering() {
        let router = ordered(CommandOrdering::Drop);
        assert_eq!(router.interceptor_count(), 1);

        assert_eq!(router.remove_filter_at(0), Ok(()));
        assert_eq!(router.interceptor_count(), 0);
        assert_eq!(
            router.remove_filter_at(0),
            Err(RouteError::SlotNotFound { index: 0 })
        );
        assert!(!router.inner.has_interceptors.load(Ordering::Acquire));
    }

    #[tokio::test]
    async fn test_extensions_shared_with_subscribers() {
        let router = Router::new();
        router.filter_fn(|c: &Cmd, ctx: &mut PublishContext, next: Next<'_>| {
            Box::pin(async move {
                ctx.extensions().insert("script", format!("cmd-{}", c.0));
                next.run(c, ctx).await
            })
        });

        let found = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&found);
        let _s = router.subscribe_fn(move |_: &Cmd, ctx: &PublishContext| {
            *sink.lock() = ctx.extensions().get::<String>("script");
            Ok(())
        });

        router.publish(Cmd(7), CancellationToken::new()).await.unwrap();
        assert_eq!(found.lock().as_deref().map(String::as_str), Some("cmd-7"));
    }

    #[tokio::test]
    async fn test_caller_location_captured() {
        let router = Router::new();
        let file = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&file);
        let _s = router.subscribe_fn(move |_: &Cmd, ctx: &PublishContext| {
            *sink.lock() = ctx.caller().map(|c| c.file());
            Ok(())
        });

        router.publish(Cmd(1), CancellationToken::new()).await.unwrap();
        let file = file.lock().unwrap_or_default();
        assert!(file.ends_with("router.rs"), "captured {file}");
    }

    #[tokio::test]
    async fn test_fan_out_interceptor_reaches_downstream() {
        let (left, right) = (Router::new(), Router::new());
        let hits = counter();
        for downstream in [&left, &right] {
            let seen = Arc::clone(&hits);
            let _ = downstream.subscribe_fn(move |_: &Cmd, _: &PublishContext| {
                seen.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        }

        let upstream = Router::new();
        upstream.add_filter(FanOutInterceptor::with_routers([left.clone(), right.clone()]));
        upstream.publish(Cmd(1), CancellationToken::new()).await.unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_enqueue_runs_on_spawned_task() {
        let router = Router::new();
        let hits = counter();
        let seen = Arc::clone(&hits);
        let _s = router.subscribe_fn(move |_: &Cmd, _: &PublishContext| {
            seen.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        router.enqueue(Cmd(1)).await.unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_pooled_command_returns_after_publish() {
        let router = Router::new();
        let _s = router.subscribe_fn(|c: &Cmd, _: &PublishContext| {
            assert_eq!(c.0, 9);
            Ok(())
        });

        let pool = Arc::new(CommandPool::<Cmd>::new());
        {
            let mut cmd = pool.rent_pooled(Cmd::default);
            cmd.0 = 9;
            router.publish_ref(&*cmd, CancellationToken::new()).await.unwrap();
            assert!(pool.is_empty());
        }
        assert_eq!(pool.len(), 1);
    }

    #[tokio::test]
    async fn test_builder_preserves_registration_order() {
        let first = Counting::arc(true);
        let router = Router::builder(RouterConfig::default().with_ordering(CommandOrdering::Drop))
            .with_interceptor(first.clone())
            .with_subscriber(SubscriberFn::arc(|_: &Cmd, _: &PublishContext| Ok(())))
            .build();

        assert_eq!(router.interceptor_count(), 2);
        assert_eq!(router.subscriber_count(), 1);
        router.publish(Cmd(1), CancellationToken::new()).await.unwrap();
        assert_eq!(first.calls(), 1);
    }

    #[test]
    fn test_global_is_shared() {
        assert!(Arc::ptr_eq(&Router::global().inner, &Router::global().inner));
    }
}
