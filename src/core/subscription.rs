//! # Subscription handle.
//!
//! Returned by the `subscribe*` family on [`Router`](crate::Router). Disposing it
//! removes the registration(s) it stands for. Disposal is idempotent and safe after
//! the router itself was dropped (the handle holds only a weak reference).
//!
//! Dropping a `Subscription` does **not** unsubscribe; bind it to an owner's
//! lifetime explicitly when that is wanted.

use std::fmt;
use std::sync::{Arc, Weak};

use tracing::trace;

use super::router::RouterInner;
use crate::subscribers::{AsyncSubscriber, Subscriber};

/// Handle to one subscription on a router.
#[must_use = "dropping a Subscription keeps the subscriber registered; call dispose() to remove it"]
pub struct Subscription {
    router: Weak<RouterInner>,
    subscriber: Option<Arc<dyn Subscriber>>,
    async_subscriber: Option<Arc<dyn AsyncSubscriber>>,
}

impl Subscription {
    pub(crate) fn new(
        router: &Arc<RouterInner>,
        subscriber: Option<Arc<dyn Subscriber>>,
        async_subscriber: Option<Arc<dyn AsyncSubscriber>>,
    ) -> Self {
        Self {
            router: Arc::downgrade(router),
            subscriber,
            async_subscriber,
        }
    }

    /// Removes the registration(s); later calls do nothing.
    pub fn dispose(&mut self) {
        let subscriber = self.subscriber.take();
        let async_subscriber = self.async_subscriber.take();

        let Some(router) = self.router.upgrade() else {
            return;
        };
        if let Some(sub) = subscriber {
            let removed = router.subscribers.remove(&sub);
            trace!(subscriber = sub.name(), removed, "subscription disposed");
        }
        if let Some(sub) = async_subscriber {
            let removed = router.async_subscribers.remove(&sub);
            trace!(subscriber = sub.name(), removed, "async subscription disposed");
        }
    }

    /// Returns `true` once [`dispose`](Self::dispose) has run.
    pub fn is_disposed(&self) -> bool {
        self.subscriber.is_none() && self.async_subscriber.is_none()
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("subscriber", &self.subscriber.as_ref().map(|s| s.name()))
            .field("async_subscriber", &self.async_subscriber.as_ref().map(|s| s.name()))
            .finish()
    }
}
