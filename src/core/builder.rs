//! Builder for a [`Router`] with its initial registrations.

use std::sync::Arc;

use super::{Router, RouterConfig};
use crate::pipeline::Interceptor;
use crate::subscribers::{AsyncSubscriber, Subscriber};

/// Builder for constructing a [`Router`] with its initial registrations.
pub struct RouterBuilder {
    cfg: RouterConfig,
    subscribers: Vec<Arc<dyn Subscriber>>,
    async_subscribers: Vec<Arc<dyn AsyncSubscriber>>,
    interceptors: Vec<Arc<dyn Interceptor>>,
}

impl RouterBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: RouterConfig) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
            async_subscribers: Vec::new(),
            interceptors: Vec::new(),
        }
    }

    /// Adds a synchronous subscriber.
    pub fn with_subscriber(mut self, subscriber: Arc<dyn Subscriber>) -> Self {
        self.subscribers.push(subscriber);
        self
    }

    /// Adds an asynchronous subscriber.
    pub fn with_async_subscriber(mut self, subscriber: Arc<dyn AsyncSubscriber>) -> Self {
        self.async_subscribers.push(subscriber);
        self
    }

    /// Appends an interceptor after the configured ordering policy.
    pub fn with_interceptor(mut self, interceptor: Arc<dyn Interceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    /// Builds the router.
    ///
    /// Registration order is preserved: the ordering policy (if any) comes first,
    /// then interceptors in the order they were added.
    pub fn build(self) -> Router {
        let router = Router::with_config(self.cfg);
        for interceptor in self.interceptors {
            router.add_filter(interceptor);
        }
        for subscriber in self.subscribers {
            let _ = router.subscribe(subscriber);
        }
        for subscriber in self.async_subscribers {
            let _ = router.subscribe_async(subscriber);
        }
        router
    }
}
