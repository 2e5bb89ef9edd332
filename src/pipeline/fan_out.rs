//! # Fan-out to downstream routers.
//!
//! [`FanOutInterceptor`] lets one router feed others: after the local chain (and
//! local subscribers) completed, the same command is republished to every
//! downstream router and the publish resolves when all of them are done.
//!
//! ```text
//! upstream.publish(cmd) ─► … ─► FanOutInterceptor ─► next.run(cmd) (local subscribers)
//!                                       └─► on success: ┬─► router A.publish_ref(cmd)
//!                                                       ├─► router B.publish_ref(cmd)
//!                                                       └─► join (last failure wins)
//! ```
//!
//! Downstream routers receive the current cancellation token, so a switch ordering
//! upstream also cancels the fanned-out dispatches.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;

use super::interceptor::{Interceptor, Next};
use crate::command::Command;
use crate::context::PublishContext;
use crate::core::{FanOutSource, Router};
use crate::error::RouteError;

/// Republishes every command to a set of downstream routers.
#[derive(Debug, Default)]
pub struct FanOutInterceptor {
    routers: RwLock<Vec<Router>>,
}

impl FanOutInterceptor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the interceptor with an initial set of downstream routers.
    pub fn with_routers(routers: impl IntoIterator<Item = Router>) -> Arc<Self> {
        Arc::new(Self {
            routers: RwLock::new(routers.into_iter().collect()),
        })
    }

    /// Adds a downstream router.
    pub fn add(&self, router: Router) {
        self.routers.write().push(router);
    }

    /// Number of downstream routers.
    pub fn len(&self) -> usize {
        self.routers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.routers.read().is_empty()
    }
}

#[async_trait]
impl Interceptor for FanOutInterceptor {
    async fn invoke(
        &self,
        command: &dyn Command,
        ctx: &mut PublishContext,
        next: Next<'_>,
    ) -> Result<(), RouteError> {
        next.run(command, ctx).await?;

        let routers = self.routers.read().clone();
        if routers.is_empty() {
            return Ok(());
        }
        debug!(
            command = command.name(),
            downstream = routers.len(),
            "fan-out: republishing"
        );

        let mut source = FanOutSource::rent();
        source.reset(routers.len());
        for router in &routers {
            source.add_task(Box::pin(
                router.publish_ref(command, ctx.cancellation().clone()),
            ));
        }
        source.await
    }

    fn name(&self) -> &'static str {
        "fan_out"
    }
}
