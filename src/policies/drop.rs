//! Drop ordering: discard publishes that arrive while one is in flight.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tracing::trace;

use crate::command::Command;
use crate::context::PublishContext;
use crate::error::RouteError;
use crate::pipeline::{Interceptor, Next};

/// Lets one dispatch through at a time and silently drops the rest.
#[derive(Debug, Default)]
pub struct DropOrdering {
    running: AtomicBool,
}

impl DropOrdering {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` while a dispatch holds this policy.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

/// Clears the flag on every exit path, including the dispatch being dropped.
struct Running<'a>(&'a AtomicBool);

impl Drop for Running<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[async_trait]
impl Interceptor for DropOrdering {
    async fn invoke(
        &self,
        command: &dyn Command,
        ctx: &mut PublishContext,
        next: Next<'_>,
    ) -> Result<(), RouteError> {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            trace!(command = command.name(), "drop: dispatch in flight, command discarded");
            return Ok(());
        }

        let _running = Running(&self.running);
        next.run(command, ctx).await
    }

    fn name(&self) -> &'static str {
        "drop"
    }
}
