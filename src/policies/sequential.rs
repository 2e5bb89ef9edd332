//! Sequential ordering: one dispatch at a time, FIFO.

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::trace;

use crate::command::Command;
use crate::context::PublishContext;
use crate::error::RouteError;
use crate::pipeline::{Interceptor, Next};

/// Serializes dispatches passing through this interceptor.
///
/// Waiters acquire the lock in arrival order (`tokio::sync::Mutex` is fair); the
/// lock is released when the continuation finishes, fails, or is dropped.
#[derive(Debug, Default)]
pub struct SequentialOrdering {
    gate: Mutex<()>,
}

impl SequentialOrdering {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Interceptor for SequentialOrdering {
    async fn invoke(
        &self,
        command: &dyn Command,
        ctx: &mut PublishContext,
        next: Next<'_>,
    ) -> Result<(), RouteError> {
        let _turn = self.gate.lock().await;
        trace!(command = command.name(), "sequential: acquired turn");
        next.run(command, ctx).await
    }

    fn name(&self) -> &'static str {
        "sequential"
    }
}
