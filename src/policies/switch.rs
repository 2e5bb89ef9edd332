//! Switch ordering: a new publish cancels the one in flight.
//!
//! ```text
//! publish #1 ─► token₁ = caller₁.child_token() ─► subscribers … (observes cancel)
//! publish #2 ─► token₁.cancel(); token₂ = caller₂.child_token() ─► subscribers …
//! ```
//!
//! The replacement token is a child of the caller's token, so cancelling the caller
//! still reaches the dispatch.

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::command::Command;
use crate::context::PublishContext;
use crate::error::RouteError;
use crate::pipeline::{Interceptor, Next};

/// Cancels the previous dispatch before letting the new one through.
#[derive(Debug, Default)]
pub struct SwitchOrdering {
    current: Mutex<Option<CancellationToken>>,
}

impl SwitchOrdering {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Interceptor for SwitchOrdering {
    async fn invoke(
        &self,
        command: &dyn Command,
        ctx: &mut PublishContext,
        next: Next<'_>,
    ) -> Result<(), RouteError> {
        let token = ctx.cancellation().child_token();
        let previous = self.current.lock().replace(token.clone());
        if let Some(previous) = previous {
            if !previous.is_cancelled() {
                debug!(command = command.name(), "switch: cancelling previous dispatch");
            }
            previous.cancel();
        }

        ctx.set_cancellation(token);
        next.run(command, ctx).await
    }

    fn name(&self) -> &'static str {
        "switch"
    }
}
