//! # LogWriter — tracing interceptor
//!
//! A minimal interceptor that records every dispatch through `tracing`.
//! Use it for tests or demos; install a `tracing` subscriber to see the output.
//!
//! ## Example output
//! ```text
//! DEBUG cmdrouter::pipeline::log: dispatch started command="game::Move" caller=src/main.rs:42:5
//! INFO  cmdrouter::pipeline::log: dispatch completed command="game::Move"
//! INFO  cmdrouter::pipeline::log: dispatch cancelled command="game::Move"
//! WARN  cmdrouter::pipeline::log: dispatch failed command="game::Move" label="route_failed" error=…
//! ```

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::interceptor::{Interceptor, Next};
use crate::command::Command;
use crate::context::PublishContext;
use crate::error::RouteError;

/// Dispatch logging interceptor.
#[derive(Debug, Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Interceptor for LogWriter {
    async fn invoke(
        &self,
        command: &dyn Command,
        ctx: &mut PublishContext,
        next: Next<'_>,
    ) -> Result<(), RouteError> {
        match ctx.caller() {
            Some(caller) => debug!(command = command.name(), %caller, "dispatch started"),
            None => debug!(command = command.name(), "dispatch started"),
        }

        let outcome = next.run(command, ctx).await;
        match &outcome {
            Ok(()) => info!(command = command.name(), "dispatch completed"),
            Err(err) if err.is_canceled() => {
                info!(command = command.name(), "dispatch cancelled")
            }
            Err(err) => warn!(
                command = command.name(),
                label = err.as_label(),
                error = %err,
                "dispatch failed"
            ),
        }
        outcome
    }

    fn name(&self) -> &'static str {
        "log_writer"
    }
}
