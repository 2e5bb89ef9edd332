//! # Dispatch: terminal fan-out over the subscribers of one publish.
//!
//! [`Dispatch`] holds the subscriber snapshots taken when a publish starts and
//! delivers the command to them once the interceptor chain is exhausted.
//!
//! ## What it guarantees
//! - Synchronous subscribers run first, inline, in slot order.
//! - Every asynchronous subscriber is started exactly once; the returned future
//!   resolves after all of them finished.
//! - Subscribe/unsubscribe during a dispatch does not affect it (snapshots).
//!
//! ## What it does **not** guarantee
//! - No isolation between synchronous subscribers: the first `Err` aborts the rest.
//! - No aggregation of asynchronous failures: the last one wins.
//!
//! ## Diagram
//! ```text
//!    deliver(cmd, ctx)
//!        ├─► S1.receive ─► S2.receive ─► … (Err? stop, return it)
//!        │
//!        └─► FanOutSource::reset(n)
//!               ├─► A1.receive_async ─┐
//!               ├─► A2.receive_async ─┼─► await all ─► Ok / last Err
//!               └─► AN.receive_async ─┘
//! ```

use std::sync::Arc;

use futures::future::{self, Either, Ready};
use tracing::trace;

use super::fan_out::FanOutSource;
use super::registry::Slots;
use crate::command::Command;
use crate::context::PublishContext;
use crate::error::RouteError;
use crate::subscribers::{AsyncSubscriber, Subscriber};

/// Future returned by [`Dispatch::deliver`]: already resolved, or joining the
/// asynchronous subscribers.
pub(crate) type Delivery<'b> = Either<Ready<Result<(), RouteError>>, FanOutSource<'b>>;

/// Subscriber snapshots for one publish.
pub(crate) struct Dispatch {
    subscribers: Arc<Slots<dyn Subscriber>>,
    async_subscribers: Arc<Slots<dyn AsyncSubscriber>>,
}

impl Dispatch {
    pub(crate) fn new(
        subscribers: Arc<Slots<dyn Subscriber>>,
        async_subscribers: Arc<Slots<dyn AsyncSubscriber>>,
    ) -> Self {
        Self {
            subscribers,
            async_subscribers,
        }
    }

    /// Delivers `command` to every subscriber.
    ///
    /// Synchronous subscribers have already run when this returns; the future only
    /// tracks the asynchronous ones.
    pub(crate) fn deliver<'b>(
        &'b self,
        command: &'b dyn Command,
        ctx: &'b PublishContext,
    ) -> Delivery<'b> {
        for sub in self.subscribers.occupied() {
            if let Err(err) = sub.receive(command, ctx) {
                trace!(
                    subscriber = sub.name(),
                    command = command.name(),
                    error = %err,
                    "subscriber failed; remaining subscribers skipped"
                );
                return Either::Left(future::ready(Err(err)));
            }
        }

        let expected = self.async_subscribers.count();
        if expected == 0 {
            return Either::Left(future::ready(Ok(())));
        }

        let mut source = FanOutSource::rent();
        source.reset(expected);
        for sub in self.async_subscribers.occupied() {
            source.add_task(sub.receive_async(command, ctx));
        }
        Either::Right(source)
    }
}
