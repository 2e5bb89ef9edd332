//! # Fan-out completion source.
//!
//! [`FanOutSource`] joins a known number of asynchronous operations into one future.
//! Its bookkeeping state ([`FanOutState`]) is pooled. The task list allocates only
//! once a constituent is still pending after its first poll; the constituent futures
//! themselves are boxed by their producers.
//!
//! ## Flow
//! ```text
//! rent() ─► reset(n) ─► add_task(f1) … add_task(fn) ─► .await ─► Ok / last Err
//!                          │
//!                          ├─ already ready? fold outcome now
//!                          └─ pending? keep it, poll it from the aggregate
//! ```
//!
//! ## Rules
//! - The aggregate resolves once `completed == expected`; `expected == 0` resolves
//!   on first poll.
//! - Failures do not short-circuit: every constituent runs to completion.
//! - Only the **last** failure is reported; earlier ones are logged at `warn` and
//!   discarded.
//! - The source is its own (single) awaiter: it is consumed by `.await`, so a second
//!   concurrent awaiter cannot exist. Polling again after it resolved yields
//!   [`RouteError::StaleSource`].
//! - The state returns to the pool when the source is dropped; its generation is
//!   bumped on completion and on recycle.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::FutureExt;
use futures::future::BoxFuture;
use tracing::warn;

use super::pool::{Pool, Recycle, Rented};
use crate::error::RouteError;

static STATES: Pool<FanOutState> = Pool::new(64);

/// Pooled bookkeeping for one join.
#[derive(Debug, Default)]
pub(crate) struct FanOutState {
    version: u64,
    expected: usize,
    completed: usize,
    failure: Option<RouteError>,
}

impl Recycle for FanOutState {
    fn recycle(&mut self) {
        self.version = self.version.wrapping_add(1);
        self.expected = 0;
        self.completed = 0;
        self.failure = None;
    }
}

/// Future resolving when every registered task has finished.
pub(crate) struct FanOutSource<'a> {
    state: Rented<'static, FanOutState>,
    version: u64,
    pending: Vec<BoxFuture<'a, Result<(), RouteError>>>,
}

impl<'a> FanOutSource<'a> {
    /// Rents a source from the shared pool.
    pub(crate) fn rent() -> Self {
        let state = STATES.rent(FanOutState::default);
        let version = state.version;
        Self {
            state,
            version,
            pending: Vec::new(),
        }
    }

    /// Prepares the source for a join of `expected` tasks.
    pub(crate) fn reset(&mut self, expected: usize) {
        self.state.version = self.state.version.wrapping_add(1);
        self.state.expected = expected;
        self.state.completed = 0;
        self.state.failure = None;
        self.version = self.state.version;
        self.pending.clear();
    }

    /// Registers one constituent; a task that is already finished is folded in now.
    pub(crate) fn add_task(&mut self, mut task: BoxFuture<'a, Result<(), RouteError>>) {
        match task.as_mut().now_or_never() {
            Some(outcome) => self.fold(outcome),
            None => self.pending.push(task),
        }
    }

    /// Generation this source was reset with.
    #[cfg(test)]
    pub(crate) fn version(&self) -> u64 {
        self.version
    }

    /// Returns `true` once every expected task has finished.
    pub(crate) fn is_completed(&self) -> bool {
        self.state.completed >= self.state.expected
    }

    fn fold(&mut self, outcome: Result<(), RouteError>) {
        self.state.completed += 1;
        if let Err(err) = outcome {
            if let Some(discarded) = self.state.failure.replace(err) {
                warn!(
                    label = discarded.as_label(),
                    error = %discarded,
                    "fan-out: earlier failure discarded, last failure wins"
                );
            }
        }
    }
}

impl Future for FanOutSource<'_> {
    type Output = Result<(), RouteError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        if this.version != this.state.version {
            return Poll::Ready(Err(RouteError::StaleSource {
                expected: this.version,
                current: this.state.version,
            }));
        }

        let mut i = 0;
        while i < this.pending.len() {
            match this.pending[i].as_mut().poll(cx) {
                Poll::Ready(outcome) => {
                    drop(this.pending.swap_remove(i));
                    this.fold(outcome);
                }
                Poll::Pending => i += 1,
            }
        }

        if !this.is_completed() {
            return Poll::Pending;
        }

        let outcome = match this.state.failure.take() {
            Some(err) => Err(err),
            None => Ok(()),
        };
        this.state.version = this.state.version.wrapping_add(1);
        Poll::Ready(outcome)
    }
}
