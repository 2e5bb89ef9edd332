//! # Per-publish execution record.
//!
//! One [`PublishContext`] accompanies one `publish` call through every interceptor
//! and the terminal subscriber fan-out. It carries:
//!
//! - the **cancellation token** observed by cooperative subscribers (the switch
//!   ordering replaces it with a child token);
//! - optional **caller** metadata for diagnostics;
//! - the [`Extensions`] side-channel;
//! - the interceptor **cursor**, advanced by [`Next`](crate::Next).
//!
//! ## Lifecycle
//! ```text
//! publish() ─► rent(token, caller) ─► interceptors … subscribers ─► drop guard ─► recycle
//!                 cursor = 0                                         extensions cleared
//! ```
//! Contexts are pooled; the guard returns the context exactly once, on every exit
//! path (success, failure, the publish future being dropped).

use std::fmt;
use std::panic::Location;
use std::sync::OnceLock;

use tokio_util::sync::CancellationToken;

use super::extensions::Extensions;
use crate::core::pool::{Pool, Recycle, Rented};
use crate::error::RouteError;

static CONTEXTS: Pool<PublishContext> = Pool::new(256);

/// Source location of a `publish` call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Caller {
    location: &'static Location<'static>,
    member: Option<&'static str>,
}

impl Caller {
    /// Captures the location of the caller.
    #[track_caller]
    pub fn here() -> Self {
        Self {
            location: Location::caller(),
            member: None,
        }
    }

    /// Attaches the calling member (function/method) name.
    pub fn with_member(mut self, member: &'static str) -> Self {
        self.member = Some(member);
        self
    }

    pub fn file(&self) -> &'static str {
        self.location.file()
    }

    pub fn line(&self) -> u32 {
        self.location.line()
    }

    pub fn column(&self) -> u32 {
        self.location.column()
    }

    pub fn member(&self) -> Option<&'static str> {
        self.member
    }
}

impl fmt::Display for Caller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(member) = self.member {
            write!(f, "{member} at ")?;
        }
        write!(f, "{}:{}:{}", self.file(), self.line(), self.column())
    }
}

/// Mutable record threaded through one dispatch.
#[derive(Debug)]
pub struct PublishContext {
    cancellation: CancellationToken,
    caller: Option<Caller>,
    extensions: Extensions,
    cursor: usize,
}

impl PublishContext {
    /// Creates a standalone context (outside the router's pool).
    pub fn new(cancellation: CancellationToken) -> Self {
        Self {
            cancellation,
            caller: None,
            extensions: Extensions::default(),
            cursor: 0,
        }
    }

    /// Rents a pooled context prepared for a new dispatch.
    pub(crate) fn rent(
        cancellation: CancellationToken,
        caller: Option<Caller>,
    ) -> Rented<'static, PublishContext> {
        let mut ctx = CONTEXTS.rent(|| PublishContext::new(CancellationToken::new()));
        ctx.cancellation = cancellation;
        ctx.caller = caller;
        ctx.cursor = 0;
        ctx
    }

    /// Cancellation token for this dispatch.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Replaces the cancellation token seen by everything downstream.
    pub fn set_cancellation(&mut self, token: CancellationToken) {
        self.cancellation = token;
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Returns [`RouteError::Canceled`] if the dispatch has been cancelled.
    ///
    /// # Example
    /// ```
    /// use cmdrouter::{PublishContext, RouteError};
    /// use tokio_util::sync::CancellationToken;
    ///
    /// let token = CancellationToken::new();
    /// let ctx = PublishContext::new(token.clone());
    /// assert_eq!(ctx.check_cancelled(), Ok(()));
    /// token.cancel();
    /// assert_eq!(ctx.check_cancelled(), Err(RouteError::Canceled));
    /// ```
    pub fn check_cancelled(&self) -> Result<(), RouteError> {
        if self.cancellation.is_cancelled() {
            Err(RouteError::Canceled)
        } else {
            Ok(())
        }
    }

    /// Where the dispatch was published from, when captured.
    pub fn caller(&self) -> Option<&Caller> {
        self.caller.as_ref()
    }

    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    /// Index of the next interceptor to run.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Claims the next interceptor index below `len`.
    pub(crate) fn advance(&mut self, len: usize) -> Option<usize> {
        if self.cursor < len {
            let index = self.cursor;
            self.cursor += 1;
            Some(index)
        } else {
            None
        }
    }
}

impl Recycle for PublishContext {
    fn recycle(&mut self) {
        self.extensions.clear();
        self.caller = None;
        self.cursor = 0;
        // Release the dispatch token so a pooled context never pins a token tree.
        self.cancellation = detached().clone();
    }
}

fn detached() -> &'static CancellationToken {
    static DETACHED: OnceLock<CancellationToken> = OnceLock::new();
    DETACHED.get_or_init(CancellationToken::new)
}
