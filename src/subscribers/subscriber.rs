//! # Subscriber traits.
//!
//! Provides [`Subscriber`] (synchronous) and [`AsyncSubscriber`] the two ways to
//! receive commands at the end of the interceptor chain.
//!
//! ## Architecture
//! ```text
//! Router::publish ──► interceptors ──► Dispatch
//!                                        ├─► Subscriber::receive        (inline, registry order)
//!                                        └─► AsyncSubscriber::receive_async (joined by fan-out)
//! ```
//!
//! ## Rules
//! - Synchronous subscribers run on the publishing task, in slot order, before any
//!   asynchronous subscriber is started.
//! - The first `Err` from a synchronous subscriber aborts the rest of that publish.
//! - Asynchronous subscribers are all started; the publish completes once every
//!   one has finished. Only the last failure is reported.
//! - Every subscriber sees every command; narrow with
//!   [`downcast_ref`](crate::Command#method.downcast_ref) or use the typed adapters
//!   ([`SubscriberFn`](crate::SubscriberFn), [`AsyncSubscriberFn`](crate::AsyncSubscriberFn)).
//!
//! ## Example
//! ```rust
//! use async_trait::async_trait;
//! use cmdrouter::{AsyncSubscriber, Command, PublishContext, RouteError, Subscriber};
//!
//! struct Jump { height: u32 }
//! impl Command for Jump {}
//!
//! struct Audio;
//!
//! impl Subscriber for Audio {
//!     fn receive(&self, command: &dyn Command, _ctx: &PublishContext) -> Result<(), RouteError> {
//!         if let Some(jump) = command.downcast_ref::<Jump>() {
//!             let _ = jump.height; // play a sound
//!         }
//!         Ok(())
//!     }
//! }
//!
//! #[async_trait]
//! impl AsyncSubscriber for Audio {
//!     async fn receive_async(&self, command: &dyn Command, ctx: &PublishContext) -> Result<(), RouteError> {
//!         ctx.check_cancelled()?;
//!         let _ = command.is::<Jump>();
//!         Ok(())
//!     }
//!
//!     fn name(&self) -> &'static str { "audio" }
//! }
//! ```

use async_trait::async_trait;

use crate::command::Command;
use crate::context::PublishContext;
use crate::error::RouteError;

/// Synchronous command receiver.
///
/// ### Implementation requirements
/// - Return quickly: this runs inline on the publishing task.
/// - Report failures with `Err`; an `Err` stops delivery to later synchronous
///   subscribers for this publish.
pub trait Subscriber: Send + Sync + 'static {
    /// Handles one command.
    fn receive(&self, command: &dyn Command, ctx: &PublishContext) -> Result<(), RouteError>;

    /// Returns the subscriber name used in logs.
    ///
    /// The default uses `type_name::<Self>()`, which can be verbose - override it when possible.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Asynchronous command receiver.
///
/// The returned future borrows the command and context; it is joined with every
/// other asynchronous subscriber before the publish completes.
#[async_trait]
pub trait AsyncSubscriber: Send + Sync + 'static {
    /// Handles one command.
    ///
    /// Observe [`PublishContext::cancellation`] to cooperate with the switch ordering
    /// and with caller cancellation.
    async fn receive_async(
        &self,
        command: &dyn Command,
        ctx: &PublishContext,
    ) -> Result<(), RouteError>;

    /// Returns the subscriber name used in logs.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}
