//! Per-publish state: [`PublishContext`], [`Caller`] and the [`Extensions`] side-channel.

mod extensions;
mod publish;

pub use extensions::Extensions;
pub use publish::{Caller, PublishContext};
