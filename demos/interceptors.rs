//! # Example: Interceptors
//!
//! Demonstrates:
//! - `LogWriter` tracing every dispatch (feature `logging`)
//! - a typed filter that short-circuits invalid commands
//! - an error-handling interceptor converting failures into log lines
//! - the `Extensions` side-channel
//! - fanning out to a second router
//!
//! Run: `RUST_LOG=debug cargo run --example interceptors --features logging`

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use cmdrouter::{
    Command, FanOutInterceptor, Interceptor, LogWriter, Next, PublishContext, RouteError, Router,
};

struct Chat {
    text: String,
}
impl Command for Chat {}

/// Turns downstream failures into warnings.
struct Recover;

#[async_trait]
impl Interceptor for Recover {
    async fn invoke(
        &self,
        command: &dyn Command,
        ctx: &mut PublishContext,
        next: Next<'_>,
    ) -> Result<(), RouteError> {
        if let Err(err) = next.run(command, ctx).await {
            tracing::warn!(label = err.as_label(), "recovered: {err}");
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recover"
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let audit = Router::new();
    let _audit = audit.subscribe_fn(|chat: &Chat, _ctx: &PublishContext| {
        println!("[audit] {}", chat.text);
        Ok(())
    });

    let router = Router::new();
    // Empty lines never reach logging, fan-out or subscribers.
    router.filter_fn(|chat: &Chat, ctx: &mut PublishContext, next: Next<'_>| {
        Box::pin(async move {
            if chat.text.trim().is_empty() {
                return Ok(());
            }
            ctx.extensions().insert("length", chat.text.len());
            next.run(chat, ctx).await
        })
    });

    router
        .add_filter(Arc::new(LogWriter::new()))
        .add_filter(Arc::new(Recover))
        .add_filter(FanOutInterceptor::with_routers([audit.clone()]));

    let _ui = router.subscribe_fn(|chat: &Chat, ctx: &PublishContext| {
        let length = ctx.extensions().get::<usize>("length").map_or(0, |l| *l);
        if chat.text.contains("spam") {
            return Err(RouteError::failed("spam rejected"));
        }
        println!("[ui] {} ({length} chars)", chat.text);
        Ok(())
    });

    for text in ["hello", "   ", "buy spam now"] {
        router
            .publish(Chat { text: text.into() }, CancellationToken::new())
            .await?;
    }
    Ok(())
}
