//! # Example: Basic routing
//!
//! Demonstrates:
//! - typed sync and async subscribers on one router
//! - commands of other types being ignored by typed subscribers
//! - disposing a subscription
//!
//! Run: `cargo run --example basic`

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use cmdrouter::{Command, PublishContext, RouteError, Router};

struct CharacterMove {
    x: i32,
    y: i32,
}
impl Command for CharacterMove {}

struct CharacterEnter {
    name: &'static str,
}
impl Command for CharacterEnter {}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let router = Router::new();

    let mut presenter = router.subscribe_fn(|cmd: &CharacterEnter, _ctx: &PublishContext| {
        println!("[presenter] {} entered", cmd.name);
        Ok(())
    });

    let _animator = router.subscribe_await(|cmd: &CharacterMove, ctx: &PublishContext| {
        Box::pin(async move {
            if ctx.is_cancelled() {
                return Err(RouteError::Canceled);
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
            println!("[animator] moved to ({}, {})", cmd.x, cmd.y);
            Ok(())
        })
    });

    let token = CancellationToken::new();
    router
        .publish(CharacterEnter { name: "Bob" }, token.clone())
        .await?;
    router
        .publish(CharacterMove { x: 1, y: 2 }, token.clone())
        .await?;

    presenter.dispose();
    println!(
        "[main] subscribers: sync={} async={}",
        router.subscriber_count(),
        router.async_subscriber_count()
    );

    // Nobody listens for `CharacterEnter` anymore.
    router.publish(CharacterEnter { name: "Alice" }, token).await?;
    Ok(())
}
