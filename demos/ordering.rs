//! # Example: Ordering policies
//!
//! Publishes three overlapping commands under each policy and prints which ones
//! were handled:
//! - `Parallel`   → all three, interleaved
//! - `Sequential` → all three, one after another
//! - `Drop`       → only the first
//! - `Switch`     → the first two are cancelled, the last completes
//!
//! Run: `cargo run --example ordering`

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use cmdrouter::{Command, CommandOrdering, PublishContext, RouteError, Router, RouterConfig};

struct Step(u32);
impl Command for Step {}

async fn run(ordering: CommandOrdering) -> anyhow::Result<()> {
    let router = Router::with_config(RouterConfig::default().with_ordering(ordering));
    let label = ordering.as_label();

    let _sub = router.subscribe_await(move |step: &Step, ctx: &PublishContext| {
        Box::pin(async move {
            println!("[{label}] step {} start", step.0);
            tokio::select! {
                _ = ctx.cancellation().cancelled() => {
                    println!("[{label}] step {} cancelled", step.0);
                    Err(RouteError::Canceled)
                }
                _ = tokio::time::sleep(Duration::from_millis(100)) => {
                    println!("[{label}] step {} done", step.0);
                    Ok(())
                }
            }
        })
    });

    let (a, b, c) = tokio::join!(
        router.publish(Step(1), CancellationToken::new()),
        router.publish(Step(2), CancellationToken::new()),
        router.publish(Step(3), CancellationToken::new()),
    );
    for (i, outcome) in [a, b, c].into_iter().enumerate() {
        match outcome {
            Ok(()) => println!("[{label}] publish {} ok", i + 1),
            Err(e) if e.is_canceled() => println!("[{label}] publish {} cancelled", i + 1),
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    for ordering in [
        CommandOrdering::Parallel,
        CommandOrdering::Sequential,
        CommandOrdering::Drop,
        CommandOrdering::Switch,
    ] {
        run(ordering).await?;
        println!();
    }
    Ok(())
}
