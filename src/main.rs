//! Console walkthrough of `end_with`: each scenario builds a pipeline, prints
//! every value it observes and, where a cleanup hook is attached, `Finally`.
//!
//! Run with:
//! ```bash
//! cargo run -- finalize
//! RUST_LOG=debug cargo run -- infinite --run-ms 1000
//! ```

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use futures_util::stream;
use std::time::Duration;
use streamz_endwith::sources::{IntervalSource, IntervalSourceConfig, StreamSource};
use streamz_endwith::{EngineBuilder, Stream};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "endwith")]
#[command(about = "Emit given values after a stream completes", long_about = None)]
struct Cli {
    #[command(subcommand)]
    scenario: Scenario,
}

#[derive(Subcommand)]
enum Scenario {
    /// Append a single value to a completing source
    Basic,
    /// Append several values to a completing source
    Multiple,
    /// Append values, then run a cleanup hook
    Finalize,
    /// Append to a source that never completes
    Infinite {
        #[arg(long, default_value_t = 250)]
        period_ms: u64,

        #[arg(long, default_value_t = 1000)]
        run_ms: u64,
    },
    /// Append to a source that fails part way
    Failing,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.scenario {
        Scenario::Basic => basic(),
        Scenario::Multiple => multiple(),
        Scenario::Finalize => with_finalize(),
        Scenario::Infinite { period_ms, run_ms } => {
            infinite(Duration::from_millis(period_ms), Duration::from_millis(run_ms)).await?
        }
        Scenario::Failing => failing().await?,
    }

    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .try_init();
}

fn basic() {
    // Hello, Friend, Goodbye, Friend
    Stream::of(["Hello", "Friend", "Goodbye"])
        .end_with(["Friend"])
        .subscribe(|value| println!("{value}"));
}

fn multiple() {
    // Hello, Friend, Goodbye, Friend
    Stream::of(["Hello", "Friend"])
        .end_with(["Goodbye", "Friend"])
        .subscribe(|value| println!("{value}"));
}

fn with_finalize() {
    // Hello, Friend, Goodbye, Friend, Finally
    Stream::of(["Hello", "Friend"])
        .end_with(["Goodbye", "Friend"])
        .finalize(|| println!("Finally"))
        .subscribe(|value| println!("{value}"));
}

async fn infinite(period: Duration, run_for: Duration) -> Result<()> {
    let ticks = IntervalSource::new(IntervalSourceConfig::new(period))?;

    // The trailing value never shows up; cancelling at the deadline runs the hook.
    let stream = ticks
        .source()
        .to_stream()
        .map(|tick| format!("tick {tick}"))
        .end_with(["never printed".to_string()])
        .finalize(|| println!("Finally"));
    let subscription = stream.subscribe(|value| println!("{value}"));

    info!(?period, ?run_for, "running interval source");
    EngineBuilder::new()
        .add_source_owned("interval", ticks)
        .add_subscription(subscription)
        .with_deadline(run_for)
        .build()
        .run()
        .await?;
    Ok(())
}

async fn failing() -> Result<()> {
    let items = stream::iter(vec![
        Ok("Hello"),
        Ok("Friend"),
        Err(anyhow!("connection dropped")),
    ]);
    let input = StreamSource::new(items);

    // Hello, Friend, then the failure is logged and Goodbye is skipped.
    let stream = input
        .source()
        .to_stream()
        .end_with(["Goodbye"])
        .finalize(|| println!("Finally"));
    stream.subscribe(|value| println!("{value}"));

    EngineBuilder::new()
        .add_source_owned("items", input)
        .build()
        .run()
        .await?;
    Ok(())
}
