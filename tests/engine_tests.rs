use anyhow::anyhow;
use futures_util::stream;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;
use streamz_endwith::sources::{
    IntervalSource, IntervalSourceConfig, IterSource, IterSourceConfig, StreamSource,
};
use streamz_endwith::{EngineBuilder, EngineError, EngineSource, Notification};

type Log = Rc<RefCell<Vec<String>>>;

fn log() -> Log {
    Rc::new(RefCell::new(Vec::new()))
}

#[tokio::test(start_paused = true)]
async fn iter_source_runs_to_completion_with_trailing_values() {
    let input = IterSource::new(
        IterSourceConfig::new(["Hello", "Friend"]).with_delay(Duration::from_millis(10)),
    );
    let printed = log();
    let hook_log = printed.clone();
    let item_log = printed.clone();

    let stream = input
        .source()
        .to_stream()
        .end_with(["Goodbye", "Friend"])
        .finalize(move || hook_log.borrow_mut().push("Finally".into()));
    stream.subscribe(move |value| item_log.borrow_mut().push(value.to_string()));

    EngineBuilder::new()
        .add_source_owned("words", input)
        .build()
        .run()
        .await
        .unwrap();

    assert_eq!(
        *printed.borrow(),
        ["Hello", "Friend", "Goodbye", "Friend", "Finally"]
    );
}

#[tokio::test(start_paused = true)]
async fn infinite_source_never_reaches_trailing_values() {
    let ticks = IntervalSource::new(IntervalSourceConfig::new(Duration::from_millis(100))).unwrap();
    let printed = log();
    let finalized = Rc::new(Cell::new(0));

    let counter = finalized.clone();
    let item_log = printed.clone();
    let stream = ticks
        .source()
        .to_stream()
        .end_with([u64::MAX])
        .finalize(move || counter.set(counter.get() + 1));
    let subscription = stream.subscribe(move |tick| item_log.borrow_mut().push(tick.to_string()));

    EngineBuilder::new()
        .add_source_owned("ticks", ticks)
        .add_subscription(subscription)
        .with_deadline(Duration::from_millis(550))
        .build()
        .run()
        .await
        .unwrap();

    assert_eq!(*printed.borrow(), ["0", "1", "2", "3", "4"]);
    assert_eq!(finalized.get(), 1);
}

#[tokio::test(start_paused = true)]
async fn interval_limit_completes_the_source() {
    let ticks = Rc::new(
        IntervalSource::new(IntervalSourceConfig::new(Duration::from_secs(1)).with_limit(3))
            .unwrap(),
    );
    let printed = log();

    let item_log = printed.clone();
    ticks
        .source()
        .to_stream()
        .end_with([99])
        .subscribe(move |tick| item_log.borrow_mut().push(tick.to_string()));

    EngineBuilder::new()
        .add_source("ticks", ticks.clone())
        .build()
        .run()
        .await
        .unwrap();

    assert!(ticks.source().is_terminated());
    assert_eq!(*printed.borrow(), ["0", "1", "2", "99"]);
}

#[test]
fn zero_period_is_rejected() {
    assert!(IntervalSource::new(IntervalSourceConfig::new(Duration::ZERO)).is_err());
}

#[tokio::test]
async fn failing_stream_propagates_error_and_skips_trailing_values() {
    let input = StreamSource::new(stream::iter(vec![
        Ok("Hello"),
        Err(anyhow!("connection dropped")),
        Ok("unreachable"),
    ]));
    let seen = log();

    let sink = seen.clone();
    input
        .source()
        .to_stream()
        .end_with(["Goodbye"])
        .observe(move |notification| {
            let entry = match notification {
                Notification::Next(value) => value.to_string(),
                Notification::Error(err) => format!("error: {err}"),
                Notification::Complete => "complete".into(),
            };
            sink.borrow_mut().push(entry);
        });

    EngineBuilder::new()
        .add_source_owned("items", input)
        .build()
        .run()
        .await
        .unwrap();

    assert_eq!(*seen.borrow(), ["Hello", "error: connection dropped"]);
}

#[tokio::test]
async fn stream_source_cannot_start_twice() {
    let input = StreamSource::new(stream::iter(vec![Ok::<_, anyhow::Error>(1)]));

    input.run().await.unwrap();
    assert!(input.source().is_terminated());
    assert!(input.run().await.is_err());
}

struct BrokenSource;

impl EngineSource for BrokenSource {
    fn run<'a>(
        &'a self,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = anyhow::Result<()>> + 'a>> {
        Box::pin(async { Err::<(), _>(anyhow!("socket closed")) })
    }
}

#[tokio::test]
async fn source_failure_is_reported_with_its_label() {
    let err = EngineBuilder::new()
        .add_source_owned("feed", BrokenSource)
        .build()
        .run()
        .await
        .unwrap_err();

    match &err {
        EngineError::Source { label, .. } => assert_eq!(label, "feed"),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(err.to_string(), "feed source error: socket closed");
}

#[tokio::test(start_paused = true)]
async fn deadline_without_sources_cancels_subscriptions() {
    let source = streamz_endwith::Source::<u8>::new();
    let finalized = Rc::new(Cell::new(false));

    let flag = finalized.clone();
    let subscription = source
        .to_stream()
        .finalize(move || flag.set(true))
        .subscribe(|_| {});

    EngineBuilder::new()
        .add_subscription(subscription)
        .with_deadline(Duration::from_secs(5))
        .build()
        .run()
        .await
        .unwrap();

    assert!(finalized.get());
}
