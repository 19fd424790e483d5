use crate::sources::{IntervalSource, IterSource, StreamSource};
use crate::{EngineError, Subscription};
use anyhow::Result;
use futures_util::future::pending;
use futures_util::stream::FuturesUnordered;
use futures_util::StreamExt;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::time::Duration;
use tokio::time::{sleep_until, Instant};
use tracing::{info, warn};

pub trait EngineSource: 'static {
    fn run<'a>(&'a self) -> Pin<Box<dyn Future<Output = Result<()>> + 'a>>;
}

pub struct EngineBuilder {
    sources: Vec<(String, Rc<dyn EngineSource>)>,
    subscriptions: Vec<Subscription>,
    deadline: Option<Duration>,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
            subscriptions: Vec::new(),
            deadline: None,
        }
    }

    pub fn add_source<S>(mut self, label: impl Into<String>, source: Rc<S>) -> Self
    where
        S: EngineSource,
    {
        self.sources
            .push((label.into(), source as Rc<dyn EngineSource>));
        self
    }

    pub fn add_source_owned<S>(self, label: impl Into<String>, source: S) -> Self
    where
        S: EngineSource,
    {
        self.add_source(label, Rc::new(source))
    }

    /// Cancelled when the engine stops early on the deadline or Ctrl+C.
    pub fn add_subscription(mut self, subscription: Subscription) -> Self {
        self.subscriptions.push(subscription);
        self
    }

    /// Stop after `deadline` even if sources are still running.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn build(self) -> Engine {
        Engine {
            sources: self.sources,
            subscriptions: self.subscriptions,
            deadline: self.deadline,
        }
    }
}

impl<T> EngineSource for IterSource<T>
where
    T: 'static,
{
    fn run<'a>(&'a self) -> Pin<Box<dyn Future<Output = Result<()>> + 'a>> {
        Box::pin(async move { self.start().await })
    }
}

impl EngineSource for IntervalSource {
    fn run<'a>(&'a self) -> Pin<Box<dyn Future<Output = Result<()>> + 'a>> {
        Box::pin(async move { self.start().await })
    }
}

impl<S, T, E> EngineSource for StreamSource<S, T>
where
    S: futures_util::Stream<Item = Result<T, E>> + 'static,
    T: 'static,
    E: Into<anyhow::Error> + 'static,
{
    fn run<'a>(&'a self) -> Pin<Box<dyn Future<Output = Result<()>> + 'a>> {
        Box::pin(async move { self.start().await })
    }
}

pub struct Engine {
    sources: Vec<(String, Rc<dyn EngineSource>)>,
    subscriptions: Vec<Subscription>,
    deadline: Option<Duration>,
}

impl Engine {
    pub async fn run(self) -> Result<(), EngineError> {
        let mut tasks = FuturesUnordered::new();

        for (label, source) in &self.sources {
            let label_clone = label.clone();
            let source_clone = Rc::clone(source);
            tasks.push(async move { source_clone.run().await.map_err(|err| (label_clone, err)) });
        }

        if tasks.is_empty() {
            info!("no sources registered; waiting for deadline or Ctrl+C");
        }

        let deadline = self.deadline.map(|after| Instant::now() + after);

        loop {
            tokio::select! {
                res = tasks.next(), if !tasks.is_empty() => {
                    match res {
                        Some(Ok(())) if tasks.is_empty() => {
                            info!("all sources completed");
                            return Ok(());
                        }
                        Some(Ok(())) => continue,
                        Some(Err((label, cause))) => {
                            warn!(source = %label, error = %cause, "source failed");
                            return Err(EngineError::Source { label, cause });
                        }
                        None => return Ok(()),
                    }
                }
                _ = async {
                    match deadline {
                        Some(instant) => sleep_until(instant).await,
                        None => pending::<()>().await,
                    }
                } => {
                    info!("deadline reached; cancelling subscriptions");
                    self.cancel_subscriptions();
                    return Ok(());
                }
                signal = tokio::signal::ctrl_c() => {
                    signal?;
                    info!("received interrupt; shutting down engine");
                    self.cancel_subscriptions();
                    return Ok(());
                }
            }
        }
    }

    fn cancel_subscriptions(&self) {
        for subscription in &self.subscriptions {
            subscription.unsubscribe();
        }
    }
}
