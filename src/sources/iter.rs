use crate::Source;
use anyhow::Result;
use std::cell::RefCell;
use std::mem;
use std::time::Duration;
use tokio::time::sleep;

#[derive(Clone, Debug)]
pub struct IterSourceConfig<T> {
    pub items: Vec<T>,
    pub delay: Option<Duration>,
}

impl<T> IterSourceConfig<T> {
    pub fn new<I>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
    {
        Self {
            items: items.into_iter().collect(),
            delay: None,
        }
    }

    /// Waits `delay` before each item.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

/// Emits a fixed list of items, then completes.
pub struct IterSource<T> {
    items: RefCell<Vec<T>>,
    delay: Option<Duration>,
    source: Source<T>,
}

impl<T> IterSource<T> {
    pub fn new(config: IterSourceConfig<T>) -> Self {
        Self {
            items: RefCell::new(config.items),
            delay: config.delay,
            source: Source::new(),
        }
    }

    pub fn source(&self) -> &Source<T> {
        &self.source
    }

    pub async fn start(&self) -> Result<()> {
        let items = mem::take(&mut *self.items.borrow_mut());

        for item in items {
            if let Some(delay) = self.delay {
                sleep(delay).await;
            }
            self.source.emit(item);
        }

        self.source.complete();
        Ok(())
    }
}
