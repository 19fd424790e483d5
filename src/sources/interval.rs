use crate::Source;
use anyhow::{ensure, Result};
use std::cell::Cell;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::debug;

#[derive(Clone, Debug)]
pub struct IntervalSourceConfig {
    pub period: Duration,
    pub limit: Option<u64>,
}

impl IntervalSourceConfig {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            limit: None,
        }
    }

    /// Completes after `limit` ticks instead of running forever.
    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Emits 0, 1, 2, ... once per period. Without a limit it never completes.
pub struct IntervalSource {
    config: IntervalSourceConfig,
    counter: Cell<u64>,
    source: Source<u64>,
}

impl IntervalSource {
    pub fn new(config: IntervalSourceConfig) -> Result<Self> {
        ensure!(!config.period.is_zero(), "interval period must be non-zero");

        Ok(Self {
            config,
            counter: Cell::new(0),
            source: Source::new(),
        })
    }

    pub fn source(&self) -> &Source<u64> {
        &self.source
    }

    pub async fn start(&self) -> Result<()> {
        let period = self.config.period;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if let Some(limit) = self.config.limit {
                if self.counter.get() >= limit {
                    debug!(ticks = limit, "interval limit reached");
                    self.source.complete();
                    return Ok(());
                }
            }

            ticker.tick().await;
            let tick = self.counter.get();
            self.counter.set(tick + 1);
            self.source.emit(tick);
        }
    }
}
