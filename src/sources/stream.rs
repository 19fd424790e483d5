use crate::Source;
use anyhow::{anyhow, Result};
use futures_util::{pin_mut, Stream, StreamExt};
use std::cell::RefCell;

/// Pushes the items of an async stream. The first `Err` fails the source,
/// and exhausting the stream completes it.
pub struct StreamSource<S, T> {
    stream: RefCell<Option<S>>,
    source: Source<T>,
}

impl<S, T, E> StreamSource<S, T>
where
    S: Stream<Item = Result<T, E>>,
    E: Into<anyhow::Error>,
{
    pub fn new(stream: S) -> Self {
        Self {
            stream: RefCell::new(Some(stream)),
            source: Source::new(),
        }
    }

    pub fn source(&self) -> &Source<T> {
        &self.source
    }

    pub async fn start(&self) -> Result<()> {
        let stream = self
            .stream
            .borrow_mut()
            .take()
            .ok_or_else(|| anyhow!("stream source already started"))?;
        pin_mut!(stream);

        while let Some(item) = stream.next().await {
            match item {
                Ok(value) => self.source.emit(value),
                Err(err) => {
                    self.source.error(err);
                    return Ok(());
                }
            }
        }

        self.source.complete();
        Ok(())
    }
}
