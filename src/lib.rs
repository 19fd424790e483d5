//! Push-based streaming primitives with completion and failure signals, the
//! `end_with` trailing-append operator, a `finalize` cleanup hook, and an
//! async engine that drives timed sources.

mod engine;
mod error;
mod source;
pub mod sources;

pub use engine::{Engine, EngineBuilder, EngineSource};
pub use error::EngineError;
pub use source::{Notification, Source, Stream, StreamError, Subscription};
