pub mod interval;
pub mod iter;
pub mod stream;

pub use interval::{IntervalSource, IntervalSourceConfig};
pub use iter::{IterSource, IterSourceConfig};
pub use stream::StreamSource;
