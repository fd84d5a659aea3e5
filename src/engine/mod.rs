//! Pluggable backends, retries and task fan-out

pub mod fanout;
pub mod retry;
pub mod stubs;
pub mod traits;

pub use fanout::fan_out;
pub use retry::RetryPolicy;
pub use traits::{ColdItem, HashStore, ItemKey, SeriesReader, WideColumnStore};
