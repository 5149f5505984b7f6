#[macro_use]
extern crate anyhow;
#[cfg(test)]
#[macro_use]
extern crate async_trait;
#[macro_use]
extern crate tracing;

pub mod cache;
pub mod engine;
pub mod error;
pub mod series;

pub use cache::IdentityCache;
pub use engine::config::{BufferConfig, DatastoreConfig};
pub use engine::datastore::Datastore;
pub use engine::stats::{LoggingStats, NoopStats, WriteBufferStats};
pub use engine::write_buffer::{WriteBuffer, WriteBufferOptions};
pub use error::{DatastoreError, Result};
pub use series::{RowKey, RowKeyError};
