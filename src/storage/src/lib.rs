#[macro_use]
extern crate async_trait;

use futures::stream::BoxStream;

pub mod error;
pub mod memory;
pub mod record;
pub mod schema;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use record::{AttributeValue, WriteRecord};
pub use schema::{KeyAttribute, ScalarType, TableSchema};

/// StoreClient is the boundary to the backend key-value store. Implementations wrap a
/// concrete network client; credentials and endpoints are passed in by the caller that
/// builds the client, never looked up here.
#[async_trait]
pub trait StoreClient: Send + Sync {
    /// batch_write upserts every record into table. There are no partial-batch semantics:
    /// an error means none of the batch can be assumed written and the whole batch
    /// must be sent again.
    async fn batch_write(&self, table: &str, records: &[WriteRecord]) -> Result<(), StoreError>;

    /// create_table creates table if it does not exist yet. Creating an existing table
    /// is not an error.
    async fn create_table(&self, schema: &TableSchema) -> Result<(), StoreError>;

    /// scan returns every record of table. Each call starts a new scan.
    fn scan(&self, table: &str) -> BoxStream<'static, Result<WriteRecord, StoreError>>;
}
