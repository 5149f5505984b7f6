use kairos_storage::StoreError;

use crate::series::RowKeyError;

pub type Result<T> = std::result::Result<T, DatastoreError>;

/// DatastoreError is the single error type surfaced by the write path. Backend
/// failures while flushing never show up here; write buffers retry them internally.
#[derive(Debug, thiserror::Error)]
pub enum DatastoreError {
    #[error("timestamp must be greater than or equal to zero, got {0}")]
    NegativeTimestamp(i64),

    #[error("metric name must not be empty")]
    EmptyMetricName,

    #[error(transparent)]
    RowKey(#[from] RowKeyError),

    #[error("write buffer for table {0} is closed")]
    BufferClosed(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}
