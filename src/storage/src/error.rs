#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("table not found: {0}")]
    TableNotFound(String),

    #[error("record for table {table} is missing key attribute {attribute}")]
    MissingKeyAttribute { table: String, attribute: String },

    /// Unavailable is a transient failure: throttling, timeouts, connection resets.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}
