/// WriteBufferStats receives the size of every batch a write buffer swaps out for
/// flushing, whether or not the write then succeeds.
pub trait WriteBufferStats: Send + Sync {
    fn save_write_size(&self, table: &str, pending_writes: usize);
}

impl<F> WriteBufferStats for F
where
    F: Fn(&str, usize) + Send + Sync,
{
    fn save_write_size(&self, table: &str, pending_writes: usize) {
        self(table, pending_writes)
    }
}

/// LoggingStats reports flush sizes through tracing.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingStats;

impl WriteBufferStats for LoggingStats {
    fn save_write_size(&self, table: &str, pending_writes: usize) {
        debug!(table, pending_writes, "write buffer flush");
    }
}

/// NoopStats discards flush sizes.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopStats;

impl WriteBufferStats for NoopStats {
    fn save_write_size(&self, _table: &str, _pending_writes: usize) {}
}
