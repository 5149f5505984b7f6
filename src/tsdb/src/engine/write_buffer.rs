use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use kairos_storage::{StoreClient, WriteRecord};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::engine::stats::WriteBufferStats;
use crate::error::{DatastoreError, Result};

/// BUFFER_SIZE_INCREMENT is how much [`WriteBuffer::increase_max_pending`] grows the
/// admission cap per call.
pub const BUFFER_SIZE_INCREMENT: usize = 1000;

#[derive(Debug, Clone)]
pub struct WriteBufferOptions {
    /// write_delay is the pause between two flush cycles.
    pub write_delay: Duration,
    /// max_pending is the initial admission cap.
    pub max_pending: usize,
    /// retry_delay is the pause before resending a failed batch.
    pub retry_delay: Duration,
}

impl Default for WriteBufferOptions {
    fn default() -> Self {
        Self {
            write_delay: Duration::from_millis(1000),
            max_pending: 500_000,
            retry_delay: Duration::from_millis(100),
        }
    }
}

struct Pending {
    records: Vec<WriteRecord>,
    closed: bool,
}

struct Inner {
    table: String,
    pending: Mutex<Pending>,
    /// room wakes producers blocked on a full buffer. It is only notified together with
    /// a swap of the pending queue, or on close.
    room: Notify,

    max_pending: AtomicUsize,
    initial_max_pending: usize,
    write_delay: Duration,
    retry_delay: Duration,

    client: Arc<dyn StoreClient>,
    stats: Arc<dyn WriteBufferStats>,
    shutdown: CancellationToken,
}

/// WriteBuffer batches records for one table and writes them to the store from a
/// dedicated background task.
///
/// Producers call [`add`](Self::add), which waits while the buffer holds
/// `max_pending` records. Every `write_delay` the worker swaps the whole pending queue
/// out, releases blocked producers and writes the batch. A failed batch shrinks the
/// admission cap to 3/4 and is resent, unchanged, until the store accepts it. The
/// next batch is not attempted before that, so batches of one table land in order.
///
/// The flush path never calls `add` on its own buffer, otherwise it could wait on
/// room that only it can make.
pub struct WriteBuffer {
    inner: Arc<Inner>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl WriteBuffer {
    /// new starts the flush task, it must be called from within a tokio runtime.
    pub fn new(
        table: &str,
        client: Arc<dyn StoreClient>,
        stats: Arc<dyn WriteBufferStats>,
        options: WriteBufferOptions,
    ) -> Self {
        let max_pending = options.max_pending.max(1);
        let inner = Arc::new(Inner {
            table: table.to_string(),
            pending: Mutex::new(Pending {
                records: Vec::new(),
                closed: false,
            }),
            room: Notify::new(),
            max_pending: AtomicUsize::new(max_pending),
            initial_max_pending: max_pending,
            write_delay: options.write_delay,
            retry_delay: options.retry_delay,
            client,
            stats,
            shutdown: CancellationToken::new(),
        });

        let worker = tokio::spawn(inner.clone().run());

        Self {
            inner,
            worker: Mutex::new(Some(worker)),
        }
    }

    pub fn table(&self) -> &str {
        self.inner.table.as_str()
    }

    /// pending returns the number of records waiting for the next flush. Records of a
    /// batch that is being written or retried are not counted.
    pub fn pending(&self) -> usize {
        self.inner.lock().records.len()
    }

    pub fn max_pending(&self) -> usize {
        self.inner.max_pending.load(Ordering::SeqCst)
    }

    pub fn initial_max_pending(&self) -> usize {
        self.inner.initial_max_pending
    }

    /// add queues record for the next flush, waiting while the buffer is full. Store
    /// errors are never returned here; the only error is a buffer that has been closed.
    pub async fn add(&self, record: WriteRecord) -> Result<()> {
        let inner = &self.inner;
        loop {
            // register interest before looking at the queue so a swap that happens
            // between the check and the await is not missed
            let notified = inner.room.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut pending = inner.lock();
                if pending.closed {
                    return Err(DatastoreError::BufferClosed(inner.table.clone()));
                }
                if pending.records.len() < inner.max_pending.load(Ordering::SeqCst) {
                    pending.records.push(record);
                    return Ok(());
                }
            }

            notified.await;
        }
    }

    /// increase_max_pending grows the admission cap by BUFFER_SIZE_INCREMENT, never past
    /// the initial cap, and returns the new cap.
    pub fn increase_max_pending(&self) -> usize {
        let inner = &self.inner;
        let prev = inner
            .max_pending
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                if n < inner.initial_max_pending {
                    Some(
                        n.saturating_add(BUFFER_SIZE_INCREMENT)
                            .min(inner.initial_max_pending),
                    )
                } else {
                    None
                }
            });

        match prev {
            Ok(prev) => {
                let n = self.max_pending();
                info!(table = %inner.table, from = prev, to = n, "increasing write buffer size");
                n
            }
            Err(n) => n,
        }
    }

    /// close stops the flush task after one last flush of everything queued so far, and
    /// waits for it. A batch that is being retried when close is called keeps being
    /// retried, so close does not return while the store stays unavailable.
    pub async fn close(&self) -> Result<()> {
        {
            let mut pending = self.inner.lock();
            pending.closed = true;
        }
        self.inner.room.notify_waiters();
        self.inner.shutdown.cancel();

        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(worker) = worker {
            worker.await.map_err(|e| {
                anyhow!("write buffer worker for {} failed: {}", self.inner.table, e)
            })?;
        }

        Ok(())
    }
}

impl Drop for WriteBuffer {
    fn drop(&mut self) {
        // nothing can be added any more, let the worker drain and exit
        self.inner.lock().closed = true;
        self.inner.shutdown.cancel();
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, Pending> {
        // pending is only ever pushed to or swapped, both leave it consistent
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn run(self: Arc<Self>) {
        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.write_delay) => {}
                _ = self.shutdown.cancelled() => break,
            }
            self.flush().await;
        }

        // closed is set before shutdown is cancelled, this drains everything accepted
        self.flush().await;
        debug!(table = %self.table, "write buffer stopped");
    }

    async fn flush(&self) {
        let batch = {
            let mut pending = self.lock();
            if pending.records.is_empty() {
                return;
            }
            let batch = std::mem::take(&mut pending.records);
            self.room.notify_waiters();
            batch
        };

        self.stats.save_write_size(self.table.as_str(), batch.len());

        let mut attempt = 0_u64;
        while let Err(e) = self.client.batch_write(self.table.as_str(), &batch).await {
            attempt += 1;
            if attempt == 1 {
                let max_pending = self.shrink();
                error!(
                    table = %self.table,
                    error = %e,
                    max_pending,
                    "error sending data to store, reducing write buffer size. \
                     increase the store's write capacity or write_buffer_max_size"
                );
            } else {
                warn!(table = %self.table, error = %e, attempt, "error resending data to store");
            }

            tokio::time::sleep(self.retry_delay).await;
        }

        trace!(table = %self.table, records = batch.len(), attempt, "batch written");
    }

    /// shrink lowers the admission cap to 3/4 of its value, keeping it at least 1.
    fn shrink(&self) -> usize {
        let prev = self
            .max_pending
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| Some(three_quarters(n)))
            .unwrap_or_else(|n| n);
        three_quarters(prev)
    }
}

/// three_quarters is `max(1, floor(3n / 4))` without overflowing for large n.
fn three_quarters(n: usize) -> usize {
    (n / 4 * 3 + n % 4 * 3 / 4).max(1)
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use kairos_storage::{AttributeValue, WriteRecord};

    use crate::engine::stats::{NoopStats, WriteBufferStats};
    use crate::engine::testing::RecordingStore;
    use crate::engine::write_buffer::{three_quarters, WriteBuffer, WriteBufferOptions};
    use crate::error::DatastoreError;

    const TABLE: &str = "test";

    fn record(i: usize) -> WriteRecord {
        WriteRecord::new().with("name", AttributeValue::number(i))
    }

    fn options(write_delay_ms: u64, max_pending: usize) -> WriteBufferOptions {
        WriteBufferOptions {
            write_delay: Duration::from_millis(write_delay_ms),
            max_pending,
            retry_delay: Duration::from_millis(10),
        }
    }

    #[tokio::test]
    async fn test_flush_delivers_batch() {
        let store = Arc::new(RecordingStore::new());
        let sizes = Arc::new(Mutex::new(Vec::new()));
        let stats: Arc<dyn WriteBufferStats> = {
            let sizes = sizes.clone();
            Arc::new(move |table: &str, n: usize| {
                sizes.lock().unwrap().push((table.to_string(), n));
            })
        };

        let buffer = WriteBuffer::new(TABLE, store.clone(), stats, options(20, 100));
        for i in 0..3 {
            buffer.add(record(i)).await.unwrap();
        }

        store.wait_for(TABLE, 3).await;
        assert_eq!(store.delivered_records(TABLE), vec![record(0), record(1), record(2)]);
        assert_eq!(buffer.pending(), 0);
        assert_eq!(*sizes.lock().unwrap(), vec![(TABLE.to_string(), 3)]);

        buffer.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_backpressure() {
        let store = Arc::new(RecordingStore::new());
        let buffer = Arc::new(WriteBuffer::new(
            TABLE,
            store.clone(),
            Arc::new(NoopStats),
            options(300, 2),
        ));

        buffer.add(record(0)).await.unwrap();
        buffer.add(record(1)).await.unwrap();
        assert_eq!(buffer.pending(), 2);

        let mut blocked = {
            let buffer = buffer.clone();
            tokio::spawn(async move { buffer.add(record(2)).await })
        };

        let r = tokio::time::timeout(Duration::from_millis(100), &mut blocked).await;
        assert!(r.is_err(), "third add must wait for a flush");
        assert_eq!(buffer.pending(), 2);

        tokio::time::timeout(Duration::from_secs(5), blocked)
            .await
            .expect("add must proceed once the buffer is flushed")
            .unwrap()
            .unwrap();

        store.wait_for(TABLE, 2).await;
        buffer.close().await.unwrap();
        assert_eq!(store.delivered_records(TABLE).len(), 3);
    }

    #[tokio::test]
    async fn test_adaptive_shrink() {
        let store = Arc::new(RecordingStore::failing(1));
        let buffer = WriteBuffer::new(TABLE, store.clone(), Arc::new(NoopStats), options(10, 100));

        buffer.add(record(0)).await.unwrap();
        store.wait_for(TABLE, 1).await;

        assert_eq!(buffer.max_pending(), 75);
        assert_eq!(buffer.initial_max_pending(), 100);
        buffer.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_retry_to_success() {
        let store = Arc::new(RecordingStore::failing(2));
        let buffer = WriteBuffer::new(TABLE, store.clone(), Arc::new(NoopStats), options(10, 100));

        buffer.add(record(0)).await.unwrap();
        buffer.add(record(1)).await.unwrap();
        store.wait_for(TABLE, 2).await;

        assert_eq!(store.attempts(), 3);
        assert_eq!(store.delivered(TABLE), vec![vec![record(0), record(1)]]);
        assert_eq!(buffer.pending(), 0);
        // only the first failure of a batch shrinks the cap
        assert_eq!(buffer.max_pending(), 75);

        buffer.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_batches_stay_ordered_while_retrying() {
        let store = Arc::new(RecordingStore::failing(3));
        let buffer = WriteBuffer::new(
            TABLE,
            store.clone(),
            Arc::new(NoopStats),
            WriteBufferOptions {
                write_delay: Duration::from_millis(10),
                max_pending: 100,
                retry_delay: Duration::from_millis(50),
            },
        );

        buffer.add(record(0)).await.unwrap();
        store.wait_for_attempts(1).await;
        // lands in the queue while batch [0] is being retried
        buffer.add(record(1)).await.unwrap();

        store.wait_for(TABLE, 2).await;
        assert_eq!(store.delivered(TABLE), vec![vec![record(0)], vec![record(1)]]);
        buffer.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_close_drains_and_rejects() {
        let store = Arc::new(RecordingStore::new());
        let buffer = WriteBuffer::new(
            TABLE,
            store.clone(),
            Arc::new(NoopStats),
            options(60 * 60 * 1000, 100),
        );

        for i in 0..5 {
            buffer.add(record(i)).await.unwrap();
        }
        buffer.close().await.unwrap();
        assert_eq!(store.delivered_records(TABLE).len(), 5);

        let r = buffer.add(record(5)).await;
        assert!(matches!(r, Err(DatastoreError::BufferClosed(t)) if t == TABLE));

        // closing twice is harmless
        buffer.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_increase_max_pending() {
        let store = Arc::new(RecordingStore::new());
        let buffer = WriteBuffer::new(
            TABLE,
            store.clone(),
            Arc::new(NoopStats),
            options(60 * 60 * 1000, 4000),
        );

        assert_eq!(buffer.inner.shrink(), 3000);
        assert_eq!(buffer.inner.shrink(), 2250);
        assert_eq!(buffer.increase_max_pending(), 3250);
        assert_eq!(buffer.increase_max_pending(), 4000);
        assert_eq!(buffer.increase_max_pending(), 4000);

        buffer.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_unbounded_cap_survives_failure() {
        let store = Arc::new(RecordingStore::failing(1));
        let buffer = WriteBuffer::new(
            TABLE,
            store.clone(),
            Arc::new(NoopStats),
            options(10, usize::MAX),
        );

        buffer.add(record(0)).await.unwrap();
        store.wait_for(TABLE, 1).await;
        assert_eq!(buffer.max_pending(), usize::MAX / 4 * 3 + 2);

        assert_eq!(buffer.increase_max_pending(), usize::MAX / 4 * 3 + 1002);
        buffer.close().await.unwrap();
        assert_eq!(store.delivered_records(TABLE), vec![record(0)]);
    }

    #[test]
    fn test_three_quarters() {
        assert_eq!(three_quarters(100), 75);
        assert_eq!(three_quarters(3000), 2250);
        assert_eq!(three_quarters(7), 5);
        assert_eq!(three_quarters(2), 1);
        assert_eq!(three_quarters(1), 1);
        assert_eq!(three_quarters(0), 1);
    }

    #[tokio::test]
    async fn test_cap_never_reaches_zero() {
        let store = Arc::new(RecordingStore::new());
        let buffer = WriteBuffer::new(TABLE, store.clone(), Arc::new(NoopStats), options(10, 1));

        assert_eq!(buffer.inner.shrink(), 1);
        assert_eq!(buffer.max_pending(), 1);

        buffer.add(record(0)).await.unwrap();
        buffer.add(record(1)).await.unwrap();
        store.wait_for(TABLE, 2).await;
        buffer.close().await.unwrap();
    }
}
