use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use futures::stream::{self, BoxStream, StreamExt};
use kairos_storage::{StoreClient, StoreError, TableSchema, WriteRecord};

/// RecordingStore keeps every successfully written batch, in order, and can be told
/// to fail a number of batch writes first.
#[derive(Default)]
pub(crate) struct RecordingStore {
    failures: AtomicUsize,
    attempts: AtomicUsize,
    delivered: Mutex<Vec<(String, Vec<WriteRecord>)>>,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(failures: usize) -> Self {
        Self {
            failures: AtomicUsize::new(failures),
            ..Default::default()
        }
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn delivered(&self, table: &str) -> Vec<Vec<WriteRecord>> {
        self.delivered
            .lock()
            .unwrap()
            .iter()
            .filter(|(t, _)| t == table)
            .map(|(_, batch)| batch.clone())
            .collect()
    }

    pub fn delivered_records(&self, table: &str) -> Vec<WriteRecord> {
        self.delivered(table).into_iter().flatten().collect()
    }

    pub async fn wait_for(&self, table: &str, n: usize) {
        for _ in 0..1000 {
            if self.delivered_records(table).len() >= n {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!(
            "timed out waiting for {} records in {}, got {}",
            n,
            table,
            self.delivered_records(table).len()
        );
    }

    pub async fn wait_for_attempts(&self, n: usize) {
        for _ in 0..1000 {
            if self.attempts() >= n {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("timed out waiting for {} write attempts", n);
    }
}

#[async_trait]
impl StoreClient for RecordingStore {
    async fn batch_write(&self, table: &str, records: &[WriteRecord]) -> Result<(), StoreError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        let fail = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if fail {
            return Err(StoreError::Unavailable("injected failure".to_string()));
        }

        self.delivered
            .lock()
            .unwrap()
            .push((table.to_string(), records.to_vec()));
        Ok(())
    }

    async fn create_table(&self, _schema: &TableSchema) -> Result<(), StoreError> {
        Ok(())
    }

    fn scan(&self, table: &str) -> BoxStream<'static, Result<WriteRecord, StoreError>> {
        let records: Vec<_> = self.delivered_records(table).into_iter().map(Ok).collect();
        stream::iter(records).boxed()
    }
}
