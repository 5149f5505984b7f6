use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use common_base::DataPointSet;
use futures::stream::{BoxStream, StreamExt};
use kairos_storage::StoreClient;
use kairos_utils::time::time_format;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::cache::IdentityCache;
use crate::engine::config::DatastoreConfig;
use crate::engine::records::{new_data_point, new_row_key, new_string_index};
use crate::engine::schema::tables;
use crate::engine::stats::WriteBufferStats;
use crate::engine::write_buffer::WriteBuffer;
use crate::engine::{
    calculate_row_time, ATTR_NAME, TABLE_DATA_POINTS, TABLE_METRIC_NAMES, TABLE_ROW_KEY_INDEX,
    TABLE_TAG_NAMES, TABLE_TAG_VALUES,
};
use crate::error::{DatastoreError, Result};
use crate::series::row_key::{validate_metric_name, validate_tags};
use crate::series::RowKey;

/// Datastore is the write path: it turns data point sets into data-points records
/// plus the secondary index records needed to find them again, and hands them to
/// one write buffer per table.
///
/// Index records are only written the first time a value is seen by this process, as
/// remembered by an identity cache per index.
pub struct Datastore {
    config: DatastoreConfig,
    client: Arc<dyn StoreClient>,

    data_point_buffer: Arc<WriteBuffer>,
    row_key_buffer: Arc<WriteBuffer>,
    metric_name_buffer: Arc<WriteBuffer>,
    tag_name_buffer: Arc<WriteBuffer>,
    tag_value_buffer: Arc<WriteBuffer>,

    row_key_cache: IdentityCache<RowKey>,
    metric_name_cache: IdentityCache<String>,
    tag_name_cache: IdentityCache<String>,
    tag_value_cache: IdentityCache<String>,

    increase_job: Mutex<Option<JoinHandle<()>>>,
    shutdown: CancellationToken,
}

impl Datastore {
    /// new validates config and starts one flush task per table, plus the buffer size
    /// recovery job if configured. It must be called from within a tokio runtime.
    pub fn new(
        config: DatastoreConfig,
        client: Arc<dyn StoreClient>,
        stats: Arc<dyn WriteBufferStats>,
    ) -> Result<Self> {
        config.validate()?;

        let buffer = |table: &str| {
            Arc::new(WriteBuffer::new(
                table,
                client.clone(),
                stats.clone(),
                config.buffer_options(table),
            ))
        };
        let data_point_buffer = buffer(TABLE_DATA_POINTS);
        let row_key_buffer = buffer(TABLE_ROW_KEY_INDEX);
        let metric_name_buffer = buffer(TABLE_METRIC_NAMES);
        let tag_name_buffer = buffer(TABLE_TAG_NAMES);
        let tag_value_buffer = buffer(TABLE_TAG_VALUES);

        let partitions = config.cache_partitions;
        let row_key_cache = IdentityCache::with_partitions(config.row_key_cache_size, partitions);
        let metric_name_cache = IdentityCache::with_partitions(config.string_cache_size, partitions);
        let tag_name_cache = IdentityCache::with_partitions(config.string_cache_size, partitions);
        let tag_value_cache = IdentityCache::with_partitions(config.string_cache_size, partitions);

        let shutdown = CancellationToken::new();
        let increase_job = config.increase_buffer_size_interval.map(|interval| {
            spawn_increase_job(
                vec![
                    data_point_buffer.clone(),
                    row_key_buffer.clone(),
                    metric_name_buffer.clone(),
                    tag_name_buffer.clone(),
                    tag_value_buffer.clone(),
                ],
                Duration::from_millis(interval),
                shutdown.clone(),
            )
        });

        info!(
            row_width = config.row_width,
            write_delay = config.write_delay,
            write_buffer_max_size = config.write_buffer_max_size,
            "datastore started"
        );

        Ok(Self {
            config,
            client,
            data_point_buffer,
            row_key_buffer,
            metric_name_buffer,
            tag_name_buffer,
            tag_value_buffer,
            row_key_cache,
            metric_name_cache,
            tag_name_cache,
            tag_value_cache,
            increase_job: Mutex::new(increase_job),
            shutdown,
        })
    }

    pub fn config(&self) -> &DatastoreConfig {
        &self.config
    }

    /// buffer returns the write buffer of table, if table is one of the five tables
    /// this datastore writes.
    pub fn buffer(&self, table: &str) -> Option<&WriteBuffer> {
        self.buffers()
            .into_iter()
            .find(|b| b.table() == table)
            .map(|b| &**b)
    }

    fn buffers(&self) -> [&Arc<WriteBuffer>; 5] {
        [
            &self.data_point_buffer,
            &self.row_key_buffer,
            &self.metric_name_buffer,
            &self.tag_name_buffer,
            &self.tag_value_buffer,
        ]
    }

    /// create_schema creates every table the datastore writes to.
    pub async fn create_schema(&self) -> Result<()> {
        for schema in tables() {
            self.client.create_table(&schema).await?;
            debug!(table = %schema.name, "table created");
        }
        Ok(())
    }

    /// put_data_points queues every point of dps, along with whatever index records
    /// are not known to be written yet. It returns once all records are accepted by
    /// their buffers, which can take a while when buffers are full. A rejected set
    /// queues nothing.
    pub async fn put_data_points(&self, dps: &DataPointSet) -> Result<()> {
        if dps.name().is_empty() {
            return Err(DatastoreError::EmptyMetricName);
        }
        validate_metric_name(dps.name())?;
        validate_tags(dps.tags())?;
        if let Some(dp) = dps.data_points().iter().find(|dp| dp.timestamp < 0) {
            return Err(DatastoreError::NegativeTimestamp(dp.timestamp));
        }

        let mut bucket = None;
        let mut row_key = Bytes::new();
        for dp in dps.data_points() {
            let row_time = calculate_row_time(dp.timestamp, self.config.row_width);
            if bucket != Some(row_time) {
                let key = RowKey::new(dps.name(), row_time, dps.tags().clone());
                row_key = Bytes::from(key.encode()?);
                self.write_index(&key).await?;
                bucket = Some(row_time);
            }

            let offset = i32::try_from(dp.timestamp - row_time).map_err(|_| {
                anyhow!(
                    "offset of {} in row {} does not fit in i32",
                    dp.timestamp,
                    row_time
                )
            })?;
            self.data_point_buffer
                .add(new_data_point(row_key.clone(), offset, dp.value))
                .await?;
        }

        Ok(())
    }

    /// write_index queues the index records of a row that are not cached yet. A value
    /// is cached only after its record has been accepted by a buffer.
    async fn write_index(&self, key: &RowKey) -> Result<()> {
        if !self.row_key_cache.is_cached(key) {
            trace!(
                metric = key.metric_name(),
                row = %time_format(key.timestamp()),
                "new row"
            );
            self.row_key_buffer.add(new_row_key(key)).await?;
            self.row_key_cache.cache(key.clone());
        }

        let metric_name = key.metric_name().to_string();
        if !self.metric_name_cache.is_cached(&metric_name) {
            self.metric_name_buffer
                .add(new_string_index(metric_name.as_str()))
                .await?;
            self.metric_name_cache.cache(metric_name);
        }

        for (name, value) in key.tags() {
            if !self.tag_name_cache.is_cached(name) {
                self.tag_name_buffer.add(new_string_index(name)).await?;
                self.tag_name_cache.cache(name.clone());
            }
            if !self.tag_value_cache.is_cached(value) {
                self.tag_value_buffer.add(new_string_index(value)).await?;
                self.tag_value_cache.cache(value.clone());
            }
        }

        Ok(())
    }

    pub fn get_metric_names(&self) -> BoxStream<'static, Result<String>> {
        self.list_names(TABLE_METRIC_NAMES)
    }

    pub fn get_tag_names(&self) -> BoxStream<'static, Result<String>> {
        self.list_names(TABLE_TAG_NAMES)
    }

    pub fn get_tag_values(&self) -> BoxStream<'static, Result<String>> {
        self.list_names(TABLE_TAG_VALUES)
    }

    /// list_names scans a string index table. Every call starts a new scan.
    fn list_names(&self, table: &str) -> BoxStream<'static, Result<String>> {
        let table = table.to_string();
        self.client
            .scan(table.as_str())
            .map(move |record| {
                let record = record?;
                record
                    .get_str(ATTR_NAME)
                    .map(|name| name.to_string())
                    .ok_or_else(|| {
                        DatastoreError::Internal(anyhow!(
                            "record in {} without a {} attribute",
                            table,
                            ATTR_NAME
                        ))
                    })
            })
            .boxed()
    }

    /// close flushes and stops every write buffer. Closing twice is a no-op, and
    /// put_data_points fails with BufferClosed afterwards.
    pub async fn close(&self) -> Result<()> {
        self.shutdown.cancel();
        let job = self
            .increase_job
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(job) = job {
            job.await
                .map_err(|e| anyhow!("buffer size job failed: {}", e))?;
        }

        // every buffer is drained before the first error is reported
        let results =
            futures::future::join_all(self.buffers().into_iter().map(|b| b.close())).await;
        results.into_iter().collect::<Result<Vec<_>>>()?;
        info!("datastore closed");
        Ok(())
    }
}

impl Drop for Datastore {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// spawn_increase_job periodically grows the admission cap of every buffer back
/// toward its initial value, until shutdown is cancelled.
fn spawn_increase_job(
    buffers: Vec<Arc<WriteBuffer>>,
    period: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        // the first tick completes immediately
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.cancelled() => break,
            }
            for buffer in buffers.iter() {
                buffer.increase_max_pending();
            }
        }
    })
}
