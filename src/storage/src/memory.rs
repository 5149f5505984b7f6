use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

use futures::stream::{self, BoxStream, StreamExt};

use crate::error::StoreError;
use crate::record::{AttributeValue, WriteRecord};
use crate::schema::TableSchema;
use crate::StoreClient;

struct Table {
    schema: TableSchema,
    rows: BTreeMap<Vec<AttributeValue>, WriteRecord>,
}

impl Table {
    fn row_key(&self, record: &WriteRecord) -> Result<Vec<AttributeValue>, StoreError> {
        self.schema
            .key_attributes()
            .into_iter()
            .map(|name| {
                record
                    .get(name)
                    .cloned()
                    .ok_or_else(|| StoreError::MissingKeyAttribute {
                        table: self.schema.name.clone(),
                        attribute: name.to_string(),
                    })
            })
            .collect()
    }
}

/// MemoryStore keeps every table in process memory. Records are upserted by the
/// table's key attributes and scans return rows in key order.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<String, Table>>,
    batches: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// batches returns how many batch writes have been applied.
    pub fn batches(&self) -> u64 {
        self.batches.load(Ordering::SeqCst)
    }

    /// len returns the number of rows in table, 0 if it does not exist.
    pub fn len(&self, table: &str) -> usize {
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        tables.get(table).map(|t| t.rows.len()).unwrap_or(0)
    }

    pub fn records(&self, table: &str) -> Vec<WriteRecord> {
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        tables
            .get(table)
            .map(|t| t.rows.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn table_names(&self) -> Vec<String> {
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = tables.keys().cloned().collect();
        names.sort();
        names
    }
}

#[async_trait]
impl StoreClient for MemoryStore {
    async fn batch_write(&self, table: &str, records: &[WriteRecord]) -> Result<(), StoreError> {
        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        let t = tables
            .get_mut(table)
            .ok_or_else(|| StoreError::TableNotFound(table.to_string()))?;

        // resolve every key first so a bad record rejects the whole batch
        let keys = records
            .iter()
            .map(|r| t.row_key(r))
            .collect::<Result<Vec<_>, _>>()?;

        for (key, record) in keys.into_iter().zip(records.iter()) {
            t.rows.insert(key, record.clone());
        }
        self.batches.fetch_add(1, Ordering::SeqCst);

        Ok(())
    }

    async fn create_table(&self, schema: &TableSchema) -> Result<(), StoreError> {
        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        tables.entry(schema.name.clone()).or_insert_with(|| Table {
            schema: schema.clone(),
            rows: BTreeMap::new(),
        });
        Ok(())
    }

    fn scan(&self, table: &str) -> BoxStream<'static, Result<WriteRecord, StoreError>> {
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        match tables.get(table) {
            Some(t) => {
                let rows: Vec<Result<WriteRecord, StoreError>> =
                    t.rows.values().cloned().map(Ok).collect();
                stream::iter(rows).boxed()
            }
            None => stream::once(futures::future::ready(Err(StoreError::TableNotFound(
                table.to_string(),
            ))))
            .boxed(),
        }
    }
}
