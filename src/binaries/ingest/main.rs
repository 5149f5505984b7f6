use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use common_base::{DataPoint, DataPointSet};
use futures::TryStreamExt;
use kairos_storage::MemoryStore;
use kairos_tsdb::engine::{
    TABLE_DATA_POINTS, TABLE_METRIC_NAMES, TABLE_ROW_KEY_INDEX, TABLE_TAG_NAMES, TABLE_TAG_VALUES,
};
use kairos_tsdb::{Datastore, DatastoreConfig, LoggingStats};
use kairos_utils::time::{now_millis, time_format};
use serde::Deserialize;
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Parser)]
#[clap(about, version, author)]
struct Config {
    /// JSON datastore configuration, defaults are used when absent
    #[clap(long)]
    pub config: Option<String>,

    #[clap(long, default_value = "kairos.ingest")]
    pub metric: String,

    /// points written by each producer, one second apart
    #[clap(long, default_value_t = 1000)]
    pub points: usize,

    #[clap(long, default_value_t = 4)]
    pub producers: usize,

    /// used when RUST_LOG is not set
    #[clap(long, default_value = "info")]
    pub log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(config.log_level.as_str())?,
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    println!("config: {:?}", config);
    if config.metric.is_empty() {
        println!("metric MUST not be empty!");
        return Ok(());
    }

    let ds_config = match &config.config {
        Some(path) => DatastoreConfig::from_json_file(path)?,
        None => DatastoreConfig::default(),
    };

    let store = Arc::new(MemoryStore::new());
    let ds = Arc::new(Datastore::new(
        ds_config,
        store.clone(),
        Arc::new(LoggingStats),
    )?);
    ds.create_schema().await?;

    let start = now_millis() - config.points as i64 * 1000;
    let started = Instant::now();

    let mut handles = Vec::with_capacity(config.producers);
    for producer in 0..config.producers {
        let ds = ds.clone();
        let metric = config.metric.clone();
        let points = config.points;
        handles.push(tokio::spawn(async move {
            let mut dps = DataPointSet::new(metric);
            dps.add_tag("host", format!("host-{}", producer));
            for i in 0..points {
                dps.add_data_point(DataPoint::new(start + i as i64 * 1000, i as i64));
            }
            ds.put_data_points(&dps).await
        }));
    }
    for handle in handles {
        handle.await??;
    }
    ds.close().await?;

    info!(
        producers = config.producers,
        points = config.points,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "ingest finished"
    );

    println!("from {} to {}", time_format(start), time_format(now_millis()));
    for table in [
        TABLE_DATA_POINTS,
        TABLE_ROW_KEY_INDEX,
        TABLE_METRIC_NAMES,
        TABLE_TAG_NAMES,
        TABLE_TAG_VALUES,
    ] {
        println!("{}: {} rows", table, store.len(table));
    }

    let metric_names: Vec<String> = ds.get_metric_names().try_collect().await?;
    println!("metric names: {:?}", metric_names);
    let tag_names: Vec<String> = ds.get_tag_names().try_collect().await?;
    println!("tag names: {:?}", tag_names);
    let tag_values: Vec<String> = ds.get_tag_values().try_collect().await?;
    println!("tag values: {:?}", tag_values);

    Ok(())
}
