use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::engine::write_buffer::WriteBufferOptions;
use crate::engine::{ROW_KEY_CACHE_SIZE, ROW_WIDTH, STRING_CACHE_SIZE};
use crate::error::{DatastoreError, Result};

/// BufferConfig overrides the datastore wide buffer settings for one table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferConfig {
    pub write_delay: Option<u64>,
    pub write_buffer_max_size: Option<usize>,
}

/// DatastoreConfig holds every tunable of the write path. Durations are in
/// milliseconds. Missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatastoreConfig {
    /// row_width is the time span of one data-points row.
    pub row_width: i64,
    pub write_delay: u64,
    pub write_buffer_max_size: usize,
    pub retry_delay: u64,
    pub row_key_cache_size: usize,
    pub string_cache_size: usize,
    pub cache_partitions: usize,
    /// increase_buffer_size_interval enables the job that grows shrunk admission caps
    /// back toward write_buffer_max_size.
    pub increase_buffer_size_interval: Option<u64>,
    /// buffers is keyed by table name.
    pub buffers: HashMap<String, BufferConfig>,
}

impl Default for DatastoreConfig {
    fn default() -> Self {
        Self {
            row_width: ROW_WIDTH,
            write_delay: 1000,
            write_buffer_max_size: 500_000,
            retry_delay: 100,
            row_key_cache_size: ROW_KEY_CACHE_SIZE,
            string_cache_size: STRING_CACHE_SIZE,
            cache_partitions: 1,
            increase_buffer_size_interval: None,
            buffers: HashMap::new(),
        }
    }
}

impl DatastoreConfig {
    pub fn from_json_str(s: &str) -> Result<Self> {
        let config: DatastoreConfig =
            serde_json::from_str(s).map_err(|e| DatastoreError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let s = std::fs::read_to_string(path)
            .map_err(|e| DatastoreError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(s.as_str())
    }

    pub fn validate(&self) -> Result<()> {
        if self.row_width <= 0 {
            return Err(DatastoreError::Config(format!(
                "row_width must be positive, got {}",
                self.row_width
            )));
        }
        if self.row_width - 1 > i32::MAX as i64 {
            return Err(DatastoreError::Config(format!(
                "row_width {} does not keep row offsets within i32",
                self.row_width
            )));
        }
        if self.row_key_cache_size == 0 || self.string_cache_size == 0 {
            return Err(DatastoreError::Config(
                "cache sizes must be greater than zero".to_string(),
            ));
        }
        if self.cache_partitions == 0 {
            return Err(DatastoreError::Config(
                "cache_partitions must be greater than zero".to_string(),
            ));
        }
        if self.write_delay == 0 {
            return Err(DatastoreError::Config(
                "write_delay must be greater than zero".to_string(),
            ));
        }
        for (table, buffer) in self.buffers.iter() {
            if buffer.write_delay == Some(0) {
                return Err(DatastoreError::Config(format!(
                    "write_delay of {} must be greater than zero",
                    table
                )));
            }
        }
        if self.increase_buffer_size_interval == Some(0) {
            return Err(DatastoreError::Config(
                "increase_buffer_size_interval must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// buffer_options resolves the write buffer settings of table.
    pub fn buffer_options(&self, table: &str) -> WriteBufferOptions {
        let overrides = self.buffers.get(table);
        let write_delay = overrides
            .and_then(|b| b.write_delay)
            .unwrap_or(self.write_delay);
        let max_pending = overrides
            .and_then(|b| b.write_buffer_max_size)
            .unwrap_or(self.write_buffer_max_size);

        WriteBufferOptions {
            write_delay: Duration::from_millis(write_delay),
            max_pending,
            retry_delay: Duration::from_millis(self.retry_delay),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::time::Duration;

    use crate::engine::config::DatastoreConfig;
    use crate::engine::{ROW_WIDTH, TABLE_DATA_POINTS, TABLE_TAG_NAMES};
    use crate::error::DatastoreError;

    #[test]
    fn test_defaults() {
        let config = DatastoreConfig::from_json_str("{}").unwrap();
        assert_eq!(config, DatastoreConfig::default());
        assert_eq!(config.row_width, ROW_WIDTH);

        let options = config.buffer_options(TABLE_DATA_POINTS);
        assert_eq!(options.write_delay, Duration::from_millis(1000));
        assert_eq!(options.max_pending, 500_000);
        assert_eq!(options.retry_delay, Duration::from_millis(100));
    }

    #[test]
    fn test_buffer_overrides() {
        let config = DatastoreConfig::from_json_str(
            r#"{
                "write_delay": 200,
                "buffers": {
                    "tag-names": { "write_buffer_max_size": 10 }
                }
            }"#,
        )
        .unwrap();

        let options = config.buffer_options(TABLE_TAG_NAMES);
        assert_eq!(options.write_delay, Duration::from_millis(200));
        assert_eq!(options.max_pending, 10);

        let options = config.buffer_options(TABLE_DATA_POINTS);
        assert_eq!(options.max_pending, 500_000);
    }

    #[test]
    fn test_validate() {
        let mut config = DatastoreConfig::default();
        config.row_width = 0;
        assert!(matches!(config.validate(), Err(DatastoreError::Config(_))));

        config.row_width = i32::MAX as i64 + 1;
        assert!(config.validate().is_ok());
        config.row_width = i32::MAX as i64 + 2;
        assert!(matches!(config.validate(), Err(DatastoreError::Config(_))));

        let mut config = DatastoreConfig::default();
        config.string_cache_size = 0;
        assert!(config.validate().is_err());

        let mut config = DatastoreConfig::default();
        config.increase_buffer_size_interval = Some(0);
        assert!(config.validate().is_err());

        let mut config = DatastoreConfig::default();
        config.write_delay = 0;
        assert!(matches!(config.validate(), Err(DatastoreError::Config(_))));

        assert!(matches!(
            DatastoreConfig::from_json_str(r#"{"buffers": {"tag-names": {"write_delay": 0}}}"#),
            Err(DatastoreError::Config(_))
        ));

        assert!(DatastoreConfig::from_json_str(r#"{"row_width": -5}"#).is_err());
        assert!(DatastoreConfig::from_json_str("not json").is_err());
    }

    #[test]
    fn test_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(br#"{"row_width": 3600000, "cache_partitions": 4}"#)
            .unwrap();

        let config = DatastoreConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.row_width, 3_600_000);
        assert_eq!(config.cache_partitions, 4);

        let missing = file.path().with_extension("missing");
        assert!(matches!(
            DatastoreConfig::from_json_file(missing),
            Err(DatastoreError::Config(_))
        ));
    }
}
