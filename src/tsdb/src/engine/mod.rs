pub mod config;
pub mod datastore;
pub mod records;
pub mod schema;
pub mod stats;
pub mod write_buffer;

#[cfg(test)]
pub(crate) mod testing;

/// ROW_WIDTH is the default width of a row's time bucket in milliseconds: 3 weeks.
/// Offsets inside a row are stored as i32, so a row width must keep
/// `row_width - 1 <= i32::MAX`.
pub const ROW_WIDTH: i64 = 1_814_400_000;

pub const ROW_KEY_CACHE_SIZE: usize = 1024;
pub const STRING_CACHE_SIZE: usize = 1024;

/// Value type discriminators stored with every data point.
pub const LONG_TYPE: u8 = 0x0;
pub const FLOAT_TYPE: u8 = 0x1;

pub const TABLE_DATA_POINTS: &str = "data-points";
pub const TABLE_ROW_KEY_INDEX: &str = "row-key-index";
pub const TABLE_METRIC_NAMES: &str = "metric-names";
pub const TABLE_TAG_NAMES: &str = "tag-names";
pub const TABLE_TAG_VALUES: &str = "tag-values";

pub const ATTR_ROW_KEY: &str = "metric-tbase-tags";
pub const ATTR_TOFFSET: &str = "toffset";
pub const ATTR_TYPE: &str = "type";
pub const ATTR_VALUE: &str = "value";
pub const ATTR_METRIC: &str = "metric";
pub const ATTR_TBASE: &str = "tbase";
pub const ATTR_TAGS: &str = "tags";
pub const ATTR_NAME: &str = "name";

/// calculate_row_time returns the start of the bucket timestamp falls in.
/// timestamp must not be negative.
pub fn calculate_row_time(timestamp: i64, row_width: i64) -> i64 {
    timestamp - (timestamp % row_width)
}
