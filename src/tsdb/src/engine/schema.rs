use kairos_storage::{KeyAttribute, ScalarType, TableSchema};

use crate::engine::{
    ATTR_METRIC, ATTR_NAME, ATTR_ROW_KEY, ATTR_TBASE, ATTR_TOFFSET, TABLE_DATA_POINTS,
    TABLE_METRIC_NAMES, TABLE_ROW_KEY_INDEX, TABLE_TAG_NAMES, TABLE_TAG_VALUES,
};

/// tables returns the schema of every table the write path writes to.
///
/// | table         | hash key                | range key    |
/// |---------------|-------------------------|--------------|
/// | data-points   | metric-tbase-tags (B)   | toffset (N)  |
/// | row-key-index | metric (S)              | tbase (N)    |
/// | metric-names  | name (S)                |              |
/// | tag-names     | name (S)                |              |
/// | tag-values    | name (S)                |              |
pub fn tables() -> Vec<TableSchema> {
    vec![
        TableSchema::new(
            TABLE_DATA_POINTS,
            KeyAttribute::new(ATTR_ROW_KEY, ScalarType::B),
        )
        .with_range_key(KeyAttribute::new(ATTR_TOFFSET, ScalarType::N)),
        TableSchema::new(
            TABLE_ROW_KEY_INDEX,
            KeyAttribute::new(ATTR_METRIC, ScalarType::S),
        )
        .with_range_key(KeyAttribute::new(ATTR_TBASE, ScalarType::N)),
        string_index(TABLE_METRIC_NAMES),
        string_index(TABLE_TAG_NAMES),
        string_index(TABLE_TAG_VALUES),
    ]
}

fn string_index(table: &str) -> TableSchema {
    TableSchema::new(table, KeyAttribute::new(ATTR_NAME, ScalarType::S))
}
