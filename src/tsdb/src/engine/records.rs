use bytes::Bytes;
use common_base::DataPointValue;
use kairos_storage::{AttributeValue, WriteRecord};

use crate::engine::{
    ATTR_METRIC, ATTR_NAME, ATTR_ROW_KEY, ATTR_TAGS, ATTR_TBASE, ATTR_TOFFSET, ATTR_TYPE,
    ATTR_VALUE, FLOAT_TYPE, LONG_TYPE,
};
use crate::series::row_key::tag_string;
use crate::series::RowKey;

/// new_row_key builds the row-key-index record for key: metric and bucket timestamp
/// address the row, the tag string is its payload.
pub fn new_row_key(key: &RowKey) -> WriteRecord {
    WriteRecord::new()
        .with(ATTR_METRIC, AttributeValue::S(key.metric_name().to_string()))
        .with(ATTR_TBASE, AttributeValue::number(key.timestamp()))
        .with(ATTR_TAGS, AttributeValue::S(tag_string(key.tags())))
}

/// new_data_point builds the data-points record for one value stored at offset
/// inside the row identified by the encoded row key.
pub fn new_data_point(row_key: Bytes, offset: i32, value: DataPointValue) -> WriteRecord {
    let (value_type, value) = match value {
        DataPointValue::Long(v) => (LONG_TYPE, AttributeValue::number(v)),
        DataPointValue::Double(v) => (FLOAT_TYPE, AttributeValue::number(v)),
    };

    WriteRecord::new()
        .with(ATTR_ROW_KEY, AttributeValue::B(row_key))
        .with(ATTR_TOFFSET, AttributeValue::number(offset))
        .with(ATTR_TYPE, AttributeValue::number(value_type))
        .with(ATTR_VALUE, value)
}

/// new_string_index builds a record for the metric-names, tag-names or tag-values table.
pub fn new_string_index(name: &str) -> WriteRecord {
    WriteRecord::new().with(ATTR_NAME, AttributeValue::S(name.to_string()))
}
