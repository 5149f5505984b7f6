use std::fmt::{Display, Formatter};

use bytes::{Buf, BufMut, BytesMut};
use common_base::Tags;

/// SEPARATOR terminates the metric name in an encoded row key.
pub const SEPARATOR: u8 = 0x0;

/// TAG_KEY_TERMINATOR separates a tag key from its value in the tag string.
pub const TAG_KEY_TERMINATOR: char = '=';

/// TAG_VALUE_TERMINATOR ends every tag value in the tag string.
pub const TAG_VALUE_TERMINATOR: char = ':';

/// Row key bytes: | metric name | 0x0 | bucket timestamp (8B, big endian) | k1=v1:k2=v2:... |
/// Tags are written in sorted key order. There is no escaping, so none of the three
/// delimiters may appear inside a metric name, tag key or tag value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RowKey {
    metric_name: String,
    timestamp: i64,
    tags: Tags,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RowKeyError {
    #[error("{field} {value:?} contains a reserved character ('=', ':' or NUL)")]
    ReservedCharacter { field: &'static str, value: String },

    #[error("row key has no metric name terminator")]
    MissingSeparator,

    #[error("row key is truncated: {0} bytes left for the 8 byte timestamp")]
    Truncated(usize),

    #[error("row key {0} is not valid utf-8")]
    InvalidUtf8(&'static str),

    #[error("dangling tag text {0:?} at the end of the tag string")]
    DanglingTag(String),

    #[error("tag key {0:?} is duplicated or out of order")]
    NonCanonicalTags(String),
}

impl RowKey {
    pub fn new(metric_name: impl Into<String>, timestamp: i64, tags: Tags) -> Self {
        Self {
            metric_name: metric_name.into(),
            timestamp,
            tags,
        }
    }

    pub fn metric_name(&self) -> &str {
        self.metric_name.as_str()
    }

    /// timestamp is the start of the row's time bucket.
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn tags(&self) -> &Tags {
        &self.tags
    }

    /// validate checks that no field contains a delimiter of the encoding.
    pub fn validate(&self) -> Result<(), RowKeyError> {
        validate_metric_name(self.metric_name.as_str())?;
        validate_tags(&self.tags)
    }

    pub fn encode(&self) -> Result<Vec<u8>, RowKeyError> {
        encode_row_key(self)
    }

    pub fn decode(data: &[u8]) -> Result<Self, RowKeyError> {
        decode_row_key(data)
    }
}

impl Display for RowKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}@{}{{{}}}",
            self.metric_name,
            self.timestamp,
            tag_string(&self.tags)
        )
    }
}

fn is_reserved(c: char) -> bool {
    c == TAG_KEY_TERMINATOR || c == TAG_VALUE_TERMINATOR || c == SEPARATOR as char
}

fn check(field: &'static str, value: &str) -> Result<(), RowKeyError> {
    if value.chars().any(is_reserved) {
        return Err(RowKeyError::ReservedCharacter {
            field,
            value: value.to_string(),
        });
    }
    Ok(())
}

pub fn validate_metric_name(name: &str) -> Result<(), RowKeyError> {
    check("metric name", name)
}

pub fn validate_tags(tags: &Tags) -> Result<(), RowKeyError> {
    for (k, v) in tags {
        check("tag key", k)?;
        check("tag value", v)?;
    }
    Ok(())
}

/// tag_string renders tags as `k1=v1:k2=v2:` in sorted key order. The caller is
/// responsible for having validated the tags.
pub fn tag_string(tags: &Tags) -> String {
    let size = tags.iter().map(|(k, v)| k.len() + v.len() + 2).sum();
    let mut s = String::with_capacity(size);
    for (k, v) in tags {
        s.push_str(k);
        s.push(TAG_KEY_TERMINATOR);
        s.push_str(v);
        s.push(TAG_VALUE_TERMINATOR);
    }
    s
}

pub fn encode_row_key(key: &RowKey) -> Result<Vec<u8>, RowKeyError> {
    key.validate()?;

    let tags = tag_string(&key.tags);
    let mut buf = BytesMut::with_capacity(key.metric_name.len() + 1 + 8 + tags.len());
    buf.put_slice(key.metric_name.as_bytes());
    buf.put_u8(SEPARATOR);
    buf.put_i64(key.timestamp);
    buf.put_slice(tags.as_bytes());

    Ok(buf.to_vec())
}

pub fn decode_row_key(data: &[u8]) -> Result<RowKey, RowKeyError> {
    let name_len = data
        .iter()
        .position(|b| *b == SEPARATOR)
        .ok_or(RowKeyError::MissingSeparator)?;
    let metric_name = std::str::from_utf8(&data[..name_len])
        .map_err(|_| RowKeyError::InvalidUtf8("metric name"))?;
    check("metric name", metric_name)?;

    let mut remaining = &data[name_len + 1..];
    if remaining.len() < 8 {
        return Err(RowKeyError::Truncated(remaining.len()));
    }
    let timestamp = remaining.get_i64();

    let tag_str =
        std::str::from_utf8(remaining).map_err(|_| RowKeyError::InvalidUtf8("tag string"))?;
    let tags = extract_tags(tag_str)?;

    Ok(RowKey::new(metric_name, timestamp, tags))
}

/// extract_tags parses a tag string produced by [`tag_string`].
pub fn extract_tags(tag_str: &str) -> Result<Tags, RowKeyError> {
    let mut tags = Tags::new();
    let mut rest = tag_str;

    while !rest.is_empty() {
        let (key, after_key) = rest
            .split_once(TAG_KEY_TERMINATOR)
            .ok_or_else(|| RowKeyError::DanglingTag(rest.to_string()))?;
        let (value, after_value) = after_key
            .split_once(TAG_VALUE_TERMINATOR)
            .ok_or_else(|| RowKeyError::DanglingTag(rest.to_string()))?;

        // keys are written strictly ascending, anything else was not produced by encode
        if let Some((last, _)) = tags.last_key_value() {
            if key <= last.as_str() {
                return Err(RowKeyError::NonCanonicalTags(key.to_string()));
            }
        }
        // e.g. "k=a=b:" cannot be told apart from a key containing '='
        check("tag key", key)?;
        check("tag value", value)?;

        tags.insert(key.to_string(), value.to_string());
        rest = after_value;
    }

    Ok(tags)
}
