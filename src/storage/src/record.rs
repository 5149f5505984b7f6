use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter};

use bytes::Bytes;

/// AttributeValue is a single typed attribute of a record.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AttributeValue {
    /// S is a UTF-8 string.
    S(String),
    /// N is a number carried as its decimal text. Ordering is by text, not magnitude.
    N(String),
    /// B is opaque binary.
    B(Bytes),
}

impl AttributeValue {
    pub fn number(n: impl ToString) -> Self {
        AttributeValue::N(n.to_string())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::S(s) | AttributeValue::N(s) => Some(s.as_str()),
            AttributeValue::B(_) => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            AttributeValue::B(b) => Some(b),
            _ => None,
        }
    }
}

impl Debug for AttributeValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            AttributeValue::S(s) => write!(f, "S({:?})", s),
            AttributeValue::N(n) => write!(f, "N({})", n),
            AttributeValue::B(b) => write!(f, "B({} bytes)", b.len()),
        }
    }
}

/// WriteRecord is one row to upsert into one table, as a map of attribute name to value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteRecord {
    attributes: BTreeMap<String, AttributeValue>,
}

impl WriteRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: AttributeValue) -> Self {
        self.put(name, value);
        self
    }

    pub fn put(&mut self, name: &str, value: AttributeValue) {
        self.attributes.insert(name.to_string(), value);
    }

    pub fn get(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes.get(name)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(|v| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &AttributeValue)> {
        self.attributes.iter()
    }
}
