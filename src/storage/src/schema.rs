/// ScalarType is the declared type of a key attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarType {
    S,
    N,
    B,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyAttribute {
    pub name: String,
    pub scalar_type: ScalarType,
}

impl KeyAttribute {
    pub fn new(name: &str, scalar_type: ScalarType) -> Self {
        Self {
            name: name.to_string(),
            scalar_type,
        }
    }
}

/// TableSchema describes a table by its key: a hash key and an optional range key.
/// Two records with the same key values address the same row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    pub name: String,
    pub hash_key: KeyAttribute,
    pub range_key: Option<KeyAttribute>,
}

impl TableSchema {
    pub fn new(name: &str, hash_key: KeyAttribute) -> Self {
        Self {
            name: name.to_string(),
            hash_key,
            range_key: None,
        }
    }

    pub fn with_range_key(mut self, range_key: KeyAttribute) -> Self {
        self.range_key = Some(range_key);
        self
    }

    /// key_attributes returns the key attribute names, hash key first.
    pub fn key_attributes(&self) -> Vec<&str> {
        let mut keys = vec![self.hash_key.name.as_str()];
        if let Some(range) = &self.range_key {
            keys.push(range.name.as_str());
        }
        keys
    }
}
