use std::collections::BTreeMap;
use std::fmt::{Debug, Display, Formatter};

/// Tags maps tag names to tag values. Iteration is always in sorted key order,
/// which is the order the row key encoding relies on.
pub type Tags = BTreeMap<String, String>;

/// DataPointValue is either a 64-bit integer or a 64-bit float, never both.
#[derive(Clone, Copy, PartialEq)]
pub enum DataPointValue {
    Long(i64),
    Double(f64),
}

impl DataPointValue {
    pub fn is_integer(&self) -> bool {
        matches!(self, DataPointValue::Long(_))
    }
}

impl Debug for DataPointValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            DataPointValue::Long(v) => write!(f, "Long({})", v),
            DataPointValue::Double(v) => write!(f, "Double({})", v),
        }
    }
}

impl Display for DataPointValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            DataPointValue::Long(v) => write!(f, "{}", v),
            DataPointValue::Double(v) => write!(f, "{}", v),
        }
    }
}

impl From<i64> for DataPointValue {
    fn from(v: i64) -> Self {
        DataPointValue::Long(v)
    }
}

impl From<f64> for DataPointValue {
    fn from(v: f64) -> Self {
        DataPointValue::Double(v)
    }
}

/// DataPoint is a single sample. The timestamp is in milliseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DataPoint {
    pub timestamp: i64,
    pub value: DataPointValue,
}

impl DataPoint {
    pub fn new(timestamp: i64, value: impl Into<DataPointValue>) -> Self {
        Self {
            timestamp,
            value: value.into(),
        }
    }

    pub fn is_integer(&self) -> bool {
        self.value.is_integer()
    }
}

/// DataPointSet is the unit of ingest: one metric, one tag set and the points
/// recorded for that series, in the order they were received.
#[derive(Debug, Clone, PartialEq)]
pub struct DataPointSet {
    name: String,
    tags: Tags,
    points: Vec<DataPoint>,
}

impl DataPointSet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tags: Tags::new(),
            points: Vec::new(),
        }
    }

    pub fn with_tags(name: impl Into<String>, tags: Tags) -> Self {
        Self {
            name: name.into(),
            tags,
            points: Vec::new(),
        }
    }

    pub fn add_tag(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.tags.insert(name.into(), value.into());
    }

    pub fn add_data_point(&mut self, point: DataPoint) {
        self.points.push(point);
    }

    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    pub fn tags(&self) -> &Tags {
        &self.tags
    }

    pub fn data_points(&self) -> &[DataPoint] {
        self.points.as_slice()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use crate::point::{DataPoint, DataPointSet, DataPointValue};

    #[test]
    fn test_tags_sorted() {
        let mut dps = DataPointSet::new("cpu");
        dps.add_tag("region", "us-west");
        dps.add_tag("host", "server1");
        dps.add_tag("dc", "a");

        let keys: Vec<&str> = dps.tags().keys().map(|k| k.as_str()).collect();
        assert_eq!(keys, vec!["dc", "host", "region"]);
    }

    #[test]
    fn test_value_kind() {
        let p = DataPoint::new(10, 42_i64);
        assert!(p.is_integer());
        assert_eq!(p.value, DataPointValue::Long(42));

        let p = DataPoint::new(10, 1.5_f64);
        assert!(!p.is_integer());
        assert_eq!(format!("{}", p.value), "1.5");
    }
}
