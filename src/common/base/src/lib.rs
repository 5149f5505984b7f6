pub mod point;

pub use point::{DataPoint, DataPointSet, DataPointValue, Tags};
