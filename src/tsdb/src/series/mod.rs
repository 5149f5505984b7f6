pub mod row_key;

pub use row_key::{RowKey, RowKeyError};
