//! Fixtures shared by the unit tests.

use arrow::array::{ArrayRef, Int64Array, RecordBatch};
use arrow::datatypes::{DataType, Field, Schema};
use std::sync::Arc;

/// A single `Int64` column named `name`.
pub(crate) fn int64_batch(name: &str, values: Vec<Option<i64>>, nullable: bool) -> RecordBatch {
    let schema = Arc::new(Schema::new(vec![Field::new(name, DataType::Int64, nullable)]));
    let column: ArrayRef = Arc::new(Int64Array::from(values));
    RecordBatch::try_new(schema, vec![column]).expect("valid single-column batch")
}
