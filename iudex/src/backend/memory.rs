//! Eager evaluation over in-memory Arrow arrays.

use super::{kernels, Backend, Dataset, MaskSummary};
use crate::checks::{CompareOp, ValueSet};
use crate::prelude::*;
use arrow::array::{ArrayRef, BooleanArray, RecordBatch};
use arrow::datatypes::SchemaRef;
use async_trait::async_trait;
use datafusion::scalar::ScalarValue;
use tracing::instrument;

/// Evaluates every primitive immediately with Arrow compute kernels.
#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryBackend;

#[async_trait]
impl Backend for MemoryBackend {
    type Column = ArrayRef;
    type Mask = BooleanArray;

    fn name(&self) -> &'static str {
        "memory"
    }

    fn compare(&self, column: &ArrayRef, op: CompareOp, value: &ScalarValue) -> Result<BooleanArray> {
        kernels::compare(column, op, value)
    }

    fn is_in(&self, column: &ArrayRef, values: &ValueSet, null_passes: bool) -> Result<BooleanArray> {
        kernels::is_in(column, values, null_passes)
    }

    fn unique(&self, column: &ArrayRef) -> Result<BooleanArray> {
        kernels::unique(column)
    }

    fn and(&self, left: BooleanArray, right: BooleanArray) -> Result<BooleanArray> {
        Ok(arrow::compute::and(&left, &right)?)
    }

    fn or(&self, left: BooleanArray, right: BooleanArray) -> Result<BooleanArray> {
        Ok(arrow::compute::or(&left, &right)?)
    }

    fn not(&self, mask: BooleanArray) -> Result<BooleanArray> {
        Ok(arrow::compute::not(&mask)?)
    }

    async fn materialize(&self, _column: &ArrayRef, mask: BooleanArray) -> Result<BooleanArray> {
        Ok(mask)
    }

    async fn summarize(&self, _column: &ArrayRef, mask: BooleanArray) -> Result<MaskSummary> {
        Ok(MaskSummary::from_mask(&mask))
    }
}

#[async_trait]
impl Dataset for RecordBatch {
    type Backend = MemoryBackend;

    fn backend(&self) -> MemoryBackend {
        MemoryBackend
    }

    fn schema(&self) -> SchemaRef {
        RecordBatch::schema(self)
    }

    fn column(&self, name: &str) -> Result<ArrayRef> {
        self.column_by_name(name)
            .cloned()
            .ok_or_else(|| IudexError::ColumnNotFound {
                column: name.to_string(),
            })
    }

    #[instrument(skip_all, fields(dataset = %self.describe(), fields = target.fields().len()))]
    async fn cast_to(self, target: SchemaRef) -> Result<Self> {
        kernels::cast_batch(&self, &target)
    }

    fn describe(&self) -> String {
        format!(
            "in-memory batch ({} rows, {} columns)",
            self.num_rows(),
            self.num_columns()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::Check;
    use arrow::array::Int64Array;
    use arrow::datatypes::{DataType, Field, Schema};
    use std::sync::Arc;

    fn batch() -> RecordBatch {
        RecordBatch::try_from_iter(vec![(
            "a",
            Arc::new(Int64Array::from(vec![Some(1), Some(2), None])) as ArrayRef,
        )])
        .unwrap()
    }

    #[tokio::test]
    async fn test_summarize_counts_failures() {
        let batch = batch();
        let column = Dataset::column(&batch, "a").unwrap();
        let summary = Check::greater(1i64)
            .summarize(&MemoryBackend, &column)
            .await
            .unwrap();
        assert_eq!(summary, MaskSummary { total_rows: 3, failing_rows: 2 });
    }

    #[tokio::test]
    async fn test_missing_column() {
        let err = Dataset::column(&batch(), "b").unwrap_err();
        assert!(matches!(err, IudexError::ColumnNotFound { column } if column == "b"));
    }

    #[tokio::test]
    async fn test_cast_to() {
        let target = Arc::new(Schema::new(vec![Field::new("a", DataType::Float64, true)]));
        let cast = batch().cast_to(target.clone()).await.unwrap();
        assert_eq!(Dataset::schema(&cast), target);
    }
}
