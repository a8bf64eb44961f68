//! Row-level semantics of every check, asserted on all three backends.
//!
//! Each case evaluates one check over one column with the memory, streaming
//! (in small chunks) and lazy backends, and requires all three to produce
//! the expected per-row booleans and the matching aggregate result.

use arrow::array::{Array, ArrayRef, BooleanArray, Float32Array, Float64Array, Int32Array, Int64Array, RecordBatch, StringArray};
use datafusion::datasource::MemTable;
use datafusion::prelude::{SessionConfig, SessionContext};
use datafusion::scalar::ScalarValue;
use iudex::backend::{Dataset, LazyBackend, LazyTable, MemoryBackend, StreamingBackend, StreamingDataset};
use iudex::checks::Check;
use iudex::prelude::*;
use iudex::sources::MemorySource;
use std::sync::Arc;

fn batch(column: ArrayRef) -> RecordBatch {
    RecordBatch::try_from_iter(vec![("x", column)]).unwrap()
}

fn ints(values: Vec<Option<i64>>) -> ArrayRef {
    Arc::new(Int64Array::from(values))
}

/// Evaluates `check` on every backend and returns the elementwise results
/// after asserting that aggregate mode agrees with them.
async fn evaluate_everywhere(check: &Check, column: ArrayRef) -> Vec<BooleanArray> {
    let batch = batch(column);
    let mut results = Vec::new();

    let memory = Dataset::column(&batch, "x").unwrap();
    results.push((
        "memory",
        check.evaluate(&MemoryBackend, &memory).await.unwrap(),
        check.passes(&MemoryBackend, &memory).await.unwrap(),
    ));

    let streaming = StreamingDataset::new(MemorySource::chunked(&batch, 2));
    let column = streaming.column("x").unwrap();
    results.push((
        "streaming",
        check.evaluate(&StreamingBackend, &column).await.unwrap(),
        check.passes(&StreamingBackend, &column).await.unwrap(),
    ));

    let ctx = SessionContext::new_with_config(SessionConfig::new().with_target_partitions(1));
    let lazy = LazyTable::from(ctx.read_batch(batch.clone()).unwrap());
    let column = lazy.column("x").unwrap();
    results.push((
        "lazy",
        check.evaluate(&LazyBackend, &column).await.unwrap(),
        check.passes(&LazyBackend, &column).await.unwrap(),
    ));

    results
        .into_iter()
        .map(|(backend, elementwise, aggregate)| {
            assert_eq!(elementwise.null_count(), 0, "{backend}: {check}");
            assert_eq!(
                aggregate,
                elementwise.false_count() == 0,
                "{backend}: aggregate disagrees for {check}"
            );
            elementwise
        })
        .collect()
}

async fn assert_rows(check: Check, column: ArrayRef, expected: Vec<bool>) {
    let expected = BooleanArray::from(expected);
    for result in evaluate_everywhere(&check, column).await {
        assert_eq!(result, expected, "{check}");
    }
}

#[tokio::test]
async fn test_greater() {
    assert_rows(Check::greater(0i64), ints(vec![Some(1), Some(2), Some(3)]), vec![true, true, true]).await;
    assert_rows(Check::greater(0i64), ints(vec![Some(-1), Some(2), Some(3)]), vec![false, true, true]).await;
}

#[tokio::test]
async fn test_ordering_checks_fail_nulls() {
    let column = ints(vec![Some(0), None, Some(5)]);
    assert_rows(Check::greater_equal(0i64), column.clone(), vec![true, false, true]).await;
    assert_rows(Check::less(5i64), column.clone(), vec![true, false, false]).await;
    assert_rows(Check::less_equal(5i64), column, vec![true, false, true]).await;
}

#[tokio::test]
async fn test_null_bound_fails_every_row() {
    let column = ints(vec![Some(1), None]);
    assert_rows(Check::greater(ScalarValue::Int64(None)), column, vec![false, false]).await;
}

#[tokio::test]
async fn test_unique_flags_all_duplicates() {
    assert_rows(Check::unique(), ints(vec![Some(1), Some(2), Some(3)]), vec![true, true, true]).await;
    assert_rows(
        Check::unique(),
        ints(vec![Some(1), Some(2), Some(3), Some(3)]),
        vec![true, true, false, false],
    )
    .await;
}

#[tokio::test]
async fn test_unique_groups_nulls() {
    assert_rows(Check::unique(), ints(vec![None, Some(1)]), vec![true, true]).await;
    assert_rows(Check::unique(), ints(vec![None, Some(1), None]), vec![false, true, false]).await;
}

#[tokio::test]
async fn test_unique_strings_across_chunks() {
    let column: ArrayRef = Arc::new(StringArray::from(vec!["a", "b", "c", "d", "a"]));
    assert_rows(Check::unique(), column, vec![false, true, true, true, false]).await;
}

#[tokio::test]
async fn test_is_in_with_null_marker() {
    assert_rows(
        Check::is_in([Some(1i64), Some(2), Some(3), None]).unwrap(),
        ints(vec![Some(1), Some(2), Some(4), None]),
        vec![true, true, false, true],
    )
    .await;
}

#[tokio::test]
async fn test_is_in_skip_nulls() {
    assert_rows(
        Check::is_in_skip_nulls([1i64]).unwrap(),
        ints(vec![Some(1), Some(2), None]),
        vec![true, false, true],
    )
    .await;
}

#[tokio::test]
async fn test_not_in() {
    let column = ints(vec![Some(1), Some(2), Some(3), None]);
    assert_rows(
        Check::not_in_skip_nulls([10i64]).unwrap(),
        column.clone(),
        vec![true, true, true, true],
    )
    .await;
    assert_rows(
        Check::not_in([Some(1i64), Some(2), Some(3), None]).unwrap(),
        column.clone(),
        vec![false, false, false, false],
    )
    .await;
    assert_rows(
        Check::not_in([ScalarValue::Null]).unwrap(),
        column,
        vec![true, true, true, false],
    )
    .await;
}

#[tokio::test]
async fn test_combinators() {
    let column = ints(vec![Some(-1), Some(0), Some(1), Some(1000), None]);
    assert_rows(
        Check::greater(0i64) & Check::less(1000i64),
        column.clone(),
        vec![false, false, true, false, false],
    )
    .await;
    assert_rows(
        Check::less(0i64) | Check::greater_equal(1000i64),
        column.clone(),
        vec![true, false, false, true, false],
    )
    .await;
    assert_rows(
        (Check::greater(0i64) & Check::unique()) | Check::is_in_skip_nulls([0i64]).unwrap(),
        column,
        vec![false, true, true, true, true],
    )
    .await;
}

#[tokio::test]
async fn test_mixed_numeric_operands() {
    let floats: ArrayRef = Arc::new(Float32Array::from(vec![0.5, 4.0, 10.0]));
    assert_rows(
        Check::greater(0i64) & Check::less_equal(10i64),
        floats.clone(),
        vec![true, true, true],
    )
    .await;
    assert_rows(Check::is_in([4i64]).unwrap(), floats, vec![false, true, false]).await;

    let narrow: ArrayRef = Arc::new(Int32Array::from(vec![0, 1, 2]));
    assert_rows(Check::greater(0.5f64), narrow.clone(), vec![false, true, true]).await;
    assert_rows(Check::less(i64::MAX), narrow, vec![true, true, true]).await;

    let doubles: ArrayRef = Arc::new(Float64Array::from(vec![1.0, 1.5]));
    assert_rows(Check::is_in([1i64]).unwrap(), doubles, vec![true, false]).await;
}

#[tokio::test]
async fn test_string_checks() {
    let column: ArrayRef = Arc::new(StringArray::from(vec![Some("apple"), Some("pear"), None]));
    assert_rows(Check::greater("banana"), column.clone(), vec![false, true, false]).await;
    assert_rows(
        Check::not_in(["apple"]).unwrap(),
        column,
        vec![false, true, true],
    )
    .await;
}

#[tokio::test]
async fn test_empty_column_passes() {
    let column = ints(vec![]);
    for check in [Check::greater(0i64), Check::unique(), Check::is_in([1i64]).unwrap()] {
        for result in evaluate_everywhere(&check, column.clone()).await {
            assert_eq!(result.len(), 0);
        }
    }
}

#[tokio::test]
async fn test_incomparable_operands_fail_on_every_backend() {
    let batch = batch(Arc::new(StringArray::from(vec!["a"])));
    let check = Check::greater(1i64);

    let memory = Dataset::column(&batch, "x").unwrap();
    assert!(matches!(
        check.evaluate(&MemoryBackend, &memory).await,
        Err(IudexError::TypeMismatch { .. })
    ));

    let streaming = StreamingDataset::new(MemorySource::from_batch(batch.clone()));
    assert!(matches!(
        check.evaluate(&StreamingBackend, &streaming.column("x").unwrap()).await,
        Err(IudexError::TypeMismatch { .. })
    ));

    let ctx = SessionContext::new();
    let lazy = LazyTable::from(ctx.read_batch(batch).unwrap());
    assert!(matches!(
        check.evaluate(&LazyBackend, &lazy.column("x").unwrap()).await,
        Err(IudexError::TypeMismatch { .. })
    ));
}

#[tokio::test]
async fn test_failing_row_counts_agree() {
    let column = ints(vec![Some(1), Some(1), Some(2), None, Some(7)]);
    let check = Check::unique() & Check::less(5i64);
    for result in evaluate_everywhere(&check, column).await {
        assert_eq!(result.false_count(), 4);
    }
}

#[tokio::test]
async fn test_lazy_rows_align_over_partitioned_table() {
    let values: Vec<i64> = (0..20_000i64).map(|i| (i * 7_919) % 20_011 - 50).collect();
    let mut duplicated = values.clone();
    duplicated[19_999] = duplicated[0];
    let batch = batch(Arc::new(Int64Array::from(duplicated)));

    let partitions: Vec<Vec<RecordBatch>> = (0..4)
        .map(|i| vec![batch.slice(i * 5_000, 5_000)])
        .collect();
    let table = MemTable::try_new(batch.schema(), partitions).unwrap();
    let ctx = SessionContext::new();
    let lazy = LazyTable::from(ctx.read_table(Arc::new(table)).unwrap());
    let column = lazy.column("x").unwrap();
    let memory = batch.column(0).clone();

    for check in [
        Check::greater(0i64),
        Check::unique(),
        Check::unique() | Check::less(0i64),
    ] {
        let expected = check.evaluate_array(&memory).unwrap();
        assert_eq!(check.evaluate(&LazyBackend, &column).await.unwrap(), expected, "{check}");
        let summary = check.summarize(&LazyBackend, &column).await.unwrap();
        assert_eq!(summary.total_rows, 20_000);
        assert_eq!(summary.failing_rows, expected.false_count(), "{check}");
    }
    assert_eq!(Check::unique().summarize(&LazyBackend, &column).await.unwrap().failing_rows, 2);
}
