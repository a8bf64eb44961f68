//! Property-based tests for the check algebra.
//!
//! ## Properties
//!
//! - `is_in` and `not_in` over the same members are complements on non-null rows
//! - `all`/`any` fold their children with AND/OR, in any child order
//! - A chunked stream evaluates to the same rows as the materialized column
//! - A lazy plan over a multi-partition table evaluates to the same rows
//! - Aggregate mode agrees with the AND of the elementwise results

use arrow::array::{ArrayRef, BooleanArray, Int64Array, RecordBatch};
use arrow::compute::kernels::boolean::{and, or};
use datafusion::datasource::MemTable;
use datafusion::prelude::{SessionConfig, SessionContext};
use iudex::backend::{Dataset, LazyBackend, LazyTable, MemoryBackend, StreamingBackend, StreamingDataset};
use iudex::checks::Check;
use iudex::sources::MemorySource;
use proptest::prelude::*;
use std::sync::Arc;

fn column_strategy() -> impl Strategy<Value = Vec<Option<i64>>> {
    prop::collection::vec(prop::option::weighted(0.9, -20i64..20), 0..60)
}

fn check_strategy() -> impl Strategy<Value = Check> {
    let leaf = prop_oneof![
        (-20i64..20).prop_map(Check::greater),
        (-20i64..20).prop_map(Check::greater_equal),
        (-20i64..20).prop_map(Check::less),
        (-20i64..20).prop_map(Check::less_equal),
        prop::collection::vec(-20i64..20, 1..5).prop_map(|v| Check::is_in_skip_nulls(v).unwrap()),
        prop::collection::vec(-20i64..20, 1..5).prop_map(|v| Check::not_in(v).unwrap()),
        Just(Check::unique()),
    ];
    leaf.prop_recursive(3, 12, 3, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 1..4).prop_map(|c| Check::all(c).unwrap()),
            prop::collection::vec(inner, 1..4).prop_map(|c| Check::any(c).unwrap()),
        ]
    })
}

fn to_array(values: &[Option<i64>]) -> ArrayRef {
    Arc::new(Int64Array::from(values.to_vec()))
}

/// A lazy table whose scan yields `batch` split over `partitions` partitions.
fn partitioned_table(batch: &RecordBatch, partitions: usize) -> LazyTable {
    let rows = batch.num_rows();
    let size = rows.div_ceil(partitions).max(1);
    let mut parts: Vec<Vec<RecordBatch>> = (0..rows)
        .step_by(size)
        .map(|offset| vec![batch.slice(offset, size.min(rows - offset))])
        .collect();
    if parts.is_empty() {
        parts.push(vec![batch.clone()]);
    }
    let table = MemTable::try_new(batch.schema(), parts).unwrap();
    let ctx = SessionContext::new_with_config(SessionConfig::new().with_target_partitions(partitions));
    LazyTable::from(ctx.read_table(Arc::new(table)).unwrap())
}

proptest! {
    #[test]
    fn prop_membership_complement(
        values in column_strategy(),
        members in prop::collection::vec(-20i64..20, 1..6),
    ) {
        let column = to_array(&values);
        let inside = Check::is_in(members.clone()).unwrap().evaluate_array(&column).unwrap();
        let outside = Check::not_in(members).unwrap().evaluate_array(&column).unwrap();

        for (row, value) in values.iter().enumerate() {
            if value.is_some() {
                prop_assert_ne!(inside.value(row), outside.value(row));
            } else {
                prop_assert!(!inside.value(row));
                prop_assert!(outside.value(row));
            }
        }
    }

    #[test]
    fn prop_combinators_fold_children(
        values in column_strategy(),
        left in check_strategy(),
        right in check_strategy(),
    ) {
        let column = to_array(&values);
        let l = left.evaluate_array(&column).unwrap();
        let r = right.evaluate_array(&column).unwrap();

        let all = Check::all([left.clone(), right.clone()]).unwrap();
        prop_assert_eq!(all.evaluate_array(&column).unwrap(), and(&l, &r).unwrap());
        prop_assert_eq!(&all, &Check::all([right.clone(), left.clone()]).unwrap());

        let any = Check::any([left.clone(), right.clone()]).unwrap();
        prop_assert_eq!(any.evaluate_array(&column).unwrap(), or(&l, &r).unwrap());
        prop_assert_eq!(&any, &Check::any([right, left]).unwrap());
    }

    #[test]
    fn prop_chunked_matches_materialized(
        values in column_strategy(),
        check in check_strategy(),
        chunk_rows in 1usize..16,
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let batch = RecordBatch::try_from_iter(vec![("x", to_array(&values))]).unwrap();
            let memory = Dataset::column(&batch, "x").unwrap();
            let expected = check.evaluate(&MemoryBackend, &memory).await.unwrap();

            let streamed = StreamingDataset::new(MemorySource::chunked(&batch, chunk_rows));
            let column = streamed.column("x").unwrap();
            let actual = check.evaluate(&StreamingBackend, &column).await.unwrap();

            prop_assert_eq!(actual, expected);
            Ok(())
        })?;
    }

    #[test]
    fn prop_aggregate_is_and_of_rows(
        values in column_strategy(),
        check in check_strategy(),
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let batch = RecordBatch::try_from_iter(vec![("x", to_array(&values))]).unwrap();
            let column = Dataset::column(&batch, "x").unwrap();

            let rows: BooleanArray = check.evaluate(&MemoryBackend, &column).await.unwrap();
            let summary = check.summarize(&MemoryBackend, &column).await.unwrap();

            prop_assert_eq!(summary.total_rows, values.len());
            prop_assert_eq!(summary.failing_rows, rows.false_count());
            prop_assert_eq!(
                check.passes(&MemoryBackend, &column).await.unwrap(),
                rows.iter().all(|row| row == Some(true))
            );
            Ok(())
        })?;
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_lazy_matches_materialized(
        values in column_strategy(),
        check in check_strategy(),
        partitions in 2usize..6,
    ) {
        // Partitions are coalesced in scan order on a single-threaded runtime.
        let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        rt.block_on(async {
            let batch = RecordBatch::try_from_iter(vec![("x", to_array(&values))]).unwrap();
            let expected = check.evaluate_array(&to_array(&values)).unwrap();

            let table = partitioned_table(&batch, partitions);
            let column = table.column("x").unwrap();
            let actual = check.evaluate(&LazyBackend, &column).await.unwrap();
            let summary = check.summarize(&LazyBackend, &column).await.unwrap();

            prop_assert_eq!(summary.total_rows, values.len());
            prop_assert_eq!(summary.failing_rows, expected.false_count());
            prop_assert_eq!(actual, expected);
            Ok(())
        })?;
    }
}
