//! Execution backends for checks.
//!
//! A [`Backend`] owns two associated types: a column handle and a mask. The
//! check algebra only ever builds masks through the backend's primitives
//! (ordering comparison, set membership, uniqueness and the boolean
//! connectives), so adding a backend never touches [`Check`](crate::checks::Check).
//!
//! Three backends ship with the crate:
//!
//! | Backend | Column | Mask | Dataset |
//! |---|---|---|---|
//! | [`MemoryBackend`] | `ArrayRef` | `BooleanArray`, evaluated eagerly | `RecordBatch` |
//! | [`StreamingBackend`] | [`StreamingColumn`] | [`ChunkMask`], evaluated per chunk | [`StreamingDataset`] |
//! | [`LazyBackend`] | [`LazyColumn`] | DataFusion `Expr` | [`LazyTable`] |
//!
//! All three agree row-for-row on every check; the integration tests pin
//! that down.

pub mod kernels;
mod lazy;
mod memory;
mod streaming;

pub use lazy::{LazyBackend, LazyColumn, LazyTable};
pub use memory::MemoryBackend;
pub use streaming::{ChunkMask, StreamingBackend, StreamingColumn, StreamingDataset};

use crate::checks::{CompareOp, ValueSet};
use crate::prelude::*;
use arrow::array::BooleanArray;
use arrow::datatypes::SchemaRef;
use async_trait::async_trait;
use datafusion::scalar::ScalarValue;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Outcome of evaluating a mask in aggregate mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaskSummary {
    /// Rows evaluated.
    pub total_rows: usize,
    /// Rows whose mask value was false.
    pub failing_rows: usize,
}

impl MaskSummary {
    /// True iff no row failed. An empty column passes.
    pub fn passed(&self) -> bool {
        self.failing_rows == 0
    }

    /// Summarizes a fully materialized mask.
    pub fn from_mask(mask: &BooleanArray) -> Self {
        let resolved = kernels::resolve_nulls(mask, false);
        Self {
            total_rows: mask.len(),
            failing_rows: resolved.false_count(),
        }
    }
}

/// The primitives a dataframe engine must provide to evaluate checks.
///
/// Mask construction is synchronous and must not touch data that is not
/// already in memory; all I/O happens in [`Backend::materialize`] and
/// [`Backend::summarize`]. Every primitive returns a mask with no nulls once
/// materialized.
#[async_trait]
pub trait Backend: Debug + Send + Sync {
    /// Handle to one column of a dataset.
    type Column: Send + Sync;
    /// A per-row boolean, possibly not yet computed.
    type Mask: Send;

    /// Short name used in logs and reports.
    fn name(&self) -> &'static str;

    /// `column <op> value`; null rows and a null `value` yield false.
    fn compare(&self, column: &Self::Column, op: CompareOp, value: &ScalarValue)
        -> Result<Self::Mask>;

    /// Membership of each row in `values`. Null rows yield `null_passes`.
    fn is_in(&self, column: &Self::Column, values: &ValueSet, null_passes: bool)
        -> Result<Self::Mask>;

    /// True where the row's value occurs exactly once in the column.
    fn unique(&self, column: &Self::Column) -> Result<Self::Mask>;

    /// Row-wise AND.
    fn and(&self, left: Self::Mask, right: Self::Mask) -> Result<Self::Mask>;

    /// Row-wise OR.
    fn or(&self, left: Self::Mask, right: Self::Mask) -> Result<Self::Mask>;

    /// Row-wise NOT.
    fn not(&self, mask: Self::Mask) -> Result<Self::Mask>;

    /// Computes the mask, one boolean per row in the column's order.
    async fn materialize(&self, column: &Self::Column, mask: Self::Mask) -> Result<BooleanArray>;

    /// Counts rows and failing rows without keeping the per-row result.
    async fn summarize(&self, column: &Self::Column, mask: Self::Mask) -> Result<MaskSummary>;
}

/// A dataset that a [`Backend`] can evaluate checks against.
#[async_trait]
pub trait Dataset: Sized + Send + Sync {
    /// The backend that evaluates checks on this dataset.
    type Backend: Backend;

    /// Returns the backend for this dataset.
    fn backend(&self) -> Self::Backend;

    /// Arrow schema of the dataset as it will be seen by checks.
    fn schema(&self) -> SchemaRef;

    /// Looks up a column by name.
    fn column(&self, name: &str) -> Result<<Self::Backend as Backend>::Column>;

    /// Casts the dataset to `target`, keeping only the target's columns in
    /// the target's order. Fails with [`IudexError::Cast`] if any value
    /// cannot be represented in its target type.
    async fn cast_to(self, target: SchemaRef) -> Result<Self>;

    /// One-line description for logs.
    fn describe(&self) -> String;
}
