//! The validation engine.
//!
//! A run takes a dataset and a [`Schema`], optionally casts the dataset to
//! the declared types, verifies that its columns match the declaration and
//! then evaluates each field's check in aggregate mode:
//!
//! ```text
//! Unvalidated ──cast?──▶ structural check ──▶ SchemaChecked
//!                              │                    │
//!                         SchemaError        field checks, in order
//!                                                   │
//!                                   ValidationError ◀┴▶ FieldsChecked
//! ```
//!
//! The engine is generic over [`Dataset`], so the same call validates an
//! in-memory `RecordBatch`, a [`StreamingDataset`](crate::backend::StreamingDataset)
//! or a [`LazyTable`](crate::backend::LazyTable).

mod report;
mod validator;

pub use report::{FieldOutcome, FieldStatus, ValidationMetrics, ValidationReport};
pub use validator::{ValidationStage, Validator};

use crate::backend::Dataset;
use crate::config::ValidateOptions;
use crate::interop::DataFrameAdapter;
use crate::prelude::*;
use crate::schema::Schema;
use arrow::array::RecordBatch;

/// Validates `dataset` against `schema` with `options`.
///
/// See [`Validator::validate`].
pub async fn validate<D: Dataset>(dataset: D, schema: &Schema, options: ValidateOptions) -> Result<D> {
    Validator::new(options).validate(dataset, schema).await
}

/// Converts `frame` to a canonical table and validates it.
///
/// See [`Validator::validate_dataframe`].
pub async fn validate_dataframe<A>(frame: &A, schema: &Schema, options: ValidateOptions) -> Result<RecordBatch>
where
    A: DataFrameAdapter + ?Sized,
{
    Validator::new(options).validate_dataframe(frame, schema).await
}
