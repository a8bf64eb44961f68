//! # Iudex - Schema and Check Validation for Arrow Data
//!
//! Iudex verifies that a dataset conforms to a declared contract: a set of
//! fields with names, Arrow types and nullability, each optionally carrying
//! a composable [`Check`](checks::Check). The same checks run unchanged over
//! an in-memory `RecordBatch`, a chunked stream of batches, or a lazy
//! DataFusion plan, and produce the same per-row results on all three.
//!
//! ## Quick Start
//!
//! ```rust
//! use iudex::prelude::*;
//! use iudex::checks::Check;
//! use iudex::schema::{Field, Schema};
//! use arrow::array::{ArrayRef, Float32Array, Int64Array, RecordBatch};
//! use arrow::datatypes::DataType;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<()> {
//! let schema = Schema::new(vec![
//!     Field::new("a", DataType::Int64)
//!         .with_check(Check::greater(0i64) & Check::less(1000i64)),
//!     Field::new("b", DataType::Float32)
//!         .with_check(Check::greater(0i64) & Check::less_equal(10i64)),
//! ])?;
//!
//! let batch = RecordBatch::try_from_iter(vec![
//!     ("a", Arc::new(Int64Array::from(vec![1, 2, 3])) as ArrayRef),
//!     ("b", Arc::new(Float32Array::from(vec![4.0, 5.0, 5.0])) as ArrayRef),
//! ])?;
//!
//! let validated = iudex::validate(batch, &schema, ValidateOptions::default()).await?;
//! assert_eq!(validated.num_rows(), 3);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - **`checks`**: the check algebra (`Check`, `ValueSet`, `CompareOp`)
//! - **`backend`**: the `Backend` and `Dataset` traits with the memory,
//!   streaming and lazy backends
//! - **`sources`**: restartable batch sources for the streaming backend
//! - **`interop`**: adapters that turn foreign tables into a `RecordBatch`
//! - **`schema`**: declared fields and the structural comparison
//! - **`config`**: `ValidateOptions` and JSON schema declarations
//! - **`core`**: the `Validator` and its reports
//! - **`logging`**: `tracing` configuration
//!
//! ## Backends
//!
//! ```rust
//! use iudex::backend::{LazyBackend, LazyTable, StreamingBackend, StreamingDataset};
//! use iudex::backend::Dataset;
//! use iudex::checks::Check;
//! use iudex::sources::MemorySource;
//! use arrow::array::{ArrayRef, BooleanArray, Int64Array, RecordBatch};
//! use datafusion::prelude::SessionContext;
//! use std::sync::Arc;
//!
//! # async fn example() -> iudex::prelude::Result<()> {
//! let batch = RecordBatch::try_from_iter(vec![
//!     ("a", Arc::new(Int64Array::from(vec![1, 2, 3, 3])) as ArrayRef),
//! ])?;
//! let expected = BooleanArray::from(vec![true, true, false, false]);
//!
//! let streamed = StreamingDataset::new(MemorySource::chunked(&batch, 2));
//! let column = streamed.column("a")?;
//! assert_eq!(Check::unique().evaluate(&StreamingBackend, &column).await?, expected);
//!
//! let ctx = SessionContext::new();
//! let lazy = LazyTable::from(ctx.read_batch(batch)?);
//! let column = lazy.column("a")?;
//! assert_eq!(Check::unique().evaluate(&LazyBackend, &column).await?, expected);
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod checks;
pub mod config;
pub mod core;
pub mod error;
pub mod interop;
pub mod logging;
pub mod prelude;
pub mod schema;
pub mod sources;

#[cfg(test)]
mod test_helpers;

pub use crate::core::{validate, validate_dataframe};
