//! Restartable batch sources for the streaming backend.
//!
//! A [`BatchSource`] can be read any number of times, each read producing a
//! fresh stream of record batches restricted to the requested columns. That
//! is what lets the streaming backend make a counting pre-pass before the
//! evaluation pass without ever holding the whole dataset in memory.

use crate::backend::kernels;
use crate::prelude::*;
use arrow::array::RecordBatch;
use arrow::datatypes::{Schema, SchemaRef};
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use std::fmt::Debug;
use std::sync::Arc;

mod dataframe;
#[cfg(feature = "parquet")]
mod parquet_file;

pub use dataframe::DataFrameSource;
#[cfg(feature = "parquet")]
pub use parquet_file::ParquetSource;

/// A stream of record batches produced by a [`BatchSource`].
pub type BatchStream = BoxStream<'static, Result<RecordBatch>>;

/// A dataset that can be streamed from the start as often as needed.
///
/// # Examples
///
/// ```rust
/// use iudex::sources::{BatchSource, MemorySource};
/// use arrow::array::{ArrayRef, Int64Array, RecordBatch};
/// use futures::TryStreamExt;
/// use std::sync::Arc;
///
/// # async fn example() -> iudex::prelude::Result<()> {
/// let batch = RecordBatch::try_from_iter(vec![
///     ("a", Arc::new(Int64Array::from(vec![1, 2])) as ArrayRef),
/// ])?;
/// let source = MemorySource::from_batch(batch);
///
/// let batches: Vec<_> = source.batches(&["a".to_string()]).await?.try_collect().await?;
/// assert_eq!(batches.len(), 1);
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait BatchSource: Debug + Send + Sync {
    /// Schema of every batch the source produces when all columns are read.
    fn schema(&self) -> SchemaRef;

    /// Starts a new pass over the data, yielding only `columns` in the
    /// given order.
    async fn batches(&self, columns: &[String]) -> Result<BatchStream>;

    /// Returns a human-readable description of this source.
    fn description(&self) -> String;
}

/// Resolves column names to indices of `schema`.
pub(crate) fn projection(schema: &Schema, columns: &[String]) -> Result<Vec<usize>> {
    columns
        .iter()
        .map(|name| {
            schema
                .index_of(name)
                .map_err(|_| IudexError::ColumnNotFound {
                    column: name.clone(),
                })
        })
        .collect()
}

/// Batches already held in memory.
#[derive(Debug, Clone)]
pub struct MemorySource {
    schema: SchemaRef,
    batches: Vec<RecordBatch>,
}

impl MemorySource {
    /// Creates a source from batches that all share `schema`.
    pub fn try_new(schema: SchemaRef, batches: Vec<RecordBatch>) -> Result<Self> {
        if let Some(batch) = batches.iter().find(|b| b.schema() != schema) {
            return Err(IudexError::Configuration(format!(
                "Batch schema {:?} does not match source schema {:?}",
                batch.schema(),
                schema
            )));
        }
        Ok(Self { schema, batches })
    }

    /// Creates a single-batch source.
    pub fn from_batch(batch: RecordBatch) -> Self {
        Self {
            schema: batch.schema(),
            batches: vec![batch],
        }
    }

    /// Splits `batch` into chunks of at most `chunk_rows` rows.
    pub fn chunked(batch: &RecordBatch, chunk_rows: usize) -> Self {
        let chunk_rows = chunk_rows.max(1);
        let batches = (0..batch.num_rows())
            .step_by(chunk_rows)
            .map(|offset| batch.slice(offset, chunk_rows.min(batch.num_rows() - offset)))
            .collect();
        Self {
            schema: batch.schema(),
            batches,
        }
    }
}

#[async_trait]
impl BatchSource for MemorySource {
    fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }

    async fn batches(&self, columns: &[String]) -> Result<BatchStream> {
        let indices = projection(&self.schema, columns)?;
        let projected = self
            .batches
            .iter()
            .map(|batch| batch.project(&indices).map_err(IudexError::from))
            .collect::<Vec<_>>();
        Ok(stream::iter(projected).boxed())
    }

    fn description(&self) -> String {
        format!("{} in-memory batches", self.batches.len())
    }
}

/// Casts every batch of an inner source to a target schema while streaming.
///
/// Casting follows the lossless policy of
/// [`kernels::cast_column`](crate::backend::kernels::cast_column), so a bad
/// value surfaces as an error in the stream that reaches it.
#[derive(Debug)]
pub struct CastSource {
    inner: Arc<dyn BatchSource>,
    target: SchemaRef,
}

impl CastSource {
    /// Wraps `inner`, failing with [`IudexError::Cast`] if it lacks a
    /// column of `target`.
    pub fn try_new(inner: Arc<dyn BatchSource>, target: SchemaRef) -> Result<Self> {
        let schema = inner.schema();
        if let Some(missing) = target
            .fields()
            .iter()
            .find(|field| schema.index_of(field.name()).is_err())
        {
            return Err(IudexError::cast(missing.name(), "column is missing"));
        }
        Ok(Self { inner, target })
    }
}

#[async_trait]
impl BatchSource for CastSource {
    fn schema(&self) -> SchemaRef {
        self.target.clone()
    }

    async fn batches(&self, columns: &[String]) -> Result<BatchStream> {
        let indices = projection(&self.target, columns)?;
        let target = Arc::new(self.target.project(&indices)?);
        let stream = self.inner.batches(columns).await?;
        Ok(stream
            .map(move |batch| kernels::cast_batch(&batch?, &target))
            .boxed())
    }

    fn description(&self) -> String {
        format!("{} cast to {} fields", self.inner.description(), self.target.fields().len())
    }
}
