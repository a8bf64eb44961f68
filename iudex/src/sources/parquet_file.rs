//! Parquet files read chunk by chunk.

use super::{BatchSource, BatchStream};
use crate::prelude::*;
use arrow::array::RecordBatch;
use arrow::datatypes::SchemaRef;
use async_trait::async_trait;
use futures::StreamExt;
use parquet::arrow::{ParquetRecordBatchStreamBuilder, ProjectionMask};
use std::path::{Path, PathBuf};
use tokio::fs::File;

const DEFAULT_BATCH_SIZE: usize = 8192;

/// A Parquet file re-opened on every pass.
///
/// Only the requested columns are decoded, and at most one batch of
/// `batch_size` rows is held in memory per pass. File reads go through
/// tokio, so decoding never blocks the runtime's worker threads.
#[derive(Debug, Clone)]
pub struct ParquetSource {
    path: PathBuf,
    schema: SchemaRef,
    batch_size: usize,
}

impl ParquetSource {
    /// Opens `path` and reads its schema.
    pub async fn try_new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let builder = Self::open(&path).await?;
        let schema = builder.schema().clone();
        Ok(Self {
            path,
            schema,
            batch_size: DEFAULT_BATCH_SIZE,
        })
    }

    /// Sets the number of rows decoded per batch.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    async fn open(path: &Path) -> Result<ParquetRecordBatchStreamBuilder<File>> {
        let file = File::open(path)
            .await
            .with_context(|| format!("Opening {}", path.display()))?;
        Ok(ParquetRecordBatchStreamBuilder::new(file).await?)
    }
}

/// Projects a batch onto `columns`, in that order.
fn project_batch(batch: &RecordBatch, columns: &[String]) -> Result<RecordBatch> {
    let indices = super::projection(&batch.schema(), columns)?;
    Ok(batch.project(&indices)?)
}

#[async_trait]
impl BatchSource for ParquetSource {
    fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }

    async fn batches(&self, columns: &[String]) -> Result<BatchStream> {
        let indices = super::projection(&self.schema, columns)?;
        let builder = Self::open(&self.path).await?;
        let mask = ProjectionMask::roots(builder.parquet_schema(), indices);
        let stream = builder
            .with_projection(mask)
            .with_batch_size(self.batch_size)
            .build()?;

        // The reader yields columns in file order; restore the requested one.
        let columns = columns.to_vec();
        Ok(stream
            .map(move |batch| project_batch(&batch?, &columns))
            .boxed())
    }

    fn description(&self) -> String {
        format!("Parquet file {}", self.path.display())
    }
}
