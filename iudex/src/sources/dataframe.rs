//! DataFusion plans as batch sources.

use super::{BatchSource, BatchStream};
use crate::prelude::*;
use arrow::datatypes::SchemaRef;
use async_trait::async_trait;
use datafusion::prelude::DataFrame;
use futures::{StreamExt, TryStreamExt};

/// Re-executes a DataFusion plan for every pass.
///
/// Useful for sources DataFusion already knows how to scan (CSV, Parquet,
/// registered tables): only the projected columns are read, and nothing is
/// kept between passes.
#[derive(Debug, Clone)]
pub struct DataFrameSource {
    frame: DataFrame,
    schema: SchemaRef,
}

impl DataFrameSource {
    /// Creates a source from a logical plan.
    pub fn new(frame: DataFrame) -> Self {
        let schema = frame.schema().inner().clone();
        Self { frame, schema }
    }
}

#[async_trait]
impl BatchSource for DataFrameSource {
    fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }

    async fn batches(&self, columns: &[String]) -> Result<BatchStream> {
        super::projection(&self.schema, columns)?;
        let names: Vec<&str> = columns.iter().map(String::as_str).collect();
        let stream = self
            .frame
            .clone()
            .select_columns(&names)?
            .execute_stream()
            .await?;
        Ok(stream.map_err(IudexError::from).boxed())
    }

    fn description(&self) -> String {
        format!("DataFusion plan with {} columns", self.schema.fields().len())
    }
}
