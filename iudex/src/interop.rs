//! Conversion of foreign tables into one canonical [`RecordBatch`].
//!
//! A [`DataFrameAdapter`] is asked for a single contiguous batch. Some
//! representations can hand one over without copying; when they cannot and
//! the caller forbids copies, the adapter fails with
//! [`IudexError::Interop`] instead of silently allocating.

use crate::prelude::*;
use arrow::array::RecordBatch;
use arrow::datatypes::SchemaRef;
use arrow::json::reader::{infer_json_schema_from_iterator, ReaderBuilder};
use serde_json::Value;
use std::sync::Arc;

/// A table that can be turned into a canonical [`RecordBatch`].
pub trait DataFrameAdapter {
    /// Produces the canonical table. With `allow_copy == false` the call
    /// fails rather than copying column buffers.
    fn to_canonical_table(&self, allow_copy: bool) -> Result<RecordBatch>;
}

impl DataFrameAdapter for RecordBatch {
    fn to_canonical_table(&self, _allow_copy: bool) -> Result<RecordBatch> {
        Ok(self.clone())
    }
}

/// A table split into several record batches sharing one schema.
#[derive(Debug, Clone)]
pub struct ChunkedBatches {
    schema: SchemaRef,
    batches: Vec<RecordBatch>,
}

impl ChunkedBatches {
    /// Creates a chunked table, failing if a batch has another schema.
    pub fn try_new(schema: SchemaRef, batches: Vec<RecordBatch>) -> Result<Self> {
        if batches.iter().any(|batch| batch.schema() != schema) {
            return Err(IudexError::interop("chunks do not share one schema"));
        }
        Ok(Self { schema, batches })
    }

    /// Number of chunks.
    pub fn num_chunks(&self) -> usize {
        self.batches.len()
    }
}

impl DataFrameAdapter for ChunkedBatches {
    /// Zero chunks give an empty table and one chunk is handed over as is.
    /// More chunks must be concatenated, which copies.
    fn to_canonical_table(&self, allow_copy: bool) -> Result<RecordBatch> {
        match self.batches.as_slice() {
            [] => Ok(RecordBatch::new_empty(self.schema.clone())),
            [batch] => Ok(batch.clone()),
            batches if allow_copy => {
                arrow::compute::concat_batches(&self.schema, batches).map_err(|e| {
                    IudexError::interop_with_source("cannot concatenate chunks", Box::new(e))
                })
            }
            batches => Err(IudexError::interop(format!(
                "{} chunks cannot be combined without copying",
                batches.len()
            ))),
        }
    }
}

/// Row-oriented JSON objects, e.g. the body of an HTTP request.
#[derive(Debug, Clone)]
pub struct JsonRows {
    rows: Vec<Value>,
    schema: Option<SchemaRef>,
}

impl JsonRows {
    /// Rows whose schema is inferred from the values.
    pub fn new(rows: Vec<Value>) -> Self {
        Self { rows, schema: None }
    }

    /// Rows decoded with a known schema.
    pub fn with_schema(rows: Vec<Value>, schema: SchemaRef) -> Self {
        Self {
            rows,
            schema: Some(schema),
        }
    }

    /// Parses a JSON array of objects.
    pub fn from_json(json: &str) -> Result<Self> {
        match serde_json::from_str(json)? {
            Value::Array(rows) => Ok(Self::new(rows)),
            other => Err(IudexError::interop(format!(
                "expected a JSON array of objects, found {}",
                kind(&other)
            ))),
        }
    }

    fn schema(&self) -> Result<SchemaRef> {
        if let Some(schema) = &self.schema {
            return Ok(schema.clone());
        }
        let inferred = infer_json_schema_from_iterator(self.rows.iter().map(Ok))
            .map_err(|e| IudexError::interop_with_source("cannot infer schema", Box::new(e)))?;
        Ok(Arc::new(inferred))
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

impl DataFrameAdapter for JsonRows {
    /// Building columns from rows always copies.
    fn to_canonical_table(&self, allow_copy: bool) -> Result<RecordBatch> {
        if !allow_copy {
            return Err(IudexError::interop(
                "JSON rows cannot be converted to columns without copying",
            ));
        }

        let schema = self.schema()?;
        let mut decoder = ReaderBuilder::new(schema.clone())
            .with_batch_size(self.rows.len().max(1))
            .build_decoder()?;
        decoder
            .serialize(&self.rows)
            .map_err(|e| IudexError::interop_with_source("cannot decode rows", Box::new(e)))?;

        Ok(decoder
            .flush()?
            .unwrap_or_else(|| RecordBatch::new_empty(schema)))
    }
}
