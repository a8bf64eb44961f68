//! Chunk-at-a-time evaluation over a restartable [`BatchSource`].

use super::{kernels, Backend, Dataset, MaskSummary};
use crate::checks::{CompareOp, ValueSet};
use crate::prelude::*;
use crate::sources::{BatchSource, CastSource};
use arrow::array::{Array, ArrayRef, AsArray, BooleanArray};
use arrow::datatypes::{DataType, SchemaRef};
use async_trait::async_trait;
use datafusion::scalar::ScalarValue;
use futures::TryStreamExt;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Evaluates masks chunk by chunk, so memory use is bounded by the chunk
/// size of the source rather than the size of the column.
#[derive(Debug, Clone, Copy, Default)]
pub struct StreamingBackend;

/// One column of a [`BatchSource`].
#[derive(Debug, Clone)]
pub struct StreamingColumn {
    source: Arc<dyn BatchSource>,
    name: String,
    data_type: DataType,
}

impl StreamingColumn {
    /// Name of the column in the source.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Arrow type of the column.
    pub fn data_type(&self) -> &DataType {
        &self.data_type
    }

    /// Feeds the whole column through `visit`, one chunk at a time.
    async fn for_each_chunk<F>(&self, mut visit: F) -> Result<()>
    where
        F: FnMut(&ArrayRef) -> Result<()> + Send,
    {
        let mut stream = self.source.batches(std::slice::from_ref(&self.name)).await?;
        while let Some(batch) = stream.try_next().await? {
            visit(batch.column(0))?;
        }
        Ok(())
    }
}

/// A deferred predicate tree, evaluated against each chunk of a column.
#[derive(Debug, Clone)]
pub enum ChunkMask {
    /// Ordering comparison against a bound.
    Compare { op: CompareOp, value: ScalarValue },
    /// Set membership with the null outcome resolved.
    Membership { values: ValueSet, null_passes: bool },
    /// Exactly-once occurrence across the whole column.
    Unique,
    /// Negation.
    Not(Box<ChunkMask>),
    /// Conjunction.
    And(Box<ChunkMask>, Box<ChunkMask>),
    /// Disjunction.
    Or(Box<ChunkMask>, Box<ChunkMask>),
}

impl ChunkMask {
    /// True if evaluating this mask needs counts over the whole column.
    pub fn needs_counts(&self) -> bool {
        match self {
            ChunkMask::Unique => true,
            ChunkMask::Not(inner) => inner.needs_counts(),
            ChunkMask::And(l, r) | ChunkMask::Or(l, r) => l.needs_counts() || r.needs_counts(),
            _ => false,
        }
    }

    fn evaluate(&self, chunk: &ArrayRef, counts: Option<&kernels::ValueCounts>) -> Result<BooleanArray> {
        match self {
            ChunkMask::Compare { op, value } => kernels::compare(chunk, *op, value),
            ChunkMask::Membership {
                values,
                null_passes,
            } => kernels::is_in(chunk, values, *null_passes),
            ChunkMask::Unique => counts
                .ok_or_else(|| IudexError::Internal("unique() evaluated without counts".to_string()))?
                .unique_mask(chunk),
            ChunkMask::Not(inner) => Ok(arrow::compute::not(&inner.evaluate(chunk, counts)?)?),
            ChunkMask::And(l, r) => Ok(arrow::compute::and(
                &l.evaluate(chunk, counts)?,
                &r.evaluate(chunk, counts)?,
            )?),
            ChunkMask::Or(l, r) => Ok(arrow::compute::or(
                &l.evaluate(chunk, counts)?,
                &r.evaluate(chunk, counts)?,
            )?),
        }
    }
}

impl StreamingBackend {
    /// Counting pre-pass, only run when the mask contains `Unique`.
    async fn counts_for(
        &self,
        column: &StreamingColumn,
        mask: &ChunkMask,
    ) -> Result<Option<kernels::ValueCounts>> {
        if !mask.needs_counts() {
            return Ok(None);
        }
        let mut counts = kernels::ValueCounts::new(&column.data_type)?;
        column.for_each_chunk(|chunk| counts.observe(chunk)).await?;
        debug!(
            column = %column.name,
            distinct = counts.distinct(),
            "Counted distinct values"
        );
        Ok(Some(counts))
    }
}

#[async_trait]
impl Backend for StreamingBackend {
    type Column = StreamingColumn;
    type Mask = ChunkMask;

    fn name(&self) -> &'static str {
        "streaming"
    }

    fn compare(&self, column: &StreamingColumn, op: CompareOp, value: &ScalarValue) -> Result<ChunkMask> {
        kernels::ensure_comparable(&column.data_type, value)?;
        Ok(ChunkMask::Compare {
            op,
            value: value.clone(),
        })
    }

    fn is_in(&self, column: &StreamingColumn, values: &ValueSet, null_passes: bool) -> Result<ChunkMask> {
        for value in values.values() {
            kernels::ensure_comparable(&column.data_type, value)?;
        }
        Ok(ChunkMask::Membership {
            values: values.clone(),
            null_passes,
        })
    }

    fn unique(&self, column: &StreamingColumn) -> Result<ChunkMask> {
        // Fail at plan time for types the row format cannot count.
        kernels::ValueCounts::new(&column.data_type)?;
        Ok(ChunkMask::Unique)
    }

    fn and(&self, left: ChunkMask, right: ChunkMask) -> Result<ChunkMask> {
        Ok(ChunkMask::And(Box::new(left), Box::new(right)))
    }

    fn or(&self, left: ChunkMask, right: ChunkMask) -> Result<ChunkMask> {
        Ok(ChunkMask::Or(Box::new(left), Box::new(right)))
    }

    fn not(&self, mask: ChunkMask) -> Result<ChunkMask> {
        Ok(ChunkMask::Not(Box::new(mask)))
    }

    async fn materialize(&self, column: &StreamingColumn, mask: ChunkMask) -> Result<BooleanArray> {
        let counts = self.counts_for(column, &mask).await?;
        let mut chunks: Vec<BooleanArray> = Vec::new();
        column
            .for_each_chunk(|chunk| {
                chunks.push(mask.evaluate(chunk, counts.as_ref())?);
                Ok(())
            })
            .await?;

        let arrays: Vec<&dyn Array> = chunks.iter().map(|c| c as &dyn Array).collect();
        if arrays.is_empty() {
            return Ok(BooleanArray::from(Vec::<bool>::new()));
        }
        Ok(arrow::compute::concat(&arrays)?.as_boolean().clone())
    }

    async fn summarize(&self, column: &StreamingColumn, mask: ChunkMask) -> Result<MaskSummary> {
        let counts = self.counts_for(column, &mask).await?;
        let mut summary = MaskSummary {
            total_rows: 0,
            failing_rows: 0,
        };
        column
            .for_each_chunk(|chunk| {
                let chunk_summary = MaskSummary::from_mask(&mask.evaluate(chunk, counts.as_ref())?);
                summary.total_rows += chunk_summary.total_rows;
                summary.failing_rows += chunk_summary.failing_rows;
                Ok(())
            })
            .await?;
        Ok(summary)
    }
}

/// A dataset read through a [`BatchSource`].
#[derive(Debug, Clone)]
pub struct StreamingDataset {
    source: Arc<dyn BatchSource>,
}

impl StreamingDataset {
    /// Wraps a source.
    pub fn new(source: impl BatchSource + 'static) -> Self {
        Self {
            source: Arc::new(source),
        }
    }

    /// Wraps an already shared source.
    pub fn from_arc(source: Arc<dyn BatchSource>) -> Self {
        Self { source }
    }

    /// The underlying source.
    pub fn source(&self) -> &Arc<dyn BatchSource> {
        &self.source
    }
}

#[async_trait]
impl Dataset for StreamingDataset {
    type Backend = StreamingBackend;

    fn backend(&self) -> StreamingBackend {
        StreamingBackend
    }

    fn schema(&self) -> SchemaRef {
        self.source.schema()
    }

    fn column(&self, name: &str) -> Result<StreamingColumn> {
        let schema = self.source.schema();
        let field = schema
            .field_with_name(name)
            .map_err(|_| IudexError::ColumnNotFound {
                column: name.to_string(),
            })?;
        Ok(StreamingColumn {
            source: self.source.clone(),
            name: name.to_string(),
            data_type: field.data_type().clone(),
        })
    }

    /// Wraps the source in a [`CastSource`] after one verification pass, so
    /// a lossy value is reported here rather than during a later check.
    #[instrument(skip_all, fields(dataset = %self.describe(), fields = target.fields().len()))]
    async fn cast_to(self, target: SchemaRef) -> Result<Self> {
        let cast: Arc<dyn BatchSource> = Arc::new(CastSource::try_new(self.source, target.clone())?);
        let columns: Vec<String> = target.fields().iter().map(|f| f.name().clone()).collect();

        let mut stream = cast.batches(&columns).await?;
        let mut rows = 0;
        while let Some(batch) = stream.try_next().await? {
            rows += batch.num_rows();
        }
        debug!(rows, "Verified streaming cast");

        Ok(Self { source: cast })
    }

    fn describe(&self) -> String {
        self.source.description()
    }
}
