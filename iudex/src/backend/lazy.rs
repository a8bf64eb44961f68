//! Deferred evaluation as DataFusion logical expressions.
//!
//! Masks are plain [`Expr`]s. Nothing runs until [`LazyBackend::materialize`]
//! or [`LazyBackend::summarize`] turns the expression into a query over the
//! column's [`DataFrame`], so DataFusion can push projections into the scan
//! and evaluate every check in one pass.

use super::kernels::{self, Alignment};
use super::{Backend, Dataset, MaskSummary};
use crate::checks::{CompareOp, ValueSet};
use crate::prelude::*;
use arrow::array::{Array, AsArray, BooleanArray, RecordBatch};
use arrow::datatypes::{DataType, SchemaRef};
use async_trait::async_trait;
use datafusion::functions_aggregate::count::count_udaf;
use datafusion::functions_aggregate::expr_fn::{count, sum};
use datafusion::functions_window::expr_fn::row_number;
use datafusion::logical_expr::expr::WindowFunction;
use datafusion::logical_expr::{
    binary_expr, cast, ident, in_list, lit, when, Expr, ExprFunctionExt, Operator,
};
use datafusion::prelude::DataFrame;
use datafusion::scalar::ScalarValue;
use tracing::{debug, instrument};

const ROW_COLUMN: &str = "__iudex_row";
const PASSED_COLUMN: &str = "__iudex_passed";
const TOTAL_COLUMN: &str = "__iudex_total";
const FAILING_COLUMN: &str = "__iudex_failing";
const LOST_COLUMN: &str = "__iudex_lost";
const NULLS_COLUMN: &str = "__iudex_nulls";

/// Builds masks as DataFusion expressions.
#[derive(Debug, Clone, Copy, Default)]
pub struct LazyBackend;

/// One column of a [`DataFrame`].
#[derive(Debug, Clone)]
pub struct LazyColumn {
    frame: DataFrame,
    name: String,
    data_type: DataType,
}

impl LazyColumn {
    /// Name of the column in the frame.
    pub fn name(&self) -> &str {
        &self.name
    }

    fn expr(&self) -> Expr {
        ident(&self.name)
    }

    /// The column expression and the literal to compare it with, following
    /// the same operand alignment as the eager kernels.
    fn aligned(&self, value: &ScalarValue) -> Result<Option<(Expr, Expr)>> {
        Ok(match kernels::align(&self.data_type, value)? {
            Alignment::Null => None,
            Alignment::Scalar(scalar) => Some((self.expr(), lit(scalar))),
            Alignment::Widen(scalar) => Some((cast(self.expr(), DataType::Float64), lit(scalar))),
        })
    }
}

fn operator(op: CompareOp) -> Operator {
    match op {
        CompareOp::Gt => Operator::Gt,
        CompareOp::GtEq => Operator::GtEq,
        CompareOp::Lt => Operator::Lt,
        CompareOp::LtEq => Operator::LtEq,
    }
}

/// Reads a single count out of an aggregate result; an empty sum is zero.
fn count_at(batch: &RecordBatch, name: &str) -> Result<usize> {
    let array = batch
        .column_by_name(name)
        .ok_or_else(|| IudexError::Internal(format!("aggregate column {name} missing")))?;
    match ScalarValue::try_from_array(array, 0)?.cast_to(&DataType::Int64)? {
        ScalarValue::Int64(Some(value)) => Ok(value.max(0) as usize),
        ScalarValue::Int64(None) => Ok(0),
        other => Err(IudexError::Internal(format!("unexpected count {other:?}"))),
    }
}

/// `SUM(CASE WHEN passed THEN 0 ELSE 1 END)`; null counts as failing.
fn failing(passed: Expr) -> Result<Expr> {
    Ok(sum(when(passed, lit(0i64)).otherwise(lit(1i64))?))
}

#[async_trait]
impl Backend for LazyBackend {
    type Column = LazyColumn;
    type Mask = Expr;

    fn name(&self) -> &'static str {
        "lazy"
    }

    fn compare(&self, column: &LazyColumn, op: CompareOp, value: &ScalarValue) -> Result<Expr> {
        Ok(match column.aligned(value)? {
            None => lit(false),
            Some((left, right)) => binary_expr(left, operator(op), right).is_true(),
        })
    }

    fn is_in(&self, column: &LazyColumn, values: &ValueSet, null_passes: bool) -> Result<Expr> {
        let mut direct = Vec::new();
        let mut widened = Vec::new();
        for value in values.values() {
            match kernels::align(&column.data_type, value)? {
                Alignment::Null => {}
                Alignment::Scalar(scalar) => direct.push(lit(scalar)),
                Alignment::Widen(scalar) => widened.push(lit(scalar)),
            }
        }

        let mut hits = lit(false);
        if !direct.is_empty() {
            hits = hits.or(in_list(column.expr(), direct, false).is_true());
        }
        if !widened.is_empty() {
            let as_float = cast(column.expr(), DataType::Float64);
            hits = hits.or(in_list(as_float, widened, false).is_true());
        }

        Ok(when(column.expr().is_null(), lit(null_passes)).otherwise(hits)?)
    }

    /// `COUNT(1) OVER (PARTITION BY column) = 1`; nulls share a partition.
    fn unique(&self, column: &LazyColumn) -> Result<Expr> {
        let occurrences = Expr::from(WindowFunction::new(count_udaf(), vec![lit(1i64)]))
            .partition_by(vec![column.expr()])
            .build()?;
        Ok(occurrences.eq(lit(1i64)))
    }

    fn and(&self, left: Expr, right: Expr) -> Result<Expr> {
        Ok(left.and(right))
    }

    fn or(&self, left: Expr, right: Expr) -> Result<Expr> {
        Ok(left.or(right))
    }

    fn not(&self, mask: Expr) -> Result<Expr> {
        Ok(!mask)
    }

    /// Rows are numbered before the mask is applied and the result is
    /// sorted by that number, so the output follows the frame's scan order.
    async fn materialize(&self, column: &LazyColumn, mask: Expr) -> Result<BooleanArray> {
        let batches = column
            .frame
            .clone()
            .select(vec![column.expr(), row_number().alias(ROW_COLUMN)])?
            .select(vec![ident(ROW_COLUMN), mask.alias(PASSED_COLUMN)])?
            .sort(vec![ident(ROW_COLUMN).sort(true, false)])?
            .collect()
            .await?;

        let arrays: Vec<&dyn Array> = batches
            .iter()
            .filter_map(|batch| batch.column_by_name(PASSED_COLUMN))
            .map(|array| array.as_ref())
            .collect();
        if arrays.is_empty() {
            return Ok(BooleanArray::from(Vec::<bool>::new()));
        }
        let passed = arrow::compute::concat(&arrays)?;
        Ok(kernels::resolve_nulls(passed.as_boolean(), false))
    }

    async fn summarize(&self, column: &LazyColumn, mask: Expr) -> Result<MaskSummary> {
        let batches = column
            .frame
            .clone()
            .select(vec![mask.alias(PASSED_COLUMN)])?
            .aggregate(
                vec![],
                vec![
                    count(lit(1i64)).alias(TOTAL_COLUMN),
                    failing(ident(PASSED_COLUMN))?.alias(FAILING_COLUMN),
                ],
            )?
            .collect()
            .await?;

        let batch = batches
            .iter()
            .find(|batch| batch.num_rows() > 0)
            .ok_or_else(|| IudexError::Internal("aggregate returned no rows".to_string()))?;
        Ok(MaskSummary {
            total_rows: count_at(batch, TOTAL_COLUMN)?,
            failing_rows: count_at(batch, FAILING_COLUMN)?,
        })
    }
}

/// A DataFusion [`DataFrame`] with the schema checks should see.
///
/// The declared schema starts out as the frame's own and is replaced by the
/// target schema after [`Dataset::cast_to`], which is how a verified
/// non-nullable declaration survives DataFusion's nullable casts.
#[derive(Debug, Clone)]
pub struct LazyTable {
    frame: DataFrame,
    schema: SchemaRef,
}

impl LazyTable {
    /// The underlying frame.
    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    /// Consumes the table, returning the frame.
    pub fn into_frame(self) -> DataFrame {
        self.frame
    }

    /// Counts rows of the cast column that do not survive a round trip, or
    /// that are null under a non-nullable target.
    async fn cast_violations(&self, field: &arrow::datatypes::Field, source: &DataType) -> Result<usize> {
        let name = field.name();
        let column = ident(name);
        let mut aggregates = Vec::new();

        if source != field.data_type() {
            let round_trip = cast(cast(column.clone(), field.data_type().clone()), source.clone());
            let preserved = binary_expr(round_trip, Operator::IsNotDistinctFrom, column.clone());
            aggregates.push(failing(preserved)?.alias(LOST_COLUMN));
        }
        if !field.is_nullable() {
            aggregates.push(failing(column.is_not_null())?.alias(NULLS_COLUMN));
        }
        if aggregates.is_empty() {
            return Ok(0);
        }

        let batches = self
            .frame
            .clone()
            .aggregate(vec![], aggregates)?
            .collect()
            .await
            .map_err(|e| IudexError::cast(name, e.to_string()))?;
        let Some(batch) = batches.iter().find(|batch| batch.num_rows() > 0) else {
            return Ok(0);
        };

        let mut violations = 0;
        for aggregate in [LOST_COLUMN, NULLS_COLUMN] {
            if batch.column_by_name(aggregate).is_some() {
                violations += count_at(batch, aggregate)?;
            }
        }
        Ok(violations)
    }
}

impl From<DataFrame> for LazyTable {
    fn from(frame: DataFrame) -> Self {
        let schema = frame.schema().inner().clone();
        Self { frame, schema }
    }
}

#[async_trait]
impl Dataset for LazyTable {
    type Backend = LazyBackend;

    fn backend(&self) -> LazyBackend {
        LazyBackend
    }

    fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }

    fn column(&self, name: &str) -> Result<LazyColumn> {
        let field = self
            .schema
            .field_with_name(name)
            .map_err(|_| IudexError::ColumnNotFound {
                column: name.to_string(),
            })?;
        Ok(LazyColumn {
            frame: self.frame.clone(),
            name: name.to_string(),
            data_type: field.data_type().clone(),
        })
    }

    #[instrument(skip_all, fields(dataset = %self.describe(), fields = target.fields().len()))]
    async fn cast_to(self, target: SchemaRef) -> Result<Self> {
        let mut projection = Vec::with_capacity(target.fields().len());
        for field in target.fields() {
            let name = field.name();
            let source = self
                .schema
                .field_with_name(name)
                .map_err(|_| IudexError::cast(name, "column is missing"))?
                .data_type()
                .clone();

            let violations = self.cast_violations(field, &source).await?;
            if violations > 0 {
                return Err(IudexError::cast(
                    name,
                    format!(
                        "{violations} values cannot be represented as {} {}",
                        field.data_type(),
                        if field.is_nullable() { "without loss" } else { "not null" }
                    ),
                ));
            }
            debug!(field = %name, from = %source, to = %field.data_type(), "Verified lazy cast");
            projection.push(cast(ident(name), field.data_type().clone()).alias(name));
        }

        Ok(Self {
            frame: self.frame.select(projection)?,
            schema: target,
        })
    }

    fn describe(&self) -> String {
        format!("DataFusion plan ({} columns)", self.schema.fields().len())
    }
}
