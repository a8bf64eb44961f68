//! The validation engine.

use super::report::{FieldOutcome, FieldStatus, ValidationMetrics, ValidationReport};
use crate::backend::{Backend, Dataset};
use crate::config::ValidateOptions;
use crate::interop::DataFrameAdapter;
use crate::prelude::*;
use crate::schema::Schema;
use crate::{log_check, log_data_op};
use arrow::array::RecordBatch;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

/// Where a validation run currently is.
///
/// A run moves `Unvalidated → SchemaChecked → FieldsChecked`; any error
/// ends it in the stage it was in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStage {
    /// Nothing checked yet; casting happens here.
    Unvalidated,
    /// Structure matches the schema.
    SchemaChecked,
    /// Every field check passed.
    FieldsChecked,
}

impl fmt::Display for ValidationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ValidationStage::Unvalidated => "unvalidated",
            ValidationStage::SchemaChecked => "schema_checked",
            ValidationStage::FieldsChecked => "fields_checked",
        })
    }
}

/// Validates datasets against schemas.
///
/// A validator holds only options, so one instance can serve any number of
/// concurrent calls.
///
/// # Examples
///
/// ```rust
/// use iudex::prelude::*;
/// use iudex::checks::Check;
/// use iudex::schema::{Field, Schema};
/// use arrow::array::{ArrayRef, Int64Array, RecordBatch};
/// use arrow::datatypes::{DataType, Field as ArrowField, Schema as ArrowSchema};
/// use std::sync::Arc;
///
/// # async fn example() -> Result<()> {
/// let schema = Schema::new(vec![Field::new("a", DataType::Int64)
///     .with_nullable(false)
///     .with_check(Check::greater(0i64) & Check::less(1000i64))])?;
///
/// let batch = RecordBatch::try_new(
///     Arc::new(ArrowSchema::new(vec![ArrowField::new("a", DataType::Int64, false)])),
///     vec![Arc::new(Int64Array::from(vec![1, 2, 3])) as ArrayRef],
/// )?;
///
/// let validated = Validator::default().validate(batch.clone(), &schema).await?;
/// assert_eq!(validated, batch);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct Validator {
    options: ValidateOptions,
}

impl Validator {
    /// Creates a validator.
    pub fn new(options: ValidateOptions) -> Self {
        Self { options }
    }

    /// The options in use.
    pub fn options(&self) -> &ValidateOptions {
        &self.options
    }

    /// Casts (if requested) and checks the structure.
    async fn prepare<D: Dataset>(&self, dataset: D, schema: &Schema) -> Result<D> {
        let dataset = if self.options.cast {
            log_data_op!(
                self.options.log,
                dataset = %dataset.describe(),
                fields = schema.len(),
                "Casting dataset to declared schema"
            );
            dataset.cast_to(schema.to_arrow()).await.inspect_err(|e| {
                warn!(stage = %ValidationStage::Unvalidated, error = %e, "Cast failed");
            })?
        } else {
            dataset
        };

        let actual = dataset.schema();
        if !schema.matches(&actual) {
            warn!(
                stage = %ValidationStage::Unvalidated,
                mismatches = ?schema.mismatches(&actual),
                "Dataset does not match schema"
            );
            return Err(IudexError::Schema {
                actual,
                expected: schema.to_arrow(),
            });
        }
        debug!(stage = %ValidationStage::SchemaChecked, "Schema matches");
        Ok(dataset)
    }

    /// Validates `dataset` against `schema`.
    ///
    /// Fields are checked in schema order and the first failing field ends
    /// the run with [`IudexError::Validation`]. On success the dataset is
    /// returned unchanged, or in its cast form when casting was requested.
    #[instrument(skip_all, fields(fields = schema.len(), cast = self.options.cast))]
    pub async fn validate<D: Dataset>(&self, dataset: D, schema: &Schema) -> Result<D> {
        let start = Instant::now();
        let dataset = self.prepare(dataset, schema).await?;
        let backend = dataset.backend();
        info!(
            backend = backend.name(),
            dataset = %dataset.describe(),
            "Validating fields"
        );

        for field in schema.fields() {
            let Some(check) = field.check() else {
                continue;
            };
            let column = dataset.column(field.name())?;
            let summary = check.summarize(&backend, &column).await?;
            log_check!(
                self.options.log,
                field = field.name(),
                check = %self.options.log.truncate(check),
                total_rows = summary.total_rows,
                failing_rows = summary.failing_rows,
                "Evaluated field check"
            );

            if !summary.passed() {
                warn!(
                    stage = %ValidationStage::SchemaChecked,
                    field = field.name(),
                    failing_rows = summary.failing_rows,
                    total_rows = summary.total_rows,
                    "Field check failed"
                );
                return Err(IudexError::validation(
                    field.name(),
                    check.to_string(),
                    summary.failing_rows,
                    summary.total_rows,
                ));
            }
        }

        info!(
            stage = %ValidationStage::FieldsChecked,
            duration_ms = start.elapsed().as_millis() as u64,
            "Validation passed"
        );
        Ok(dataset)
    }

    /// Evaluates every field and reports each outcome instead of stopping
    /// at the first failure.
    ///
    /// Casting and the structural check still fail the call, since no field
    /// can be evaluated meaningfully against the wrong structure.
    #[instrument(skip_all, fields(fields = schema.len(), cast = self.options.cast))]
    pub async fn report<D: Dataset>(&self, dataset: D, schema: &Schema) -> Result<ValidationReport> {
        let start = Instant::now();
        let dataset = self.prepare(dataset, schema).await?;
        let backend = dataset.backend();

        let mut metrics = ValidationMetrics {
            total_fields: schema.len(),
            ..Default::default()
        };
        let mut fields = Vec::with_capacity(schema.len());
        for field in schema.fields() {
            let Some(check) = field.check() else {
                fields.push(FieldOutcome {
                    field: field.name().to_string(),
                    check: None,
                    status: FieldStatus::Unchecked,
                });
                continue;
            };

            metrics.checked_fields += 1;
            let column = dataset.column(field.name())?;
            let summary = check.summarize(&backend, &column).await?;
            let status = if summary.passed() {
                metrics.passed_fields += 1;
                FieldStatus::Passed {
                    total_rows: summary.total_rows,
                }
            } else {
                metrics.failed_fields += 1;
                FieldStatus::Failed {
                    failing_rows: summary.failing_rows,
                    total_rows: summary.total_rows,
                }
            };
            debug!(field = field.name(), status = ?status, "Field evaluated");
            fields.push(FieldOutcome {
                field: field.name().to_string(),
                check: Some(check.to_string()),
                status,
            });
        }

        metrics.execution_time_ms = start.elapsed().as_millis() as u64;
        info!(
            passed = metrics.passed_fields,
            failed = metrics.failed_fields,
            unchecked = metrics.total_fields - metrics.checked_fields,
            "Report complete"
        );
        Ok(ValidationReport {
            backend: backend.name().to_string(),
            fields,
            metrics,
        })
    }

    /// Converts a foreign table with its adapter, honoring `allow_copy`,
    /// then validates the result in memory.
    pub async fn validate_dataframe<A>(&self, frame: &A, schema: &Schema) -> Result<RecordBatch>
    where
        A: DataFrameAdapter + ?Sized,
    {
        let table = frame.to_canonical_table(self.options.allow_copy)?;
        log_data_op!(
            self.options.log,
            rows = table.num_rows(),
            columns = table.num_columns(),
            "Converted dataframe to canonical table"
        );
        self.validate(table, schema).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::Check;
    use crate::schema::Field;
    use crate::test_helpers::int64_batch;
    use arrow::datatypes::DataType;

    fn schema(nullable: bool) -> Schema {
        Schema::new(vec![Field::new("a", DataType::Int64)
            .with_nullable(nullable)
            .with_check(Check::greater(0i64) & Check::less(1000i64))])
        .unwrap()
    }

    #[tokio::test]
    async fn test_validate_pass_returns_input() {
        let batch = int64_batch("a", vec![Some(1), Some(2), Some(3)], false);
        let result = Validator::default()
            .validate(batch.clone(), &schema(false))
            .await
            .unwrap();
        assert_eq!(result, batch);
    }

    #[tokio::test]
    async fn test_nullability_mismatch_is_schema_error() {
        let batch = int64_batch("a", vec![Some(1), Some(2), Some(3)], true);
        let err = Validator::default()
            .validate(batch, &schema(false))
            .await
            .unwrap_err();
        assert!(err.is_schema_error());
    }

    #[tokio::test]
    async fn test_failing_field_is_validation_error() {
        let batch = int64_batch("a", vec![Some(1), Some(2), Some(-3)], false);
        let err = Validator::default()
            .validate(batch, &schema(false))
            .await
            .unwrap_err();
        assert!(err.is_validation_error());
        assert_eq!(err.field(), Some("a"));
        assert!(matches!(
            err,
            IudexError::Validation {
                failing_rows: 1,
                total_rows: 3,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_cast_tightens_nullability() {
        let batch = int64_batch("a", vec![Some(1), Some(2)], true);
        let validator = Validator::new(ValidateOptions::new().with_cast(true));
        let result = validator.validate(batch, &schema(false)).await.unwrap();
        assert!(!result.schema().field(0).is_nullable());
    }

    #[tokio::test]
    async fn test_report_does_not_short_circuit() {
        let batch = int64_batch("a", vec![Some(-1), Some(5)], false);
        let schema = Schema::new(vec![Field::new("a", DataType::Int64)
            .with_nullable(false)
            .with_check(Check::greater(0i64))])
        .unwrap();

        let report = Validator::default().report(batch, &schema).await.unwrap();
        assert_eq!(report.backend, "memory");
        assert_eq!(
            report.fields[0].status,
            FieldStatus::Failed {
                failing_rows: 1,
                total_rows: 2
            }
        );
        assert_eq!(report.metrics.failed_fields, 1);
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(ValidationStage::SchemaChecked.to_string(), "schema_checked");
    }
}
