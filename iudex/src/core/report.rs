//! Diagnostic reports produced by [`Validator::report`](super::Validator::report).

use crate::prelude::*;
use serde::{Deserialize, Serialize};

/// Counters collected over one report run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationMetrics {
    /// Fields declared by the schema
    pub total_fields: usize,
    /// Fields that carried a check
    pub checked_fields: usize,
    /// Checked fields that passed
    pub passed_fields: usize,
    /// Checked fields that failed
    pub failed_fields: usize,
    /// Wall-clock time of the run in milliseconds
    pub execution_time_ms: u64,
}

impl ValidationMetrics {
    /// Share of checked fields that passed, from 0.0 to 100.0.
    pub fn success_rate(&self) -> f64 {
        if self.checked_fields == 0 {
            100.0
        } else {
            (self.passed_fields as f64 / self.checked_fields as f64) * 100.0
        }
    }
}

/// Result of one field's check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FieldStatus {
    /// Every row passed.
    Passed { total_rows: usize },
    /// At least one row failed.
    Failed {
        failing_rows: usize,
        total_rows: usize,
    },
    /// The field has no check.
    Unchecked,
}

/// One entry of a [`ValidationReport`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldOutcome {
    /// Field name
    pub field: String,
    /// Rendered check, absent for unchecked fields
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check: Option<String>,
    /// Outcome
    #[serde(flatten)]
    pub status: FieldStatus,
}

impl FieldOutcome {
    /// True unless the check failed.
    pub fn passed(&self) -> bool {
        !matches!(self.status, FieldStatus::Failed { .. })
    }
}

/// Outcome of every field, in schema order.
///
/// Unlike [`Validator::validate`](super::Validator::validate), a report run
/// does not stop at the first failing field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Backend that evaluated the checks
    pub backend: String,
    /// Per-field outcomes
    pub fields: Vec<FieldOutcome>,
    /// Summary counters
    pub metrics: ValidationMetrics,
}

impl ValidationReport {
    /// True iff no field failed.
    pub fn passed(&self) -> bool {
        self.fields.iter().all(FieldOutcome::passed)
    }

    /// Failing fields in schema order.
    pub fn failures(&self) -> impl Iterator<Item = &FieldOutcome> {
        self.fields.iter().filter(|outcome| !outcome.passed())
    }

    /// The error [`Validator::validate`](super::Validator::validate) would
    /// have returned, if any.
    pub fn first_error(&self) -> Option<IudexError> {
        self.failures().find_map(|outcome| match outcome.status {
            FieldStatus::Failed {
                failing_rows,
                total_rows,
            } => Some(IudexError::validation(
                &outcome.field,
                outcome.check.clone().unwrap_or_default(),
                failing_rows,
                total_rows,
            )),
            _ => None,
        })
    }

    /// Serializes the report as JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Serializes the report as indented JSON.
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
