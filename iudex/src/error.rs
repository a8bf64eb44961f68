//! Error types for the iudex validation library.
//!
//! Every failure surfaced by the library is an [`IudexError`]. The first five
//! variants form the validation taxonomy callers branch on; the remaining
//! variants wrap infrastructure failures from Arrow, DataFusion and friends.

use arrow::datatypes::SchemaRef;
use std::fmt::Write as _;
use thiserror::Error;

/// The main error type for the iudex library.
#[derive(Error, Debug)]
pub enum IudexError {
    /// A check was built from structurally invalid parameters, such as an
    /// empty membership set or a combinator without children.
    #[error("Invalid check: {0}")]
    Construction(String),

    /// A foreign dataframe could not be converted into a canonical table
    /// under the requested copy policy.
    #[error("Interop error: {message}")]
    Interop {
        /// Detailed error message
        message: String,
        /// Optional underlying error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The dataset's columns do not match the declared schema.
    #[error(
        "Schema does not match expected schema. Schema: {}. Expected schema: {}.",
        describe_schema(.actual),
        describe_schema(.expected)
    )]
    Schema {
        /// The schema the dataset actually has
        actual: SchemaRef,
        /// The schema the caller declared
        expected: SchemaRef,
    },

    /// A field's check did not pass for every row.
    #[error("Check failed for field '{field}': {failing_rows} of {total_rows} rows failed {check}")]
    Validation {
        /// Name of the field whose check failed
        field: String,
        /// Rendered form of the failing check
        check: String,
        /// Number of rows that did not pass
        failing_rows: usize,
        /// Number of rows evaluated
        total_rows: usize,
    },

    /// A requested cast could not be performed without data loss.
    #[error("Cast failed for field '{field}': {message}")]
    Cast {
        /// Name of the field that could not be cast
        field: String,
        /// Detailed error message
        message: String,
    },

    /// Error from Arrow operations.
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Error from DataFusion operations.
    #[error("DataFusion error: {0}")]
    DataFusion(#[from] datafusion::error::DataFusionError),

    /// Error from reading Parquet files.
    #[cfg(feature = "parquet")]
    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// Error from JSON (de)serialization.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Error from I/O operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A required column is not present in the dataset.
    #[error("Column '{column}' not found in dataset")]
    ColumnNotFound { column: String },

    /// A check parameter cannot be compared with the column it is applied to.
    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    /// The operation is not supported by the active backend.
    #[error("Operation not supported: {0}")]
    NotSupported(String),

    /// Invalid configuration or schema declaration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Generic internal error for unexpected conditions.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A type alias for `Result<T, IudexError>`.
pub type Result<T> = std::result::Result<T, IudexError>;

impl IudexError {
    /// Creates a construction error.
    pub fn construction(message: impl Into<String>) -> Self {
        Self::Construction(message.into())
    }

    /// Creates an interop error.
    pub fn interop(message: impl Into<String>) -> Self {
        Self::Interop {
            message: message.into(),
            source: None,
        }
    }

    /// Creates an interop error with a source error.
    pub fn interop_with_source(
        message: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        Self::Interop {
            message: message.into(),
            source: Some(source),
        }
    }

    /// Creates a validation error for a field.
    pub fn validation(
        field: impl Into<String>,
        check: impl Into<String>,
        failing_rows: usize,
        total_rows: usize,
    ) -> Self {
        Self::Validation {
            field: field.into(),
            check: check.into(),
            failing_rows,
            total_rows,
        }
    }

    /// Creates a cast error for a field.
    pub fn cast(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Cast {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Creates a type mismatch error.
    pub fn type_mismatch(expected: impl ToString, found: impl ToString) -> Self {
        Self::TypeMismatch {
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }

    /// Returns true for [`IudexError::Construction`].
    pub fn is_construction_error(&self) -> bool {
        matches!(self, Self::Construction(_))
    }

    /// Returns true for [`IudexError::Interop`].
    pub fn is_interop_error(&self) -> bool {
        matches!(self, Self::Interop { .. })
    }

    /// Returns true for [`IudexError::Schema`].
    pub fn is_schema_error(&self) -> bool {
        matches!(self, Self::Schema { .. })
    }

    /// Returns true for [`IudexError::Validation`].
    pub fn is_validation_error(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    /// Returns true for [`IudexError::Cast`].
    pub fn is_cast_error(&self) -> bool {
        matches!(self, Self::Cast { .. })
    }

    /// Returns the field a validation or cast error refers to.
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::Validation { field, .. } | Self::Cast { field, .. } => Some(field),
            _ => None,
        }
    }
}

/// Renders a schema as `name: Type [not null], ...`.
fn describe_schema(schema: &SchemaRef) -> String {
    let mut out = String::from("{");
    for (i, field) in schema.fields().iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        let _ = write!(out, "{}: {}", field.name(), field.data_type());
        if !field.is_nullable() {
            out.push_str(" not null");
        }
    }
    out.push('}');
    out
}

/// Extension trait for adding context to errors.
pub trait ErrorContext<T> {
    /// Adds context to an error.
    fn context(self, msg: &str) -> Result<T>;

    /// Adds context with a lazy message.
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: Into<IudexError>,
{
    fn context(self, msg: &str) -> Result<T> {
        self.map_err(|e| e.into().prefixed(msg))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.into().prefixed(&f()))
    }
}

impl IudexError {
    /// Prefixes the message of an infrastructure error with `context`.
    ///
    /// Taxonomy errors pass through untouched so `is_*_error()` and
    /// `field()` keep working on the result.
    fn prefixed(self, context: &str) -> Self {
        match self {
            Self::Construction(_)
            | Self::Interop { .. }
            | Self::Schema { .. }
            | Self::Validation { .. }
            | Self::Cast { .. }
            | Self::ColumnNotFound { .. }
            | Self::TypeMismatch { .. } => self,
            Self::NotSupported(inner) => Self::NotSupported(format!("{context}: {inner}")),
            Self::Configuration(inner) => Self::Configuration(format!("{context}: {inner}")),
            Self::Internal(inner) => Self::Internal(format!("{context}: {inner}")),
            other => Self::Internal(format!("{context}: {other}")),
        }
    }
}
