//! Validation options and JSON schema declarations.
//!
//! Schemas are normally built in code with [`Schema::new`], but services
//! that receive their contracts at runtime can declare them as JSON:
//!
//! ```json
//! {
//!   "fields": [
//!     {"name": "a", "type": "int64", "nullable": false,
//!      "check": {"all": [{"greater": 0}, {"less": 1000}]}},
//!     {"name": "status", "type": "utf8",
//!      "check": {"is_in": {"values": ["new", "done", null]}}},
//!     {"name": "id", "type": "int64", "check": "unique"}
//!   ]
//! }
//! ```

use crate::checks::Check;
use crate::logging::LogConfig;
use crate::prelude::*;
use crate::schema::{Field, Schema};
use arrow::datatypes::DataType;
use datafusion::scalar::ScalarValue;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Options for a single validation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidateOptions {
    /// Cast the dataset to the declared schema before the structural check
    pub cast: bool,
    /// Allow dataframe adapters to copy while producing a canonical table
    pub allow_copy: bool,
    /// Logging for this call; not part of the serialized form
    #[serde(skip)]
    pub log: LogConfig,
}

impl Default for ValidateOptions {
    fn default() -> Self {
        Self {
            cast: false,
            allow_copy: true,
            log: LogConfig::default(),
        }
    }
}

impl ValidateOptions {
    /// Default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to cast before checking the structure.
    pub fn with_cast(mut self, cast: bool) -> Self {
        self.cast = cast;
        self
    }

    /// Sets whether adapters may copy.
    pub fn with_allow_copy(mut self, allow_copy: bool) -> Self {
        self.allow_copy = allow_copy;
        self
    }

    /// Sets the logging configuration.
    pub fn with_log_config(mut self, log: LogConfig) -> Self {
        self.log = log;
        self
    }

    /// Loads options from JSON; missing keys take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// A schema as declared in JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaDeclaration {
    /// Fields in declaration order
    pub fields: Vec<FieldDeclaration>,
}

impl SchemaDeclaration {
    /// Parses a declaration.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// One declared field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDeclaration {
    /// Column name
    pub name: String,
    /// Lowercase type name such as `int64` or `utf8`
    #[serde(rename = "type")]
    pub data_type: String,
    /// Defaults to true
    #[serde(default = "default_nullable")]
    pub nullable: bool,
    /// Optional check
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check: Option<CheckDeclaration>,
}

fn default_nullable() -> bool {
    true
}

/// A declared check, externally tagged by its snake_case name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckDeclaration {
    Greater(Value),
    GreaterEqual(Value),
    Less(Value),
    LessEqual(Value),
    IsIn(MembershipDeclaration),
    NotIn(MembershipDeclaration),
    Unique,
    All(Vec<CheckDeclaration>),
    Any(Vec<CheckDeclaration>),
}

/// Parameters of `is_in` and `not_in`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MembershipDeclaration {
    /// Members; `null` adds the null marker
    pub values: Vec<Value>,
    /// Whether null rows always pass
    #[serde(default)]
    pub skip_nulls: bool,
}

impl MembershipDeclaration {
    fn scalars(&self) -> Result<Vec<ScalarValue>> {
        self.values.iter().map(scalar_from_json).collect()
    }
}

/// Converts a JSON literal into a scalar.
///
/// Integers become `Int64` (`UInt64` beyond `i64::MAX`), other numbers
/// `Float64`, strings `Utf8`, booleans `Boolean` and `null` the untyped null.
pub fn scalar_from_json(value: &Value) -> Result<ScalarValue> {
    match value {
        Value::Null => Ok(ScalarValue::Null),
        Value::Bool(b) => Ok(ScalarValue::Boolean(Some(*b))),
        Value::String(s) => Ok(ScalarValue::Utf8(Some(s.clone()))),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(ScalarValue::Int64(Some(i)))
            } else if let Some(u) = n.as_u64() {
                Ok(ScalarValue::UInt64(Some(u)))
            } else if let Some(f) = n.as_f64() {
                Ok(ScalarValue::Float64(Some(f)))
            } else {
                Err(IudexError::Configuration(format!("unsupported number {n}")))
            }
        }
        Value::Array(_) | Value::Object(_) => Err(IudexError::Configuration(format!(
            "check parameters must be scalars, found {value}"
        ))),
    }
}

/// Parses a lowercase type name.
pub fn parse_data_type(name: &str) -> Result<DataType> {
    Ok(match name {
        "bool" | "boolean" => DataType::Boolean,
        "int8" => DataType::Int8,
        "int16" => DataType::Int16,
        "int32" => DataType::Int32,
        "int64" => DataType::Int64,
        "uint8" => DataType::UInt8,
        "uint16" => DataType::UInt16,
        "uint32" => DataType::UInt32,
        "uint64" => DataType::UInt64,
        "float16" => DataType::Float16,
        "float32" => DataType::Float32,
        "float64" => DataType::Float64,
        "utf8" | "string" => DataType::Utf8,
        "large_utf8" | "large_string" => DataType::LargeUtf8,
        "binary" => DataType::Binary,
        "date32" => DataType::Date32,
        "date64" => DataType::Date64,
        "null" => DataType::Null,
        other => {
            return Err(IudexError::Configuration(format!(
                "unknown data type '{other}'"
            )))
        }
    })
}

impl TryFrom<&CheckDeclaration> for Check {
    type Error = IudexError;

    fn try_from(declaration: &CheckDeclaration) -> Result<Self> {
        match declaration {
            CheckDeclaration::Greater(v) => Ok(Check::greater(scalar_from_json(v)?)),
            CheckDeclaration::GreaterEqual(v) => Ok(Check::greater_equal(scalar_from_json(v)?)),
            CheckDeclaration::Less(v) => Ok(Check::less(scalar_from_json(v)?)),
            CheckDeclaration::LessEqual(v) => Ok(Check::less_equal(scalar_from_json(v)?)),
            CheckDeclaration::IsIn(m) if m.skip_nulls => Check::is_in_skip_nulls(m.scalars()?),
            CheckDeclaration::IsIn(m) => Check::is_in(m.scalars()?),
            CheckDeclaration::NotIn(m) if m.skip_nulls => Check::not_in_skip_nulls(m.scalars()?),
            CheckDeclaration::NotIn(m) => Check::not_in(m.scalars()?),
            CheckDeclaration::Unique => Ok(Check::unique()),
            CheckDeclaration::All(children) => Check::all(
                children
                    .iter()
                    .map(Check::try_from)
                    .collect::<Result<Vec<_>>>()?,
            ),
            CheckDeclaration::Any(children) => Check::any(
                children
                    .iter()
                    .map(Check::try_from)
                    .collect::<Result<Vec<_>>>()?,
            ),
        }
    }
}

impl TryFrom<&FieldDeclaration> for Field {
    type Error = IudexError;

    fn try_from(declaration: &FieldDeclaration) -> Result<Self> {
        let field = Field::new(&declaration.name, parse_data_type(&declaration.data_type)?)
            .with_nullable(declaration.nullable);
        match &declaration.check {
            Some(check) => Ok(field.with_check(Check::try_from(check)?)),
            None => Ok(field),
        }
    }
}

impl TryFrom<&SchemaDeclaration> for Schema {
    type Error = IudexError;

    fn try_from(declaration: &SchemaDeclaration) -> Result<Self> {
        Schema::new(
            declaration
                .fields
                .iter()
                .map(Field::try_from)
                .collect::<Result<Vec<_>>>()?,
        )
    }
}

/// Parses a JSON schema declaration straight into a [`Schema`].
pub fn schema_from_json(json: &str) -> Result<Schema> {
    Schema::try_from(&SchemaDeclaration::from_json(json)?)
}
