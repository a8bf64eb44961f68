//! Declared schemas: fields, types, nullability and attached checks.

use crate::checks::Check;
use crate::prelude::*;
use arrow::datatypes::{DataType, Field as ArrowField, Schema as ArrowSchema, SchemaRef};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// One declared column.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Field {
    name: String,
    data_type: DataType,
    nullable: bool,
    check: Option<Check>,
}

impl Field {
    /// A nullable field without a check.
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable: true,
            check: None,
        }
    }

    /// Sets whether the column may contain nulls.
    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    /// Attaches a check. A second call replaces the first; combine checks
    /// with `&` to attach several.
    pub fn with_check(mut self, check: Check) -> Self {
        self.check = Some(check);
        self
    }

    /// Field name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared Arrow type.
    pub fn declared_type(&self) -> &DataType {
        &self.data_type
    }

    /// Whether nulls are allowed.
    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    /// The attached check, if any.
    pub fn check(&self) -> Option<&Check> {
        self.check.as_ref()
    }

    /// True iff a column of `data_type` and `nullable` satisfies the
    /// declaration exactly.
    pub fn matches(&self, data_type: &DataType, nullable: bool) -> bool {
        &self.data_type == data_type && self.nullable == nullable
    }

    /// The Arrow field this declaration describes.
    pub fn to_arrow(&self) -> ArrowField {
        ArrowField::new(&self.name, self.data_type.clone(), self.nullable)
    }
}

/// A set of uniquely named fields, kept in declaration order.
///
/// Declaration order is the order in which checks run and the column order
/// of a cast dataset; the structural comparison itself ignores order.
///
/// # Examples
///
/// ```rust
/// use iudex::checks::Check;
/// use iudex::schema::{Field, Schema};
/// use arrow::datatypes::DataType;
///
/// let schema = Schema::new(vec![
///     Field::new("a", DataType::Int64)
///         .with_nullable(false)
///         .with_check(Check::greater(0i64) & Check::less(1000i64)),
///     Field::new("b", DataType::Float32),
/// ])
/// .unwrap();
///
/// assert_eq!(schema.len(), 2);
/// assert_eq!(schema.declared_type("b"), Some(&DataType::Float32));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    fields: Vec<Field>,
    by_name: HashMap<String, usize>,
}

impl Schema {
    /// Builds a schema, failing with [`IudexError::Configuration`] on a
    /// repeated field name.
    pub fn new(fields: Vec<Field>) -> Result<Self> {
        let mut by_name = HashMap::with_capacity(fields.len());
        for (index, field) in fields.iter().enumerate() {
            if by_name.insert(field.name.clone(), index).is_some() {
                return Err(IudexError::Configuration(format!(
                    "Field '{}' is declared more than once",
                    field.name
                )));
            }
        }
        Ok(Self { fields, by_name })
    }

    /// Fields in declaration order.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Looks up a field by name.
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.by_name.get(name).map(|&index| &self.fields[index])
    }

    /// Declared type of a field.
    pub fn declared_type(&self, name: &str) -> Option<&DataType> {
        self.field(name).map(Field::declared_type)
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// True for a schema without fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// The Arrow schema this declaration describes, in declaration order.
    pub fn to_arrow(&self) -> SchemaRef {
        Arc::new(ArrowSchema::new(
            self.fields.iter().map(Field::to_arrow).collect::<Vec<_>>(),
        ))
    }

    /// Structural comparison: the same set of (name, type, nullability)
    /// triples, in any order.
    pub fn matches(&self, actual: &ArrowSchema) -> bool {
        if actual.fields().len() != self.fields.len() {
            return false;
        }
        let mut seen = HashSet::with_capacity(self.fields.len());
        actual.fields().iter().all(|column| {
            seen.insert(column.name().as_str())
                && self
                    .field(column.name())
                    .is_some_and(|field| field.matches(column.data_type(), column.is_nullable()))
        })
    }

    /// Human-readable reasons why `actual` does not match, one per column.
    pub fn mismatches(&self, actual: &ArrowSchema) -> Vec<String> {
        let mut reasons = Vec::new();
        for field in &self.fields {
            match actual.field_with_name(&field.name) {
                Err(_) => reasons.push(format!("missing column '{}'", field.name)),
                Ok(column) if column.data_type() != &field.data_type => reasons.push(format!(
                    "column '{}' has type {}, expected {}",
                    field.name,
                    column.data_type(),
                    field.data_type
                )),
                Ok(column) if column.is_nullable() != field.nullable => reasons.push(format!(
                    "column '{}' is {}, expected {}",
                    field.name,
                    nullability(column.is_nullable()),
                    nullability(field.nullable)
                )),
                Ok(_) => {}
            }
        }
        for column in actual.fields() {
            if self.field(column.name()).is_none() {
                reasons.push(format!("unexpected column '{}'", column.name()));
            }
        }
        reasons
    }
}

fn nullability(nullable: bool) -> &'static str {
    if nullable {
        "nullable"
    } else {
        "not null"
    }
}

impl std::hash::Hash for Schema {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.fields.hash(state);
    }
}
