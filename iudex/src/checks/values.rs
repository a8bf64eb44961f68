//! Parameters shared by the leaf checks.

use crate::prelude::*;
use datafusion::scalar::ScalarValue;
use std::fmt;

/// Comparison operator of the ordering checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    /// `value > bound`
    Gt,
    /// `value >= bound`
    GtEq,
    /// `value < bound`
    Lt,
    /// `value <= bound`
    LtEq,
}

impl CompareOp {
    /// Returns the name used when rendering a check.
    pub fn name(&self) -> &'static str {
        match self {
            CompareOp::Gt => "greater",
            CompareOp::GtEq => "greater_equal",
            CompareOp::Lt => "less",
            CompareOp::LtEq => "less_equal",
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A non-empty set of scalars used by the membership checks.
///
/// Null scalars of any type collapse into a single null marker. The non-null
/// members are de-duplicated and kept in a canonical order, so two sets built
/// from the same values in a different order compare and hash equal.
///
/// # Examples
///
/// ```rust
/// use iudex::checks::ValueSet;
///
/// let set = ValueSet::new([Some(3i64), Some(1), None, Some(3)]).unwrap();
/// assert_eq!(set.values().len(), 2);
/// assert!(set.contains_null());
///
/// assert!(ValueSet::new(Vec::<i64>::new()).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ValueSet {
    values: Vec<ScalarValue>,
    contains_null: bool,
}

impl ValueSet {
    /// Builds a value set, failing if no value (not even a null) is given.
    pub fn new<I, V>(values: I) -> Result<Self>
    where
        I: IntoIterator<Item = V>,
        V: Into<ScalarValue>,
    {
        let mut contains_null = false;
        let mut members = Vec::new();
        for value in values {
            let value = value.into();
            if value.is_null() {
                contains_null = true;
            } else {
                members.push(value);
            }
        }

        if members.is_empty() && !contains_null {
            return Err(IudexError::construction(
                "Value set must contain at least one value.",
            ));
        }

        members.sort_by_cached_key(canonical_key);
        members.dedup();

        Ok(Self {
            values: members,
            contains_null,
        })
    }

    /// The non-null members in canonical order.
    pub fn values(&self) -> &[ScalarValue] {
        &self.values
    }

    /// Whether the null marker is a member.
    pub fn contains_null(&self) -> bool {
        self.contains_null
    }

    /// Number of members, counting the null marker.
    pub fn len(&self) -> usize {
        self.values.len() + usize::from(self.contains_null)
    }

    /// Always false; construction rejects empty sets.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Display for ValueSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, value) in self.values.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{value}")?;
        }
        if self.contains_null {
            if !self.values.is_empty() {
                f.write_str(", ")?;
            }
            f.write_str("null")?;
        }
        f.write_str("]")
    }
}

/// Sort key giving scalars a total, type-aware order.
pub(crate) fn canonical_key(value: &ScalarValue) -> String {
    format!("{value:?}")
}
