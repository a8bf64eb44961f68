//! The check algebra.

use super::values::{CompareOp, ValueSet};
use crate::backend::{Backend, MaskSummary, MemoryBackend};
use crate::prelude::*;
use arrow::array::{ArrayRef, BooleanArray};
use datafusion::scalar::ScalarValue;
use std::fmt;
use std::ops::{BitAnd, BitOr};
use tracing::instrument;

/// A composable boolean predicate over a single column.
///
/// Checks are plain values: they hold no backend state, compare and hash by
/// value, and can be shared between fields, schemas and threads. Combinator
/// children are flattened, de-duplicated and kept in canonical order, so
/// `a & b` and `b & a` are the same check.
///
/// Every check evaluates to a per-row boolean that is never null. Null inputs
/// fail the ordering checks; the membership checks resolve them through their
/// null policy (see [`Check::is_in`] and [`Check::not_in`]).
///
/// # Examples
///
/// ```rust
/// use iudex::checks::Check;
/// use arrow::array::{ArrayRef, BooleanArray, Int64Array};
/// use std::sync::Arc;
///
/// let check = Check::greater(0i64) & Check::less(1000i64);
/// assert_eq!(check, Check::less(1000i64) & Check::greater(0i64));
///
/// let column: ArrayRef = Arc::new(Int64Array::from(vec![Some(-1), Some(2), None]));
/// let result = check.evaluate_array(&column).unwrap();
/// assert_eq!(result, BooleanArray::from(vec![false, true, false]));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Check {
    /// Every value is strictly greater than the bound.
    Greater(ScalarValue),
    /// Every value is greater than or equal to the bound.
    GreaterEqual(ScalarValue),
    /// Every value is strictly less than the bound.
    Less(ScalarValue),
    /// Every value is less than or equal to the bound.
    LessEqual(ScalarValue),
    /// Every value is a member of the set.
    IsIn { values: ValueSet, skip_nulls: bool },
    /// No value is a member of the set.
    NotIn { values: ValueSet, skip_nulls: bool },
    /// Every value occurs exactly once in the column.
    Unique,
    /// Every child check passes.
    All(Vec<Check>),
    /// At least one child check passes.
    Any(Vec<Check>),
}

#[derive(Clone, Copy, PartialEq)]
enum Combinator {
    All,
    Any,
}

impl Check {
    /// Values must be strictly greater than `value`.
    pub fn greater(value: impl Into<ScalarValue>) -> Self {
        Check::Greater(value.into())
    }

    /// Values must be greater than or equal to `value`.
    pub fn greater_equal(value: impl Into<ScalarValue>) -> Self {
        Check::GreaterEqual(value.into())
    }

    /// Values must be strictly less than `value`.
    pub fn less(value: impl Into<ScalarValue>) -> Self {
        Check::Less(value.into())
    }

    /// Values must be less than or equal to `value`.
    pub fn less_equal(value: impl Into<ScalarValue>) -> Self {
        Check::LessEqual(value.into())
    }

    /// Values must be members of `values`.
    ///
    /// A null row passes only if the set contains a null marker.
    pub fn is_in<I, V>(values: I) -> Result<Self>
    where
        I: IntoIterator<Item = V>,
        V: Into<ScalarValue>,
    {
        Ok(Check::IsIn {
            values: ValueSet::new(values)?,
            skip_nulls: false,
        })
    }

    /// Like [`Check::is_in`], but null rows always pass.
    pub fn is_in_skip_nulls<I, V>(values: I) -> Result<Self>
    where
        I: IntoIterator<Item = V>,
        V: Into<ScalarValue>,
    {
        Ok(Check::IsIn {
            values: ValueSet::new(values)?,
            skip_nulls: true,
        })
    }

    /// Values must not be members of `values`.
    ///
    /// A null row passes only if the set does not contain a null marker.
    pub fn not_in<I, V>(values: I) -> Result<Self>
    where
        I: IntoIterator<Item = V>,
        V: Into<ScalarValue>,
    {
        Ok(Check::NotIn {
            values: ValueSet::new(values)?,
            skip_nulls: false,
        })
    }

    /// Like [`Check::not_in`], but null rows always pass.
    pub fn not_in_skip_nulls<I, V>(values: I) -> Result<Self>
    where
        I: IntoIterator<Item = V>,
        V: Into<ScalarValue>,
    {
        Ok(Check::NotIn {
            values: ValueSet::new(values)?,
            skip_nulls: true,
        })
    }

    /// Every value must occur exactly once. All occurrences of a repeated
    /// value fail, and nulls count as one value.
    pub fn unique() -> Self {
        Check::Unique
    }

    /// Logical AND of `checks`. Fails on an empty input.
    pub fn all<I>(checks: I) -> Result<Self>
    where
        I: IntoIterator<Item = Check>,
    {
        let checks: Vec<Check> = checks.into_iter().collect();
        if checks.is_empty() {
            return Err(IudexError::construction(
                "All requires at least one check.",
            ));
        }
        Ok(Self::combine(Combinator::All, checks))
    }

    /// Logical OR of `checks`. Fails on an empty input.
    pub fn any<I>(checks: I) -> Result<Self>
    where
        I: IntoIterator<Item = Check>,
    {
        let checks: Vec<Check> = checks.into_iter().collect();
        if checks.is_empty() {
            return Err(IudexError::construction(
                "Any requires at least one check.",
            ));
        }
        Ok(Self::combine(Combinator::Any, checks))
    }

    fn combine(kind: Combinator, checks: Vec<Check>) -> Self {
        let mut children = Vec::with_capacity(checks.len());
        for check in checks {
            match (kind, check) {
                (Combinator::All, Check::All(nested)) | (Combinator::Any, Check::Any(nested)) => {
                    children.extend(nested)
                }
                (_, other) => children.push(other),
            }
        }
        children.sort_by_cached_key(|child| format!("{child:?}"));
        children.dedup();

        match kind {
            Combinator::All => Check::All(children),
            Combinator::Any => Check::Any(children),
        }
    }

    /// Builds the backend mask for this check without executing anything
    /// that requires I/O.
    ///
    /// `NotIn` is planned as the negation of `IsIn` with the null policy
    /// inverted, so both share a single membership primitive.
    pub fn plan<B: Backend>(&self, backend: &B, column: &B::Column) -> Result<B::Mask> {
        match self {
            Check::Greater(value) => backend.compare(column, CompareOp::Gt, value),
            Check::GreaterEqual(value) => backend.compare(column, CompareOp::GtEq, value),
            Check::Less(value) => backend.compare(column, CompareOp::Lt, value),
            Check::LessEqual(value) => backend.compare(column, CompareOp::LtEq, value),
            Check::IsIn { values, skip_nulls } => {
                backend.is_in(column, values, *skip_nulls || values.contains_null())
            }
            Check::NotIn { values, skip_nulls } => {
                let null_passes = *skip_nulls || !values.contains_null();
                let members = backend.is_in(column, values, !null_passes)?;
                backend.not(members)
            }
            Check::Unique => backend.unique(column),
            Check::All(children) => Self::fold(children, backend, column, B::and),
            Check::Any(children) => Self::fold(children, backend, column, B::or),
        }
    }

    fn fold<B, F>(children: &[Check], backend: &B, column: &B::Column, combine: F) -> Result<B::Mask>
    where
        B: Backend,
        F: Fn(&B, B::Mask, B::Mask) -> Result<B::Mask>,
    {
        let mut children = children.iter();
        let first = children.next().ok_or_else(|| {
            IudexError::construction("Combinator requires at least one check.")
        })?;

        let mut mask = first.plan(backend, column)?;
        for child in children {
            mask = combine(backend, mask, child.plan(backend, column)?)?;
        }
        Ok(mask)
    }

    /// Evaluates the check in elementwise mode: one boolean per input row.
    #[instrument(skip(self, backend, column), fields(check = %self, backend = backend.name()))]
    pub async fn evaluate<B: Backend>(&self, backend: &B, column: &B::Column) -> Result<BooleanArray> {
        let mask = self.plan(backend, column)?;
        backend.materialize(column, mask).await
    }

    /// Evaluates the check in aggregate mode, counting failing rows.
    #[instrument(skip(self, backend, column), fields(check = %self, backend = backend.name()))]
    pub async fn summarize<B: Backend>(&self, backend: &B, column: &B::Column) -> Result<MaskSummary> {
        let mask = self.plan(backend, column)?;
        backend.summarize(column, mask).await
    }

    /// Evaluates the check in aggregate mode: true iff every row passes.
    pub async fn passes<B: Backend>(&self, backend: &B, column: &B::Column) -> Result<bool> {
        Ok(self.summarize(backend, column).await?.passed())
    }

    /// Evaluates the check elementwise against an in-memory array.
    pub fn evaluate_array(&self, column: &ArrayRef) -> Result<BooleanArray> {
        self.plan(&MemoryBackend, column)
    }
}

impl BitAnd for Check {
    type Output = Check;

    fn bitand(self, rhs: Check) -> Check {
        Check::combine(Combinator::All, vec![self, rhs])
    }
}

impl BitOr for Check {
    type Output = Check;

    fn bitor(self, rhs: Check) -> Check {
        Check::combine(Combinator::Any, vec![self, rhs])
    }
}

impl fmt::Display for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Check::Greater(value) => write!(f, "{}({value})", CompareOp::Gt),
            Check::GreaterEqual(value) => write!(f, "{}({value})", CompareOp::GtEq),
            Check::Less(value) => write!(f, "{}({value})", CompareOp::Lt),
            Check::LessEqual(value) => write!(f, "{}({value})", CompareOp::LtEq),
            Check::IsIn { values, skip_nulls } => {
                write!(f, "is_in({values}")?;
                if *skip_nulls {
                    f.write_str(", skip_nulls")?;
                }
                f.write_str(")")
            }
            Check::NotIn { values, skip_nulls } => {
                write!(f, "not_in({values}")?;
                if *skip_nulls {
                    f.write_str(", skip_nulls")?;
                }
                f.write_str(")")
            }
            Check::Unique => f.write_str("unique()"),
            Check::All(children) => write_joined(f, children, " AND "),
            Check::Any(children) => write_joined(f, children, " OR "),
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, children: &[Check], separator: &str) -> fmt::Result {
    f.write_str("(")?;
    for (i, child) in children.iter().enumerate() {
        if i > 0 {
            f.write_str(separator)?;
        }
        write!(f, "{child}")?;
    }
    f.write_str(")")
}
