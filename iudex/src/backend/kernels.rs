//! Arrow compute kernels shared by the in-memory and streaming backends.
//!
//! Everything here works on a single materialized array. The streaming
//! backend calls the same functions once per chunk, which is what keeps the
//! two backends in agreement.

use crate::checks::{CompareOp, ValueSet};
use crate::prelude::*;
use arrow::array::{Array, ArrayRef, BooleanArray, RecordBatch};
use arrow::buffer::BooleanBuffer;
use arrow::compute::kernels::cmp;
use arrow::compute::{cast_with_options, CastOptions};
use arrow::datatypes::{DataType, Field, SchemaRef};
use arrow::row::{RowConverter, SortField};
use datafusion::scalar::ScalarValue;
use std::collections::HashMap;

/// How a check parameter is brought to the column's type before comparing.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Alignment {
    /// Either side is null; every comparison yields null.
    Null,
    /// Compare the column against this scalar as-is.
    Scalar(ScalarValue),
    /// Cast both sides to `Float64`.
    Widen(ScalarValue),
}

fn is_string(data_type: &DataType) -> bool {
    matches!(
        data_type,
        DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View
    )
}

/// Decides how `value` is compared against a column of `column_type`.
///
/// Numeric operands are compared in the column's type when the scalar
/// survives a round trip through it, and as `Float64` otherwise, so
/// `int_column > 0.5` does not silently become `int_column > 0`.
pub(crate) fn align(column_type: &DataType, value: &ScalarValue) -> Result<Alignment> {
    if value.is_null() || column_type == &DataType::Null {
        return Ok(Alignment::Null);
    }

    let value_type = value.data_type();
    if &value_type == column_type {
        return Ok(Alignment::Scalar(value.clone()));
    }

    if column_type.is_numeric() && value_type.is_numeric() {
        if let Ok(cast) = value.cast_to(column_type) {
            if cast.cast_to(&value_type).ok().as_ref() == Some(value) {
                return Ok(Alignment::Scalar(cast));
            }
        }
        return Ok(Alignment::Widen(value.cast_to(&DataType::Float64)?));
    }

    let compatible = (is_string(column_type) && is_string(&value_type))
        || (is_string(&value_type) && column_type.is_temporal())
        || (column_type.is_temporal() && value_type.is_temporal());
    if compatible {
        if let Ok(cast) = value.cast_to(column_type) {
            return Ok(Alignment::Scalar(cast));
        }
    }

    Err(IudexError::type_mismatch(column_type, value_type))
}

/// Fails with [`IudexError::TypeMismatch`] if `value` cannot be compared
/// with a column of `column_type`.
pub(crate) fn ensure_comparable(column_type: &DataType, value: &ScalarValue) -> Result<()> {
    align(column_type, value).map(|_| ())
}

/// Replaces nulls in a mask with `null_value`.
pub fn resolve_nulls(mask: &BooleanArray, null_value: bool) -> BooleanArray {
    match mask.nulls() {
        None => mask.clone(),
        Some(nulls) => {
            let values = if null_value {
                let invalid = !nulls.inner();
                mask.values() | &invalid
            } else {
                mask.values() & nulls.inner()
            };
            BooleanArray::new(values, None)
        }
    }
}

/// A mask of `len` rows that all have the same outcome.
pub fn constant_mask(len: usize, value: bool) -> BooleanArray {
    let values = if value {
        BooleanBuffer::new_set(len)
    } else {
        BooleanBuffer::new_unset(len)
    };
    BooleanArray::new(values, None)
}

/// Compares every element of `array` against `value`. Nulls fail.
pub fn compare(array: &ArrayRef, op: CompareOp, value: &ScalarValue) -> Result<BooleanArray> {
    let (left, right) = match align(array.data_type(), value)? {
        Alignment::Null => return Ok(constant_mask(array.len(), false)),
        Alignment::Scalar(scalar) => (array.clone(), scalar),
        Alignment::Widen(scalar) => (arrow::compute::cast(array, &DataType::Float64)?, scalar),
    };
    let right = right.to_scalar()?;

    let raw = match op {
        CompareOp::Gt => cmp::gt(&left, &right)?,
        CompareOp::GtEq => cmp::gt_eq(&left, &right)?,
        CompareOp::Lt => cmp::lt(&left, &right)?,
        CompareOp::LtEq => cmp::lt_eq(&left, &right)?,
    };
    Ok(resolve_nulls(&raw, false))
}

/// Tests every element of `array` for membership in `values`.
///
/// Non-null rows pass on exact equality with a member; null rows take
/// `null_passes`.
pub fn is_in(array: &ArrayRef, values: &ValueSet, null_passes: bool) -> Result<BooleanArray> {
    let mut hits = constant_mask(array.len(), false);
    for value in values.values() {
        let (left, right) = match align(array.data_type(), value)? {
            Alignment::Null => continue,
            Alignment::Scalar(scalar) => (array.clone(), scalar),
            Alignment::Widen(scalar) => {
                (arrow::compute::cast(array, &DataType::Float64)?, scalar)
            }
        };
        let equal = cmp::eq(&left, &right.to_scalar()?)?;
        hits = arrow::compute::or(&hits, &resolve_nulls(&equal, false))?;
    }

    let Some(nulls) = array.logical_nulls() else {
        return Ok(hits);
    };
    let values = if null_passes {
        let invalid = !nulls.inner();
        hits.values() | &invalid
    } else {
        hits.values() & nulls.inner()
    };
    Ok(BooleanArray::new(values, None))
}

/// Occurrence counts of every distinct value seen in one or more arrays.
///
/// Values are keyed by their Arrow row encoding, so any type the row format
/// supports can be counted, and all nulls share one key.
#[derive(Debug)]
pub struct ValueCounts {
    converter: RowConverter,
    counts: HashMap<Box<[u8]>, usize>,
}

impl ValueCounts {
    /// Creates an empty counter for values of `data_type`.
    /// Fails with [`IudexError::NotSupported`] for types the row format
    /// cannot encode.
    pub fn new(data_type: &DataType) -> Result<Self> {
        let fields = vec![SortField::new(data_type.clone())];
        if !RowConverter::supports_fields(&fields) {
            return Err(IudexError::NotSupported(format!(
                "unique over {data_type} columns"
            )));
        }
        Ok(Self {
            converter: RowConverter::new(fields)?,
            counts: HashMap::new(),
        })
    }

    /// Counts the values of a whole array.
    pub fn from_array(array: &ArrayRef) -> Result<Self> {
        let mut counts = Self::new(array.data_type())?;
        counts.observe(array)?;
        Ok(counts)
    }

    /// Adds the values of `array` to the counts.
    pub fn observe(&mut self, array: &ArrayRef) -> Result<()> {
        let rows = self.converter.convert_columns(&[array.clone()])?;
        for row in rows.iter() {
            *self.counts.entry(row.as_ref().into()).or_default() += 1;
        }
        Ok(())
    }

    /// Number of distinct values seen so far.
    pub fn distinct(&self) -> usize {
        self.counts.len()
    }

    /// True for every element of `array` whose value was counted exactly once.
    pub fn unique_mask(&self, array: &ArrayRef) -> Result<BooleanArray> {
        let rows = self.converter.convert_columns(&[array.clone()])?;
        Ok(rows
            .iter()
            .map(|row| Some(self.counts.get(row.as_ref()) == Some(&1)))
            .collect())
    }
}

/// Flags elements whose value occurs exactly once in `array`.
pub fn unique(array: &ArrayRef) -> Result<BooleanArray> {
    ValueCounts::from_array(array)?.unique_mask(array)
}

/// Casts a column to `target`, rejecting any cast that loses information.
///
/// The cast runs with overflow checking, and the result must cast back to
/// the source type without changing a single value. A non-nullable target
/// rejects columns that contain nulls.
pub fn cast_column(array: &ArrayRef, target: &Field) -> Result<ArrayRef> {
    let field = target.name();
    let cast = if array.data_type() == target.data_type() {
        array.clone()
    } else {
        let options = CastOptions {
            safe: false,
            ..Default::default()
        };
        let cast = cast_with_options(array, target.data_type(), &options)
            .map_err(|e| IudexError::cast(field, e.to_string()))?;
        let back = cast_with_options(&cast, array.data_type(), &options)
            .map_err(|e| IudexError::cast(field, e.to_string()))?;

        let lost = cmp::not_distinct(array, &back)?.false_count();
        if lost > 0 {
            return Err(IudexError::cast(
                field,
                format!(
                    "{lost} values cannot be represented as {} without loss",
                    target.data_type()
                ),
            ));
        }
        cast
    };

    if !target.is_nullable() && cast.logical_null_count() > 0 {
        return Err(IudexError::cast(
            field,
            format!(
                "{} null values in a non-nullable field",
                cast.logical_null_count()
            ),
        ));
    }
    Ok(cast)
}

/// Projects `batch` onto the fields of `target` (in `target`'s order) and
/// casts each column with [`cast_column`].
pub fn cast_batch(batch: &RecordBatch, target: &SchemaRef) -> Result<RecordBatch> {
    let columns = target
        .fields()
        .iter()
        .map(|field| {
            let array = batch
                .column_by_name(field.name())
                .ok_or_else(|| IudexError::cast(field.name(), "column is missing"))?;
            cast_column(array, field)
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(RecordBatch::try_new(target.clone(), columns)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Float32Array, Float64Array, Int32Array, Int64Array, StringArray};
    use arrow::datatypes::{Schema, UnionFields, UnionMode};
    use std::sync::Arc;

    #[test]
    fn test_align_same_type() {
        let aligned = align(&DataType::Int64, &ScalarValue::Int64(Some(1))).unwrap();
        assert_eq!(aligned, Alignment::Scalar(ScalarValue::Int64(Some(1))));
    }

    #[test]
    fn test_align_lossless_numeric() {
        let aligned = align(&DataType::Float32, &ScalarValue::Int64(Some(3))).unwrap();
        assert_eq!(aligned, Alignment::Scalar(ScalarValue::Float32(Some(3.0))));
    }

    #[test]
    fn test_align_widens_lossy_numeric() {
        let aligned = align(&DataType::Int64, &ScalarValue::Float64(Some(0.5))).unwrap();
        assert_eq!(aligned, Alignment::Widen(ScalarValue::Float64(Some(0.5))));
    }

    #[test]
    fn test_align_nulls() {
        assert_eq!(
            align(&DataType::Int64, &ScalarValue::Int64(None)).unwrap(),
            Alignment::Null
        );
        assert_eq!(
            align(&DataType::Null, &ScalarValue::Int64(Some(1))).unwrap(),
            Alignment::Null
        );
    }

    #[test]
    fn test_align_rejects_incompatible() {
        assert!(align(&DataType::Utf8, &ScalarValue::Int64(Some(1))).is_err());
        assert!(align(&DataType::Int64, &ScalarValue::from("1")).is_err());
    }

    #[test]
    fn test_resolve_nulls() {
        let mask = BooleanArray::from(vec![Some(true), None, Some(false)]);
        assert_eq!(
            resolve_nulls(&mask, false),
            BooleanArray::from(vec![true, false, false])
        );
        assert_eq!(
            resolve_nulls(&mask, true),
            BooleanArray::from(vec![true, true, false])
        );
    }

    #[test]
    fn test_compare_against_null_bound() {
        let array: ArrayRef = Arc::new(Int64Array::from(vec![1, 2]));
        let mask = compare(&array, CompareOp::Gt, &ScalarValue::Int64(None)).unwrap();
        assert_eq!(mask, BooleanArray::from(vec![false, false]));
    }

    #[test]
    fn test_float32_column_against_float64_bound() {
        let array: ArrayRef = Arc::new(Float32Array::from(vec![0.1, 0.2]));
        let mask = compare(&array, CompareOp::Gt, &ScalarValue::Float64(Some(0.1))).unwrap();
        // 0.1f32 widens to 0.10000000149, which is above 0.1f64.
        assert_eq!(mask, BooleanArray::from(vec![true, true]));
    }

    #[test]
    fn test_is_in_on_null_column() {
        let array: ArrayRef = Arc::new(arrow::array::NullArray::new(2));
        let values = ValueSet::new([1i64]).unwrap();
        assert_eq!(
            is_in(&array, &values, true).unwrap(),
            BooleanArray::from(vec![true, true])
        );
        assert_eq!(
            is_in(&array, &values, false).unwrap(),
            BooleanArray::from(vec![false, false])
        );
    }

    #[test]
    fn test_value_counts_across_chunks() {
        let first: ArrayRef = Arc::new(StringArray::from(vec![Some("a"), None, Some("b")]));
        let second: ArrayRef = Arc::new(StringArray::from(vec![Some("b"), Some("c")]));

        let mut counts = ValueCounts::new(&DataType::Utf8).unwrap();
        counts.observe(&first).unwrap();
        counts.observe(&second).unwrap();
        assert_eq!(counts.distinct(), 4);

        assert_eq!(
            counts.unique_mask(&first).unwrap(),
            BooleanArray::from(vec![true, true, false])
        );
        assert_eq!(
            counts.unique_mask(&second).unwrap(),
            BooleanArray::from(vec![false, true])
        );
    }

    #[test]
    fn test_value_counts_rejects_unencodable_types() {
        let candidates = [
            DataType::Union(UnionFields::empty(), UnionMode::Sparse),
            DataType::ListView(Arc::new(Field::new_list_field(DataType::Int64, true))),
        ];
        let unsupported: Vec<_> = candidates
            .iter()
            .filter(|t| !RowConverter::supports_fields(&[SortField::new((*t).clone())]))
            .collect();
        assert!(!unsupported.is_empty());
        for data_type in unsupported {
            let err = ValueCounts::new(data_type).unwrap_err();
            assert!(matches!(err, IudexError::NotSupported(_)));
        }
    }

    #[test]
    fn test_unique_groups_nulls() {
        let array: ArrayRef = Arc::new(Int64Array::from(vec![None, Some(1), None]));
        assert_eq!(
            unique(&array).unwrap(),
            BooleanArray::from(vec![false, true, false])
        );
    }

    #[test]
    fn test_cast_column_lossless() {
        let array: ArrayRef = Arc::new(Float64Array::from(vec![4.0, 5.0]));
        let target = Field::new("b", DataType::Float32, true);
        let cast = cast_column(&array, &target).unwrap();
        assert_eq!(cast.data_type(), &DataType::Float32);
    }

    #[test]
    fn test_cast_column_rejects_truncation() {
        let array: ArrayRef = Arc::new(Float64Array::from(vec![1.0, 1.5]));
        let target = Field::new("a", DataType::Int64, true);
        let err = cast_column(&array, &target).unwrap_err();
        assert!(err.is_cast_error());
        assert_eq!(err.field(), Some("a"));
    }

    #[test]
    fn test_cast_column_rejects_overflow() {
        let array: ArrayRef = Arc::new(Int64Array::from(vec![1, i64::MAX]));
        let target = Field::new("a", DataType::Int32, true);
        assert!(cast_column(&array, &target).unwrap_err().is_cast_error());
    }

    #[test]
    fn test_cast_column_rejects_nulls_for_required_field() {
        let array: ArrayRef = Arc::new(Int32Array::from(vec![Some(1), None]));
        let target = Field::new("a", DataType::Int64, false);
        assert!(cast_column(&array, &target).unwrap_err().is_cast_error());
    }

    #[test]
    fn test_cast_batch_reorders_and_tightens_nullability() {
        let batch = RecordBatch::try_from_iter(vec![
            (
                "b",
                Arc::new(Float64Array::from(vec![4.0, 5.0])) as ArrayRef,
            ),
            ("a", Arc::new(Int32Array::from(vec![1, 2])) as ArrayRef),
        ])
        .unwrap();
        let target = Arc::new(Schema::new(vec![
            Field::new("a", DataType::Int64, false),
            Field::new("b", DataType::Float32, true),
        ]));

        let cast = cast_batch(&batch, &target).unwrap();
        assert_eq!(cast.schema(), target);
        assert_eq!(cast.num_rows(), 2);
    }

    #[test]
    fn test_cast_batch_missing_column() {
        let batch = RecordBatch::try_from_iter(vec![(
            "a",
            Arc::new(Int32Array::from(vec![1])) as ArrayRef,
        )])
        .unwrap();
        let target = Arc::new(Schema::new(vec![Field::new("z", DataType::Int32, true)]));
        let err = cast_batch(&batch, &target).unwrap_err();
        assert_eq!(err.field(), Some("z"));
    }
}
