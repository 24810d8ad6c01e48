//! In-memory columnar accumulator.
//!
//! A [`Frame`] holds coerced rows column-wise between flushes, plus the
//! derived partition values when partitioning is configured. Row order is
//! preserved by every operation here, and the row-boundary operations
//! (append, split, partition extraction, splice) are what the engine's
//! conservation guarantee rests on.
//!
//! The memory accounting model is deliberately simple: fixed-width columns
//! cost their width per row, text columns cost a pointer-sized overhead per
//! row plus the string bytes. Flush decisions key off this number, so it has
//! to be cheap and deterministic rather than exact.

use std::fmt::Write as _;
use std::sync::Arc;

use arrow::array::{
    ArrayRef, Float32Array, Float64Array, Int8Array, Int32Array, Int64Array, StringArray,
    TimestampMillisecondArray,
};
use chrono::DateTime;

use crate::coerce;
use crate::config::{IntWidth, PrimitiveTag, TypeSpec};
use crate::error::{CoerceError, EtlError, Result};

const DEFAULT_STAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ============================================================================
// ColumnData
// ============================================================================

/// One column's values in their in-memory representation. Nullable integers
/// live in `Float64` until output; datetimes live at second precision.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Int8(Vec<i8>),
    Int16(Vec<i16>),
    Int32(Vec<i32>),
    Int64(Vec<i64>),
    Float32(Vec<Option<f32>>),
    Float64(Vec<Option<f64>>),
    Utf8(Vec<Option<String>>),
    TimestampSec(Vec<Option<i64>>),
}

impl ColumnData {
    fn len(&self) -> usize {
        match self {
            Self::Int8(v) => v.len(),
            Self::Int16(v) => v.len(),
            Self::Int32(v) => v.len(),
            Self::Int64(v) => v.len(),
            Self::Float32(v) => v.len(),
            Self::Float64(v) => v.len(),
            Self::Utf8(v) => v.len(),
            Self::TimestampSec(v) => v.len(),
        }
    }

    fn byte_size(&self) -> usize {
        match self {
            Self::Int8(v) => v.len(),
            Self::Int16(v) => 2 * v.len(),
            Self::Int32(v) => 4 * v.len(),
            Self::Int64(v) => 8 * v.len(),
            Self::Float32(v) => 4 * v.len(),
            Self::Float64(v) => 8 * v.len(),
            Self::TimestampSec(v) => 8 * v.len(),
            Self::Utf8(v) => 8 * v.len() + v.iter().flatten().map(String::len).sum::<usize>(),
        }
    }

    fn append(&mut self, other: Self) {
        match (self, other) {
            (Self::Int8(a), Self::Int8(mut b)) => a.append(&mut b),
            (Self::Int16(a), Self::Int16(mut b)) => a.append(&mut b),
            (Self::Int32(a), Self::Int32(mut b)) => a.append(&mut b),
            (Self::Int64(a), Self::Int64(mut b)) => a.append(&mut b),
            (Self::Float32(a), Self::Float32(mut b)) => a.append(&mut b),
            (Self::Float64(a), Self::Float64(mut b)) => a.append(&mut b),
            (Self::Utf8(a), Self::Utf8(mut b)) => a.append(&mut b),
            (Self::TimestampSec(a), Self::TimestampSec(mut b)) => a.append(&mut b),
            _ => debug_assert!(false, "mismatched column layouts"),
        }
    }

    fn split_off(&mut self, at: usize) -> Self {
        match self {
            Self::Int8(v) => Self::Int8(v.split_off(at)),
            Self::Int16(v) => Self::Int16(v.split_off(at)),
            Self::Int32(v) => Self::Int32(v.split_off(at)),
            Self::Int64(v) => Self::Int64(v.split_off(at)),
            Self::Float32(v) => Self::Float32(v.split_off(at)),
            Self::Float64(v) => Self::Float64(v.split_off(at)),
            Self::Utf8(v) => Self::Utf8(v.split_off(at)),
            Self::TimestampSec(v) => Self::TimestampSec(v.split_off(at)),
        }
    }

    fn take_where(&mut self, mask: &[bool]) -> Self {
        match self {
            Self::Int8(v) => Self::Int8(split_by_mask(v, mask)),
            Self::Int16(v) => Self::Int16(split_by_mask(v, mask)),
            Self::Int32(v) => Self::Int32(split_by_mask(v, mask)),
            Self::Int64(v) => Self::Int64(split_by_mask(v, mask)),
            Self::Float32(v) => Self::Float32(split_by_mask(v, mask)),
            Self::Float64(v) => Self::Float64(split_by_mask(v, mask)),
            Self::Utf8(v) => Self::Utf8(split_by_mask(v, mask)),
            Self::TimestampSec(v) => Self::TimestampSec(split_by_mask(v, mask)),
        }
    }

    fn insert_rows(&mut self, at: usize, other: Self) {
        match (self, other) {
            (Self::Int8(dst), Self::Int8(src)) => insert_values(dst, at, src),
            (Self::Int16(dst), Self::Int16(src)) => insert_values(dst, at, src),
            (Self::Int32(dst), Self::Int32(src)) => insert_values(dst, at, src),
            (Self::Int64(dst), Self::Int64(src)) => insert_values(dst, at, src),
            (Self::Float32(dst), Self::Float32(src)) => insert_values(dst, at, src),
            (Self::Float64(dst), Self::Float64(src)) => insert_values(dst, at, src),
            (Self::Utf8(dst), Self::Utf8(src)) => insert_values(dst, at, src),
            (Self::TimestampSec(dst), Self::TimestampSec(src)) => insert_values(dst, at, src),
            _ => debug_assert!(false, "mismatched column layouts"),
        }
    }
}

fn split_by_mask<T>(values: &mut Vec<T>, mask: &[bool]) -> Vec<T> {
    let mut taken = Vec::new();
    let mut kept = Vec::with_capacity(values.len());
    for (value, take) in values.drain(..).zip(mask) {
        if *take {
            taken.push(value);
        } else {
            kept.push(value);
        }
    }
    *values = kept;
    taken
}

fn insert_values<T>(dst: &mut Vec<T>, at: usize, src: Vec<T>) {
    for (offset, value) in src.into_iter().enumerate() {
        dst.insert(at + offset, value);
    }
}

// ============================================================================
// Frame
// ============================================================================

/// Columnar row buffer with an optional derived partition column.
#[derive(Debug, Clone, Default)]
pub struct Frame {
    pub(crate) columns: Vec<ColumnData>,
    pub(crate) partition: Option<Vec<String>>,
}

impl Frame {
    /// Coerce parsed text records into typed columns, in schema order.
    ///
    /// # Errors
    ///
    /// Fails when a record has the wrong width or a cell refuses its
    /// declared type.
    pub fn from_records(records: &[Vec<String>], schema: &[(String, TypeSpec)]) -> Result<Self> {
        for record in records {
            if record.len() != schema.len() {
                return Err(CoerceError::RowWidth {
                    expected: schema.len(),
                    found: record.len(),
                }
                .into());
            }
        }
        let mut columns = Vec::with_capacity(schema.len());
        for (idx, (name, spec)) in schema.iter().enumerate() {
            let column = match spec {
                TypeSpec::Primitive(PrimitiveTag::Int8) => ColumnData::Int8(
                    records
                        .iter()
                        .map(|r| coerce::int8_cell(name, &r[idx]))
                        .collect::<std::result::Result<_, _>>()?,
                ),
                TypeSpec::Primitive(PrimitiveTag::Int16) => ColumnData::Int16(
                    records
                        .iter()
                        .map(|r| coerce::int16_cell(name, &r[idx]))
                        .collect::<std::result::Result<_, _>>()?,
                ),
                TypeSpec::Primitive(PrimitiveTag::Int32) => ColumnData::Int32(
                    records
                        .iter()
                        .map(|r| coerce::int32_cell(name, &r[idx]))
                        .collect::<std::result::Result<_, _>>()?,
                ),
                TypeSpec::Primitive(PrimitiveTag::Int64) => ColumnData::Int64(
                    records
                        .iter()
                        .map(|r| coerce::int64_cell(name, &r[idx]))
                        .collect::<std::result::Result<_, _>>()?,
                ),
                TypeSpec::Primitive(PrimitiveTag::Float32) => ColumnData::Float32(
                    records
                        .iter()
                        .map(|r| coerce::float32_cell(name, &r[idx]))
                        .collect::<std::result::Result<_, _>>()?,
                ),
                TypeSpec::Primitive(PrimitiveTag::Float64) => ColumnData::Float64(
                    records
                        .iter()
                        .map(|r| coerce::float64_cell(name, &r[idx]))
                        .collect::<std::result::Result<_, _>>()?,
                ),
                TypeSpec::Primitive(PrimitiveTag::Utf8 | PrimitiveTag::Category) => {
                    ColumnData::Utf8(records.iter().map(|r| utf8_value(&r[idx])).collect())
                }
                TypeSpec::NullableInt(_) => ColumnData::Float64(
                    records
                        .iter()
                        .map(|r| coerce::nullable_int_cell(name, &r[idx]))
                        .collect::<std::result::Result<_, _>>()?,
                ),
                TypeSpec::DateTime(format) => ColumnData::TimestampSec(
                    records
                        .iter()
                        .map(|r| coerce::datetime_cell(name, &r[idx], format))
                        .collect::<std::result::Result<_, _>>()?,
                ),
                TypeSpec::Undefined(descriptor) => {
                    return Err(crate::error::SchemaError::UndefinedType {
                        column: name.clone(),
                        descriptor: descriptor.clone(),
                    }
                    .into());
                }
            };
            columns.push(column);
        }
        Ok(Self {
            columns,
            partition: None,
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.first().map_or(0, ColumnData::len)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Estimated resident size in bytes under the fixed accounting model.
    #[must_use]
    pub fn byte_size(&self) -> usize {
        let mut total: usize = self.columns.iter().map(ColumnData::byte_size).sum();
        if let Some(values) = &self.partition {
            total += 8 * values.len() + values.iter().map(String::len).sum::<usize>();
        }
        total
    }

    /// Append another frame's rows after this frame's rows. An empty frame
    /// adopts the other frame's layout wholesale.
    pub fn append(&mut self, other: Frame) {
        if self.columns.is_empty() {
            *self = other;
            return;
        }
        debug_assert_eq!(self.columns.len(), other.columns.len());
        for (dst, src) in self.columns.iter_mut().zip(other.columns) {
            dst.append(src);
        }
        match (&mut self.partition, other.partition) {
            (Some(dst), Some(mut src)) => dst.append(&mut src),
            (None, None) => {}
            _ => debug_assert!(false, "mismatched partition layouts"),
        }
    }

    /// Truncate this frame to its first `at` rows and return the rest.
    pub fn split_rows(&mut self, at: usize) -> Frame {
        let columns = self.columns.iter_mut().map(|c| c.split_off(at)).collect();
        let partition = self.partition.as_mut().map(|p| p.split_off(at));
        Frame { columns, partition }
    }

    /// Extract every row whose partition value equals `value`, preserving
    /// relative order on both sides. A frame without partition values
    /// yields nothing.
    pub fn take_partition(&mut self, value: &str) -> Frame {
        let mask: Vec<bool> = match &self.partition {
            Some(values) => values.iter().map(|v| v == value).collect(),
            None => return Frame::default(),
        };
        let columns = self
            .columns
            .iter_mut()
            .map(|c| c.take_where(&mask))
            .collect();
        let partition = self.partition.as_mut().map(|p| split_by_mask(p, &mask));
        Frame { columns, partition }
    }

    /// Distinct partition values in first-seen row order.
    #[must_use]
    pub fn distinct_partitions(&self) -> Vec<String> {
        let mut seen: Vec<String> = Vec::new();
        if let Some(values) = &self.partition {
            for value in values {
                if !seen.iter().any(|s| s == value) {
                    seen.push(value.clone());
                }
            }
        }
        seen
    }

    /// Insert another frame's rows at `index`, clamped to the row count.
    /// Splicing happens before partition derivation, so neither side
    /// carries partition values yet.
    pub fn splice(&mut self, index: usize, other: Frame) {
        debug_assert!(self.partition.is_none() && other.partition.is_none());
        let at = index.min(self.len());
        for (dst, src) in self.columns.iter_mut().zip(other.columns) {
            dst.insert_rows(at, src);
        }
    }

    /// Derive the partition value for every row from the column at `index`.
    ///
    /// Timestamp sources are rendered with `date_format` when given, or a
    /// second-precision default. Any other source must come without a
    /// format and is rendered verbatim.
    ///
    /// # Errors
    ///
    /// Fails when a source cell is null, when a format is supplied for a
    /// non-timestamp source, or when the format itself cannot render.
    pub fn derive_partition(
        &mut self,
        index: usize,
        column: &str,
        date_format: Option<&str>,
    ) -> Result<()> {
        let Some(data) = self.columns.get(index) else {
            return Err(EtlError::InvalidState("partition source column out of range"));
        };
        let values = match (data, date_format) {
            (ColumnData::TimestampSec(cells), format) => {
                let format = format.unwrap_or(DEFAULT_STAMP_FORMAT);
                let mut out = Vec::with_capacity(cells.len());
                for cell in cells {
                    let Some(seconds) = cell else {
                        return Err(null_partition(column));
                    };
                    let Some(stamp) = DateTime::from_timestamp(*seconds, 0) else {
                        return Err(bad_format(column, format));
                    };
                    let mut text = String::new();
                    if write!(text, "{}", stamp.format(format)).is_err() {
                        return Err(bad_format(column, format));
                    }
                    out.push(text);
                }
                out
            }
            (_, Some(format)) => return Err(bad_format(column, format)),
            (ColumnData::Utf8(cells), None) => {
                let mut out = Vec::with_capacity(cells.len());
                for cell in cells {
                    match cell {
                        Some(text) => out.push(text.clone()),
                        None => return Err(null_partition(column)),
                    }
                }
                out
            }
            (ColumnData::Int8(cells), None) => cells.iter().map(ToString::to_string).collect(),
            (ColumnData::Int16(cells), None) => cells.iter().map(ToString::to_string).collect(),
            (ColumnData::Int32(cells), None) => cells.iter().map(ToString::to_string).collect(),
            (ColumnData::Int64(cells), None) => cells.iter().map(ToString::to_string).collect(),
            (ColumnData::Float32(cells), None) => {
                let mut out = Vec::with_capacity(cells.len());
                for cell in cells {
                    match cell {
                        Some(value) => out.push(value.to_string()),
                        None => return Err(null_partition(column)),
                    }
                }
                out
            }
            (ColumnData::Float64(cells), None) => {
                let mut out = Vec::with_capacity(cells.len());
                for cell in cells {
                    match cell {
                        Some(value) => out.push(value.to_string()),
                        None => return Err(null_partition(column)),
                    }
                }
                out
            }
        };
        self.partition = Some(values);
        Ok(())
    }

    /// Materialize the columns as Arrow arrays in schema order. Nullable
    /// integers take their declared output width here. Partition values are
    /// not materialized; they surface only in the artifact key.
    ///
    /// # Errors
    ///
    /// Fails when the layout does not match the schema or a nullable
    /// integer cell is not exactly representable at its output width.
    pub fn to_arrays(&self, schema: &[(String, TypeSpec)]) -> Result<Vec<ArrayRef>> {
        if self.columns.len() != schema.len() {
            return Err(EtlError::InvalidState(
                "column count does not match the declared schema",
            ));
        }
        let mut arrays: Vec<ArrayRef> = Vec::with_capacity(schema.len());
        for (column, (name, spec)) in self.columns.iter().zip(schema) {
            let array: ArrayRef = match (column, spec) {
                (ColumnData::Int8(v), TypeSpec::Primitive(PrimitiveTag::Int8)) => {
                    Arc::new(Int8Array::from(v.clone()))
                }
                (ColumnData::Int16(v), TypeSpec::Primitive(PrimitiveTag::Int16)) => Arc::new(
                    Int32Array::from(v.iter().map(|&x| i32::from(x)).collect::<Vec<_>>()),
                ),
                (ColumnData::Int32(v), TypeSpec::Primitive(PrimitiveTag::Int32)) => {
                    Arc::new(Int32Array::from(v.clone()))
                }
                (ColumnData::Int64(v), TypeSpec::Primitive(PrimitiveTag::Int64)) => {
                    Arc::new(Int64Array::from(v.clone()))
                }
                (ColumnData::Float32(v), TypeSpec::Primitive(PrimitiveTag::Float32)) => {
                    Arc::new(Float32Array::from(v.clone()))
                }
                (ColumnData::Float64(v), TypeSpec::Primitive(PrimitiveTag::Float64)) => {
                    Arc::new(Float64Array::from(v.clone()))
                }
                (
                    ColumnData::Utf8(v),
                    TypeSpec::Primitive(PrimitiveTag::Utf8 | PrimitiveTag::Category),
                ) => Arc::new(StringArray::from(v.clone())),
                (ColumnData::Float64(v), TypeSpec::NullableInt(width)) => match width {
                    IntWidth::W8 => Arc::new(Int8Array::from(nullable_ints::<i8>(name, v, "int8")?)),
                    IntWidth::W16 => {
                        Arc::new(Int32Array::from(nullable_ints::<i32>(name, v, "int16")?))
                    }
                    IntWidth::W32 => {
                        Arc::new(Int32Array::from(nullable_ints::<i32>(name, v, "int32")?))
                    }
                    IntWidth::W64 => {
                        Arc::new(Int64Array::from(nullable_ints::<i64>(name, v, "int64")?))
                    }
                },
                (ColumnData::TimestampSec(v), TypeSpec::DateTime(_)) => {
                    Arc::new(TimestampMillisecondArray::from(
                        v.iter().map(|c| c.map(|s| s * 1000)).collect::<Vec<_>>(),
                    ))
                }
                _ => {
                    return Err(EtlError::InvalidState(
                        "column data does not match the declared schema",
                    ));
                }
            };
            arrays.push(array);
        }
        Ok(arrays)
    }
}

fn utf8_value(raw: &str) -> Option<String> {
    if raw.is_empty() {
        None
    } else {
        Some(raw.to_string())
    }
}

fn nullable_ints<T: TryFrom<i64>>(
    column: &str,
    values: &[Option<f64>],
    target: &'static str,
) -> std::result::Result<Vec<Option<T>>, CoerceError> {
    values
        .iter()
        .map(|cell| match cell {
            None => Ok(None),
            Some(f) => {
                if f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64 {
                    if let Ok(v) = T::try_from(*f as i64) {
                        return Ok(Some(v));
                    }
                }
                Err(CoerceError::Cast {
                    column: column.to_string(),
                    value: f.to_string(),
                    target,
                })
            }
        })
        .collect()
}

fn null_partition(column: &str) -> EtlError {
    CoerceError::NullPartition {
        column: column.to_string(),
    }
    .into()
}

fn bad_format(column: &str, format: &str) -> EtlError {
    CoerceError::DateFormat {
        column: column.to_string(),
        format: format.to_string(),
    }
    .into()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn schema(entries: &[(&str, TypeSpec)]) -> Vec<(String, TypeSpec)> {
        entries
            .iter()
            .map(|(name, spec)| ((*name).to_string(), spec.clone()))
            .collect()
    }

    fn record(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| (*c).to_string()).collect()
    }

    fn two_column_schema() -> Vec<(String, TypeSpec)> {
        schema(&[
            ("name", TypeSpec::Primitive(PrimitiveTag::Utf8)),
            ("v", TypeSpec::Primitive(PrimitiveTag::Int64)),
        ])
    }

    #[test]
    fn from_records_builds_typed_columns() {
        let schema = schema(&[
            ("name", TypeSpec::Primitive(PrimitiveTag::Utf8)),
            ("count", TypeSpec::Primitive(PrimitiveTag::Int16)),
            ("score", TypeSpec::Primitive(PrimitiveTag::Float64)),
        ]);
        let records = vec![record(&["ada", "3", "1.5"]), record(&["", "4", ""])];
        let frame = Frame::from_records(&records, &schema).unwrap();
        assert_eq!(frame.len(), 2);
        assert_eq!(
            frame.columns[0],
            ColumnData::Utf8(vec![Some("ada".to_string()), None])
        );
        assert_eq!(frame.columns[1], ColumnData::Int16(vec![3, 4]));
        assert_eq!(
            frame.columns[2],
            ColumnData::Float64(vec![Some(1.5), None])
        );
    }

    #[test]
    fn from_records_rejects_ragged_rows() {
        let schema = two_column_schema();
        let records = vec![record(&["a", "1"]), record(&["b"])];
        let err = Frame::from_records(&records, &schema).unwrap_err();
        assert_eq!(err.to_string(), "expected 2 fields per record, found 1");
    }

    #[test]
    fn append_adopts_into_an_empty_frame_and_extends_otherwise() {
        let schema = two_column_schema();
        let mut frame = Frame::default();
        frame.append(Frame::from_records(&[record(&["a", "1"])], &schema).unwrap());
        frame.append(Frame::from_records(&[record(&["b", "2"])], &schema).unwrap());
        assert_eq!(frame.len(), 2);
        assert_eq!(frame.columns[1], ColumnData::Int64(vec![1, 2]));
    }

    #[test]
    fn split_rows_keeps_the_head_and_returns_the_tail() {
        let schema = two_column_schema();
        let records = vec![
            record(&["a", "1"]),
            record(&["b", "2"]),
            record(&["c", "3"]),
        ];
        let mut frame = Frame::from_records(&records, &schema).unwrap();
        let tail = frame.split_rows(2);
        assert_eq!(frame.len(), 2);
        assert_eq!(tail.len(), 1);
        assert_eq!(tail.columns[1], ColumnData::Int64(vec![3]));
    }

    #[test]
    fn take_partition_extracts_matching_rows_in_order() {
        let schema = two_column_schema();
        let records = vec![
            record(&["x", "1"]),
            record(&["y", "2"]),
            record(&["x", "3"]),
        ];
        let mut frame = Frame::from_records(&records, &schema).unwrap();
        frame.derive_partition(0, "name", None).unwrap();
        assert_eq!(frame.distinct_partitions(), vec!["x", "y"]);

        let taken = frame.take_partition("x");
        assert_eq!(taken.len(), 2);
        assert_eq!(taken.columns[1], ColumnData::Int64(vec![1, 3]));
        assert_eq!(taken.partition, Some(vec!["x".to_string(), "x".to_string()]));
        assert_eq!(frame.len(), 1);
        assert_eq!(frame.columns[1], ColumnData::Int64(vec![2]));
    }

    #[test]
    fn splice_inserts_at_the_index_and_clamps_past_the_end() {
        let schema = two_column_schema();
        let mut frame =
            Frame::from_records(&[record(&["a", "1"]), record(&["c", "3"])], &schema).unwrap();
        frame.splice(
            1,
            Frame::from_records(&[record(&["b", "2"])], &schema).unwrap(),
        );
        frame.splice(
            99,
            Frame::from_records(&[record(&["d", "4"])], &schema).unwrap(),
        );
        assert_eq!(frame.columns[1], ColumnData::Int64(vec![1, 2, 3, 4]));
    }

    #[test]
    fn byte_size_follows_the_fixed_accounting_model() {
        let schema = schema(&[
            ("part", TypeSpec::Primitive(PrimitiveTag::Utf8)),
            ("v", TypeSpec::Primitive(PrimitiveTag::Int64)),
        ]);
        let mut frame = Frame::from_records(&[record(&["A", "1"])], &schema).unwrap();
        // utf8 col: 8 + 1; int64 col: 8
        assert_eq!(frame.byte_size(), 17);
        frame.derive_partition(0, "part", None).unwrap();
        // plus the partition side column: 8 + 1
        assert_eq!(frame.byte_size(), 26);
    }

    #[test]
    fn to_arrays_widens_and_converts_to_output_types() {
        use arrow::array::{Array, AsArray};
        use arrow::datatypes::{Int32Type, TimestampMillisecondType};

        let schema = schema(&[
            ("w", TypeSpec::Primitive(PrimitiveTag::Int16)),
            ("n", TypeSpec::NullableInt(IntWidth::W32)),
            ("ts", TypeSpec::DateTime("%Y-%m-%d".to_string())),
        ]);
        let records = vec![
            record(&["5", "7", "2021-03-01"]),
            record(&["-5", "", "2021-03-02"]),
        ];
        let frame = Frame::from_records(&records, &schema).unwrap();
        let arrays = frame.to_arrays(&schema).unwrap();
        assert_eq!(arrays.len(), 3);

        let widened = arrays[0].as_primitive::<Int32Type>();
        assert_eq!(widened.value(0), 5);
        assert_eq!(widened.value(1), -5);

        let nullable = arrays[1].as_primitive::<Int32Type>();
        assert_eq!(nullable.value(0), 7);
        assert!(nullable.is_null(1));

        let stamps = arrays[2].as_primitive::<TimestampMillisecondType>();
        assert_eq!(stamps.value(0), 1_614_556_800_000);
    }

    #[test]
    fn to_arrays_rejects_fractional_nullable_integers() {
        let schema = schema(&[("n", TypeSpec::NullableInt(IntWidth::W8))]);
        let frame = Frame::from_records(&[record(&["1.5"])], &schema).unwrap();
        let err = frame.to_arrays(&schema).unwrap_err();
        assert_eq!(err.to_string(), "column 'n': cannot cast '1.5' to int8");
    }

    #[test]
    fn derive_partition_formats_timestamps() {
        let schema = schema(&[("ts", TypeSpec::DateTime("%Y-%m-%d %H:%M:%S".to_string()))]);
        let records = vec![record(&["2021-03-01 06:30:00"])];

        let mut frame = Frame::from_records(&records, &schema).unwrap();
        frame.derive_partition(0, "ts", Some("%Y-%m-%d")).unwrap();
        assert_eq!(frame.partition, Some(vec!["2021-03-01".to_string()]));

        let mut frame = Frame::from_records(&records, &schema).unwrap();
        frame.derive_partition(0, "ts", None).unwrap();
        assert_eq!(
            frame.partition,
            Some(vec!["2021-03-01 06:30:00".to_string()])
        );
    }

    #[test]
    fn derive_partition_rejects_nulls_and_misplaced_formats() {
        let schema = schema(&[
            ("name", TypeSpec::Primitive(PrimitiveTag::Utf8)),
            ("ts", TypeSpec::DateTime("%Y-%m-%d".to_string())),
        ]);
        let records = vec![record(&["a", ""])];
        let mut frame = Frame::from_records(&records, &schema).unwrap();

        let err = frame.derive_partition(1, "ts", None).unwrap_err();
        assert_eq!(
            err.to_string(),
            "partition source column 'ts' contains a null value"
        );

        let err = frame.derive_partition(0, "name", Some("%Y")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "column 'name': cannot format timestamp with '%Y'"
        );
    }
}
