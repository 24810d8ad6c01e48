//! Type coercion between delimited text and the declared column types.
//!
//! Two halves live here. [`build_output_schema`] turns validated type
//! descriptors into the physical Arrow schema, rejecting descriptors that
//! have no physical mapping. The cell parsers turn one trimmed text field
//! into one typed value, with blank cells reading as null for the nullable
//! types and as a cast failure for the plain integer types.

use std::sync::Arc;

use arrow::datatypes::{DataType, Field, Schema, SchemaRef, TimeUnit};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::config::{IntWidth, PrimitiveTag, TypeSpec};
use crate::error::{CoerceError, SchemaError};

// ============================================================================
// Output Schema
// ============================================================================

/// Build the Arrow schema the output artifacts are written with.
///
/// Sub-word integers widen to 32 bits on output; only `int8` keeps its
/// width. Datetime columns become millisecond timestamps. Every field is
/// nullable.
///
/// # Errors
///
/// Returns [`SchemaError::UndefinedType`] for a descriptor with no physical
/// mapping, `category` included.
pub fn build_output_schema(schema: &[(String, TypeSpec)]) -> Result<SchemaRef, SchemaError> {
    let mut fields = Vec::with_capacity(schema.len());
    for (column, spec) in schema {
        let data_type = match spec {
            TypeSpec::Primitive(tag) => match tag {
                PrimitiveTag::Int8 => DataType::Int8,
                PrimitiveTag::Int16 | PrimitiveTag::Int32 => DataType::Int32,
                PrimitiveTag::Int64 => DataType::Int64,
                PrimitiveTag::Float32 => DataType::Float32,
                PrimitiveTag::Float64 => DataType::Float64,
                PrimitiveTag::Utf8 => DataType::Utf8,
                PrimitiveTag::Category => {
                    return Err(SchemaError::UndefinedType {
                        column: column.clone(),
                        descriptor: "\"category\"".to_string(),
                    });
                }
            },
            TypeSpec::NullableInt(width) => match width {
                IntWidth::W8 => DataType::Int8,
                IntWidth::W16 | IntWidth::W32 => DataType::Int32,
                IntWidth::W64 => DataType::Int64,
            },
            TypeSpec::DateTime(_) => DataType::Timestamp(TimeUnit::Millisecond, None),
            TypeSpec::Undefined(descriptor) => {
                return Err(SchemaError::UndefinedType {
                    column: column.clone(),
                    descriptor: descriptor.clone(),
                });
            }
        };
        fields.push(Field::new(column, data_type, true));
    }
    Ok(Arc::new(Schema::new(fields)))
}

// ============================================================================
// Cell Parsers
// ============================================================================

macro_rules! int_cell {
    ($name:ident, $ty:ty, $target:literal) => {
        pub(crate) fn $name(column: &str, raw: &str) -> Result<$ty, CoerceError> {
            let text = raw.trim();
            if let Ok(v) = text.parse::<$ty>() {
                return Ok(v);
            }
            // Accept float-form cells like "3.0" as long as nothing is lost.
            // The bound is strict: i64::MAX as f64 rounds up to 2^63, which
            // does not fit back into i64.
            if let Ok(f) = text.parse::<f64>() {
                if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
                    if let Ok(v) = <$ty>::try_from(f as i64) {
                        return Ok(v);
                    }
                }
            }
            Err(CoerceError::Cast {
                column: column.to_string(),
                value: raw.to_string(),
                target: $target,
            })
        }
    };
}

int_cell!(int8_cell, i8, "int8");
int_cell!(int16_cell, i16, "int16");
int_cell!(int32_cell, i32, "int32");
int_cell!(int64_cell, i64, "int64");

pub(crate) fn float32_cell(column: &str, raw: &str) -> Result<Option<f32>, CoerceError> {
    let text = raw.trim();
    if text.is_empty() {
        return Ok(None);
    }
    text.parse::<f32>().map(Some).map_err(|_| CoerceError::Cast {
        column: column.to_string(),
        value: raw.to_string(),
        target: "float32",
    })
}

pub(crate) fn float64_cell(column: &str, raw: &str) -> Result<Option<f64>, CoerceError> {
    let text = raw.trim();
    if text.is_empty() {
        return Ok(None);
    }
    text.parse::<f64>().map(Some).map_err(|_| CoerceError::Cast {
        column: column.to_string(),
        value: raw.to_string(),
        target: "float64",
    })
}

/// Nullable-integer cells are held as float64 until output time, so a blank
/// reads as null and any numeric form is accepted here. Width and
/// integrality are enforced when the output arrays are built.
pub(crate) fn nullable_int_cell(column: &str, raw: &str) -> Result<Option<f64>, CoerceError> {
    let text = raw.trim();
    if text.is_empty() {
        return Ok(None);
    }
    text.parse::<f64>().map(Some).map_err(|_| CoerceError::Cast {
        column: column.to_string(),
        value: raw.to_string(),
        target: "Int64",
    })
}

/// Parse one datetime cell to epoch seconds. Values that carry no time part
/// are accepted at midnight.
pub(crate) fn datetime_cell(
    column: &str,
    raw: &str,
    format: &str,
) -> Result<Option<i64>, CoerceError> {
    let text = raw.trim();
    if text.is_empty() {
        return Ok(None);
    }
    let parsed = NaiveDateTime::parse_from_str(text, format)
        .or_else(|_| NaiveDate::parse_from_str(text, format).map(|d| d.and_time(NaiveTime::MIN)))
        .map_err(|_| CoerceError::DateParse {
            column: column.to_string(),
            value: text.to_string(),
            format: format.to_string(),
        })?;
    Ok(Some(parsed.and_utc().timestamp()))
}

// ============================================================================
// Tests
// ============================================================================
