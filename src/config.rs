//! Configuration contract for the engine.
//!
//! A configuration arrives as one JSON mapping and is validated into an
//! immutable [`EngineConfig`] before any I/O happens. Validation is a gate:
//! the first violation aborts with a [`ConfigError`] naming the offending
//! entry. Descriptors that are shape-valid but have no physical output
//! mapping are accepted here and rejected later, when the output schema is
//! built.

use std::collections::HashMap;

use regex::Regex;
use serde_json::{Map, Value};

use crate::error::ConfigError;

/// Memory budget applied when the configuration does not name one.
pub const DEFAULT_MEM_CAP: usize = 2_000_000_000;

/// Budgets below this produce a warning, not an error.
pub const MIN_RECOMMENDED_MEM_CAP: usize = 500_000_000;

// ============================================================================
// Type Descriptors
// ============================================================================

/// Plain dtype tags a schema entry may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveTag {
    Int8,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    Utf8,
    Category,
}

/// Output width declared by a nullable-integer descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntWidth {
    W8,
    W16,
    W32,
    W64,
}

/// A column type descriptor, parsed from one schema entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeSpec {
    /// A plain dtype tag.
    Primitive(PrimitiveTag),
    /// Parsed as nullable and held as float64 in memory; the width only
    /// shapes the declared output schema.
    NullableInt(IntWidth),
    /// Parsed with the given format, held at second precision in memory.
    DateTime(String),
    /// Shape-valid descriptor with no physical mapping. Carries its rendered
    /// form for the eventual undefined-type error.
    Undefined(String),
}

impl TypeSpec {
    fn parse(column: &str, descriptor: &Value) -> Result<Self, ConfigError> {
        match descriptor {
            Value::String(tag) => {
                Ok(Self::from_tag(tag).unwrap_or_else(|| Self::Undefined(descriptor.to_string())))
            }
            Value::Array(elems) => {
                if elems.len() != 2 {
                    return Err(ConfigError::WrongLength {
                        name: format!("schema['{column}']"),
                        expected: "2",
                    });
                }
                let first = str_check(&elems[0], &format!("schema['{column}'][0]"))?;
                let second = str_check(&elems[1], &format!("schema['{column}'][1]"))?;
                Ok(match (first, second) {
                    ("Int64", "int8") => Self::NullableInt(IntWidth::W8),
                    ("Int64", "int16") => Self::NullableInt(IntWidth::W16),
                    ("Int64", "int32") => Self::NullableInt(IntWidth::W32),
                    ("Int64", "int64") => Self::NullableInt(IntWidth::W64),
                    ("datetime", format) => Self::DateTime(format.to_string()),
                    _ => Self::Undefined(descriptor.to_string()),
                })
            }
            _ => Err(ConfigError::WrongType {
                name: format!("schema['{column}']"),
                expected: "a string or sequence",
            }),
        }
    }

    fn from_tag(tag: &str) -> Option<Self> {
        let tag = match tag {
            "int8" => PrimitiveTag::Int8,
            "int16" => PrimitiveTag::Int16,
            "int32" => PrimitiveTag::Int32,
            "int64" => PrimitiveTag::Int64,
            "float32" => PrimitiveTag::Float32,
            "float64" => PrimitiveTag::Float64,
            "object" => PrimitiveTag::Utf8,
            "category" => PrimitiveTag::Category,
            _ => return None,
        };
        Some(Self::Primitive(tag))
    }
}

// ============================================================================
// Sub-Structures
// ============================================================================

/// Row patching for one source file: zero-based line numbers excluded from
/// the parse, and the literal rows spliced back in at those same indices.
/// The two sequences are equal-length by validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowPatch {
    pub rownums: Vec<usize>,
    pub rowrepls: Vec<Vec<String>>,
}

/// How output artifacts are split by a derived key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionSpec {
    /// Name the key takes in the storage path.
    pub key: String,
    /// Source column the value derives from.
    pub source: String,
    /// When present, values are date-formatted; otherwise the raw column
    /// value is used verbatim.
    pub date_format: Option<String>,
}

// ============================================================================
// EngineConfig
// ============================================================================

/// Validated, immutable engine configuration.
///
/// The directory and file patterns are compiled as prefix matches; the
/// shorter identifier pattern stays unanchored because it is searched
/// against full file paths. The schema is held in declared column order.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub addr: String,
    pub dir_pattern: Regex,
    pub file_pattern: Regex,
    pub id_pattern: Regex,
    pub columns: Vec<String>,
    pub schema: Vec<(String, TypeSpec)>,
    pub bucket: String,
    pub table_name: String,
    pub mem_cap: usize,
    pub row_skip: HashMap<String, RowPatch>,
    pub partition: Option<PartitionSpec>,
}

impl EngineConfig {
    /// Validate a raw configuration mapping.
    ///
    /// Checks run in a fixed order: required keys and coarse types, schema
    /// descriptor shapes, schema-keys/columns set equality, then the
    /// optional row-skip and partition sub-structures. A memory budget below
    /// [`MIN_RECOMMENDED_MEM_CAP`] warns and proceeds.
    ///
    /// # Errors
    ///
    /// Returns the [`ConfigError`] for the first violated check.
    pub fn from_value(config: &Value) -> Result<Self, ConfigError> {
        let map = map_check(config, "config")?;

        log::info!("validating config parameters");
        let addr = str_check(key_check(map, "addr", "config")?, "addr")?.to_string();
        let dir_ptrn = str_check(key_check(map, "dir_ptrn", "config")?, "dir_ptrn")?;
        let file_ptrn = str_check(key_check(map, "file_ptrn", "config")?, "file_ptrn")?;
        let file_ptrn_abbr = str_check(
            key_check(map, "file_ptrn_abbr", "config")?,
            "file_ptrn_abbr",
        )?;
        let columns_raw = seq_check(key_check(map, "columns", "config")?, "columns")?;
        let schema_raw = map_check(key_check(map, "schema", "config")?, "schema")?;
        let bucket = str_check(key_check(map, "bucket", "config")?, "bucket")?.to_string();
        let table_name = str_check(key_check(map, "table_name", "config")?, "table_name")?.to_string();

        let mut columns = Vec::with_capacity(columns_raw.len());
        for (i, entry) in columns_raw.iter().enumerate() {
            columns.push(str_check(entry, &format!("columns[{i}]"))?.to_string());
        }

        log::info!("validating schema parameters");
        let mut specs: HashMap<String, TypeSpec> = HashMap::with_capacity(schema_raw.len());
        for (col, descriptor) in schema_raw {
            specs.insert(col.clone(), TypeSpec::parse(col, descriptor)?);
        }

        // Schema keys and declared columns must agree as sets, not counts.
        // Draining the schema in column order proves equality and fixes the
        // ordering in one pass.
        let mut schema = Vec::with_capacity(columns.len());
        for col in &columns {
            let Some(spec) = specs.remove(col) else {
                return Err(set_mismatch());
            };
            schema.push((col.clone(), spec));
        }
        if !specs.is_empty() {
            return Err(set_mismatch());
        }

        let mut row_skip = HashMap::new();
        if let Some(raw) = map.get("row_skip") {
            log::info!("validating row_skip parameters");
            let entries = map_check(raw, "row_skip")?;
            let key_pattern = compile_anchored(file_ptrn_abbr, "file_ptrn_abbr")?;
            for (file, params) in entries {
                if !key_pattern.is_match(file) {
                    return Err(ConfigError::PatternMismatch {
                        name: format!("row_skip key '{file}'"),
                        pattern: file_ptrn_abbr.to_string(),
                    });
                }
                let object = format!("row_skip[{file}]");
                let params = map_check(params, &object)?;
                let rownums_raw = seq_check(
                    key_check(params, "rownums", &object)?,
                    &format!("row_skip[{file}]['rownums']"),
                )?;
                let rowrepls_raw = seq_check(
                    key_check(params, "rowrepls", &object)?,
                    &format!("row_skip[{file}]['rowrepls']"),
                )?;

                let mut rownums = Vec::with_capacity(rownums_raw.len());
                for (i, entry) in rownums_raw.iter().enumerate() {
                    rownums.push(index_check(
                        entry,
                        &format!("row_skip[{file}]['rownums'][{i}]"),
                    )?);
                }
                let mut rowrepls = Vec::with_capacity(rowrepls_raw.len());
                for (i, entry) in rowrepls_raw.iter().enumerate() {
                    let cells = seq_check(entry, &format!("row_skip[{file}]['rowrepls'][{i}]"))?;
                    rowrepls.push(cells.iter().map(cell_text).collect());
                }
                if rownums.len() != rowrepls.len() {
                    return Err(ConfigError::UnequalLengths {
                        left: format!("row_skip[{file}]['rownums']"),
                        right: format!("row_skip[{file}]['rowrepls']"),
                    });
                }
                row_skip.insert(file.clone(), RowPatch { rownums, rowrepls });
            }
        }

        let mut partition = None;
        if let Some(raw) = map.get("partition") {
            log::info!("validating partition parameters");
            let elems = seq_check(raw, "partition")?;
            if elems.len() != 2 && elems.len() != 3 {
                return Err(ConfigError::WrongLength {
                    name: "partition".to_string(),
                    expected: "[2, 3]",
                });
            }
            let mut parts = Vec::with_capacity(elems.len());
            for (i, entry) in elems.iter().enumerate() {
                parts.push(str_check(entry, &format!("partition[{i}]"))?.to_string());
            }
            let date_format = parts.get(2).filter(|f| !f.is_empty()).cloned();
            partition = Some(PartitionSpec {
                key: parts[0].clone(),
                source: parts[1].clone(),
                date_format,
            });
        }

        let mem_cap = match map.get("mem_cap") {
            Some(value) => index_check(value, "mem_cap")?,
            None => DEFAULT_MEM_CAP,
        };
        if mem_cap < MIN_RECOMMENDED_MEM_CAP {
            log::warn!(
                "mem_cap is {mem_cap}; a minimum of {MIN_RECOMMENDED_MEM_CAP} bytes is recommended"
            );
        }

        Ok(Self {
            addr,
            dir_pattern: compile_anchored(dir_ptrn, "dir_ptrn")?,
            file_pattern: compile_anchored(file_ptrn, "file_ptrn")?,
            id_pattern: compile_unanchored(file_ptrn_abbr, "file_ptrn_abbr")?,
            columns,
            schema,
            bucket,
            table_name,
            mem_cap,
            row_skip,
            partition,
        })
    }
}

// ============================================================================
// Check Helpers
// ============================================================================

fn key_check<'a>(
    map: &'a Map<String, Value>,
    key: &str,
    object: &str,
) -> Result<&'a Value, ConfigError> {
    map.get(key).ok_or_else(|| ConfigError::MissingKey {
        key: key.to_string(),
        object: object.to_string(),
    })
}

fn str_check<'a>(value: &'a Value, name: &str) -> Result<&'a str, ConfigError> {
    value.as_str().ok_or_else(|| ConfigError::WrongType {
        name: name.to_string(),
        expected: "a string",
    })
}

fn seq_check<'a>(value: &'a Value, name: &str) -> Result<&'a Vec<Value>, ConfigError> {
    value.as_array().ok_or_else(|| ConfigError::WrongType {
        name: name.to_string(),
        expected: "a sequence",
    })
}

fn map_check<'a>(value: &'a Value, name: &str) -> Result<&'a Map<String, Value>, ConfigError> {
    value.as_object().ok_or_else(|| ConfigError::WrongType {
        name: name.to_string(),
        expected: "a mapping",
    })
}

fn index_check(value: &Value, name: &str) -> Result<usize, ConfigError> {
    value
        .as_u64()
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| ConfigError::WrongType {
            name: name.to_string(),
            expected: "a non-negative integer",
        })
}

fn set_mismatch() -> ConfigError {
    ConfigError::SetMismatch {
        left: "schema".to_string(),
        right: "columns".to_string(),
    }
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn compile_anchored(pattern: &str, name: &str) -> Result<Regex, ConfigError> {
    Regex::new(&format!("^(?:{pattern})")).map_err(|source| ConfigError::InvalidPattern {
        name: name.to_string(),
        source,
    })
}

fn compile_unanchored(pattern: &str, name: &str) -> Result<Regex, ConfigError> {
    Regex::new(pattern).map_err(|source| ConfigError::InvalidPattern {
        name: name.to_string(),
        source,
    })
}
