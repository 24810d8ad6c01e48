//! Error types for the ETL engine.
//!
//! Failures fall into a few distinct classes:
//! - [`ConfigError`]: configuration contract violations, raised once at
//!   construction before any I/O happens
//! - [`SchemaError`]: descriptors that pass validation but have no physical
//!   output mapping, raised when the output schema is built
//! - [`CoerceError`]: per-cell and per-record parse failures during ingestion
//! - [`EtlError`]: the top-level enum the engine returns, which also wraps
//!   transport and storage failures without catching or retrying them

use thiserror::Error;

/// Violations of the configuration contract.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config: {key} not in {object}")]
    MissingKey { key: String, object: String },

    #[error("config: {name} must be {expected}")]
    WrongType { name: String, expected: &'static str },

    #[error("config: {name} must have length {expected}")]
    WrongLength { name: String, expected: &'static str },

    #[error("config: {name} doesn't match pattern {pattern}")]
    PatternMismatch { name: String, pattern: String },

    #[error("config: {left}, {right} do not have matching values")]
    SetMismatch { left: String, right: String },

    #[error("config: {left}, {right} have unequal lengths")]
    UnequalLengths { left: String, right: String },

    #[error("config: {name} is not a valid pattern: {source}")]
    InvalidPattern { name: String, source: regex::Error },
}

/// Descriptors the validator accepts but the output format cannot represent.
///
/// Surfaces when the output schema is built, not at configuration time, so a
/// run can fail on this after earlier artifacts were already written.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("undefined type {descriptor} for column '{column}'")]
    UndefinedType { column: String, descriptor: String },
}

/// Failures turning raw text cells into typed column values.
#[derive(Debug, Error)]
pub enum CoerceError {
    #[error("column '{column}': cannot cast '{value}' to {target}")]
    Cast {
        column: String,
        value: String,
        target: &'static str,
    },

    #[error("column '{column}': cannot parse '{value}' with format '{format}'")]
    DateParse {
        column: String,
        value: String,
        format: String,
    },

    #[error("column '{column}': cannot format timestamp with '{format}'")]
    DateFormat { column: String, format: String },

    #[error("expected {expected} fields per record, found {found}")]
    RowWidth { expected: usize, found: usize },

    #[error("partition source column '{column}' contains a null value")]
    NullPartition { column: String },

    #[error("malformed delimited text: {0}")]
    Csv(#[from] csv::Error),
}

/// Top-level error for engine operations.
///
/// Transport and storage failures are opaque: the engine does not retry or
/// recover, it hands them back to the caller. A failed run leaves any
/// already-written artifacts in place.
#[derive(Debug, Error)]
pub enum EtlError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Coerce(#[from] CoerceError),

    #[error("invalid state: {0}")]
    InvalidState(&'static str),

    #[error("file '{file}' does not match identifier pattern {pattern}")]
    FileIdentifier { file: String, pattern: String },

    #[error("transport: {0}")]
    Transport(anyhow::Error),

    #[error("storage: {0}")]
    Storage(anyhow::Error),
}

pub type Result<T> = std::result::Result<T, EtlError>;
