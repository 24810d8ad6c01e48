//! # Ironflume
//!
//! A **memory-bounded ETL engine** that imports delimited text files from a
//! remote file tree and lands them as Snappy-compressed Parquet artifacts in
//! an object store. One JSON configuration describes the whole run: where
//! the source files live, how their columns are typed, which rows need
//! patching, and how the output is partitioned and named.
//!
//! ## Key Features
//!
//! - **Single-document configuration** - patterns, schema, patches, and
//!   budget validated up front, before any connection is opened
//! - **Remote tree discovery** - recursive traversal over a stateful cursor,
//!   with regex prefix selection of directories and file names
//! - **Typed coercion** - declared column types applied cell by cell, with
//!   nullable integers, datetimes, and deliberate lazy rejection of
//!   descriptors that have no physical output mapping
//! - **Row patching** - known-bad source lines skipped at parse time and
//!   replaced with literal rows at the same positions
//! - **Bounded accumulation** - files buffer in one columnar frame that is
//!   flushed whenever a partition value closes or the memory budget is
//!   exceeded, so arbitrarily large trees import in bounded memory
//! - **Deterministic artifact names** - identical inputs always produce the
//!   same keys, so a rerun overwrites rather than duplicates
//! - **Trait seams for I/O** - the remote source ([`RemoteIO`]) and the
//!   object store ([`ObjectIO`]) are single-purpose traits with in-memory
//!   fakes for testing
//!
//! ## Quick Start
//!
//! ```ignore
//! use ironflume::{EtlEngine, FakeObjectIO, FakeRemoteIO};
//! use serde_json::json;
//! # use ironflume::Result;
//!
//! # fn main() -> Result<()> {
//! let config = json!({
//!     "addr": "files.example.com",
//!     "dir_ptrn": "/data/trips",
//!     "file_ptrn": "trips_",
//!     "file_ptrn_abbr": r"\d{6}",
//!     "columns": ["vendor", "distance"],
//!     "schema": {"vendor": "object", "distance": "float64"},
//!     "bucket": "lake",
//!     "table_name": "trips",
//! });
//!
//! let mut remote = FakeRemoteIO::new();
//! remote.add_file("/data/trips/trips_202101.csv", "a,1.5\nb,2.0\n");
//! let store = FakeObjectIO::new();
//!
//! let mut engine = EtlEngine::new(&config)?;
//! engine.attach_remote(Box::new(remote));
//! engine.attach_store(Box::new(store.clone()));
//! let stats = engine.etl()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Core Concepts
//!
//! ### Configuration
//!
//! [`EngineConfig`] is the validated form of the configuration document.
//! Validation is strict about shape (missing keys, wrong types, mismatched
//! lengths) but deliberately does not resolve type descriptors to output
//! types; a shape-valid descriptor like `"float16"` is carried as
//! [`TypeSpec::Undefined`] and only rejected when a run starts.
//!
//! ### Discovery
//!
//! [`RemoteTreeWalker`] visits every directory under the server root in
//! pre-order, then selects files whose directory path and file name match
//! the configured patterns. Both patterns match as prefixes. The selected
//! full paths are imported in lexicographic order, which is what makes
//! artifact naming reproducible.
//!
//! ### Accumulation and Flushing
//!
//! Imported rows buffer in a [`frame::Frame`]. After each file the engine
//! applies two rules in order: a partitioned buffer is reduced to at most
//! one open partition value, and a buffer over the memory budget is drained
//! in chunks until it fits. The remainder is written after the last file.
//! Rows are never dropped, duplicated, or reordered.
//!
//! ## Module Overview
//!
//! - [`config`] - configuration validation and the type descriptor model
//! - [`remote`] - the remote source trait and its in-memory fake
//! - [`walk`] - tree traversal and file selection
//! - [`coerce`] - output schema construction and cell parsing
//! - [`frame`] - the columnar buffer and its row-boundary operations
//! - [`store`] - the object store trait, its fake, and Parquet encoding
//! - [`engine`] - the orchestrating engine and its flush rules
//! - [`error`] - the error taxonomy for the whole crate

pub mod coerce;
pub mod config;
pub mod engine;
pub mod error;
pub mod frame;
pub mod remote;
pub mod store;
pub mod walk;

// General re-exports
pub use config::{EngineConfig, IntWidth, PartitionSpec, PrimitiveTag, RowPatch, TypeSpec};
pub use engine::{EtlEngine, RunStats};
pub use error::{CoerceError, ConfigError, EtlError, Result, SchemaError};
pub use frame::Frame;
pub use remote::{EntryKind, FakeRemoteIO, RemoteEntry, RemoteIO};
pub use store::{BucketStorage, FakeObjectIO, ObjectIO};
pub use walk::{DirListing, RemoteTreeWalker};
