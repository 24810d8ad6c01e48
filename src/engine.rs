//! The accumulate-and-flush import engine.
//!
//! [`EtlEngine`] validates its configuration up front, scans the remote
//! tree for matching files, and imports them in lexicographic order into
//! one in-memory [`Frame`]. Two rules decide when buffered rows leave
//! memory as Parquet artifacts:
//!
//! 1. After each file, a partitioned frame is reduced to at most one
//!    partition value. Every completed value is written out whole, in
//!    first-seen order.
//! 2. If the buffer then still exceeds the memory budget, leading rows are
//!    written out in budget-sized chunks until it fits again.
//!
//! Whatever remains after the last file is written as the final artifact.
//! Every buffered row is written exactly once, in arrival order.
//!
//! Artifact keys are deterministic. Partitioned chunks number upward
//! within a partition value and reset when the value closes; unpartitioned
//! chunks are named by the identifier span of the files that fed them; a
//! run that never exceeds its budget writes a single object named after
//! the table.

use std::sync::Arc;

use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;
use serde::Serialize;
use serde_json::Value;

use crate::coerce;
use crate::config::EngineConfig;
use crate::error::{CoerceError, ConfigError, EtlError, Result};
use crate::frame::Frame;
use crate::remote::RemoteIO;
use crate::store::{self, ObjectIO};
use crate::walk::RemoteTreeWalker;

const ARTIFACT_SUFFIX: &str = ".parquet.snappy";

/// Counters for one completed run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunStats {
    pub files_imported: usize,
    pub artifacts_written: usize,
    pub rows_written: u64,
}

/// Streaming importer from a remote file tree into an object store.
///
/// The engine is built from a raw configuration value, then needs a remote
/// source and an object store attached before [`EtlEngine::etl`] can run.
pub struct EtlEngine {
    config: EngineConfig,
    frame: Frame,
    mem: usize,
    counter: u32,
    remote: Option<Box<dyn RemoteIO>>,
    store: Option<Box<dyn ObjectIO>>,
}

impl EtlEngine {
    /// Validate `config` and build an engine with nothing attached.
    ///
    /// # Errors
    ///
    /// Fails when the configuration is rejected.
    pub fn new(config: &Value) -> Result<Self> {
        let config = EngineConfig::from_value(config)?;
        Ok(Self {
            config,
            frame: Frame::default(),
            mem: 0,
            counter: 0,
            remote: None,
            store: None,
        })
    }

    pub fn attach_remote(&mut self, remote: Box<dyn RemoteIO>) {
        self.remote = Some(remote);
    }

    pub fn attach_store(&mut self, store: Box<dyn ObjectIO>) {
        self.store = Some(store);
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run one full import: scan, accumulate, flush.
    ///
    /// # Errors
    ///
    /// Fails when either attachment is missing, when the declared schema
    /// has no physical mapping, or when any transport, coercion, or storage
    /// step fails. Nothing is retried.
    pub fn etl(&mut self) -> Result<RunStats> {
        if self.store.is_none() {
            return Err(EtlError::InvalidState("no object store attached"));
        }
        if self.remote.is_none() {
            return Err(EtlError::InvalidState("no remote source attached"));
        }
        let schema = coerce::build_output_schema(&self.config.schema)?;

        log::info!("scanning {} for matching files", self.config.addr);
        let files = {
            let Some(remote) = self.remote.as_mut() else {
                return Err(EtlError::InvalidState("no remote source attached"));
            };
            let mut walker = RemoteTreeWalker::new(remote.as_mut());
            walker
                .get_files(&self.config.dir_pattern, &self.config.file_pattern)
                .map_err(EtlError::Transport)?
        };
        log::info!("found {} files to import", files.len());

        let mut stats = RunStats::default();
        let mut head: Option<String> = None;
        let mut tail = String::new();
        let mut oversize = false;

        for file in &files {
            log::info!("importing {file}");
            let id = self.file_id(file)?.to_string();
            self.import_file(file, &id)?;
            stats.files_imported += 1;
            log::info!("imported {file} ({} rows buffered)", self.frame.len());

            if self.config.partition.is_some() {
                // Close out every partition value except the newest one.
                loop {
                    let distinct = self.frame.distinct_partitions();
                    if distinct.len() <= 1 {
                        break;
                    }
                    self.flush_partition(&distinct[0], &schema, &mut stats)?;
                }
            } else {
                if head.is_none() {
                    head = Some(id.clone());
                }
                tail = id;
            }

            if self.mem > self.config.mem_cap {
                log::info!(
                    "buffer at {} bytes exceeds the {} byte budget, writing chunks",
                    self.mem,
                    self.config.mem_cap
                );
                oversize = true;
                while self.mem > self.config.mem_cap {
                    self.flush_oversize(&schema, head.as_deref(), &tail, &mut stats)?;
                }
                if self.config.partition.is_none() {
                    head = Some(tail.clone());
                }
            }
        }

        if !self.frame.is_empty() {
            let frame = std::mem::take(&mut self.frame);
            let key = match &self.config.partition {
                Some(spec) => {
                    let value = first_partition(&frame)?;
                    partition_key(&self.config.table_name, &spec.key, &value, self.counter)
                }
                None if oversize => span_key(
                    &self.config.table_name,
                    head.as_deref().unwrap_or(&tail),
                    &tail,
                    0,
                ),
                None => single_key(&self.config.table_name),
            };
            self.write_artifact(&frame, &key, &schema, &mut stats)?;
            self.counter = 0;
            self.mem = 0;
        }

        log::info!(
            "run complete: {} files imported, {} artifacts written, {} rows",
            stats.files_imported,
            stats.artifacts_written,
            stats.rows_written
        );
        Ok(stats)
    }

    // ========================================================================
    // Import
    // ========================================================================

    fn file_id<'a>(&self, path: &'a str) -> Result<&'a str> {
        self.config
            .id_pattern
            .find(path)
            .map(|m| m.as_str())
            .ok_or_else(|| EtlError::FileIdentifier {
                file: path.to_string(),
                pattern: self.config.id_pattern.as_str().to_string(),
            })
    }

    /// Fetch one file, parse and coerce it, and append it to the buffer.
    fn import_file(&mut self, path: &str, id: &str) -> Result<()> {
        let patch = self.config.row_skip.get(id).cloned();
        let text = {
            let Some(remote) = self.remote.as_mut() else {
                return Err(EtlError::InvalidState("no remote source attached"));
            };
            remote.read_text(path).map_err(EtlError::Transport)?
        };

        let width = self.config.columns.len();
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(text.as_bytes());
        let mut records: Vec<Vec<String>> = Vec::new();
        let skip: &[usize] = patch.as_ref().map_or(&[], |p| p.rownums.as_slice());
        for (line, record) in reader.records().enumerate() {
            let record = record.map_err(CoerceError::from)?;
            if skip.contains(&line) {
                continue;
            }
            let mut fields: Vec<String> = record.iter().map(str::to_string).collect();
            // Lines ending in the delimiter parse as one extra empty field.
            if fields.len() == width + 1 && fields.last().is_some_and(String::is_empty) {
                fields.pop();
            }
            records.push(fields);
        }

        // Files are sometimes cut off mid-line. A final record that is
        // mostly blanks is dropped; anything else ragged is an error.
        if let Some(last) = records.last() {
            let blanks = last.iter().filter(|f| f.is_empty()).count();
            let missing = width.saturating_sub(last.len());
            if blanks + missing > 2 {
                records.pop();
            }
        }

        let mut incoming = Frame::from_records(&records, &self.config.schema)?;

        if let Some(patch) = &patch {
            let mut pairs: Vec<(usize, &Vec<String>)> =
                patch.rownums.iter().copied().zip(&patch.rowrepls).collect();
            pairs.sort_by_key(|(line, _)| *line);
            for (line, repl) in pairs {
                let row = Frame::from_records(std::slice::from_ref(repl), &self.config.schema)?;
                incoming.splice(line, row);
            }
        }

        if let Some(spec) = &self.config.partition {
            let Some(index) = self.config.columns.iter().position(|c| c == &spec.source) else {
                return Err(ConfigError::MissingKey {
                    key: spec.source.clone(),
                    object: "columns".to_string(),
                }
                .into());
            };
            incoming.derive_partition(index, &spec.source, spec.date_format.as_deref())?;
        }

        self.mem += incoming.byte_size();
        self.frame.append(incoming);
        Ok(())
    }

    // ========================================================================
    // Flushing
    // ========================================================================

    /// Write out every buffered row of one partition value and reset the
    /// chunk counter for the value that follows it.
    fn flush_partition(
        &mut self,
        value: &str,
        schema: &SchemaRef,
        stats: &mut RunStats,
    ) -> Result<()> {
        let Some(spec) = &self.config.partition else {
            return Err(EtlError::InvalidState("partition flush without partition config"));
        };
        let key = partition_key(&self.config.table_name, &spec.key, value, self.counter);
        let chunk = self.frame.take_partition(value);
        self.write_artifact(&chunk, &key, schema, stats)?;
        self.counter = 0;
        self.mem = self.frame.byte_size();
        Ok(())
    }

    /// Write out the leading slice of the buffer that the budget cannot
    /// hold. Partitioned chunks advance the counter; unpartitioned chunks
    /// are named by their identifier span and always carry chunk `00`.
    fn flush_oversize(
        &mut self,
        schema: &SchemaRef,
        head: Option<&str>,
        tail: &str,
        stats: &mut RunStats,
    ) -> Result<()> {
        let take = self.flush_rows();
        let remainder = self.frame.split_rows(take);
        let chunk = std::mem::replace(&mut self.frame, remainder);
        let key = match &self.config.partition {
            Some(spec) => {
                let value = first_partition(&chunk)?;
                let key = partition_key(&self.config.table_name, &spec.key, &value, self.counter);
                self.counter += 1;
                key
            }
            None => span_key(&self.config.table_name, head.unwrap_or(tail), tail, 0),
        };
        self.write_artifact(&chunk, &key, schema, stats)?;
        self.mem = self.frame.byte_size();
        Ok(())
    }

    /// How many leading rows a budget flush writes: the fraction of the
    /// buffer the budget can hold, and at least one row so an oversized
    /// single row still drains.
    fn flush_rows(&self) -> usize {
        let rows = self.frame.len();
        let ratio = self.config.mem_cap as f64 / self.mem as f64;
        let take = (ratio * rows as f64) as usize;
        take.max(1).min(rows)
    }

    fn write_artifact(
        &mut self,
        frame: &Frame,
        key: &str,
        schema: &SchemaRef,
        stats: &mut RunStats,
    ) -> Result<()> {
        let arrays = frame.to_arrays(&self.config.schema)?;
        let batch = RecordBatch::try_new(Arc::clone(schema), arrays)
            .map_err(|e| EtlError::Storage(e.into()))?;
        let data = store::encode_parquet(&batch).map_err(EtlError::Storage)?;
        let Some(store) = self.store.as_deref() else {
            return Err(EtlError::InvalidState("no object store attached"));
        };
        store
            .put_object(&self.config.bucket, key, &data)
            .map_err(EtlError::Storage)?;
        stats.artifacts_written += 1;
        stats.rows_written += frame.len() as u64;
        log::info!("wrote {key} ({} rows)", frame.len());
        Ok(())
    }
}

// ============================================================================
// Artifact Keys
// ============================================================================

fn partition_key(table: &str, key: &str, value: &str, counter: u32) -> String {
    format!("{table}/{key}={value}/{table}_{key}={value}_{counter:02}{ARTIFACT_SUFFIX}")
}

fn span_key(table: &str, head: &str, tail: &str, counter: u32) -> String {
    format!("{table}/{table}_{head}_{tail}_{counter:02}{ARTIFACT_SUFFIX}")
}

fn single_key(table: &str) -> String {
    format!("{table}{ARTIFACT_SUFFIX}")
}

fn first_partition(frame: &Frame) -> Result<String> {
    frame
        .distinct_partitions()
        .into_iter()
        .next()
        .ok_or(EtlError::InvalidState("partitioned frame without partition values"))
}
