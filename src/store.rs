//! Object storage capability and artifact encoding.
//!
//! Artifacts leave the engine through [`ObjectIO`], a single-method seam
//! over whatever object store backs the lake. [`FakeObjectIO`] keeps
//! everything in memory and records write order, which is what the
//! integration tests assert against. [`encode_parquet`] turns one record
//! batch into the bytes of a Snappy-compressed Parquet file.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::Context;
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;

// ============================================================================
// ObjectIO
// ============================================================================

/// Write access to an object store.
pub trait ObjectIO: Send + Sync {
    /// Store one object at `key` in `bucket`, replacing any existing object.
    ///
    /// # Errors
    ///
    /// Fails when the object cannot be stored.
    fn put_object(&self, bucket: &str, key: &str, data: &[u8]) -> anyhow::Result<()>;
}

// ============================================================================
// FakeObjectIO
// ============================================================================

/// Bucket name to key to object bytes.
pub type BucketStorage = HashMap<String, HashMap<String, Vec<u8>>>;

/// In-memory [`ObjectIO`]. Buckets spring into existence on first write,
/// and every stored key is also recorded in arrival order.
#[derive(Clone, Default)]
pub struct FakeObjectIO {
    buckets: Arc<Mutex<BucketStorage>>,
    log: Arc<Mutex<Vec<String>>>,
}

impl FakeObjectIO {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Keys currently stored in `bucket`, sorted.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn keys(&self, bucket: &str) -> Vec<String> {
        let buckets = self.buckets.lock().expect("FakeObjectIO mutex poisoned");
        let mut keys: Vec<String> = buckets
            .get(bucket)
            .map(|objects| objects.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }

    /// Bytes stored at `key` in `bucket`, if any.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn object(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        let buckets = self.buckets.lock().expect("FakeObjectIO mutex poisoned");
        buckets.get(bucket).and_then(|objects| objects.get(key)).cloned()
    }

    /// Every stored key, in the order the writes arrived.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn writes(&self) -> Vec<String> {
        self.log.lock().expect("FakeObjectIO mutex poisoned").clone()
    }
}

impl ObjectIO for FakeObjectIO {
    fn put_object(&self, bucket: &str, key: &str, data: &[u8]) -> anyhow::Result<()> {
        let mut buckets = self.buckets.lock().expect("FakeObjectIO mutex poisoned");
        buckets
            .entry(bucket.to_string())
            .or_default()
            .insert(key.to_string(), data.to_vec());
        self.log
            .lock()
            .expect("FakeObjectIO mutex poisoned")
            .push(key.to_string());
        Ok(())
    }
}

// ============================================================================
// Parquet Encoding
// ============================================================================

/// Encode one record batch as a Snappy-compressed Parquet file.
///
/// # Errors
///
/// Fails when the writer cannot serialize the batch.
pub fn encode_parquet(batch: &RecordBatch) -> anyhow::Result<Vec<u8>> {
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();
    let mut buffer = Vec::new();
    let mut writer = ArrowWriter::try_new(&mut buffer, batch.schema(), Some(props))
        .context("Failed to create Parquet writer")?;
    writer.write(batch).context("Failed to write record batch")?;
    writer.close().context("Failed to close Parquet writer")?;
    Ok(buffer)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::io::Write as _;

    use arrow::array::Int64Array;
    use arrow::datatypes::{DataType, Field, Schema};
    use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

    use super::*;

    #[test]
    fn encode_parquet_round_trips_with_snappy() -> anyhow::Result<()> {
        let schema = Arc::new(Schema::new(vec![Field::new("v", DataType::Int64, true)]));
        let batch = RecordBatch::try_new(schema, vec![Arc::new(Int64Array::from(vec![1, 2, 3]))])?;
        let data = encode_parquet(&batch)?;

        let mut file = tempfile::tempfile()?;
        file.write_all(&data)?;
        let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
        assert_eq!(
            builder.metadata().row_group(0).column(0).compression(),
            Compression::SNAPPY
        );
        let mut reader = builder.build()?;
        let decoded = reader.next().transpose()?.expect("one batch");
        assert_eq!(decoded.num_rows(), 3);
        Ok(())
    }

    #[test]
    fn fake_store_records_write_order() -> anyhow::Result<()> {
        let store = FakeObjectIO::new();
        store.put_object("lake", "b", &[1])?;
        store.put_object("lake", "a", &[2])?;
        assert_eq!(store.keys("lake"), vec!["a", "b"]);
        assert_eq!(store.writes(), vec!["b", "a"]);
        assert_eq!(store.object("lake", "a"), Some(vec![2]));
        assert_eq!(store.object("lake", "missing"), None);
        Ok(())
    }
}
