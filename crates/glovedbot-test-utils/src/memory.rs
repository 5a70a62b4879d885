use async_trait::async_trait;
use glovedbot_memory::{InMemoryStore, MemoryRecord, MemoryStore, StorageError};
use std::io;

/// Record with a fixed timestamp so ordering in tests is deterministic.
pub fn record_at(speaker: &str, content: &str, vector: Vec<f32>, timestamp: f64) -> MemoryRecord {
    MemoryRecord::at(speaker, content, vector, timestamp)
}

/// Store that reads from an in-memory history but refuses every append.
#[derive(Clone, Default)]
pub struct FailingStore {
    inner: InMemoryStore,
}

impl FailingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<MemoryRecord>) -> Self {
        Self {
            inner: InMemoryStore::with_records(records),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[async_trait]
impl MemoryStore for FailingStore {
    async fn append(&self, _record: &MemoryRecord) -> Result<(), StorageError> {
        Err(StorageError::Io(io::Error::other("disk full")))
    }

    async fn load_all(&self) -> Result<Vec<MemoryRecord>, StorageError> {
        self.inner.load_all().await
    }
}
