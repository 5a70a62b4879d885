//! Append-only memory stores.

use crate::error::StorageError;
use crate::model::MemoryRecord;
use async_trait::async_trait;
use log::{debug, info, warn};
use parking_lot::Mutex;
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Extension used for published record files.
const RECORD_EXTENSION: &str = "json";

#[async_trait]
/// Durable append-only log of memory records.
pub trait MemoryStore: Send + Sync {
    /// Persist a record. Never overwrites an existing record.
    async fn append(&self, record: &MemoryRecord) -> Result<(), StorageError>;

    /// Load every stored record.
    ///
    /// A store that was never written to yields an empty history.
    async fn load_all(&self) -> Result<Vec<MemoryRecord>, StorageError>;
}

/// File-backed store writing one JSON file per record.
#[derive(Debug, Clone)]
pub struct FileMemoryStore {
    /// Directory holding record files.
    root: PathBuf,
}

impl FileMemoryStore {
    /// Create a store rooted at `root`. The directory is created on first append.
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref().to_path_buf();
        info!("initialized file memory store (root={})", root.display());
        Self { root }
    }

    /// Root directory for record files.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File name for a record; the id keeps names unique within one clock tick.
    fn record_file_name(record: &MemoryRecord) -> String {
        format!("log_{}_{}.{RECORD_EXTENSION}", record.timestamp, record.id)
    }

    /// Path to the published record file.
    pub fn record_path(&self, record: &MemoryRecord) -> PathBuf {
        self.root.join(Self::record_file_name(record))
    }

    /// Path to the temporary file used while writing.
    fn temp_path(&self, record: &MemoryRecord) -> PathBuf {
        self.root.join(format!(".{}.tmp", Self::record_file_name(record)))
    }

    /// Write the record to a temp file, then publish it without replacing anything.
    fn write_record(&self, record: &MemoryRecord) -> Result<PathBuf, StorageError> {
        validate_record(record)?;
        std::fs::create_dir_all(&self.root)?;
        let path = self.record_path(record);
        let temp_path = self.temp_path(record);
        let contents = serde_json::to_vec_pretty(record)?;
        {
            let mut file = OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&temp_path)?;
            if let Err(err) = file.write_all(&contents).and_then(|_| file.sync_all()) {
                drop(file);
                let _ = std::fs::remove_file(&temp_path);
                return Err(err.into());
            }
        }
        let published = publish_no_clobber(&temp_path, &path);
        if published.is_err() {
            let _ = std::fs::remove_file(&temp_path);
        }
        published?;
        Ok(path)
    }

    /// Read all published record files in the root directory.
    fn read_records(&self) -> Result<Vec<MemoryRecord>, StorageError> {
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(
                    "memory directory missing; starting empty (root={})",
                    self.root.display()
                );
                return Ok(Vec::new());
            }
            Err(err) => return Err(err.into()),
        };

        let mut loaded = Vec::new();
        let mut skipped = 0usize;
        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            if !is_record_file(&path) {
                continue;
            }
            let contents = std::fs::read(&path)?;
            match serde_json::from_slice::<MemoryRecord>(&contents) {
                Ok(record) => loaded.push((path, record)),
                Err(err) => {
                    skipped += 1;
                    warn!(
                        "skipping unreadable memory record (path={}): {err}",
                        path.display()
                    );
                }
            }
        }
        loaded.sort_by(|(path_a, a), (path_b, b)| {
            a.timestamp
                .total_cmp(&b.timestamp)
                .then_with(|| path_a.cmp(path_b))
        });
        debug!(
            "loaded memory records (root={}, loaded={}, skipped={})",
            self.root.display(),
            loaded.len(),
            skipped
        );
        Ok(loaded.into_iter().map(|(_, record)| record).collect())
    }
}

#[async_trait]
impl MemoryStore for FileMemoryStore {
    async fn append(&self, record: &MemoryRecord) -> Result<(), StorageError> {
        let path = self.write_record(record)?;
        debug!(
            "stored memory record (speaker={}, dim={}, path={})",
            record.speaker,
            record.dimension(),
            path.display()
        );
        Ok(())
    }

    async fn load_all(&self) -> Result<Vec<MemoryRecord>, StorageError> {
        self.read_records()
    }
}

/// Volatile store used for dry runs and tests.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    records: Arc<Mutex<Vec<MemoryRecord>>>,
}

impl InMemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store seeded with records.
    pub fn with_records(records: Vec<MemoryRecord>) -> Self {
        Self {
            records: Arc::new(Mutex::new(records)),
        }
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// True when nothing was stored.
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

#[async_trait]
impl MemoryStore for InMemoryStore {
    async fn append(&self, record: &MemoryRecord) -> Result<(), StorageError> {
        validate_record(record)?;
        let mut records = self.records.lock();
        if records.iter().any(|existing| existing.id == record.id) {
            return Err(StorageError::InvalidRecord(format!(
                "duplicate record id {}",
                record.id
            )));
        }
        records.push(record.clone());
        Ok(())
    }

    async fn load_all(&self) -> Result<Vec<MemoryRecord>, StorageError> {
        Ok(self.records.lock().clone())
    }
}

/// Reject records that would not survive a JSON round trip.
fn validate_record(record: &MemoryRecord) -> Result<(), StorageError> {
    if !record.timestamp.is_finite() {
        return Err(StorageError::InvalidRecord(format!(
            "non-finite timestamp for record {}",
            record.id
        )));
    }
    if record.vector.iter().any(|value| !value.is_finite()) {
        return Err(StorageError::InvalidRecord(format!(
            "non-finite vector component in record {}",
            record.id
        )));
    }
    Ok(())
}

/// Move `temp` to `target`, failing if `target` already exists.
fn publish_no_clobber(temp: &Path, target: &Path) -> Result<(), StorageError> {
    match std::fs::hard_link(temp, target) {
        Ok(()) => {
            if let Err(err) = std::fs::remove_file(temp) {
                warn!("failed to remove temp record (path={}): {err}", temp.display());
            }
            Ok(())
        }
        Err(err) if err.kind() == ErrorKind::AlreadyExists => {
            Err(StorageError::AlreadyExists(target.to_path_buf()))
        }
        Err(err) => {
            // Filesystems without hard links fall back to a checked rename.
            debug!("hard link unavailable, using rename: {err}");
            if target.exists() {
                return Err(StorageError::AlreadyExists(target.to_path_buf()));
            }
            std::fs::rename(temp, target)?;
            Ok(())
        }
    }
}

/// Published record files end in `.json` and are not hidden temp files.
fn is_record_file(path: &Path) -> bool {
    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext == RECORD_EXTENSION);
    let hidden = path
        .file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with('.'));
    is_json && !hidden && path.is_file()
}

#[cfg(test)]
mod tests {
    use super::{FileMemoryStore, InMemoryStore, MemoryStore};
    use crate::{MemoryRecord, StorageError};
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn record(content: &str, timestamp: f64) -> MemoryRecord {
        MemoryRecord::at("alice", content, vec![0.5, -0.25, 0.125], timestamp)
    }

    #[tokio::test]
    async fn load_all_on_missing_directory_is_empty() {
        let temp = tempdir().expect("tempdir");
        let store = FileMemoryStore::new(temp.path().join("never-created"));
        let records = store.load_all().await.expect("load");
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn load_all_on_empty_directory_is_empty() {
        let temp = tempdir().expect("tempdir");
        let store = FileMemoryStore::new(temp.path());
        assert!(store.load_all().await.expect("load").is_empty());
    }

    #[tokio::test]
    async fn append_then_load_round_trips() {
        let temp = tempdir().expect("tempdir");
        let store = FileMemoryStore::new(temp.path().join("chat_logs"));
        let original = record("hello", 1_700_000_000.123456);
        store.append(&original).await.expect("append");

        let records = store.load_all().await.expect("load");
        assert_eq!(records, vec![original]);
    }

    #[tokio::test]
    async fn records_load_in_timestamp_order() {
        let temp = tempdir().expect("tempdir");
        let store = FileMemoryStore::new(temp.path());
        let late = record("late", 200.0);
        let early = record("early", 100.0);
        store.append(&late).await.expect("append late");
        store.append(&early).await.expect("append early");

        let records = store.load_all().await.expect("load");
        assert_eq!(records, vec![early, late]);
    }

    #[tokio::test]
    async fn appends_within_one_tick_do_not_collide() {
        let temp = tempdir().expect("tempdir");
        let store = FileMemoryStore::new(temp.path());
        let first = record("first", 1_700_000_000.0);
        let second = record("second", 1_700_000_000.0);
        assert_eq!(first.timestamp, second.timestamp);

        let (a, b) = tokio::join!(store.append(&first), store.append(&second));
        a.expect("append first");
        b.expect("append second");

        let records = store.load_all().await.expect("load");
        assert_eq!(records.len(), 2);
        assert!(records.contains(&first));
        assert!(records.contains(&second));
    }

    #[tokio::test]
    async fn concurrent_tasks_keep_every_record() {
        let temp = tempdir().expect("tempdir");
        let store = FileMemoryStore::new(temp.path());
        let mut handles = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.append(&record(&format!("m{i}"), 42.0)).await
            }));
        }
        for handle in handles {
            handle.await.expect("join").expect("append");
        }
        assert_eq!(store.load_all().await.expect("load").len(), 16);
    }

    #[tokio::test]
    async fn append_refuses_to_overwrite() {
        let temp = tempdir().expect("tempdir");
        let store = FileMemoryStore::new(temp.path());
        let original = record("once", 10.0);
        store.append(&original).await.expect("append");

        let err = store.append(&original).await.expect_err("duplicate");
        assert!(matches!(err, StorageError::AlreadyExists(_)));

        let leftovers = std::fs::read_dir(temp.path())
            .expect("read dir")
            .filter_map(Result::ok)
            .filter(|entry| entry.file_name().to_string_lossy().ends_with(".tmp"))
            .count();
        assert_eq!(leftovers, 0);
        assert_eq!(store.load_all().await.expect("load"), vec![original]);
    }

    #[tokio::test]
    async fn load_skips_corrupt_and_temp_files() {
        let temp = tempdir().expect("tempdir");
        let store = FileMemoryStore::new(temp.path());
        let good = record("good", 1.0);
        store.append(&good).await.expect("append");
        std::fs::write(temp.path().join("log_2_broken.json"), "{not json").expect("write");
        std::fs::write(temp.path().join(".log_3_partial.json.tmp"), "{}").expect("write");
        std::fs::write(temp.path().join("notes.txt"), "ignored").expect("write");

        assert_eq!(store.load_all().await.expect("load"), vec![good]);
    }

    #[tokio::test]
    async fn non_finite_vectors_are_rejected() {
        let temp = tempdir().expect("tempdir");
        let store = FileMemoryStore::new(temp.path());
        let mut bad = record("bad", 1.0);
        bad.vector[0] = f32::NAN;
        let err = store.append(&bad).await.expect_err("nan");
        assert!(matches!(err, StorageError::InvalidRecord(_)));
        assert!(store.load_all().await.expect("load").is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn load_all_fails_on_unreadable_root() {
        let temp = tempdir().expect("tempdir");
        let file_root = temp.path().join("not-a-dir");
        std::fs::write(&file_root, "x").expect("write");
        let store = FileMemoryStore::new(&file_root);
        let err = store.load_all().await.expect_err("not a directory");
        assert!(matches!(err, StorageError::Io(_)));
    }

    #[tokio::test]
    async fn in_memory_store_round_trips_and_rejects_duplicates() {
        let store = InMemoryStore::new();
        let original = record("hi", 5.0);
        store.append(&original).await.expect("append");
        assert!(store.append(&original).await.is_err());
        assert_eq!(store.len(), 1);
        assert_eq!(store.load_all().await.expect("load"), vec![original]);
    }
}
