//! Long-term conversation memory for GlovedBot.
//!
//! Records are embedded messages persisted one file per record. Retrieval is
//! an exact cosine-similarity scan over the full history, and the rolling
//! notes log keeps the summaries produced from recalled records.

pub mod error;
pub mod model;
pub mod notes;
pub mod retrieval;
pub mod store;

/// Storage error type.
pub use error::StorageError;
/// Memory record model.
pub use model::MemoryRecord;
/// Bounded notes log.
pub use notes::NotesHistory;
/// Similarity scoring and top-k selection.
pub use retrieval::{RecallOptions, Retriever, ScoredRecord, cosine_similarity, score_all, top_k};
/// Memory store interface plus file and in-memory implementations.
pub use store::{FileMemoryStore, InMemoryStore, MemoryStore};
