//! Per-message memory cycle: remember, recall, summarize.

use crate::completion::CompletionClient;
use crate::embedder::{Embedder, LlmEmbedder};
use crate::error::GlovedBotError;
use crate::llm::LlmProviders;
use crate::retry::RetryPolicy;
use crate::summarizer::Summarizer;
use glovedbot_config::GlovedConfig;
use glovedbot_memory::{
    MemoryRecord, MemoryStore, NotesHistory, RecallOptions, Retriever, score_all,
};
use log::{info, warn};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// What one turn produced for prompt assembly.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnMemory {
    /// Record persisted for the inbound message.
    pub record: MemoryRecord,
    /// Records the notes were written from, most similar first.
    pub recalled: Vec<MemoryRecord>,
    /// Fresh notes, now the latest entry of the notes log.
    pub notes: String,
    pub notes_vector: Vec<f32>,
    /// Previous notes, if the log holds at least two entries.
    pub context: Option<String>,
}

/// Record counts per vector dimension.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryStats {
    pub records: usize,
    /// Vector length mapped to the number of records with that length.
    pub dimensions: BTreeMap<usize, usize>,
}

impl MemoryStats {
    /// Tally `records` by vector length.
    pub fn from_records(records: &[MemoryRecord]) -> Self {
        let mut stats = Self {
            records: records.len(),
            ..Self::default()
        };
        for record in records {
            *stats.dimensions.entry(record.dimension()).or_default() += 1;
        }
        stats
    }

    /// True when stored vectors disagree on their length.
    pub fn is_mixed(&self) -> bool {
        self.dimensions.len() > 1
    }
}

/// Store, embedder, retriever and summarizer wired into one turn cycle.
///
/// Turns run one at a time: the summarizer lock is held from the embedding
/// call until the notes are committed.
pub struct MemoryEngine {
    store: Arc<dyn MemoryStore>,
    embedder: Arc<dyn Embedder>,
    retriever: Retriever,
    summarizer: Mutex<Summarizer>,
}

impl MemoryEngine {
    /// Wire already-built parts together.
    pub fn new(
        store: Arc<dyn MemoryStore>,
        embedder: Arc<dyn Embedder>,
        retriever: Retriever,
        summarizer: Summarizer,
    ) -> Self {
        Self {
            store,
            embedder,
            retriever,
            summarizer: Mutex::new(summarizer),
        }
    }

    /// Engine over `store` using the configured recall and retry settings.
    pub fn from_config(
        config: &GlovedConfig,
        providers: &LlmProviders,
        store: Arc<dyn MemoryStore>,
    ) -> Self {
        let retry = RetryPolicy::from(&config.retry);
        let embedder: Arc<dyn Embedder> =
            Arc::new(LlmEmbedder::new(providers.embedding.clone(), retry));
        let summarizer = Summarizer::new(
            CompletionClient::new(providers.summary.clone(), retry),
            embedder.clone(),
            NotesHistory::with_capacity(config.memory.notes_capacity),
        );
        let retriever = Retriever::new(RecallOptions {
            k: config.memory.recall_k,
            min_score: config.memory.min_score,
        });
        Self::new(store, embedder, retriever, summarizer)
    }

    /// Run the memory cycle for one inbound message.
    ///
    /// Nothing is persisted and the notes log is unchanged unless every step
    /// succeeds.
    pub async fn remember_and_recall(
        &self,
        speaker: &str,
        content: &str,
    ) -> Result<TurnMemory, GlovedBotError> {
        let mut summarizer = self.summarizer.lock().await;

        let vector = self.embedder.embed(content).await?;
        let record = MemoryRecord::new(speaker, content, vector);
        let mut history = self.store.load_all().await?;
        history.push(record.clone());

        let recalled = self.retriever.recall(&record.vector, &history);
        let summary = summarizer.summarize(&recalled).await?;
        let recalled = recalled.into_iter().cloned().collect::<Vec<_>>();

        if let Err(err) = self.store.append(&record).await {
            warn!(
                "failed to persist memory, notes not committed (id={}, error={})",
                record.id, err
            );
            return Err(err.into());
        }
        summarizer.commit(summary.notes.clone());
        let context = summarizer.notes().context_note().map(str::to_string);

        info!(
            "memory turn complete (id={}, speaker={}, history={}, recalled={}, notes={})",
            record.id,
            record.speaker,
            history.len(),
            recalled.len(),
            summarizer.notes().len()
        );
        Ok(TurnMemory {
            record,
            recalled,
            notes: summary.notes,
            notes_vector: summary.vector,
            context,
        })
    }

    /// Score stored records against `query` without touching the notes log.
    pub async fn recall_scored(
        &self,
        query: &str,
        k: usize,
    ) -> Result<Vec<(MemoryRecord, f32)>, GlovedBotError> {
        let vector = self.embedder.embed(query).await?;
        let history = self.store.load_all().await?;
        let min_score = self.retriever.options().min_score;
        let scored = score_all(&vector, &history)
            .into_iter()
            .filter(|scored| min_score.is_none_or(|min_score| scored.score >= min_score))
            .take(k)
            .map(|scored| (history[scored.index].clone(), scored.score))
            .collect();
        Ok(scored)
    }

    /// Count stored records per dimension; mixed dimensions are logged.
    pub async fn stats(&self) -> Result<MemoryStats, GlovedBotError> {
        let history = self.store.load_all().await?;
        let stats = MemoryStats::from_records(&history);
        if stats.is_mixed() {
            warn!(
                "stored vectors have mixed dimensions (dimensions={:?})",
                stats.dimensions
            );
        }
        Ok(stats)
    }

    /// Copy of the notes log, oldest first.
    pub async fn notes(&self) -> Vec<String> {
        self.summarizer
            .lock()
            .await
            .notes()
            .iter()
            .map(str::to_string)
            .collect()
    }
}
