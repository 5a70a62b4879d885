//! Notes produced from recalled memories.

use crate::completion::{CompletionClient, text_message};
use crate::embedder::Embedder;
use crate::error::GlovedBotError;
use autoagents_llm::chat::{ChatMessage, ChatRole};
use glovedbot_memory::{MemoryRecord, NotesHistory};
use log::{debug, info};
use std::sync::Arc;

/// Instruction sent ahead of the recalled records.
pub const NOTES_INSTRUCTION: &str = "You keep notes for a chat bot. Read the remembered \
messages below and write a short set of notes capturing the facts, people, preferences \
and open questions they mention. Keep names and dates. Do not invent details.";

/// Result of one summarization call. Not yet part of the notes log.
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    /// Notes text returned by the model.
    pub notes: String,
    /// Embedding of `notes`.
    pub vector: Vec<f32>,
    /// Earlier note that was sent along as context, if any.
    pub context: Option<String>,
}

/// Condenses recalled records into notes and owns the rolling notes log.
pub struct Summarizer {
    completion: CompletionClient,
    embedder: Arc<dyn Embedder>,
    notes: NotesHistory,
}

impl Summarizer {
    /// Summarizer that starts from `notes`.
    pub fn new(
        completion: CompletionClient,
        embedder: Arc<dyn Embedder>,
        notes: NotesHistory,
    ) -> Self {
        Self {
            completion,
            embedder,
            notes,
        }
    }

    /// Committed notes, oldest first.
    pub fn notes(&self) -> &NotesHistory {
        &self.notes
    }

    /// Role-tagged request for `records`, with the context note when one exists.
    pub fn build_request(&self, records: &[&MemoryRecord]) -> Vec<ChatMessage> {
        let mut messages = vec![text_message(ChatRole::System, NOTES_INSTRUCTION)];
        match self.notes.context_note() {
            Some(context) => messages.push(text_message(
                ChatRole::User,
                format!("Earlier notes:\n{context}"),
            )),
            None => debug!("no context note yet (notes={})", self.notes.len()),
        }
        let memories = records
            .iter()
            .map(|record| record.message.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        messages.push(text_message(ChatRole::User, memories));
        messages
    }

    /// Summarize `records` and embed the notes.
    ///
    /// The notes log is left untouched; call `commit` once the turn is durable.
    pub async fn summarize(&self, records: &[&MemoryRecord]) -> Result<Summary, GlovedBotError> {
        let context = self.notes.context_note().map(str::to_string);
        let request = self.build_request(records);
        let notes = self.completion.complete(&request).await?;
        let vector = self.embedder.embed(&notes).await?;
        info!(
            "summarized memories (records={}, notes_chars={}, context={})",
            records.len(),
            notes.chars().count(),
            context.is_some()
        );
        Ok(Summary {
            notes,
            vector,
            context,
        })
    }

    /// Append notes to the log.
    pub fn commit(&mut self, notes: impl Into<String>) {
        self.notes.push(notes);
    }

    /// Summarize and immediately commit, for callers with nothing to persist.
    pub async fn summarize_and_commit(
        &mut self,
        records: &[&MemoryRecord],
    ) -> Result<Summary, GlovedBotError> {
        let summary = self.summarize(records).await?;
        self.commit(summary.notes.clone());
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::{NOTES_INSTRUCTION, Summarizer};
    use crate::completion::CompletionClient;
    use crate::embedder::LlmEmbedder;
    use crate::error::{GlovedBotError, RemoteServiceError};
    use crate::retry::RetryPolicy;
    use glovedbot_memory::{MemoryRecord, NotesHistory};
    use glovedbot_test_utils::{FailingLLM, RecordingChatLLM, record_at};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn summarizer_with(llm: RecordingChatLLM, notes: NotesHistory) -> Summarizer {
        let llm = Arc::new(llm);
        Summarizer::new(
            CompletionClient::new(llm.clone(), RetryPolicy::default()),
            Arc::new(LlmEmbedder::new(llm, RetryPolicy::default())),
            notes,
        )
    }

    fn history(entries: &[&str]) -> NotesHistory {
        let mut notes = NotesHistory::default();
        for entry in entries {
            notes.push(*entry);
        }
        notes
    }

    fn records() -> Vec<MemoryRecord> {
        vec![
            record_at("alice", "I adopted a cat", vec![1.0, 0.0], 10.0),
            record_at("bob", "Nice!", vec![0.0, 1.0], 20.0),
        ]
    }

    #[tokio::test]
    async fn single_note_sends_no_context() {
        let llm = RecordingChatLLM::new("alice has a cat");
        let summarizer = summarizer_with(llm.clone(), history(&["n1"]));
        let records = records();
        let refs = records.iter().collect::<Vec<_>>();
        let summary = summarizer.summarize(&refs).await.expect("summarize");
        assert_eq!(summary.context, None);
        let sent = llm.last_messages();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].content, NOTES_INSTRUCTION);
        assert_eq!(
            sent[1].content,
            format!("{}\n{}", records[0].message, records[1].message)
        );
    }

    #[tokio::test]
    async fn context_is_second_most_recent_note() {
        let llm = RecordingChatLLM::new("notes");
        let summarizer = summarizer_with(llm.clone(), history(&["n1", "n2", "n3"]));
        let records = records();
        let refs = records.iter().collect::<Vec<_>>();
        let summary = summarizer.summarize(&refs).await.expect("summarize");
        assert_eq!(summary.context.as_deref(), Some("n2"));
        let sent = llm.last_messages();
        assert_eq!(sent.len(), 3);
        assert_eq!(sent[1].content, "Earlier notes:\nn2");
    }

    #[tokio::test]
    async fn summarize_embeds_notes_and_leaves_log_alone() {
        let llm =
            RecordingChatLLM::new("bob likes cats").with_keyed_embedding("bob", vec![0.3, 0.4]);
        let summarizer = summarizer_with(llm, history(&["n1"]));
        let records = records();
        let refs = records.iter().collect::<Vec<_>>();
        let summary = summarizer.summarize(&refs).await.expect("summarize");
        assert_eq!(summary.notes, "bob likes cats");
        assert_eq!(summary.vector, vec![0.3, 0.4]);
        assert_eq!(summarizer.notes().len(), 1);
    }

    #[tokio::test]
    async fn summarize_and_commit_appends_note() {
        let llm = RecordingChatLLM::new("fresh notes");
        let mut summarizer = summarizer_with(llm, history(&["n1", "n2"]));
        let records = records();
        let refs = records.iter().collect::<Vec<_>>();
        summarizer.summarize_and_commit(&refs).await.expect("summarize");
        assert_eq!(summarizer.notes().latest(), Some("fresh notes"));
        assert_eq!(summarizer.notes().context_note(), Some("n2"));
    }

    #[tokio::test]
    async fn failure_keeps_notes_unchanged() {
        let llm = Arc::new(FailingLLM::chat_only("This model's maximum context length is 4097"));
        let mut summarizer = Summarizer::new(
            CompletionClient::new(llm.clone(), RetryPolicy::default()),
            Arc::new(LlmEmbedder::new(llm, RetryPolicy::default())),
            history(&["n1", "n2"]),
        );
        let records = records();
        let refs = records.iter().collect::<Vec<_>>();
        let err = summarizer.summarize_and_commit(&refs).await.unwrap_err();
        assert!(matches!(
            err,
            GlovedBotError::Remote(RemoteServiceError::ContextTooLong(_))
        ));
        assert_eq!(summarizer.notes().iter().collect::<Vec<_>>(), vec!["n1", "n2"]);
    }
}
