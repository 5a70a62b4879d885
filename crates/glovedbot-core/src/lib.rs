//! Turn engine for GlovedBot.
//!
//! This crate owns the remote embedding and completion calls, the notes
//! summarizer, prompt rendering and reply delivery, and ties them to the
//! memory store in a per-message cycle.

pub mod completion;
pub mod embedder;
pub mod engine;
pub mod error;
pub mod llm;
pub mod prompt;
pub mod reply;
pub mod retry;
pub mod session;
pub mod summarizer;

pub use completion::{CompletionClient, ReplyStream, text_message};
pub use embedder::{Embedder, LlmEmbedder};
pub use engine::{MemoryEngine, MemoryStats, TurnMemory};
/// Error types and result classes.
pub use error::{CompletionStatus, GlovedBotError, RemoteServiceError};
pub use llm::{LlmProviders, build_providers};
/// Prompt rendering.
pub use prompt::{ChatLine, Conversation, MentionResolver, Prompt, TurnPrompt, resolve_mentions};
/// Reply delivery.
pub use reply::{BufferedSink, ReplySink, send_reply, split_into_shorter_messages, stream_reply};
pub use retry::{RetryPolicy, with_retry};
pub use session::{ChatSession, error_notice};
pub use summarizer::{Summarizer, Summary};
