//! Chat completion client used for notes and replies.

use crate::error::RemoteServiceError;
use crate::retry::{RetryPolicy, with_retry};
use autoagents_llm::LLMProvider;
use autoagents_llm::chat::{ChatMessage, ChatProvider, ChatRole, MessageType};
use futures_util::stream::{self, Stream, StreamExt};
use log::debug;
use std::pin::Pin;
use std::sync::Arc;

/// Reply text arriving chunk by chunk.
pub type ReplyStream = Pin<Box<dyn Stream<Item = Result<String, RemoteServiceError>> + Send>>;

/// Build a plain text chat message.
pub fn text_message(role: ChatRole, content: impl Into<String>) -> ChatMessage {
    ChatMessage {
        role,
        message_type: MessageType::Text,
        content: content.into(),
    }
}

/// Completion calls routed through the shared retry policy.
#[derive(Clone)]
pub struct CompletionClient {
    llm: Arc<dyn LLMProvider>,
    retry: RetryPolicy,
}

impl CompletionClient {
    /// Client over `llm`; every request is retried under `retry`.
    pub fn new(llm: Arc<dyn LLMProvider>, retry: RetryPolicy) -> Self {
        Self { llm, retry }
    }

    /// Request a whole answer; returns the trimmed text.
    pub async fn complete(&self, messages: &[ChatMessage]) -> Result<String, RemoteServiceError> {
        let messages = messages.to_vec();
        let text = with_retry(&self.retry, "completion", || {
            let llm = self.llm.clone();
            let messages = messages.clone();
            async move {
                let response = llm
                    .chat_with_tools(&messages, None, None)
                    .await
                    .map_err(RemoteServiceError::from)?;
                Ok::<_, RemoteServiceError>(response.text().unwrap_or_default())
            }
        })
        .await?;
        let text = text.trim().to_string();
        if text.is_empty() {
            return Err(RemoteServiceError::EmptyResponse("completion".to_string()));
        }
        debug!("completion received (chars={})", text.chars().count());
        Ok(text)
    }

    /// Open a streaming answer.
    ///
    /// Opening the stream is retried; once chunks flow, a failure or a gap
    /// longer than the per-attempt timeout ends the stream with an error.
    pub async fn stream(&self, messages: &[ChatMessage]) -> Result<ReplyStream, RemoteServiceError> {
        let messages = messages.to_vec();
        let inner = with_retry(&self.retry, "completion stream", || {
            let llm = self.llm.clone();
            let messages = messages.clone();
            async move {
                llm.chat_stream(&messages, None)
                    .await
                    .map_err(RemoteServiceError::from)
            }
        })
        .await?;
        let idle_timeout = self.retry.timeout;
        let chunks = stream::unfold(Some(inner), move |state| async move {
            let Some(mut inner) = state else {
                return None;
            };
            match tokio::time::timeout(idle_timeout, inner.next()).await {
                Ok(Some(Ok(chunk))) => Some((Ok(chunk), Some(inner))),
                Ok(Some(Err(err))) => Some((Err(RemoteServiceError::from(err)), None)),
                Ok(None) => None,
                Err(_) => Some((
                    Err(RemoteServiceError::Timeout {
                        operation: "completion stream".to_string(),
                        timeout_ms: idle_timeout.as_millis() as u64,
                    }),
                    None,
                )),
            }
        });
        Ok(Box::pin(chunks))
    }
}

#[cfg(test)]
mod tests {
    use super::{CompletionClient, text_message};
    use crate::error::RemoteServiceError;
    use crate::retry::RetryPolicy;
    use autoagents_llm::chat::ChatRole;
    use futures_util::StreamExt;
    use glovedbot_test_utils::{FailingLLM, FixedLLM, RecordingChatLLM, StallingLLM, StreamingLLM};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn complete_trims_and_forwards_messages() {
        let llm = RecordingChatLLM::new("  some notes \n");
        let client = CompletionClient::new(Arc::new(llm.clone()), RetryPolicy::default());
        let messages = vec![
            text_message(ChatRole::System, "take notes"),
            text_message(ChatRole::User, "alice: hi"),
        ];
        let text = client.complete(&messages).await.expect("complete");
        assert_eq!(text, "some notes");
        let seen = llm.last_messages();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[1].content, "alice: hi");
    }

    #[tokio::test]
    async fn blank_completion_is_empty_response() {
        let client = CompletionClient::new(Arc::new(FixedLLM::new("   ")), RetryPolicy::default());
        let err = client.complete(&[]).await.unwrap_err();
        assert_eq!(err, RemoteServiceError::EmptyResponse("completion".to_string()));
    }

    #[tokio::test]
    async fn context_overflow_is_distinguished() {
        let llm = FailingLLM::new("This model's maximum context length is 8192 tokens");
        let client = CompletionClient::new(Arc::new(llm), RetryPolicy::default());
        let err = client.complete(&[]).await.unwrap_err();
        assert!(matches!(err, RemoteServiceError::ContextTooLong(_)));
    }

    #[tokio::test]
    async fn stream_yields_chunks_in_order() {
        let llm = StreamingLLM::new(vec!["Hel".to_string(), "lo".to_string(), "!".to_string()]);
        let client = CompletionClient::new(Arc::new(llm), RetryPolicy::default());
        let chunks = client
            .stream(&[])
            .await
            .expect("stream")
            .map(|chunk| chunk.expect("chunk"))
            .collect::<Vec<_>>()
            .await;
        assert_eq!(chunks, vec!["Hel", "lo", "!"]);
    }

    #[tokio::test]
    async fn stalled_stream_ends_with_timeout() {
        let policy = RetryPolicy {
            timeout: Duration::from_millis(20),
            ..RetryPolicy::default()
        };
        let client = CompletionClient::new(Arc::new(StallingLLM::new("partial")), policy);
        let mut chunks = client.stream(&[]).await.expect("stream");
        assert_eq!(chunks.next().await, Some(Ok("partial".to_string())));
        assert_eq!(
            chunks.next().await,
            Some(Err(RemoteServiceError::Timeout {
                operation: "completion stream".to_string(),
                timeout_ms: 20,
            }))
        );
        assert_eq!(chunks.next().await, None);
    }
}
