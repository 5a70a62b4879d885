//! Text embedding behind a small trait so the engine can run on mocks.

use crate::error::RemoteServiceError;
use crate::retry::{RetryPolicy, with_retry};
use async_trait::async_trait;
use autoagents_llm::LLMProvider;
use autoagents_llm::embedding::EmbeddingProvider;
use log::debug;
use std::sync::Arc;

/// Turns text into a fixed-length vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed `text` as-is; empty input is sent unchanged.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RemoteServiceError>;
}

/// Embedder backed by an LLM provider's embedding endpoint.
#[derive(Clone)]
pub struct LlmEmbedder {
    llm: Arc<dyn LLMProvider>,
    retry: RetryPolicy,
}

impl LlmEmbedder {
    /// Embedder over `llm` using the shared retry policy.
    pub fn new(llm: Arc<dyn LLMProvider>, retry: RetryPolicy) -> Self {
        Self { llm, retry }
    }
}

#[async_trait]
impl Embedder for LlmEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RemoteServiceError> {
        let input = text.to_string();
        let vectors = with_retry(&self.retry, "embedding", || {
            let llm = self.llm.clone();
            let input = vec![input.clone()];
            async move { llm.embed(input).await.map_err(RemoteServiceError::from) }
        })
        .await?;
        let vector = vectors
            .into_iter()
            .next()
            .filter(|vector| !vector.is_empty())
            .ok_or_else(|| RemoteServiceError::EmptyResponse("embedding".to_string()))?;
        debug!(
            "embedded text (chars={}, dim={})",
            text.chars().count(),
            vector.len()
        );
        Ok(vector)
    }
}

#[cfg(test)]
mod tests {
    use super::{Embedder, LlmEmbedder};
    use crate::error::RemoteServiceError;
    use crate::retry::RetryPolicy;
    use glovedbot_test_utils::{FailingLLM, FixedLLM, FlakyLLM};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use std::time::Duration;

    fn quick_retry() -> RetryPolicy {
        RetryPolicy {
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            ..RetryPolicy::default()
        }
    }

    #[tokio::test]
    async fn returns_provider_vector() {
        let llm = FixedLLM::new("unused").with_keyed_embedding("cats", vec![0.1, 0.2, 0.3]);
        let embedder = LlmEmbedder::new(Arc::new(llm), quick_retry());
        let vector = embedder.embed("I like cats").await.expect("embed");
        assert_eq!(vector, vec![0.1, 0.2, 0.3]);
    }

    #[tokio::test]
    async fn empty_text_is_passed_through() {
        let llm = FixedLLM::new("unused").with_embedding(vec![0.5, 0.5]);
        let embedder = LlmEmbedder::new(Arc::new(llm), quick_retry());
        assert_eq!(embedder.embed("").await.expect("embed"), vec![0.5, 0.5]);
    }

    #[tokio::test]
    async fn empty_vector_is_an_error() {
        let llm = FixedLLM::new("unused").with_embedding(Vec::new());
        let embedder = LlmEmbedder::new(Arc::new(llm), quick_retry());
        let err = embedder.embed("hello").await.unwrap_err();
        assert_eq!(err, RemoteServiceError::EmptyResponse("embedding".to_string()));
    }

    #[tokio::test]
    async fn transient_failures_are_retried() {
        let llm = FlakyLLM::new("unused", "503 Service Unavailable", 2);
        let embedder = LlmEmbedder::new(Arc::new(llm.clone()), quick_retry());
        embedder.embed("hello").await.expect("embed");
        assert_eq!(llm.attempt_count(), 3);
    }

    #[tokio::test]
    async fn permanent_failures_surface_once() {
        let llm = FailingLLM::new("401 Unauthorized");
        let embedder = LlmEmbedder::new(Arc::new(llm), quick_retry());
        let err = embedder.embed("hello").await.unwrap_err();
        assert!(matches!(err, RemoteServiceError::Provider(message) if message.contains("401")));
    }
}
