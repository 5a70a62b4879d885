use async_trait::async_trait;
use autoagents_llm::chat::{ChatMessage, ChatProvider, ChatResponse, StructuredOutputFormat, Tool};
use autoagents_llm::completion::{CompletionProvider, CompletionRequest, CompletionResponse};
use autoagents_llm::embedding::EmbeddingProvider;
use autoagents_llm::error::LLMError;
use autoagents_llm::models::ModelsProvider;
use autoagents_llm::{LLMProvider, ToolCall};
use futures_util::{Stream, StreamExt};
use futures_util::stream;
use parking_lot::Mutex;
use std::pin::Pin;
use std::sync::Arc;

type TextStream = Pin<Box<dyn Stream<Item = Result<String, LLMError>> + Send>>;

/// Embedding rules: the first key contained in the input wins.
#[derive(Debug, Clone)]
struct EmbeddingTable {
    default: Vec<f32>,
    keyed: Vec<(String, Vec<f32>)>,
}

impl EmbeddingTable {
    fn new(default: Vec<f32>) -> Self {
        Self {
            default,
            keyed: Vec::new(),
        }
    }

    fn lookup(&self, input: &str) -> Vec<f32> {
        self.keyed
            .iter()
            .find(|(key, _)| input.contains(key.as_str()))
            .map(|(_, vector)| vector.clone())
            .unwrap_or_else(|| self.default.clone())
    }

    fn embed_all(&self, input: Vec<String>) -> Vec<Vec<f32>> {
        input.iter().map(|text| self.lookup(text)).collect()
    }
}

#[derive(Debug, Clone)]
pub struct FixedChatResponse {
    text: String,
}

impl FixedChatResponse {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl std::fmt::Display for FixedChatResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.text)
    }
}

impl ChatResponse for FixedChatResponse {
    fn text(&self) -> Option<String> {
        Some(self.text.clone())
    }

    fn tool_calls(&self) -> Option<Vec<ToolCall>> {
        None
    }
}

/// Provider that answers every chat with the same text.
///
/// Embeddings come from a keyword table so tests can steer similarity.
#[derive(Debug, Clone)]
pub struct FixedLLM {
    response: String,
    embeddings: EmbeddingTable,
}

impl FixedLLM {
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            embeddings: EmbeddingTable::new(vec![1.0, 0.0]),
        }
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embeddings.default = embedding;
        self
    }

    /// Inputs containing `key` embed to `embedding`.
    pub fn with_keyed_embedding(mut self, key: impl Into<String>, embedding: Vec<f32>) -> Self {
        self.embeddings.keyed.push((key.into(), embedding));
        self
    }
}

#[async_trait]
impl ChatProvider for FixedLLM {
    async fn chat_with_tools(
        &self,
        _messages: &[ChatMessage],
        _tools: Option<&[Tool]>,
        _json_schema: Option<StructuredOutputFormat>,
    ) -> Result<Box<dyn ChatResponse>, LLMError> {
        Ok(Box::new(FixedChatResponse::new(self.response.clone())))
    }

    async fn chat_stream(
        &self,
        _messages: &[ChatMessage],
        _json_schema: Option<StructuredOutputFormat>,
    ) -> Result<TextStream, LLMError> {
        Ok(Box::pin(stream::iter(vec![Ok(self.response.clone())])))
    }
}

#[async_trait]
impl CompletionProvider for FixedLLM {
    async fn complete(
        &self,
        _req: &CompletionRequest,
        _json_schema: Option<StructuredOutputFormat>,
    ) -> Result<CompletionResponse, LLMError> {
        Ok(CompletionResponse {
            text: self.response.clone(),
        })
    }
}

#[async_trait]
impl EmbeddingProvider for FixedLLM {
    async fn embed(&self, input: Vec<String>) -> Result<Vec<Vec<f32>>, LLMError> {
        Ok(self.embeddings.embed_all(input))
    }
}

#[async_trait]
impl ModelsProvider for FixedLLM {}

impl LLMProvider for FixedLLM {}

/// Provider that streams a fixed list of chunks.
#[derive(Debug, Clone)]
pub struct StreamingLLM {
    chunks: Vec<String>,
    response: String,
}

impl StreamingLLM {
    pub fn new(chunks: Vec<String>) -> Self {
        let response = chunks.join("");
        Self { chunks, response }
    }
}

#[async_trait]
impl ChatProvider for StreamingLLM {
    async fn chat_with_tools(
        &self,
        _messages: &[ChatMessage],
        _tools: Option<&[Tool]>,
        _json_schema: Option<StructuredOutputFormat>,
    ) -> Result<Box<dyn ChatResponse>, LLMError> {
        Ok(Box::new(FixedChatResponse::new(self.response.clone())))
    }

    async fn chat_stream(
        &self,
        _messages: &[ChatMessage],
        _json_schema: Option<StructuredOutputFormat>,
    ) -> Result<TextStream, LLMError> {
        let chunks = self.chunks.iter().cloned().map(Ok).collect::<Vec<_>>();
        Ok(Box::pin(stream::iter(chunks)))
    }
}

#[async_trait]
impl CompletionProvider for StreamingLLM {
    async fn complete(
        &self,
        _req: &CompletionRequest,
        _json_schema: Option<StructuredOutputFormat>,
    ) -> Result<CompletionResponse, LLMError> {
        Ok(CompletionResponse {
            text: self.response.clone(),
        })
    }
}

#[async_trait]
impl EmbeddingProvider for StreamingLLM {
    async fn embed(&self, input: Vec<String>) -> Result<Vec<Vec<f32>>, LLMError> {
        Ok(input.into_iter().map(|_| vec![1.0, 0.0]).collect())
    }
}

#[async_trait]
impl ModelsProvider for StreamingLLM {}

impl LLMProvider for StreamingLLM {}

/// Provider whose stream sends one chunk and then never yields again.
#[derive(Debug, Clone)]
pub struct StallingLLM {
    first_chunk: String,
}

impl StallingLLM {
    pub fn new(first_chunk: impl Into<String>) -> Self {
        Self {
            first_chunk: first_chunk.into(),
        }
    }
}

#[async_trait]
impl ChatProvider for StallingLLM {
    async fn chat_with_tools(
        &self,
        _messages: &[ChatMessage],
        _tools: Option<&[Tool]>,
        _json_schema: Option<StructuredOutputFormat>,
    ) -> Result<Box<dyn ChatResponse>, LLMError> {
        Ok(Box::new(FixedChatResponse::new(self.first_chunk.clone())))
    }

    async fn chat_stream(
        &self,
        _messages: &[ChatMessage],
        _json_schema: Option<StructuredOutputFormat>,
    ) -> Result<TextStream, LLMError> {
        let first = stream::iter(vec![Ok(self.first_chunk.clone())]);
        Ok(Box::pin(first.chain(stream::pending())))
    }
}

#[async_trait]
impl CompletionProvider for StallingLLM {
    async fn complete(
        &self,
        _req: &CompletionRequest,
        _json_schema: Option<StructuredOutputFormat>,
    ) -> Result<CompletionResponse, LLMError> {
        Ok(CompletionResponse {
            text: self.first_chunk.clone(),
        })
    }
}

#[async_trait]
impl EmbeddingProvider for StallingLLM {
    async fn embed(&self, input: Vec<String>) -> Result<Vec<Vec<f32>>, LLMError> {
        Ok(input.into_iter().map(|_| vec![1.0, 0.0]).collect())
    }
}

#[async_trait]
impl ModelsProvider for StallingLLM {}

impl LLMProvider for StallingLLM {}

/// Provider that captures every chat request it receives.
#[derive(Debug, Clone)]
pub struct RecordingChatLLM {
    response: String,
    embeddings: EmbeddingTable,
    pub calls: Arc<Mutex<Vec<Vec<ChatMessage>>>>,
}

impl RecordingChatLLM {
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            embeddings: EmbeddingTable::new(vec![1.0, 0.0]),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_keyed_embedding(mut self, key: impl Into<String>, embedding: Vec<f32>) -> Self {
        self.embeddings.keyed.push((key.into(), embedding));
        self
    }

    /// Messages of the most recent chat request.
    pub fn last_messages(&self) -> Vec<ChatMessage> {
        self.calls.lock().last().cloned().unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl ChatProvider for RecordingChatLLM {
    async fn chat_with_tools(
        &self,
        messages: &[ChatMessage],
        _tools: Option<&[Tool]>,
        _json_schema: Option<StructuredOutputFormat>,
    ) -> Result<Box<dyn ChatResponse>, LLMError> {
        self.calls.lock().push(messages.to_vec());
        Ok(Box::new(FixedChatResponse::new(self.response.clone())))
    }

    async fn chat_stream(
        &self,
        messages: &[ChatMessage],
        _json_schema: Option<StructuredOutputFormat>,
    ) -> Result<TextStream, LLMError> {
        self.calls.lock().push(messages.to_vec());
        Ok(Box::pin(stream::iter(vec![Ok(self.response.clone())])))
    }
}

#[async_trait]
impl CompletionProvider for RecordingChatLLM {
    async fn complete(
        &self,
        _req: &CompletionRequest,
        _json_schema: Option<StructuredOutputFormat>,
    ) -> Result<CompletionResponse, LLMError> {
        Err(LLMError::ProviderError("recording".to_string()))
    }
}

#[async_trait]
impl EmbeddingProvider for RecordingChatLLM {
    async fn embed(&self, input: Vec<String>) -> Result<Vec<Vec<f32>>, LLMError> {
        Ok(self.embeddings.embed_all(input))
    }
}

#[async_trait]
impl ModelsProvider for RecordingChatLLM {}

impl LLMProvider for RecordingChatLLM {}

/// Provider whose calls fail with a fixed provider message.
///
/// `chat_only` keeps embeddings working so a turn fails at summarization.
#[derive(Debug, Clone)]
pub struct FailingLLM {
    message: String,
    fail_embeddings: bool,
}

impl FailingLLM {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            fail_embeddings: true,
        }
    }

    pub fn chat_only(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            fail_embeddings: false,
        }
    }
}

#[async_trait]
impl ChatProvider for FailingLLM {
    async fn chat_with_tools(
        &self,
        _messages: &[ChatMessage],
        _tools: Option<&[Tool]>,
        _json_schema: Option<StructuredOutputFormat>,
    ) -> Result<Box<dyn ChatResponse>, LLMError> {
        Err(LLMError::ProviderError(self.message.clone()))
    }

    async fn chat_stream(
        &self,
        _messages: &[ChatMessage],
        _json_schema: Option<StructuredOutputFormat>,
    ) -> Result<TextStream, LLMError> {
        Err(LLMError::ProviderError(self.message.clone()))
    }
}

#[async_trait]
impl CompletionProvider for FailingLLM {
    async fn complete(
        &self,
        _req: &CompletionRequest,
        _json_schema: Option<StructuredOutputFormat>,
    ) -> Result<CompletionResponse, LLMError> {
        Err(LLMError::ProviderError(self.message.clone()))
    }
}

#[async_trait]
impl EmbeddingProvider for FailingLLM {
    async fn embed(&self, input: Vec<String>) -> Result<Vec<Vec<f32>>, LLMError> {
        if self.fail_embeddings {
            return Err(LLMError::ProviderError(self.message.clone()));
        }
        Ok(input.into_iter().map(|_| vec![1.0, 0.0]).collect())
    }
}

#[async_trait]
impl ModelsProvider for FailingLLM {}

impl LLMProvider for FailingLLM {}

/// Provider that fails its first `failures` calls, then answers normally.
#[derive(Debug, Clone)]
pub struct FlakyLLM {
    response: String,
    message: String,
    failures: usize,
    pub attempts: Arc<Mutex<usize>>,
}

impl FlakyLLM {
    pub fn new(response: impl Into<String>, message: impl Into<String>, failures: usize) -> Self {
        Self {
            response: response.into(),
            message: message.into(),
            failures,
            attempts: Arc::new(Mutex::new(0)),
        }
    }

    pub fn attempt_count(&self) -> usize {
        *self.attempts.lock()
    }

    fn next_attempt(&self) -> Result<(), LLMError> {
        let mut attempts = self.attempts.lock();
        *attempts += 1;
        if *attempts <= self.failures {
            Err(LLMError::ProviderError(self.message.clone()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ChatProvider for FlakyLLM {
    async fn chat_with_tools(
        &self,
        _messages: &[ChatMessage],
        _tools: Option<&[Tool]>,
        _json_schema: Option<StructuredOutputFormat>,
    ) -> Result<Box<dyn ChatResponse>, LLMError> {
        self.next_attempt()?;
        Ok(Box::new(FixedChatResponse::new(self.response.clone())))
    }

    async fn chat_stream(
        &self,
        _messages: &[ChatMessage],
        _json_schema: Option<StructuredOutputFormat>,
    ) -> Result<TextStream, LLMError> {
        self.next_attempt()?;
        Ok(Box::pin(stream::iter(vec![Ok(self.response.clone())])))
    }
}

#[async_trait]
impl CompletionProvider for FlakyLLM {
    async fn complete(
        &self,
        _req: &CompletionRequest,
        _json_schema: Option<StructuredOutputFormat>,
    ) -> Result<CompletionResponse, LLMError> {
        self.next_attempt()?;
        Ok(CompletionResponse {
            text: self.response.clone(),
        })
    }
}

#[async_trait]
impl EmbeddingProvider for FlakyLLM {
    async fn embed(&self, input: Vec<String>) -> Result<Vec<Vec<f32>>, LLMError> {
        self.next_attempt()?;
        Ok(input.into_iter().map(|_| vec![1.0, 0.0]).collect())
    }
}

#[async_trait]
impl ModelsProvider for FlakyLLM {}

impl LLMProvider for FlakyLLM {}
