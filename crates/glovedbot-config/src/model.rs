//! Configuration schema for GlovedBot.

use crate::ConfigError;
use serde::{Deserialize, Serialize};

/// Root config for the bot.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GlovedConfig {
    #[serde(default, rename = "$schema")]
    pub schema: Option<String>,
    #[serde(default)]
    pub bot: BotConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub retry: RetryConfig,
}

impl GlovedConfig {
    /// Start building a config programmatically with defaults applied.
    pub fn builder() -> GlovedConfigBuilder {
        GlovedConfigBuilder::new()
    }
}

/// Builder for assembling a `GlovedConfig` in code.
#[derive(Debug, Default, Clone)]
pub struct GlovedConfigBuilder {
    config: GlovedConfig,
}

impl GlovedConfigBuilder {
    /// Create a new builder seeded with default config values.
    pub fn new() -> Self {
        Self {
            config: GlovedConfig::default(),
        }
    }

    /// Replace the persona configuration.
    pub fn bot(mut self, bot: BotConfig) -> Self {
        self.config.bot = bot;
        self
    }

    /// Replace the model provider configuration.
    pub fn llm(mut self, llm: LlmConfig) -> Self {
        self.config.llm = llm;
        self
    }

    /// Replace the memory configuration.
    pub fn memory(mut self, memory: MemoryConfig) -> Self {
        self.config.memory = memory;
        self
    }

    /// Replace the chat surface configuration.
    pub fn chat(mut self, chat: ChatConfig) -> Self {
        self.config.chat = chat;
        self
    }

    /// Replace the retry policy for remote calls.
    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.config.retry = retry;
        self
    }

    /// Finalize and return the built `GlovedConfig`.
    pub fn build(self) -> GlovedConfig {
        self.config
    }
}

/// Persona of the bot: name, instructions and few-shot conversations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    #[serde(default = "default_bot_name")]
    pub name: String,
    #[serde(default)]
    pub instructions: String,
    #[serde(default)]
    pub example_conversations: Vec<ExampleConversation>,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            name: default_bot_name(),
            instructions: String::new(),
            example_conversations: Vec::new(),
        }
    }
}

fn default_bot_name() -> String {
    "GlovedBot".to_string()
}

/// A few-shot example conversation rendered ahead of the live one.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(transparent)]
pub struct ExampleConversation {
    pub messages: Vec<ExampleMessage>,
}

/// One line of an example conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExampleMessage {
    pub user: String,
    pub text: String,
}

/// Hosted model family used for chat, summaries and embeddings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LlmProviderKind {
    #[default]
    OpenAI,
    Mistral,
    Google,
}

impl LlmProviderKind {
    /// Environment variable holding the API key when none is configured.
    pub fn default_api_key_env(self) -> &'static str {
        match self {
            LlmProviderKind::OpenAI => "OPENAI_API_KEY",
            LlmProviderKind::Mistral => "MISTRAL_API_KEY",
            LlmProviderKind::Google => "GOOGLE_AI_KEY",
        }
    }

    /// Default chat model for the provider.
    pub fn default_chat_model(self) -> &'static str {
        match self {
            LlmProviderKind::OpenAI => "gpt-4",
            LlmProviderKind::Mistral => "mistral-medium",
            LlmProviderKind::Google => "gemini-pro",
        }
    }

    /// Default embedding model for the provider.
    pub fn default_embedding_model(self) -> &'static str {
        match self {
            LlmProviderKind::OpenAI => "text-embedding-ada-002",
            LlmProviderKind::Mistral => "mistral-embed",
            LlmProviderKind::Google => "embedding-001",
        }
    }
}

/// Model provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LlmConfig {
    #[serde(default)]
    pub provider: LlmProviderKind,
    /// Model used for replies; provider default when unset.
    #[serde(default)]
    pub chat_model: Option<String>,
    /// Model used for memory notes; falls back to the chat model.
    #[serde(default)]
    pub summary_model: Option<String>,
    #[serde(default)]
    pub embedding_model: Option<String>,
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
}

impl LlmConfig {
    /// Resolved chat model name.
    pub fn chat_model(&self) -> String {
        self.chat_model
            .clone()
            .unwrap_or_else(|| self.provider.default_chat_model().to_string())
    }

    /// Resolved summary model name.
    pub fn summary_model(&self) -> String {
        self.summary_model
            .clone()
            .unwrap_or_else(|| self.chat_model())
    }

    /// Resolved embedding model name.
    pub fn embedding_model(&self) -> String {
        self.embedding_model
            .clone()
            .unwrap_or_else(|| self.provider.default_embedding_model().to_string())
    }

    /// Name of the environment variable holding the API key.
    pub fn api_key_env(&self) -> String {
        self.api_key_env
            .clone()
            .unwrap_or_else(|| self.provider.default_api_key_env().to_string())
    }

    /// Read the API key from the environment.
    pub fn api_key(&self) -> Result<String, ConfigError> {
        let name = self.api_key_env();
        match std::env::var(&name) {
            Ok(value) if !value.trim().is_empty() => Ok(value),
            _ => Err(ConfigError::MissingEnv(name)),
        }
    }
}

/// Memory storage and recall configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Directory for record files; defaults to `chat_logs` in the data dir.
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default = "default_recall_k")]
    pub recall_k: usize,
    #[serde(default = "default_notes_capacity")]
    pub notes_capacity: usize,
    #[serde(default)]
    pub min_score: Option<f32>,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            path: None,
            recall_k: default_recall_k(),
            notes_capacity: default_notes_capacity(),
            min_score: None,
        }
    }
}

/// Default number of memory records recalled per turn.
fn default_recall_k() -> usize {
    5
}

/// Default number of notes kept in the rolling log.
fn default_notes_capacity() -> usize {
    32
}

/// Chat surface limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    #[serde(default = "default_max_message_history")]
    pub max_message_history: usize,
    #[serde(default = "default_max_chars_per_reply")]
    pub max_chars_per_reply: usize,
    #[serde(default = "default_stream_segment_chars")]
    pub stream_segment_chars: usize,
    /// Delay before answering so bursts of messages are read together.
    #[serde(default)]
    pub response_delay_ms: u64,
    /// Stream replies as progressive edits instead of sending them whole.
    #[serde(default = "default_stream_replies")]
    pub stream_replies: bool,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_message_history: default_max_message_history(),
            max_chars_per_reply: default_max_chars_per_reply(),
            stream_segment_chars: default_stream_segment_chars(),
            response_delay_ms: 0,
            stream_replies: default_stream_replies(),
        }
    }
}

/// Default number of recent channel messages included in prompts.
fn default_max_message_history() -> usize {
    12
}

/// Default split size for long replies (the platform caps messages at 2k).
fn default_max_chars_per_reply() -> usize {
    1500
}

/// Default size at which a streamed reply continues in a new message.
fn default_stream_segment_chars() -> usize {
    1950
}

fn default_stream_replies() -> bool {
    true
}

/// Retry, backoff and timeout policy for remote calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_timeout_ms() -> u64 {
    30_000
}
