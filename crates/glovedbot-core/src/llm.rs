//! Provider construction from the `llm` config block.

use crate::error::{GlovedBotError, RemoteServiceError};
use autoagents_llm::LLMProvider;
use autoagents_llm::backends::google::Google;
use autoagents_llm::backends::openai::OpenAI;
use autoagents_llm::builder::LLMBuilder;
use glovedbot_config::{LlmConfig, LlmProviderKind};
use log::info;
use std::sync::Arc;

/// Mistral speaks the OpenAI wire format at this endpoint.
pub const MISTRAL_BASE_URL: &str = "https://api.mistral.ai/v1/";

/// One provider handle per role, each bound to its model.
#[derive(Clone)]
pub struct LlmProviders {
    /// Reply completions.
    pub chat: Arc<dyn LLMProvider>,
    /// Notes completions.
    pub summary: Arc<dyn LLMProvider>,
    pub embedding: Arc<dyn LLMProvider>,
}

pub fn build_providers(config: &LlmConfig) -> Result<LlmProviders, GlovedBotError> {
    let api_key = config.api_key()?;
    let chat = build_provider(config, &api_key, config.chat_model())?;
    let summary = build_provider(config, &api_key, config.summary_model())?;
    let embedding = build_provider(config, &api_key, config.embedding_model())?;
    info!(
        "built llm providers (provider={:?}, chat_model={}, summary_model={}, embedding_model={})",
        config.provider,
        config.chat_model(),
        config.summary_model(),
        config.embedding_model()
    );
    Ok(LlmProviders {
        chat,
        summary,
        embedding,
    })
}

fn build_provider(
    config: &LlmConfig,
    api_key: &str,
    model: String,
) -> Result<Arc<dyn LLMProvider>, GlovedBotError> {
    let llm: Arc<dyn LLMProvider> = match config.provider {
        LlmProviderKind::OpenAI | LlmProviderKind::Mistral => {
            let mut builder = LLMBuilder::<OpenAI>::new().api_key(api_key).model(model);
            let base_url = match (config.provider, config.base_url.as_deref()) {
                (_, Some(base_url)) => Some(base_url),
                (LlmProviderKind::Mistral, None) => Some(MISTRAL_BASE_URL),
                _ => None,
            };
            if let Some(base_url) = base_url {
                builder = builder.base_url(base_url);
            }
            if let Some(temperature) = config.temperature {
                builder = builder.temperature(temperature);
            }
            builder.build().map_err(RemoteServiceError::from)?
        }
        LlmProviderKind::Google => {
            let mut builder = LLMBuilder::<Google>::new().api_key(api_key).model(model);
            if let Some(base_url) = config.base_url.as_deref() {
                builder = builder.base_url(base_url);
            }
            if let Some(temperature) = config.temperature {
                builder = builder.temperature(temperature);
            }
            builder.build().map_err(RemoteServiceError::from)?
        }
    };
    Ok(llm)
}
