use async_trait::async_trait;
use crate::types::{AppResult, LLMProvider, LLMRequest, LLMResponse};

#[async_trait]
pub trait LLMAdapter: Send + Sync {
    async fn create_chat_completion(&self, request: &LLMRequest) -> AppResult<LLMResponse>;
}

/// Provider selection handed to the `LLM` factory
pub struct LLMProviderConfig {
    pub provider: LLMProvider,
    pub api_key: String,
    /// Overrides the provider's default endpoint (proxies, local gateways)
    pub api_base: Option<String>,
}

pub struct LLM {
    adapter: Box<dyn LLMAdapter>,
}

impl LLM {
    pub fn new(config: LLMProviderConfig) -> Self {
        let adapter: Box<dyn LLMAdapter> = match (config.provider, config.api_base) {
            (LLMProvider::Anthropic, Some(base)) => Box::new(
                crate::llm::anthropic::AnthropicAdapter::new_with_api_base(&config.api_key, &base),
            ),
            (LLMProvider::Anthropic, None) => {
                Box::new(crate::llm::anthropic::AnthropicAdapter::new(&config.api_key))
            }
            (_, Some(base)) => Box::new(crate::llm::openai::OpenAIAdapter::new_with_api_base(
                &config.api_key,
                &base,
            )),
            (LLMProvider::OpenAI, None) => {
                Box::new(crate::llm::openai::OpenAIAdapter::new(&config.api_key))
            }
            (LLMProvider::OpenRouter, None) => {
                Box::new(crate::llm::openrouter::OpenRouterAdapter::new(&config.api_key))
            }
            (LLMProvider::Groq, None) => Box::new(crate::llm::groq::GroqAdapter::new(&config.api_key)),
        };

        Self { adapter }
    }
}

#[async_trait]
impl LLMAdapter for LLM {
    async fn create_chat_completion(&self, request: &LLMRequest) -> AppResult<LLMResponse> {
        self.adapter.create_chat_completion(request).await
    }
}
