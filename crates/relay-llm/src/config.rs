// Provider configuration for OpenAI-compatible completion endpoints
// All supported providers speak the chat-completions wire format; they differ
// in base URL, authentication and which prompt features they accept.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::encoding::{ContentEncoder, FlatTextEncoder, StructuredContentEncoder};

const LOCAL_API_BASE: &str = "http://localhost:1234/v1";
const MISTRAL_API_BASE: &str = "https://api.mistral.ai/v1";
const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

/// Type of LLM provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    /// Local OpenAI-compatible server (LM Studio, llama.cpp, ...)
    #[default]
    Local,
    Mistral,
    OpenAI,
}

impl ProviderType {
    pub fn default_base_url(&self) -> &'static str {
        match self {
            ProviderType::Local => LOCAL_API_BASE,
            ProviderType::Mistral => MISTRAL_API_BASE,
            ProviderType::OpenAI => OPENAI_API_BASE,
        }
    }
}

/// Complete provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub provider: ProviderType,
    /// Local servers usually accept any key
    #[serde(default)]
    pub api_key: String,
    /// Overrides the provider's default base URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl ProviderConfig {
    pub fn new(provider: ProviderType, api_key: impl Into<String>) -> Self {
        Self {
            provider,
            api_key: api_key.into(),
            base_url: None,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Base URL actually used for requests
    pub fn resolved_base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.provider.default_base_url())
    }

    /// Create a chat client for this provider
    pub fn create_chat_client(&self) -> Result<Arc<dyn crate::traits::ChatClient>> {
        let client = crate::openai::OpenAIClient::new(self.api_key.clone())?
            .with_base_url(self.resolved_base_url());
        Ok(Arc::new(client))
    }
}

/// Prompt features a provider/model pair accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelCapabilities {
    /// Model accepts image parts
    pub vision: bool,
    /// Provider accepts `content` as a list of parts
    pub structured_content: bool,
    /// Provider honours the per-message `name` field
    pub message_names: bool,
}

impl ModelCapabilities {
    pub fn detect(provider: ProviderType, model: &str) -> Self {
        Self {
            vision: model.contains("vision"),
            structured_content: provider != ProviderType::Mistral,
            message_names: provider == ProviderType::OpenAI,
        }
    }

    /// Encoder matching the provider's content shape
    pub fn content_encoder(&self) -> Arc<dyn ContentEncoder> {
        if self.structured_content {
            Arc::new(StructuredContentEncoder)
        } else {
            Arc::new(FlatTextEncoder)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_base_urls() {
        let config = ProviderConfig::new(ProviderType::Mistral, "key");
        assert_eq!(config.resolved_base_url(), "https://api.mistral.ai/v1");

        let config = ProviderConfig::new(ProviderType::Local, "").with_base_url("http://10.0.0.2:8080/v1");
        assert_eq!(config.resolved_base_url(), "http://10.0.0.2:8080/v1");
    }

    #[test]
    fn test_mistral_capabilities() {
        let caps = ModelCapabilities::detect(ProviderType::Mistral, "mistral-medium");
        assert!(!caps.structured_content);
        assert!(!caps.message_names);
        assert!(!caps.vision);
    }

    #[test]
    fn test_vision_capabilities() {
        let caps = ModelCapabilities::detect(ProviderType::OpenAI, "gpt-4-vision-preview");
        assert!(caps.vision);
        assert!(caps.structured_content);
        assert!(caps.message_names);

        let caps = ModelCapabilities::detect(ProviderType::Local, "local-model");
        assert!(!caps.message_names);
    }

    #[test]
    fn test_provider_type_deserialize() {
        let config: ProviderConfig =
            serde_json::from_str(r#"{"provider":"openai","api_key":"sk-test"}"#).unwrap();
        assert_eq!(config.provider, ProviderType::OpenAI);
        assert!(config.base_url.is_none());
    }
}
