// OpenAI-compatible client implementation (OpenAI, Mistral, local servers)

use crate::streaming::parse_chat_sse_stream;
use crate::traits::{ChatClient, ChatOptions, ChatRequest, EventStream};
use crate::types::{Content, ContentPart, Message};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde_json::{Map, Value};

const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

/// Chat-completions client (HTTP direct, no SDK)
pub struct OpenAIClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl OpenAIClient {
    /// Create new client with API key
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if !api_key.is_empty() {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {}", api_key))
                    .context("Invalid API key format")?,
            );
        }

        let http_client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http_client,
            base_url: OPENAI_API_BASE.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build chat completion request payload
    pub(crate) fn build_chat_request(
        model: &str,
        messages: Vec<Message>,
        options: &ChatOptions,
        stream: bool,
    ) -> Value {
        let openai_messages: Vec<Value> = messages
            .into_iter()
            .map(Self::convert_message)
            .collect();

        let mut obj = Map::new();
        obj.insert("model".to_string(), Value::from(model));
        obj.insert("messages".to_string(), Value::Array(openai_messages));
        obj.insert("stream".to_string(), Value::Bool(stream));

        if let Some(temp) = options.temperature {
            obj.insert("temperature".to_string(), serde_json::json!(temp));
        }
        if let Some(max_tokens) = options.max_tokens {
            obj.insert("max_tokens".to_string(), serde_json::json!(max_tokens));
        }

        Value::Object(obj)
    }

    /// Convert our Message type to wire format
    fn convert_message(message: Message) -> Value {
        let role = message.role().to_string();
        let (content, name) = match message {
            Message::System { content, name }
            | Message::Human { content, name }
            | Message::AI { content, name } => (content, name),
        };

        let mut obj = Map::new();
        obj.insert("role".to_string(), Value::String(role));
        obj.insert("content".to_string(), Self::convert_content(content));
        if let Some(name) = name {
            obj.insert("name".to_string(), Value::String(name));
        }
        Value::Object(obj)
    }

    /// Convert Content to wire format (string or array)
    fn convert_content(content: Content) -> Value {
        match content {
            Content::Text(s) => Value::String(s),
            Content::Parts(parts) => {
                let converted: Vec<Value> = parts
                    .into_iter()
                    .map(|part| match part {
                        ContentPart::Text { text } => {
                            serde_json::json!({
                                "type": "text",
                                "text": text,
                            })
                        }
                        ContentPart::ImageUrl { image_url } => {
                            serde_json::json!({
                                "type": "image_url",
                                "image_url": image_url,
                            })
                        }
                    })
                    .collect();
                Value::Array(converted)
            }
        }
    }
}

#[async_trait]
impl ChatClient for OpenAIClient {
    async fn chat_stream(&self, request: ChatRequest) -> Result<EventStream> {
        let payload = Self::build_chat_request(
            &request.model,
            request.messages,
            &request.options,
            true,
        );

        tracing::debug!(model = %request.model, base_url = %self.base_url, "opening completion stream");

        let response = self
            .http_client
            .post(format!("{}/chat/completions", self.base_url))
            .json(&payload)
            .send()
            .await
            .context("Failed to send request")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Completion API error ({}): {}", status, error_text);
        }

        Ok(parse_chat_sse_stream(response))
    }
}
