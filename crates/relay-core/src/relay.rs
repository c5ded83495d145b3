use relay_llm::{ChatClient, ChatOptions, ChatRequest, ContentEncoder, ModelCapabilities};
use std::sync::Arc;

use crate::chain::{ChainBuilder, ChainOutcome};
use crate::error::{RelayError, Result};
use crate::history::{HistoryAssembler, Warnings};
use crate::in_flight::InFlightRegistry;
use crate::node::{MessageId, UserId};
use crate::platform::{MessageFetcher, MessageSink, PlatformMessage};
use crate::prompt::system_prompt;
use crate::render::{RenderSettings, RenderedSegment, StreamRenderScheduler};
use crate::store::NodeStore;

/// Everything the relay needs to turn one message into one response
#[derive(Debug, Clone)]
pub struct RelaySettings {
    pub model: String,
    pub capabilities: ModelCapabilities,
    pub max_completion_tokens: u32,
    /// Per-message image cap; ignored (treated as 0) without vision support
    pub max_images: usize,
    pub max_messages: usize,
    pub system_prompt: String,
    pub render: RenderSettings,
    /// Identity the relay posts as
    pub self_id: UserId,
}

impl RelaySettings {
    pub fn effective_max_images(&self) -> usize {
        if self.capabilities.vision {
            self.max_images
        } else {
            0
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResponseSummary {
    pub request_id: MessageId,
    pub chain: ChainOutcome,
    pub history_len: usize,
    pub warnings: Vec<String>,
    pub segments: Vec<RenderedSegment>,
}

/// Shared relay context: node cache, in-flight set and external capabilities
///
/// One instance serves every conversation; `handle_message` may run
/// concurrently from many tasks.
pub struct Relay {
    settings: RelaySettings,
    warnings: Warnings,
    store: NodeStore,
    registry: InFlightRegistry,
    client: Arc<dyn ChatClient>,
    fetcher: Arc<dyn MessageFetcher>,
    sink: Arc<dyn MessageSink>,
    encoder: Arc<dyn ContentEncoder>,
}

impl Relay {
    pub fn new(
        settings: RelaySettings,
        client: Arc<dyn ChatClient>,
        fetcher: Arc<dyn MessageFetcher>,
        sink: Arc<dyn MessageSink>,
    ) -> Self {
        let warnings = Warnings::from_limits(settings.effective_max_images(), settings.max_messages);
        let encoder = settings.capabilities.content_encoder();
        Self {
            settings,
            warnings,
            store: NodeStore::new(),
            registry: InFlightRegistry::new(),
            client,
            fetcher,
            sink,
            encoder,
        }
    }

    pub fn settings(&self) -> &RelaySettings {
        &self.settings
    }

    pub fn store(&self) -> &NodeStore {
        &self.store
    }

    pub fn registry(&self) -> &InFlightRegistry {
        &self.registry
    }

    /// Direct conversations and mentions only; never other bots
    pub fn should_respond(&self, message: &PlatformMessage) -> bool {
        !message.author_is_bot
            && (message.is_direct || message.mentions.contains(&self.settings.self_id))
    }

    pub async fn handle_message(&self, message: PlatformMessage) -> Result<ResponseSummary> {
        let request_id = message.id;

        let chain = ChainBuilder::new(
            &self.store,
            &self.registry,
            self.fetcher.as_ref(),
            self.encoder.as_ref(),
            self.settings.self_id,
        )
        .max_images(self.settings.effective_max_images())
        .build(message)
        .await;

        let today = chrono::Local::now().date_naive();
        let system = system_prompt(&self.settings.system_prompt, self.settings.capabilities, today);
        let history = HistoryAssembler::new(&self.store, &self.warnings, self.settings.max_messages)
            .assemble(request_id, system)
            .await?;

        let history_len = history.chain.len();
        let warnings = history.sorted_warnings();
        tracing::info!(
            message_id = %request_id,
            chain_length = history_len,
            fetched = chain.fetched,
            warnings = warnings.len(),
            "message received"
        );

        let request = ChatRequest::new(self.settings.model.clone(), history.into_prompt())
            .with_options(ChatOptions::new().max_tokens(self.settings.max_completion_tokens));
        let events = self
            .client
            .chat_stream(request)
            .await
            .map_err(RelayError::Completion)?;

        let outcome = StreamRenderScheduler::new(
            Arc::clone(&self.sink),
            self.registry.clone(),
            Arc::clone(&self.encoder),
            self.settings.render,
            request_id,
            self.settings.self_id.to_string(),
        )
        .with_warnings(warnings.clone())
        .run(events, &self.store)
        .await?;

        Ok(ResponseSummary {
            request_id,
            chain,
            history_len,
            warnings,
            segments: outcome.segments,
        })
    }
}
