use relay_llm::{ContentEncoder, ImageUrl};

use crate::in_flight::InFlightRegistry;
use crate::node::{MessageId, MessageNode, Role, UserId};
use crate::platform::{MessageFetcher, PlatformMessage};
use crate::store::NodeStore;

/// Why an ascent stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainStop {
    /// Reached a message that replies to nothing
    Root,
    /// Reached an ancestor already in the store
    Cached(MessageId),
    /// The ancestor could not be fetched; history is partial
    Truncated(MessageId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainOutcome {
    pub leaf: MessageId,
    /// Nodes built during this ascent (including the leaf)
    pub built: usize,
    /// Ancestors fetched from the platform
    pub fetched: usize,
    pub stop: ChainStop,
}

/// Walks a reply chain upward, writing nodes through the [`NodeStore`]
///
/// The walk is iterative and ends as soon as it reaches an ancestor some
/// earlier walk already stored, so active threads cost O(1) per message.
pub struct ChainBuilder<'a> {
    store: &'a NodeStore,
    registry: &'a InFlightRegistry,
    fetcher: &'a dyn MessageFetcher,
    encoder: &'a dyn ContentEncoder,
    self_id: UserId,
    max_images: usize,
}

impl<'a> ChainBuilder<'a> {
    pub fn new(
        store: &'a NodeStore,
        registry: &'a InFlightRegistry,
        fetcher: &'a dyn MessageFetcher,
        encoder: &'a dyn ContentEncoder,
        self_id: UserId,
    ) -> Self {
        Self {
            store,
            registry,
            fetcher,
            encoder,
            self_id,
            max_images: 0,
        }
    }

    pub fn max_images(mut self, max_images: usize) -> Self {
        self.max_images = max_images;
        self
    }

    pub async fn build(&self, start: PlatformMessage) -> ChainOutcome {
        // Never chain onto a response that is still streaming.
        if let Some(target) = start.reply_to {
            if self.registry.contains(target) {
                tracing::debug!(message_id = %start.id, %target, "waiting for in-flight response");
                self.registry.wait_until_released(target).await;
            }
        }

        let leaf = start.id;
        let mut current = start;
        let mut previous: Option<MessageId> = None;
        let mut built = 0;
        let mut fetched = 0;

        loop {
            let node = self.node_for(&current);
            let reply_to = current.reply_to;
            self.store.upsert(node).await;
            built += 1;

            if let Some(child) = previous {
                self.store.link(child, current.id).await;
            }

            let Some(target) = reply_to else {
                return ChainOutcome { leaf, built, fetched, stop: ChainStop::Root };
            };

            if self.store.contains(target).await {
                self.store.link(current.id, target).await;
                tracing::debug!(message_id = %current.id, %target, "reply chain reached cached ancestor");
                return ChainOutcome { leaf, built, fetched, stop: ChainStop::Cached(target) };
            }

            match self.fetcher.fetch(target).await {
                Ok(parent) => {
                    fetched += 1;
                    previous = Some(current.id);
                    current = parent;
                }
                Err(e) => {
                    tracing::warn!(message_id = %current.id, %target, error = %e, "reply chain truncated");
                    return ChainOutcome { leaf, built, fetched, stop: ChainStop::Truncated(target) };
                }
            }
        }
    }

    fn node_for(&self, message: &PlatformMessage) -> MessageNode {
        let text = strip_self_mention(&message.text, self.self_id);
        let images: Vec<ImageUrl> = message
            .attachments
            .iter()
            .filter(|a| a.is_image())
            .map(|a| ImageUrl::low(a.url.clone()))
            .collect();
        let kept = images.len().min(self.max_images);

        let role = if message.author == self.self_id {
            Role::Assistant
        } else {
            Role::User
        };

        MessageNode {
            id: message.id,
            role,
            content: self.encoder.encode(text, &images[..kept]),
            author_name: message.author.to_string(),
            too_many_images: images.len() > self.max_images,
            replied_to: None,
        }
    }
}

/// Drop a leading `<@ID>` / `<@!ID>` addressed to the relay
fn strip_self_mention(text: &str, self_id: UserId) -> &str {
    let plain = self_id.mention();
    let nick = format!("<@!{}>", self_id.0);
    text.strip_prefix(plain.as_str())
        .or_else(|| text.strip_prefix(nick.as_str()))
        .map(str::trim_start)
        .unwrap_or(text)
}
