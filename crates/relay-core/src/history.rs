use relay_llm::Message;
use std::collections::BTreeSet;

use crate::error::{RelayError, Result};
use crate::node::MessageId;
use crate::store::NodeStore;

/// User-facing warning strings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warnings {
    pub too_many_images: String,
    pub too_many_messages: String,
}

impl Warnings {
    pub fn from_limits(max_images: usize, max_messages: usize) -> Self {
        let too_many_images = if max_images > 0 {
            format!(
                "⚠️ Max {} image{} per message",
                max_images,
                if max_images == 1 { "" } else { "s" }
            )
        } else {
            "⚠️ Can't see images".to_string()
        };

        Self {
            too_many_images,
            too_many_messages: format!("⚠️ Only using last {} messages", max_messages),
        }
    }
}

/// Bounded prompt for one request, oldest entry first
#[derive(Debug, Clone)]
pub struct ConversationHistory {
    pub system: Message,
    pub chain: Vec<Message>,
    /// Deduplicated; iteration order is the display order
    pub warnings: BTreeSet<String>,
}

impl ConversationHistory {
    /// System prompt followed by the chain
    pub fn into_prompt(self) -> Vec<Message> {
        let mut messages = Vec::with_capacity(self.chain.len() + 1);
        messages.push(self.system);
        messages.extend(self.chain);
        messages
    }

    pub fn sorted_warnings(&self) -> Vec<String> {
        self.warnings.iter().cloned().collect()
    }
}

/// Flattens a stored reply chain into a [`ConversationHistory`]
pub struct HistoryAssembler<'a> {
    store: &'a NodeStore,
    warnings: &'a Warnings,
    max_messages: usize,
}

impl<'a> HistoryAssembler<'a> {
    pub fn new(store: &'a NodeStore, warnings: &'a Warnings, max_messages: usize) -> Self {
        Self {
            store,
            warnings,
            max_messages,
        }
    }

    pub async fn assemble(&self, leaf: MessageId, system: Message) -> Result<ConversationHistory> {
        let ancestry = self.store.ancestry(leaf, self.max_messages).await;
        if ancestry.nodes.first().map(|n| n.id) != Some(leaf) && self.max_messages > 0 {
            return Err(RelayError::MissingNode(leaf));
        }

        let mut warnings = BTreeSet::new();
        if ancestry.nodes.iter().any(|n| n.too_many_images) {
            warnings.insert(self.warnings.too_many_images.clone());
        }
        if ancestry.truncated {
            warnings.insert(self.warnings.too_many_messages.clone());
        }

        let chain = ancestry
            .nodes
            .iter()
            .rev()
            .map(|node| node.to_prompt_message())
            .collect();

        Ok(ConversationHistory {
            system,
            chain,
            warnings,
        })
    }
}
