// Capabilities the relay consumes from the message platform.
// Gateway, transport and authentication live behind these traits.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::node::{MessageId, UserId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

impl Attachment {
    pub fn new(url: impl Into<String>, content_type: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            content_type: Some(content_type.into()),
        }
    }

    pub fn is_image(&self) -> bool {
        self.content_type
            .as_deref()
            .map_or(false, |ct| ct.contains("image"))
    }
}

/// A message as seen on the platform
///
/// For messages the relay posted itself, `text` is the rendered block text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformMessage {
    pub id: MessageId,
    pub author: UserId,
    #[serde(default)]
    pub author_is_bot: bool,
    /// Direct (one-to-one) conversation rather than a shared channel
    #[serde(default)]
    pub is_direct: bool,
    pub text: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub mentions: Vec<UserId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<MessageId>,
}

impl PlatformMessage {
    pub fn new(id: MessageId, author: UserId, text: impl Into<String>) -> Self {
        Self {
            id,
            author,
            author_is_bot: false,
            is_direct: false,
            text: text.into(),
            attachments: Vec::new(),
            mentions: Vec::new(),
            reply_to: None,
        }
    }

    pub fn replying_to(mut self, id: MessageId) -> Self {
        self.reply_to = Some(id);
        self
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    pub fn mentioning(mut self, user: UserId) -> Self {
        self.mentions.push(user);
        self
    }

    pub fn direct(mut self) -> Self {
        self.is_direct = true;
        self
    }

    pub fn from_bot(mut self) -> Self {
        self.author_is_bot = true;
        self
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("Message not found: {0}")]
    NotFound(MessageId),

    #[error("Transport error: {0}")]
    Transport(String),
}

/// Read-only access to past platform messages
#[async_trait]
pub trait MessageFetcher: Send + Sync {
    async fn fetch(&self, id: MessageId) -> Result<PlatformMessage, FetchError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentStatus {
    Incomplete,
    Complete,
}

impl SegmentStatus {
    /// Accent colour of the rendered block (orange while typing, green when done)
    pub fn color(&self) -> u32 {
        match self {
            SegmentStatus::Incomplete => 0xE67E22,
            SegmentStatus::Complete => 0x2ECC71,
        }
    }
}

/// Rendered state of one outgoing message block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub text: String,
    pub status: SegmentStatus,
    #[serde(default)]
    pub warnings: Vec<String>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SinkError {
    #[error("Unknown block: {0}")]
    UnknownBlock(MessageId),

    #[error("Transport error: {0}")]
    Transport(String),
}

/// Creates and edits outgoing message blocks
#[async_trait]
pub trait MessageSink: Send + Sync {
    /// Post a new block replying to `reply_to`, returning its id
    async fn create(&self, reply_to: MessageId, block: &Block) -> Result<MessageId, SinkError>;

    async fn edit(&self, block_id: MessageId, block: &Block) -> Result<(), SinkError>;
}
