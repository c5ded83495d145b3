use relay_llm::{Content, Message};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Platform message identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub u64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Platform user identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub u64);

impl UserId {
    /// Mention syntax as typed on the platform
    pub fn mention(&self) -> String {
        format!("<@{}>", self.0)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Cached reconstruction of one platform message
///
/// `replied_to` is a key into the [`NodeStore`](crate::NodeStore), never an
/// owning pointer, so reply cycles cannot form ownership cycles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageNode {
    pub id: MessageId,
    pub role: Role,
    pub content: Content,
    pub author_name: String,
    #[serde(default)]
    pub too_many_images: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replied_to: Option<MessageId>,
}

impl MessageNode {
    /// Prompt entry for this node, named after its author
    pub fn to_prompt_message(&self) -> Message {
        let message = match self.role {
            Role::User => Message::human(self.content.clone()),
            Role::Assistant => Message::ai(self.content.clone()),
        };
        message.with_name(self.author_name.clone())
    }
}
