// In-memory message platform driven from a terminal.
// Every stdin line is a user message in a single direct conversation;
// relay blocks are printed as they are created and edited.

use async_trait::async_trait;
use relay_core::{
    Block, FetchError, MessageFetcher, MessageId, MessageSink, PlatformMessage, SegmentStatus,
    SinkError, UserId,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

/// Prefix that starts a new thread instead of replying to the last block
pub const NEW_THREAD: &str = "/new";

#[derive(Default)]
struct ConsoleState {
    messages: HashMap<MessageId, PlatformMessage>,
    latest_block: Option<MessageId>,
}

pub struct ConsolePlatform {
    self_id: UserId,
    user_id: UserId,
    next_id: AtomicU64,
    echo: bool,
    state: RwLock<ConsoleState>,
}

impl ConsolePlatform {
    pub fn new(self_id: UserId, user_id: UserId) -> Self {
        Self {
            self_id,
            user_id,
            next_id: AtomicU64::new(1),
            echo: true,
            state: RwLock::new(ConsoleState::default()),
        }
    }

    /// Do not print blocks
    pub fn quiet(mut self) -> Self {
        self.echo = false;
        self
    }

    fn allocate_id(&self) -> MessageId {
        MessageId(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    /// Record one typed line as a user message
    pub async fn post_user(&self, line: &str) -> PlatformMessage {
        let mut state = self.state.write().await;

        let (text, reply_to) = match line.strip_prefix(NEW_THREAD) {
            Some(rest) => {
                state.latest_block = None;
                (rest.trim(), None)
            }
            None => (line.trim(), state.latest_block),
        };

        let mut message = PlatformMessage::new(self.allocate_id(), self.user_id, text).direct();
        message.reply_to = reply_to;
        state.messages.insert(message.id, message.clone());
        message
    }

    pub async fn latest_block(&self) -> Option<MessageId> {
        self.state.read().await.latest_block
    }

    pub async fn message(&self, id: MessageId) -> Option<PlatformMessage> {
        self.state.read().await.messages.get(&id).cloned()
    }

    fn print(&self, block_id: MessageId, block: &Block) {
        if self.echo {
            println!("{}", render_block(block_id, block));
        }
    }
}

/// Terminal rendering of a block
pub fn render_block(block_id: MessageId, block: &Block) -> String {
    let marker = match block.status {
        SegmentStatus::Incomplete => "…",
        SegmentStatus::Complete => "✓",
    };
    let mut out = format!("[{block_id} {marker}] {}", block.text);
    for warning in &block.warnings {
        out.push_str("\n    ");
        out.push_str(warning);
    }
    out
}

#[async_trait]
impl MessageFetcher for ConsolePlatform {
    async fn fetch(&self, id: MessageId) -> Result<PlatformMessage, FetchError> {
        self.message(id).await.ok_or(FetchError::NotFound(id))
    }
}

#[async_trait]
impl MessageSink for ConsolePlatform {
    async fn create(&self, reply_to: MessageId, block: &Block) -> Result<MessageId, SinkError> {
        let block_id = self.allocate_id();
        let message = PlatformMessage::new(block_id, self.self_id, block.text.clone())
            .replying_to(reply_to)
            .direct()
            .from_bot();

        let mut state = self.state.write().await;
        state.messages.insert(block_id, message);
        state.latest_block = Some(block_id);
        drop(state);

        self.print(block_id, block);
        Ok(block_id)
    }

    async fn edit(&self, block_id: MessageId, block: &Block) -> Result<(), SinkError> {
        let mut state = self.state.write().await;
        let message = state
            .messages
            .get_mut(&block_id)
            .ok_or(SinkError::UnknownBlock(block_id))?;
        message.text = block.text.clone();
        drop(state);

        self.print(block_id, block);
        Ok(())
    }
}
