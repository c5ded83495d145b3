#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use relay_core::{
    Block, FetchError, MessageFetcher, MessageId, MessageSink, PlatformMessage, SinkError,
};
use relay_llm::traits::EventStream;
use relay_llm::{ChatClient, ChatRequest, StreamEvent};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// In-memory platform history with a fetch counter
#[derive(Default)]
pub struct MockFetcher {
    messages: Mutex<HashMap<MessageId, PlatformMessage>>,
    broken: Mutex<HashSet<MessageId>>,
    pub fetches: AtomicUsize,
    pub fetched_ids: Mutex<Vec<MessageId>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, message: PlatformMessage) {
        self.messages.lock().unwrap().insert(message.id, message);
    }

    /// Fetching `id` fails with a transport error
    pub fn break_transport(&self, id: MessageId) {
        self.broken.lock().unwrap().insert(id);
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MessageFetcher for MockFetcher {
    async fn fetch(&self, id: MessageId) -> Result<PlatformMessage, FetchError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.fetched_ids.lock().unwrap().push(id);
        if self.broken.lock().unwrap().contains(&id) {
            return Err(FetchError::Transport("connection reset".to_string()));
        }
        self.messages
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or(FetchError::NotFound(id))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkCall {
    Create { block_id: MessageId, reply_to: MessageId, block: Block },
    Edit { block_id: MessageId, block: Block },
}

/// Records every create/edit and detects overlapping edits on one block
pub struct MockSink {
    next_id: AtomicU64,
    edit_delay: Duration,
    pub calls: Mutex<Vec<SinkCall>>,
    editing: Mutex<HashSet<MessageId>>,
    pub overlapping_edits: AtomicUsize,
    fail_create_after: Option<usize>,
    fail_edits: bool,
    creates: AtomicUsize,
}

impl MockSink {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(10_000),
            edit_delay: Duration::from_millis(0),
            calls: Mutex::new(Vec::new()),
            editing: Mutex::new(HashSet::new()),
            overlapping_edits: AtomicUsize::new(0),
            fail_create_after: None,
            fail_edits: false,
            creates: AtomicUsize::new(0),
        }
    }

    pub fn with_edit_delay(mut self, delay: Duration) -> Self {
        self.edit_delay = delay;
        self
    }

    /// The create after `n` successful ones fails
    pub fn failing_create_after(mut self, n: usize) -> Self {
        self.fail_create_after = Some(n);
        self
    }

    pub fn failing_edits(mut self) -> Self {
        self.fail_edits = true;
        self
    }

    pub fn calls(&self) -> Vec<SinkCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Latest rendered state per block, in creation order
    pub fn final_blocks(&self) -> Vec<(MessageId, Block)> {
        let mut order = Vec::new();
        let mut latest: HashMap<MessageId, Block> = HashMap::new();
        for call in self.calls() {
            match call {
                SinkCall::Create { block_id, block, .. } => {
                    order.push(block_id);
                    latest.insert(block_id, block);
                }
                SinkCall::Edit { block_id, block } => {
                    latest.insert(block_id, block);
                }
            }
        }
        order
            .into_iter()
            .map(|id| (id, latest.remove(&id).unwrap()))
            .collect()
    }

    pub fn edit_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, SinkCall::Edit { .. }))
            .count()
    }
}

#[async_trait]
impl MessageSink for MockSink {
    async fn create(&self, reply_to: MessageId, block: &Block) -> Result<MessageId, SinkError> {
        let created = self.creates.fetch_add(1, Ordering::SeqCst);
        if self.fail_create_after.map_or(false, |n| created >= n) {
            return Err(SinkError::Transport("create rejected".to_string()));
        }
        let block_id = MessageId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.calls.lock().unwrap().push(SinkCall::Create {
            block_id,
            reply_to,
            block: block.clone(),
        });
        Ok(block_id)
    }

    async fn edit(&self, block_id: MessageId, block: &Block) -> Result<(), SinkError> {
        let fresh = self.editing.lock().unwrap().insert(block_id);
        if !fresh {
            self.overlapping_edits.fetch_add(1, Ordering::SeqCst);
        }
        if !self.edit_delay.is_zero() {
            tokio::time::sleep(self.edit_delay).await;
        }
        self.editing.lock().unwrap().remove(&block_id);

        if self.fail_edits {
            return Err(SinkError::Transport("edit rejected".to_string()));
        }
        self.calls.lock().unwrap().push(SinkCall::Edit {
            block_id,
            block: block.clone(),
        });
        Ok(())
    }
}

/// Scripted stream item
#[derive(Debug, Clone)]
pub enum Step {
    Text(&'static str),
    Owned(String),
    Done,
    Fail(&'static str),
    Pause(Duration),
}

pub fn script(steps: Vec<Step>) -> EventStream {
    Box::pin(async_stream::stream! {
        for step in steps {
            match step {
                Step::Text(text) => yield Ok(StreamEvent::Message { content: text.to_string() }),
                Step::Owned(text) => yield Ok(StreamEvent::Message { content: text }),
                Step::Done => yield Ok(StreamEvent::Done { finish_reason: Some("stop".to_string()) }),
                Step::Fail(reason) => yield Err(anyhow::anyhow!(reason)),
                Step::Pause(duration) => tokio::time::sleep(duration).await,
            }
        }
    })
}

/// Fragments followed by the terminal event
pub fn fragments(texts: &[&'static str]) -> EventStream {
    let mut steps: Vec<Step> = texts.iter().copied().map(Step::Text).collect();
    steps.push(Step::Done);
    script(steps)
}

/// Completion client replaying one script per request
#[derive(Default)]
pub struct ScriptedClient {
    scripts: Mutex<Vec<Vec<Step>>>,
    pub requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedClient {
    pub fn new(scripts: Vec<Vec<Step>>) -> Self {
        Self {
            scripts: Mutex::new(scripts),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn last_request(&self) -> ChatRequest {
        self.requests.lock().unwrap().last().cloned().unwrap()
    }
}

#[async_trait]
impl ChatClient for ScriptedClient {
    async fn chat_stream(&self, request: ChatRequest) -> Result<EventStream> {
        self.requests.lock().unwrap().push(request);
        let mut scripts = self.scripts.lock().unwrap();
        if scripts.is_empty() {
            anyhow::bail!("no scripted response left");
        }
        Ok(script(scripts.remove(0)))
    }
}
