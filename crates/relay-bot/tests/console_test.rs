use async_trait::async_trait;
use relay_bot::console::{render_block, ConsolePlatform};
use relay_core::{
    Block, FetchError, MessageFetcher, MessageId, MessageSink, Relay, RelaySettings,
    RenderSettings, SegmentStatus, SinkError, UserId,
};
use relay_llm::traits::EventStream;
use relay_llm::{ChatClient, ChatRequest, ModelCapabilities, ProviderType, StreamEvent};
use std::sync::{Arc, Mutex};

const BOT: UserId = UserId(1);
const USER: UserId = UserId(2);

fn platform() -> ConsolePlatform {
    ConsolePlatform::new(BOT, USER).quiet()
}

fn block(text: &str, status: SegmentStatus) -> Block {
    Block {
        text: text.to_string(),
        status,
        warnings: Vec::new(),
    }
}

#[tokio::test]
async fn test_lines_reply_to_latest_block() {
    let console = platform();

    let first = console.post_user("hello").await;
    assert_eq!(first.reply_to, None);
    assert!(first.is_direct);
    assert_eq!(first.author, USER);

    let block_id = console
        .create(first.id, &block("hi", SegmentStatus::Incomplete))
        .await
        .unwrap();
    assert_eq!(console.latest_block().await, Some(block_id));

    let second = console.post_user("how are you?").await;
    assert_eq!(second.reply_to, Some(block_id));
}

#[tokio::test]
async fn test_new_thread_command() {
    let console = platform();
    let first = console.post_user("hello").await;
    console
        .create(first.id, &block("hi", SegmentStatus::Complete))
        .await
        .unwrap();

    let fresh = console.post_user("/new  another topic").await;
    assert_eq!(fresh.reply_to, None);
    assert_eq!(fresh.text, "another topic");
    assert_eq!(console.latest_block().await, None);
}

#[tokio::test]
async fn test_blocks_are_fetchable_as_bot_messages() {
    let console = platform();
    let request = console.post_user("hello").await;
    let block_id = console
        .create(request.id, &block("partial", SegmentStatus::Incomplete))
        .await
        .unwrap();
    console
        .edit(block_id, &block("partial answer", SegmentStatus::Complete))
        .await
        .unwrap();

    let fetched = console.fetch(block_id).await.unwrap();
    assert_eq!(fetched.author, BOT);
    assert!(fetched.author_is_bot);
    assert_eq!(fetched.text, "partial answer");
    assert_eq!(fetched.reply_to, Some(request.id));

    assert_eq!(console.fetch(request.id).await.unwrap().text, "hello");
}

#[tokio::test]
async fn test_unknown_ids() {
    let console = platform();
    assert_eq!(
        console.fetch(MessageId(99)).await,
        Err(FetchError::NotFound(MessageId(99)))
    );
    assert_eq!(
        console
            .edit(MessageId(99), &block("x", SegmentStatus::Complete))
            .await,
        Err(SinkError::UnknownBlock(MessageId(99)))
    );
}

#[test]
fn test_render_block() {
    let mut rendered = block("Hello", SegmentStatus::Complete);
    rendered.warnings.push("⚠️ Only using last 20 messages".to_string());
    assert_eq!(
        render_block(MessageId(7), &rendered),
        "[7 ✓] Hello\n    ⚠️ Only using last 20 messages"
    );
    assert_eq!(
        render_block(MessageId(8), &block("Hel", SegmentStatus::Incomplete)),
        "[8 …] Hel"
    );
}

/// Answers every request with a fixed reply, remembering prompt sizes
#[derive(Default)]
struct EchoClient {
    prompt_lengths: Mutex<Vec<usize>>,
}

#[async_trait]
impl ChatClient for EchoClient {
    async fn chat_stream(&self, request: ChatRequest) -> anyhow::Result<EventStream> {
        self.prompt_lengths.lock().unwrap().push(request.messages.len());
        let events: Vec<anyhow::Result<StreamEvent>> = vec![
            Ok(StreamEvent::Message { content: "sure".to_string() }),
            Ok(StreamEvent::Done { finish_reason: Some("stop".to_string()) }),
        ];
        Ok(Box::pin(futures::stream::iter(events)))
    }
}

#[tokio::test]
async fn test_relay_conversation_over_console() {
    let console = Arc::new(platform());
    let client = Arc::new(EchoClient::default());
    let settings = RelaySettings {
        model: "local-model".to_string(),
        capabilities: ModelCapabilities::detect(ProviderType::Local, "local-model"),
        max_completion_tokens: 128,
        max_images: 0,
        max_messages: 20,
        system_prompt: "Be brief.".to_string(),
        render: RenderSettings::default(),
        self_id: BOT,
    };
    let relay = Relay::new(settings, client.clone(), console.clone(), console.clone());

    for line in ["one", "two", "/new three"] {
        let message = console.post_user(line).await;
        assert!(relay.should_respond(&message));
        relay.handle_message(message).await.unwrap();
    }

    // System prompt plus 1, 3, then 1 chain entries
    assert_eq!(*client.prompt_lengths.lock().unwrap(), vec![2, 4, 2]);
}
