//! Conversation-graph reconstruction and streaming render for a chat relay.
//!
//! An incoming platform message is walked up its reply chain into the
//! [`NodeStore`], flattened into a bounded prompt by [`HistoryAssembler`],
//! and the model's streamed output is rendered into size-capped, rate-limited
//! message blocks by [`StreamRenderScheduler`].

pub mod chain;
pub mod error;
pub mod history;
pub mod in_flight;
pub mod node;
pub mod platform;
pub mod prompt;
pub mod relay;
pub mod render;
pub mod store;

pub use chain::{ChainBuilder, ChainOutcome, ChainStop};
pub use error::{RelayError, Result};
pub use history::{ConversationHistory, HistoryAssembler, Warnings};
pub use in_flight::{InFlightGuard, InFlightRegistry};
pub use node::{MessageId, MessageNode, Role, UserId};
pub use platform::{
    Attachment, Block, FetchError, MessageFetcher, MessageSink, PlatformMessage, SegmentStatus,
    SinkError,
};
pub use prompt::system_prompt;
pub use relay::{Relay, RelaySettings, ResponseSummary};
pub use render::{RenderOutcome, RenderSettings, RenderedSegment, StreamRenderScheduler};
pub use store::NodeStore;
