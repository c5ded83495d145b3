use futures::StreamExt;
use relay_llm::traits::EventStream;
use relay_llm::{ContentEncoder, StreamEvent};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::error::{RelayError, Result};
use crate::in_flight::{InFlightGuard, InFlightRegistry};
use crate::node::{MessageId, MessageNode, Role};
use crate::platform::{Block, MessageSink, SegmentStatus, SinkError};
use crate::store::NodeStore;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderSettings {
    /// Platform cap on one block's text, in characters
    pub max_length: usize,
    /// Process-wide edit budget shared by all live blocks
    pub edits_per_second: f64,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            max_length: 4096,
            edits_per_second: 1.3,
        }
    }
}

/// Final state of one rendered block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedSegment {
    pub block_id: MessageId,
    pub text: String,
    pub status: SegmentStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOutcome {
    pub segments: Vec<RenderedSegment>,
}

impl RenderOutcome {
    pub fn text(&self) -> String {
        self.segments.iter().map(|s| s.text.as_str()).collect()
    }
}

struct Segment {
    block_id: MessageId,
    text: String,
    len: usize,
    status: SegmentStatus,
    last_dispatch: Instant,
    outstanding: Option<JoinHandle<std::result::Result<(), SinkError>>>,
    dispatched_len: usize,
    dispatched_status: SegmentStatus,
}

impl Drop for Segment {
    fn drop(&mut self) {
        // An edit still running when the response is abandoned must not land.
        if let Some(handle) = self.outstanding.take() {
            handle.abort();
        }
    }
}

impl Segment {
    fn is_idle(&self) -> bool {
        self.outstanding.as_ref().map_or(true, |h| h.is_finished())
    }

    fn is_flushed(&self) -> bool {
        self.dispatched_len == self.len && self.dispatched_status == self.status
    }

    /// Wait for the outstanding edit, if any, and surface its failure
    async fn settle(&mut self) -> Result<()> {
        if let Some(handle) = self.outstanding.take() {
            handle.await??;
        }
        Ok(())
    }
}

/// Renders one streamed response into size-capped, rate-limited blocks
///
/// Fragments are processed one behind the stream so the scheduler knows
/// whether the next fragment still fits before deciding a segment is full.
/// At most one edit per block is ever outstanding; a block's final edit is
/// always awaited before the next block opens or the response ends.
pub struct StreamRenderScheduler {
    sink: Arc<dyn MessageSink>,
    registry: InFlightRegistry,
    encoder: Arc<dyn ContentEncoder>,
    settings: RenderSettings,
    request_id: MessageId,
    assistant_name: String,
    warnings: Vec<String>,
    segments: Vec<Segment>,
    pending: Option<String>,
    guard: InFlightGuard,
}

impl StreamRenderScheduler {
    pub fn new(
        sink: Arc<dyn MessageSink>,
        registry: InFlightRegistry,
        encoder: Arc<dyn ContentEncoder>,
        settings: RenderSettings,
        request_id: MessageId,
        assistant_name: impl Into<String>,
    ) -> Self {
        let guard = registry.guard();
        let edits_per_second = if settings.edits_per_second.is_finite() && settings.edits_per_second > 0.0 {
            settings.edits_per_second
        } else {
            tracing::warn!(
                edits_per_second = settings.edits_per_second,
                "invalid edit rate, using default"
            );
            RenderSettings::default().edits_per_second
        };
        Self {
            sink,
            registry,
            encoder,
            settings: RenderSettings {
                max_length: settings.max_length.max(1),
                edits_per_second,
            },
            request_id,
            assistant_name: assistant_name.into(),
            warnings: Vec::new(),
            segments: Vec::new(),
            pending: None,
            guard,
        }
    }

    /// Warnings shown on every block, in display order
    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings = warnings;
        self
    }

    /// Drive the stream to completion and record the response in `store`
    ///
    /// A completion failure still finalizes the partial output and records it
    /// before the error is returned. A sink failure aborts the response
    /// without recording anything. In-flight ids are released on every path.
    pub async fn run(mut self, mut events: EventStream, store: &NodeStore) -> Result<RenderOutcome> {
        match self.consume(&mut events).await {
            Ok(()) => self.materialize(store).await,
            Err(RelayError::Completion(e)) => {
                tracing::warn!(request_id = %self.request_id, error = %e, "completion stream failed, keeping partial output");
                self.finish().await?;
                self.materialize(store).await?;
                Err(RelayError::Completion(e))
            }
            Err(e) => {
                tracing::warn!(request_id = %self.request_id, error = %e, "aborting response");
                Err(e)
            }
        }
    }

    async fn consume(&mut self, events: &mut EventStream) -> Result<()> {
        while let Some(event) = events.next().await {
            match event {
                Ok(StreamEvent::Message { content }) => {
                    for piece in split_fragment(content, self.settings.max_length) {
                        if let Some(previous) = self.pending.replace(piece) {
                            let next_len = self.pending.as_deref().map(char_len);
                            self.push(previous, next_len).await?;
                        }
                    }
                }
                Ok(StreamEvent::Done { .. }) => break,
                Err(e) => return Err(RelayError::Completion(e)),
            }
        }
        self.finish().await
    }

    /// Flush the last fragment and close the current segment
    async fn finish(&mut self) -> Result<()> {
        if let Some(last) = self.pending.take() {
            self.push(last, None).await?;
        }
        self.finalize_current().await
    }

    /// Append one piece; `next_len` is `None` for the final piece
    async fn push(&mut self, piece: String, next_len: Option<usize>) -> Result<()> {
        let max = self.settings.max_length;
        let piece_len = char_len(&piece);
        let full_at = |len: usize| next_len.map_or(true, |next| len + next > max);

        let overflows = self
            .segments
            .last()
            .map_or(true, |seg| seg.len + piece_len > max);

        if overflows {
            self.finalize_current().await?;
            let status = if full_at(piece_len) {
                SegmentStatus::Complete
            } else {
                SegmentStatus::Incomplete
            };
            return self.open_segment(piece, piece_len, status).await;
        }

        let interval = self.edit_interval();
        let Some(seg) = self.segments.last_mut() else {
            return Ok(());
        };
        seg.text.push_str(&piece);
        seg.len += piece_len;

        let full = full_at(seg.len);
        if full {
            seg.status = SegmentStatus::Complete;
        }

        if full || (seg.is_idle() && seg.last_dispatch.elapsed() >= interval) {
            self.dispatch_current().await?;
        }
        Ok(())
    }

    /// Per-block cadence: the more blocks are live, the slower each one edits
    fn edit_interval(&self) -> Duration {
        let live = self.registry.len().max(1) as f64;
        Duration::try_from_secs_f64(live / self.settings.edits_per_second).unwrap_or(Duration::MAX)
    }

    async fn open_segment(&mut self, text: String, len: usize, status: SegmentStatus) -> Result<()> {
        let reply_to = self
            .segments
            .last()
            .map_or(self.request_id, |seg| seg.block_id);
        let block = Block {
            text,
            status,
            warnings: self.warnings.clone(),
        };

        let block_id = self.sink.create(reply_to, &block).await?;
        self.guard.track(block_id);
        tracing::debug!(request_id = %self.request_id, %block_id, segment = self.segments.len(), "opened block");

        self.segments.push(Segment {
            block_id,
            text: block.text,
            len,
            status,
            last_dispatch: Instant::now(),
            outstanding: None,
            dispatched_len: len,
            dispatched_status: status,
        });
        Ok(())
    }

    /// Issue an edit with the current segment's state, fire-and-forget
    async fn dispatch_current(&mut self) -> Result<()> {
        let Some(seg) = self.segments.last_mut() else {
            return Ok(());
        };
        seg.settle().await?;

        let block = Block {
            text: seg.text.clone(),
            status: seg.status,
            warnings: self.warnings.clone(),
        };
        let sink = Arc::clone(&self.sink);
        let block_id = seg.block_id;
        seg.outstanding = Some(tokio::spawn(async move { sink.edit(block_id, &block).await }));
        seg.last_dispatch = Instant::now();
        seg.dispatched_len = seg.len;
        seg.dispatched_status = seg.status;
        tracing::trace!(%block_id, len = seg.len, status = ?seg.status, "dispatched edit");
        Ok(())
    }

    /// Mark the current segment complete and wait until that state is shown
    async fn finalize_current(&mut self) -> Result<()> {
        let Some(seg) = self.segments.last_mut() else {
            return Ok(());
        };
        seg.status = SegmentStatus::Complete;
        if !seg.is_flushed() {
            self.dispatch_current().await?;
        }
        if let Some(seg) = self.segments.last_mut() {
            seg.settle().await?;
        }
        Ok(())
    }

    /// One assistant node per block, then release the in-flight ids
    async fn materialize(self, store: &NodeStore) -> Result<RenderOutcome> {
        let mut segments = Vec::with_capacity(self.segments.len());
        for seg in &self.segments {
            store
                .upsert(MessageNode {
                    id: seg.block_id,
                    role: Role::Assistant,
                    content: self.encoder.encode(&seg.text, &[]),
                    author_name: self.assistant_name.clone(),
                    too_many_images: false,
                    replied_to: Some(self.request_id),
                })
                .await;
            segments.push(RenderedSegment {
                block_id: seg.block_id,
                text: seg.text.clone(),
                status: seg.status,
            });
        }

        tracing::debug!(request_id = %self.request_id, blocks = segments.len(), "response complete");
        drop(self);
        Ok(RenderOutcome { segments })
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Split a fragment into pieces no longer than `max` characters
fn split_fragment(text: String, max: usize) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    if char_len(&text) <= max {
        return vec![text];
    }
    let chars: Vec<char> = text.chars().collect();
    chars.chunks(max).map(|chunk| chunk.iter().collect()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_fragment() {
        assert!(split_fragment(String::new(), 4).is_empty());
        assert_eq!(split_fragment("abc".into(), 4), vec!["abc"]);
        assert_eq!(split_fragment("abcdefghij".into(), 4), vec!["abcd", "efgh", "ij"]);
        assert_eq!(split_fragment("ééé".into(), 2), vec!["éé", "é"]);
    }
}
