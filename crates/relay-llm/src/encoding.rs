use crate::types::{Content, ContentPart, ImageUrl};

/// Turns a message's text and images into the content shape a provider accepts
pub trait ContentEncoder: Send + Sync {
    fn encode(&self, text: &str, images: &[ImageUrl]) -> Content;
}

/// Text part (when non-empty) followed by one part per image
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuredContentEncoder;

impl ContentEncoder for StructuredContentEncoder {
    fn encode(&self, text: &str, images: &[ImageUrl]) -> Content {
        let mut parts = Vec::with_capacity(images.len() + 1);
        if !text.is_empty() {
            parts.push(ContentPart::text(text));
        }
        parts.extend(images.iter().cloned().map(ContentPart::image));
        Content::Parts(parts)
    }
}

/// Plain text blob; images are dropped
#[derive(Debug, Clone, Copy, Default)]
pub struct FlatTextEncoder;

impl ContentEncoder for FlatTextEncoder {
    fn encode(&self, text: &str, _images: &[ImageUrl]) -> Content {
        Content::text(text)
    }
}
