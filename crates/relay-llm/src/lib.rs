pub mod types;
pub mod traits;
pub mod streaming;
pub mod openai;
pub mod config;
pub mod encoding;

pub use traits::{ChatClient, ChatRequest, ChatOptions};

pub use streaming::StreamEvent;
pub use openai::OpenAIClient;
pub use config::{ModelCapabilities, ProviderConfig, ProviderType};
pub use encoding::{ContentEncoder, FlatTextEncoder, StructuredContentEncoder};
pub use types::{Message, Content, ContentPart, ImageUrl, ImageDetail};
