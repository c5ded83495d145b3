use thiserror::Error;

use crate::node::MessageId;
use crate::platform::SinkError;

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),

    #[error("Completion stream error: {0}")]
    Completion(anyhow::Error),

    #[error("Edit task failed: {0}")]
    EditTask(#[from] tokio::task::JoinError),

    #[error("Node not found: {0}")]
    MissingNode(MessageId),
}

pub type Result<T> = std::result::Result<T, RelayError>;
