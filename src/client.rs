//! Model-endpoint traits and error types.

use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;
use thiserror::Error;

use crate::model::{Message, Response, StreamChunk};
use crate::tools::ToolDescriptor;

/// Errors raised by the model-completion endpoint.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Provider error: {0}")]
    ProviderError(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Model returned neither text nor tool calls")]
    EmptyReply,
}

pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<StreamChunk, ClientError>> + Send>>;

/// A model endpoint that maps a transcript plus the available tools to one reply.
#[async_trait]
pub trait Client: Send + Sync {
    async fn request(
        &self,
        messages: &[Message],
        tools: &[ToolDescriptor],
    ) -> Result<Response, ClientError>;
}

/// Extension trait for streaming support.
#[async_trait]
pub trait StreamingClient: Client {
    async fn request_stream(
        &self,
        messages: &[Message],
        tools: &[ToolDescriptor],
    ) -> Result<ChunkStream, ClientError>;
}
