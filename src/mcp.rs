//! Tool back-end boundary and its implementation for MCP client sessions.

use async_trait::async_trait;
use itertools::Itertools;
use rmcp::model::{CallToolRequestParam, CallToolResult, JsonObject, RawContent, Tool};
use rmcp::service::{RoleClient, RunningService, ServiceError};
use rmcp::ClientHandler;
use serde_json::{json, Value};
use std::ops::Deref;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Failure reported by (or while reaching) a tool back end.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("remote error: {0}")]
    Remote(String),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("malformed response: {0}")]
    MalformedResponse(String),
    #[error("back end panicked: {0}")]
    Panicked(String),
}

impl From<ServiceError> for BackendError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::McpError(data) => BackendError::Remote(data.message.to_string()),
            other => BackendError::Transport(other.to_string()),
        }
    }
}

/// An external service exposing a catalog of callable operations.
#[async_trait]
pub trait ToolBackend: Send + Sync {
    /// The catalog as the back end currently reports it.
    async fn list_tools(&self) -> Result<Vec<Tool>, BackendError>;

    /// Execute a tool. Arguments have already been validated against its schema.
    async fn call_tool(&self, name: &str, arguments: JsonObject) -> Result<Value, BackendError>;
}

#[async_trait]
impl<S: ClientHandler + Send + Sync> ToolBackend for RunningService<RoleClient, S> {
    async fn list_tools(&self) -> Result<Vec<Tool>, BackendError> {
        let result = self.deref().list_tools(None).await?;
        if result.next_cursor.is_some() {
            debug!("MCP server paginates its tool list; only the first page is used");
        }
        Ok(result.tools)
    }

    async fn call_tool(&self, name: &str, arguments: JsonObject) -> Result<Value, BackendError> {
        let params = CallToolRequestParam {
            name: name.to_string().into(),
            arguments: Some(arguments),
        };
        let result = self.deref().call_tool(params).await?;
        call_result_to_value(result)
    }
}

/// Collapse an MCP tool result into one JSON value.
///
/// Structured content wins, then a text part that parses as JSON, then the raw text parts.
pub fn call_result_to_value(result: CallToolResult) -> Result<Value, BackendError> {
    let mut parsed: Option<Value> = None;
    let mut texts: Vec<String> = Vec::new();

    for content in result.content {
        match content.raw {
            RawContent::Text(text_content) => {
                match serde_json::from_str::<Value>(&text_content.text) {
                    Ok(value) if parsed.is_none() => parsed = Some(value),
                    _ => texts.push(text_content.text),
                }
            }
            _ => debug!("Ignoring non-text tool content"),
        }
    }

    if result.is_error == Some(true) {
        let message = parsed
            .map(|v| v.to_string())
            .into_iter()
            .chain(texts)
            .join("\n");
        return Err(BackendError::Remote(if message.is_empty() {
            "tool reported an error".to_string()
        } else {
            message
        }));
    }

    if let Some(structured) = result.structured_content {
        return Ok(structured);
    }
    match (parsed, texts.is_empty()) {
        (Some(value), true) => Ok(value),
        (None, true) => Err(BackendError::MalformedResponse(
            "tool returned no usable content".to_string(),
        )),
        (parsed, false) => {
            let mut response: Vec<Value> = parsed.into_iter().collect();
            response.extend(texts.into_iter().map(Value::String));
            Ok(json!({ "response": response }))
        }
    }
}
