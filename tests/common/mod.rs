#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use toolloop::client::{ChunkStream, Client, ClientError, StreamingClient};
use toolloop::mcp::{BackendError, ToolBackend};
use toolloop::model::{Message, Reply, Response, StreamChunk, ToolRequest};
use toolloop::rmcp::model::{JsonObject, Tool};
use toolloop::ToolDescriptor;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn object(value: Value) -> JsonObject {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {}", other),
    }
}

/// Model stand-in that replays scripted responses and records what it was sent.
#[derive(Clone, Default)]
pub struct MockClient {
    responses: Arc<Mutex<VecDeque<Result<Response, ClientError>>>>,
    /// Returned once the script runs out.
    fallback: Option<Response>,
    requests: Arc<Mutex<Vec<Vec<Message>>>>,
    advertised: Arc<Mutex<Vec<Vec<String>>>>,
}

impl MockClient {
    pub fn new(responses: Vec<Response>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses.into_iter().map(Ok).collect())),
            ..Default::default()
        }
    }

    pub fn failing(error: ClientError) -> Self {
        Self {
            responses: Arc::new(Mutex::new(VecDeque::from(vec![Err(error)]))),
            ..Default::default()
        }
    }

    /// Answer every call with `response`.
    pub fn repeating(response: Response) -> Self {
        Self {
            fallback: Some(response),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn request(&self, index: usize) -> Vec<Message> {
        self.requests.lock().unwrap()[index].clone()
    }

    pub fn advertised_tools(&self, index: usize) -> Vec<String> {
        self.advertised.lock().unwrap()[index].clone()
    }

    fn next(&self, messages: &[Message], tools: &[ToolDescriptor]) -> Result<Response, ClientError> {
        self.requests.lock().unwrap().push(messages.to_vec());
        self.advertised
            .lock()
            .unwrap()
            .push(tools.iter().map(|t| t.name.clone()).collect());

        match self.responses.lock().unwrap().pop_front() {
            Some(response) => response,
            None => self.fallback.clone().ok_or_else(|| {
                ClientError::ProviderError("No more mock responses".to_string())
            }),
        }
    }
}

#[async_trait]
impl Client for MockClient {
    async fn request(
        &self,
        messages: &[Message],
        tools: &[ToolDescriptor],
    ) -> Result<Response, ClientError> {
        self.next(messages, tools)
    }
}

#[async_trait]
impl StreamingClient for MockClient {
    async fn request_stream(
        &self,
        messages: &[Message],
        tools: &[ToolDescriptor],
    ) -> Result<ChunkStream, ClientError> {
        let response = self.next(messages, tools)?;
        let mut chunks = Vec::new();
        match response.reply {
            Reply::Text(text) => {
                for word in text.split_inclusive(' ') {
                    chunks.push(Ok(StreamChunk::Text(word.to_string())));
                }
            }
            Reply::ToolCalls(calls) => {
                for (index, call) in calls.into_iter().enumerate() {
                    chunks.push(Ok(StreamChunk::ToolCall {
                        index,
                        id: Some(call.id),
                        name: Some(call.name),
                        arguments: call.arguments.to_string(),
                    }));
                }
            }
        }
        chunks.push(Ok(StreamChunk::Finish(response.finish)));
        Ok(Box::pin(futures::stream::iter(chunks)))
    }
}

pub fn call(id: &str, name: &str, arguments: Value) -> ToolRequest {
    ToolRequest::with_id(id, name, arguments)
}

type Handler = dyn Fn(&str, &JsonObject) -> Result<Value, BackendError> + Send + Sync;

/// In-memory tool back end with a fixed catalog.
pub struct MockBackend {
    tools: Vec<Tool>,
    handler: Box<Handler>,
    delays: Vec<(String, Duration)>,
    pub calls: Arc<AtomicUsize>,
    pub list_calls: Arc<AtomicUsize>,
    unreachable: bool,
}

impl MockBackend {
    pub fn new<F>(tools: Vec<Tool>, handler: F) -> Self
    where
        F: Fn(&str, &JsonObject) -> Result<Value, BackendError> + Send + Sync + 'static,
    {
        Self {
            tools,
            handler: Box::new(handler),
            delays: Vec::new(),
            calls: Arc::new(AtomicUsize::new(0)),
            list_calls: Arc::new(AtomicUsize::new(0)),
            unreachable: false,
        }
    }

    /// Echoes the tool name and its arguments.
    pub fn echo(tools: Vec<Tool>) -> Self {
        Self::new(tools, |name, args| Ok(json!({ "tool": name, "args": args })))
    }

    pub fn unreachable() -> Self {
        let mut backend = Self::echo(Vec::new());
        backend.unreachable = true;
        backend
    }

    pub fn with_delay(mut self, tool: &str, delay: Duration) -> Self {
        self.delays.push((tool.to_string(), delay));
        self
    }
}

#[async_trait]
impl ToolBackend for MockBackend {
    async fn list_tools(&self) -> Result<Vec<Tool>, BackendError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.unreachable {
            return Err(BackendError::Transport("connection refused".to_string()));
        }
        Ok(self.tools.clone())
    }

    async fn call_tool(&self, name: &str, arguments: JsonObject) -> Result<Value, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some((_, delay)) = self.delays.iter().find(|(tool, _)| tool == name) {
            tokio::time::sleep(*delay).await;
        }
        (self.handler)(name, &arguments)
    }
}

pub fn tool(name: &str, schema: Value) -> Tool {
    Tool::new(name.to_string(), format!("The {} tool", name), Arc::new(object(schema)))
}

pub fn gmail_tool() -> Tool {
    tool(
        "get_gmail_emails",
        json!({
            "type": "object",
            "properties": {
                "max_results": { "type": "integer", "default": 10 },
                "query": { "type": ["string", "null"] },
                "label": { "type": ["string", "null"], "default": "INBOX" }
            }
        }),
    )
}

pub fn profile_tool() -> Tool {
    tool(
        "get_instagram_profile",
        json!({
            "type": "object",
            "properties": { "username": { "type": "string" } },
            "required": ["username"]
        }),
    )
}
