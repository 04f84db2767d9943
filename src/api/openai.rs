//! OpenAI Chat Completions API client implementation.
//!
//! Works against any endpoint that speaks the Chat Completions dialect.
//! See: <https://platform.openai.com/docs/api-reference/chat>

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use nonempty::NonEmpty;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};

use crate::client::{ChunkStream, Client, ClientError, StreamingClient};
use crate::http::{add_extra_headers, build_http_client, RequestBuilderExt, ResponseExt};
use crate::model::{
    parse_arguments, with_unique_ids, FinishReason, Message, Reply, Response, StreamChunk,
    ToolRequest, Usage,
};
use crate::options::{ModelOptions, TransportOptions};
use crate::sse::SSEResponseExt;
use crate::tools::ToolDescriptor;

/// Provider-specific request fields, flattened into the request body.
pub trait OpenAiCompatibleModel:
    Send + Sync + Default + Serialize + for<'de> Deserialize<'de> + Clone
{
}

/// Generic client for OpenAI-compatible Chat Completions APIs.
#[derive(Debug, Clone)]
pub struct OpenAiCompatibleClient<M> {
    api_key: Option<String>,
    base_url: String,
    model_options: ModelOptions<M>,
    transport_options: TransportOptions,
}

impl<M: OpenAiCompatibleModel> OpenAiCompatibleClient<M> {
    pub fn new(
        api_key: Option<String>,
        base_url: String,
        model_options: ModelOptions<M>,
        transport_options: TransportOptions,
    ) -> Self {
        Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            model_options,
            transport_options,
        }
    }

    pub fn model_options(&self) -> &ModelOptions<M> {
        &self.model_options
    }

    pub fn transport_options(&self) -> &TransportOptions {
        &self.transport_options
    }

    async fn send(&self, body: &ChatRequest<M>) -> Result<reqwest::Response, ClientError> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let http_client = build_http_client(&self.transport_options)?;

        let mut req = http_client.post(&url).header(CONTENT_TYPE, "application/json");
        if let Some(key) = &self.api_key {
            req = req.header(AUTHORIZATION, format!("Bearer {}", key));
        }
        req = add_extra_headers(req, &self.transport_options);

        let response = req.json_logged(body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text_logged().await.unwrap_or_default();
            return Err(handle_error_response(status, &body));
        }
        Ok(response)
    }

    fn process_stream(
        response: reqwest::Response,
    ) -> impl Stream<Item = Result<StreamChunk, ClientError>> + Send {
        response
            .sse()
            .map(|line| {
                let chunks = match line.and_then(|l| Ok(serde_json::from_str::<ChatStreamChunk>(&l)?)) {
                    Ok(chunk) => chunk.into_stream_chunks().into_iter().map(Ok).collect(),
                    Err(e) => vec![Err(e)],
                };
                futures::stream::iter(chunks)
            })
            .flatten()
    }
}

fn handle_error_response(status: reqwest::StatusCode, body: &str) -> ClientError {
    match serde_json::from_str::<ChatErrorResponse>(body) {
        Ok(error_resp) => ClientError::ProviderError(format!(
            "API error ({}): {}",
            error_resp.error.error_type.as_deref().unwrap_or("unknown"),
            error_resp.error.message
        )),
        Err(_) => ClientError::ProviderError(format!("HTTP {}: {}", status, body)),
    }
}

#[async_trait]
impl<M: OpenAiCompatibleModel> Client for OpenAiCompatibleClient<M> {
    async fn request(
        &self,
        messages: &[Message],
        tools: &[ToolDescriptor],
    ) -> Result<Response, ClientError> {
        let body = ChatRequest::new(messages, tools, &self.model_options);
        let response = self.send(&body).await?;
        let chat_response: ChatResponse = response.json_logged().await?;
        chat_response.try_into()
    }
}

#[async_trait]
impl<M: OpenAiCompatibleModel + 'static> StreamingClient for OpenAiCompatibleClient<M> {
    async fn request_stream(
        &self,
        messages: &[Message],
        tools: &[ToolDescriptor],
    ) -> Result<ChunkStream, ClientError> {
        let mut body = ChatRequest::new(messages, tools, &self.model_options);
        body.stream = Some(true);
        body.stream_options = Some(StreamOptions {
            include_usage: true,
        });

        let response = self.send(&body).await?;
        Ok(Box::pin(Self::process_stream(response)))
    }
}

impl<M: OpenAiCompatibleModel> ChatRequest<M> {
    fn new(messages: &[Message], tools: &[ToolDescriptor], options: &ModelOptions<M>) -> Self {
        let mut chat_messages = Vec::with_capacity(messages.len() + 1);
        if let Some(system) = &options.system {
            chat_messages.push(ChatMessage::text("system", system));
        }
        chat_messages.extend(messages.iter().map(ChatMessage::from));

        let tools = (!tools.is_empty()).then(|| {
            tools
                .iter()
                .map(|def| ChatTool {
                    tool_type: "function".to_string(),
                    function: ChatFunction {
                        name: def.name.clone(),
                        description: (!def.description.is_empty()).then(|| def.description.clone()),
                        parameters: serde_json::Value::Object(def.parameters.clone()),
                    },
                })
                .collect()
        });

        ChatRequest {
            model: options.model.clone(),
            messages: chat_messages,
            temperature: options.temperature,
            top_p: options.top_p,
            max_tokens: options.max_tokens,
            stream: None,
            stream_options: None,
            tools,
            provider_options: options.provider.clone(),
        }
    }
}

impl ChatMessage {
    fn text(role: &str, content: &str) -> Self {
        ChatMessage {
            role: role.to_string(),
            content: Some(content.to_string()),
            tool_calls: None,
            tool_call_id: None,
        }
    }
}

impl From<&Message> for ChatMessage {
    fn from(msg: &Message) -> Self {
        match msg {
            Message::UserText { text } => ChatMessage::text("user", text),
            Message::AssistantText { text } => ChatMessage::text("assistant", text),
            Message::AssistantToolRequest { requests } => ChatMessage {
                role: "assistant".to_string(),
                content: None,
                tool_calls: Some(
                    requests
                        .iter()
                        .map(|req| ChatToolCall {
                            id: req.id.clone(),
                            tool_type: "function".to_string(),
                            function: ChatFunctionCall {
                                name: req.name.clone(),
                                arguments: match &req.arguments {
                                    serde_json::Value::String(raw) => raw.clone(),
                                    other => other.to_string(),
                                },
                            },
                        })
                        .collect(),
                ),
                tool_call_id: None,
            },
            Message::ToolResult(result) => ChatMessage {
                role: "tool".to_string(),
                content: Some(result.render()),
                tool_calls: None,
                tool_call_id: Some(result.id.clone()),
            },
        }
    }
}

impl TryFrom<ChatResponse> for Response {
    type Error = ClientError;

    fn try_from(chat_resp: ChatResponse) -> Result<Self, Self::Error> {
        let choice = chat_resp
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ClientError::ProviderError("response has no choices".to_string()))?;

        let finish = choice
            .finish_reason
            .as_deref()
            .map(FinishReason::from_openai)
            .unwrap_or_default();

        let calls: Vec<ToolRequest> = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|call| ToolRequest {
                id: call.id.unwrap_or_default(),
                name: call.function.name,
                arguments: parse_arguments(&call.function.arguments),
            })
            .collect();

        let reply = match NonEmpty::from_vec(with_unique_ids(calls)) {
            Some(calls) => Reply::ToolCalls(calls),
            None => Reply::Text(choice.message.content.unwrap_or_default()),
        };

        Ok(Response {
            reply,
            usage: chat_resp.usage.map(Usage::from),
            finish,
        })
    }
}

impl From<ChatUsage> for Usage {
    fn from(usage: ChatUsage) -> Self {
        Usage {
            prompt_tokens: Some(usage.prompt_tokens),
            completion_tokens: Some(usage.completion_tokens),
        }
    }
}

impl ChatStreamChunk {
    fn into_stream_chunks(self) -> Vec<StreamChunk> {
        let mut chunks = Vec::new();

        if let Some(choice) = self.choices.into_iter().next() {
            if let Some(delta) = choice.delta {
                if let Some(content) = delta.content.filter(|c| !c.is_empty()) {
                    chunks.push(StreamChunk::Text(content));
                }
                for (position, call) in delta.tool_calls.unwrap_or_default().into_iter().enumerate() {
                    let function = call.function.unwrap_or_default();
                    chunks.push(StreamChunk::ToolCall {
                        index: call.index.unwrap_or(position),
                        id: call.id,
                        name: function.name,
                        arguments: function.arguments.unwrap_or_default(),
                    });
                }
            }
            if let Some(reason) = choice.finish_reason {
                chunks.push(StreamChunk::Finish(FinishReason::from_openai(&reason)));
            }
        }

        if let Some(usage) = self.usage {
            chunks.push(StreamChunk::Usage(usage.into()));
        }
        chunks
    }
}

// --- Chat Completions API Types ---

#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Serialize)]
struct ChatRequest<M> {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: Option<f32>,
    top_p: Option<f32>,
    max_tokens: Option<u32>,
    stream: Option<bool>,
    stream_options: Option<StreamOptions>,
    tools: Option<Vec<ChatTool>>,
    #[serde(flatten)]
    provider_options: M,
}

#[derive(Debug, Clone, Serialize)]
struct StreamOptions {
    include_usage: bool,
}

#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: Option<String>,
    tool_calls: Option<Vec<ChatToolCall>>,
    tool_call_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatToolCall {
    id: String,
    #[serde(rename = "type")]
    tool_type: String,
    function: ChatFunctionCall,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Debug, Clone, Serialize)]
struct ChatTool {
    #[serde(rename = "type")]
    tool_type: String,
    function: ChatFunction,
}

#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Serialize)]
struct ChatFunction {
    name: String,
    description: Option<String>,
    parameters: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<ChatResponseToolCall>>,
}

/// Some compatible servers omit the call id or send it blank.
#[derive(Debug, Clone, Deserialize)]
struct ChatResponseToolCall {
    id: Option<String>,
    function: ChatFunctionCall,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatErrorResponse {
    error: ChatError,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatError {
    #[serde(rename = "type")]
    error_type: Option<String>,
    message: String,
}

// --- Streaming Types ---

#[derive(Debug, Clone, Deserialize)]
struct ChatStreamChunk {
    #[serde(default)]
    choices: Vec<ChatStreamChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatStreamChoice {
    delta: Option<ChatDelta>,
    finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatDelta {
    content: Option<String>,
    tool_calls: Option<Vec<ChatToolCallDelta>>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatToolCallDelta {
    index: Option<usize>,
    id: Option<String>,
    function: Option<ChatFunctionCallDelta>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ChatFunctionCallDelta {
    name: Option<String>,
    arguments: Option<String>,
}
