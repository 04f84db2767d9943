//! Conversation types shared by the agent loop, the model clients and the tool registry.

use nonempty::NonEmpty;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashSet};
use std::ops::{Add, AddAssign};
use uuid::Uuid;

/// A single entry in a [`Transcript`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    /// Text typed by the user.
    UserText { text: String },
    /// A plain answer from the model.
    AssistantText { text: String },
    /// One batch of tool calls requested by the model, in the order it asked for them.
    AssistantToolRequest { requests: NonEmpty<ToolRequest> },
    /// The outcome of one tool call, answering the request with the same id.
    ToolResult(ToolResult),
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Message::UserText { text: text.into() }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Message::AssistantText { text: text.into() }
    }

    /// Text content of the message, if it carries any.
    pub fn text(&self) -> Option<&str> {
        match self {
            Message::UserText { text } | Message::AssistantText { text } => Some(text),
            _ => None,
        }
    }
}

/// A model-issued instruction naming a tool and its arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolRequest {
    /// Correlation id echoed back by the matching [`ToolResult`].
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

impl ToolRequest {
    /// Create a request with a freshly generated correlation id.
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: generate_call_id(),
            name: name.into(),
            arguments,
        }
    }

    pub fn with_id(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

pub(crate) fn generate_call_id() -> String {
    format!("call_{}", Uuid::new_v4().simple())
}

/// Category of a failed tool call, reported to the model alongside the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    UnknownTool,
    Validation,
    Execution,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolOutcome {
    Success { content: Value },
    Failure { kind: FailureKind, message: String },
}

/// Outcome of executing one [`ToolRequest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Id of the request this result answers.
    pub id: String,
    pub name: String,
    pub outcome: ToolOutcome,
}

impl ToolResult {
    pub fn success(request: &ToolRequest, content: Value) -> Self {
        Self {
            id: request.id.clone(),
            name: request.name.clone(),
            outcome: ToolOutcome::Success { content },
        }
    }

    pub fn failure(request: &ToolRequest, kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            id: request.id.clone(),
            name: request.name.clone(),
            outcome: ToolOutcome::Failure {
                kind,
                message: message.into(),
            },
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.outcome, ToolOutcome::Failure { .. })
    }

    /// Render the outcome as the text handed to the model.
    ///
    /// String payloads are passed through untouched; everything else is serialized as JSON.
    pub fn render(&self) -> String {
        match &self.outcome {
            ToolOutcome::Success {
                content: Value::String(text),
            } => text.clone(),
            ToolOutcome::Success { content } => content.to_string(),
            ToolOutcome::Failure { kind, message } => {
                json!({ "error": { "kind": kind, "message": message } }).to_string()
            }
        }
    }
}

/// Ordered conversation history for one run.
///
/// The transcript always starts with user text, and every tool-request message is
/// followed by exactly one result per request, in request order. Only appends that
/// keep that shape are exposed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    pub fn new(user_text: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::user(user_text)],
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Append a follow-up user message to continue the conversation.
    pub fn push_user(&mut self, text: impl Into<String>) {
        self.messages.push(Message::user(text));
    }

    /// Record a tool batch together with its results.
    ///
    /// `results` must hold one entry per request, in the same order.
    pub(crate) fn push_round(&mut self, requests: NonEmpty<ToolRequest>, results: Vec<ToolResult>) {
        debug_assert_eq!(requests.len(), results.len());
        debug_assert!(requests.iter().zip(&results).all(|(req, res)| req.id == res.id));

        self.messages
            .push(Message::AssistantToolRequest { requests });
        self.messages
            .extend(results.into_iter().map(Message::ToolResult));
    }

    pub(crate) fn push_answer(&mut self, text: impl Into<String>) {
        self.messages.push(Message::assistant(text));
    }

    pub fn tool_results(&self) -> impl Iterator<Item = &ToolResult> {
        self.messages.iter().filter_map(|msg| match msg {
            Message::ToolResult(result) => Some(result),
            _ => None,
        })
    }

    /// The most recent failed tool result, if any.
    pub fn last_failure(&self) -> Option<&ToolResult> {
        self.tool_results().filter(|r| r.is_failure()).last()
    }

    /// The final answer, when the run ended with assistant text.
    pub fn final_answer(&self) -> Option<&str> {
        match self.messages.last() {
            Some(Message::AssistantText { text }) => Some(text),
            _ => None,
        }
    }
}

/// What the model asked for on one turn.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Text(String),
    ToolCalls(NonEmpty<ToolRequest>),
}

/// Why the model stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FinishReason {
    #[default]
    Stop,
    OutputTokens,
    ContentFilter,
    ToolCalls,
}

impl FinishReason {
    pub(crate) fn from_openai(reason: &str) -> Self {
        match reason {
            "length" => FinishReason::OutputTokens,
            "content_filter" => FinishReason::ContentFilter,
            "tool_calls" => FinishReason::ToolCalls,
            _ => FinishReason::Stop,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: Option<u32>,
    pub completion_tokens: Option<u32>,
}

impl Usage {
    pub fn total_tokens(&self) -> u32 {
        self.prompt_tokens
            .unwrap_or(0)
            .saturating_add(self.completion_tokens.unwrap_or(0))
    }
}

impl Add for Usage {
    type Output = Usage;

    fn add(mut self, rhs: Usage) -> Usage {
        self += rhs;
        self
    }
}

impl AddAssign for Usage {
    fn add_assign(&mut self, rhs: Usage) {
        fn sum(a: Option<u32>, b: Option<u32>) -> Option<u32> {
            match (a, b) {
                (None, None) => None,
                (a, b) => Some(a.unwrap_or(0).saturating_add(b.unwrap_or(0))),
            }
        }
        self.prompt_tokens = sum(self.prompt_tokens, rhs.prompt_tokens);
        self.completion_tokens = sum(self.completion_tokens, rhs.completion_tokens);
    }
}

/// One model turn.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub reply: Reply,
    pub usage: Option<Usage>,
    pub finish: FinishReason,
}

impl Response {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            reply: Reply::Text(text.into()),
            usage: None,
            finish: FinishReason::Stop,
        }
    }

    pub fn tool_calls(requests: NonEmpty<ToolRequest>) -> Self {
        Self {
            reply: Reply::ToolCalls(requests),
            usage: None,
            finish: FinishReason::ToolCalls,
        }
    }

    pub fn with_usage(mut self, usage: Usage) -> Self {
        self.usage = Some(usage);
        self
    }
}

/// Incremental output of a streaming model call.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamChunk {
    Text(String),
    /// A fragment of the tool call at position `index`. The first fragment carries the
    /// id and name; later ones only append to the argument string.
    ToolCall {
        index: usize,
        id: Option<String>,
        name: Option<String>,
        arguments: String,
    },
    Usage(Usage),
    Finish(FinishReason),
}

#[derive(Debug, Default)]
struct PendingCall {
    id: Option<String>,
    name: String,
    arguments: String,
}

/// Folds [`StreamChunk`]s back into a [`Response`].
#[derive(Debug, Default)]
pub struct ReplyBuilder {
    text: String,
    /// Keyed by the stream's call index, which need not be dense.
    calls: BTreeMap<usize, PendingCall>,
    usage: Option<Usage>,
    finish: Option<FinishReason>,
}

impl ReplyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: StreamChunk) {
        match chunk {
            StreamChunk::Text(delta) => self.text.push_str(&delta),
            StreamChunk::ToolCall {
                index,
                id,
                name,
                arguments,
            } => {
                let call = self.calls.entry(index).or_default();
                if let Some(id) = id.filter(|id| !id.is_empty()) {
                    call.id = Some(id);
                }
                if let Some(name) = name {
                    call.name.push_str(&name);
                }
                call.arguments.push_str(&arguments);
            }
            // Providers report cumulative usage in the final chunk.
            StreamChunk::Usage(usage) => self.usage = Some(usage),
            StreamChunk::Finish(reason) => self.finish = Some(reason),
        }
    }

    pub fn finish(self) -> Response {
        let requests: Vec<ToolRequest> = self
            .calls
            .into_values()
            .filter(|call| !call.name.is_empty())
            .map(|call| ToolRequest {
                id: call.id.unwrap_or_default(),
                name: call.name,
                arguments: parse_arguments(&call.arguments),
            })
            .collect();
        let requests = with_unique_ids(requests);

        let reply = match NonEmpty::from_vec(requests) {
            Some(requests) => Reply::ToolCalls(requests),
            None => Reply::Text(self.text),
        };

        Response {
            reply,
            usage: self.usage,
            finish: self.finish.unwrap_or_default(),
        }
    }
}

/// Give every request in a batch a distinct, non-blank correlation id.
///
/// Blank ids and repeats of an earlier id in the same batch are replaced with fresh ones.
pub(crate) fn with_unique_ids(mut requests: Vec<ToolRequest>) -> Vec<ToolRequest> {
    let mut seen = HashSet::new();
    for request in &mut requests {
        if request.id.trim().is_empty() || !seen.insert(request.id.clone()) {
            request.id = generate_call_id();
            seen.insert(request.id.clone());
        }
    }
    requests
}

/// Parse a tool-call argument string.
///
/// Empty input means "no arguments". Anything that is not valid JSON is kept as a JSON
/// string so argument validation can report it to the model.
pub(crate) fn parse_arguments(raw: &str) -> Value {
    if raw.trim().is_empty() {
        return json!({});
    }
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use nonempty::nonempty;

    #[test]
    fn test_render_failure_as_error_object() {
        let request = ToolRequest::with_id("call_1", "lookup", json!({}));
        let result = ToolResult::failure(&request, FailureKind::UnknownTool, "unknown tool: lookup");

        let rendered: Value = serde_json::from_str(&result.render()).unwrap();
        assert_eq!(rendered["error"]["kind"], "unknown_tool");
        assert_eq!(rendered["error"]["message"], "unknown tool: lookup");
    }

    #[test]
    fn test_render_string_payload_verbatim() {
        let request = ToolRequest::with_id("call_1", "echo", json!({}));
        let result = ToolResult::success(&request, json!("plain text"));
        assert_eq!(result.render(), "plain text");
    }

    #[test]
    fn test_transcript_round_keeps_request_order() {
        let mut transcript = Transcript::new("hi");
        let first = ToolRequest::with_id("a", "one", json!({}));
        let second = ToolRequest::with_id("b", "two", json!({}));
        let results = vec![
            ToolResult::success(&first, json!(1)),
            ToolResult::failure(&second, FailureKind::Execution, "boom"),
        ];
        transcript.push_round(nonempty![first, second], results);

        assert_eq!(transcript.len(), 4);
        let ids: Vec<&str> = transcript.tool_results().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(transcript.last_failure().map(|r| r.name.as_str()), Some("two"));
        assert_eq!(transcript.final_answer(), None);

        transcript.push_answer("done");
        assert_eq!(transcript.final_answer(), Some("done"));
    }

    #[test]
    fn test_usage_saturates() {
        let total = Usage {
            prompt_tokens: Some(u32::MAX),
            completion_tokens: Some(7),
        } + Usage {
            prompt_tokens: Some(1),
            completion_tokens: None,
        };
        assert_eq!(total.prompt_tokens, Some(u32::MAX));
        assert_eq!(total.total_tokens(), u32::MAX);
    }

    #[test]
    fn test_reply_builder_accepts_sparse_indices() {
        let mut builder = ReplyBuilder::new();
        builder.push(StreamChunk::ToolCall {
            index: usize::MAX,
            id: Some("call_late".into()),
            name: Some("second".into()),
            arguments: "{}".into(),
        });
        builder.push(StreamChunk::ToolCall {
            index: 3,
            id: Some("call_early".into()),
            name: Some("first".into()),
            arguments: "{}".into(),
        });

        match builder.finish().reply {
            Reply::ToolCalls(calls) => {
                let names: Vec<_> = calls.iter().map(|c| c.name.as_str()).collect();
                assert_eq!(names, vec!["first", "second"]);
            }
            other => panic!("expected tool calls, got {:?}", other),
        }
    }

    #[test]
    fn test_blank_and_repeated_ids_are_replaced() {
        let requests = with_unique_ids(vec![
            ToolRequest::with_id("", "one", json!({})),
            ToolRequest::with_id("", "two", json!({})),
            ToolRequest::with_id("call_1", "three", json!({})),
            ToolRequest::with_id("call_1", "four", json!({})),
        ]);

        let ids: HashSet<&str> = requests.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids.len(), 4);
        assert!(requests.iter().all(|r| !r.id.is_empty()));
        assert_eq!(requests[2].id, "call_1");
    }

    #[test]
    fn test_usage_accumulates() {
        let mut total = Usage::default();
        total += Usage {
            prompt_tokens: Some(10),
            completion_tokens: Some(2),
        };
        total += Usage {
            prompt_tokens: Some(5),
            completion_tokens: None,
        };
        assert_eq!(total.prompt_tokens, Some(15));
        assert_eq!(total.completion_tokens, Some(2));
        assert_eq!(total.total_tokens(), 17);
    }

    #[test]
    fn test_reply_builder_assembles_fragmented_tool_calls() {
        let mut builder = ReplyBuilder::new();
        builder.push(StreamChunk::ToolCall {
            index: 0,
            id: Some("call_a".into()),
            name: Some("get_gmail_emails".into()),
            arguments: String::new(),
        });
        builder.push(StreamChunk::ToolCall {
            index: 1,
            id: Some("call_b".into()),
            name: Some("get_instagram_profile".into()),
            arguments: "{\"username\":".into(),
        });
        builder.push(StreamChunk::ToolCall {
            index: 0,
            id: None,
            name: None,
            arguments: "{\"max_results\": 3}".into(),
        });
        builder.push(StreamChunk::ToolCall {
            index: 1,
            id: None,
            name: None,
            arguments: "\"nasa\"}".into(),
        });
        builder.push(StreamChunk::Finish(FinishReason::ToolCalls));

        let response = builder.finish();
        assert_eq!(response.finish, FinishReason::ToolCalls);
        match response.reply {
            Reply::ToolCalls(calls) => {
                assert_eq!(calls.len(), 2);
                assert_eq!(calls.head.id, "call_a");
                assert_eq!(calls.head.arguments, json!({"max_results": 3}));
                assert_eq!(calls[1].arguments, json!({"username": "nasa"}));
            }
            other => panic!("expected tool calls, got {:?}", other),
        }
    }

    #[test]
    fn test_reply_builder_concatenates_text() {
        let mut builder = ReplyBuilder::new();
        builder.push(StreamChunk::Text("2 + 2 ".into()));
        builder.push(StreamChunk::Text("is 4.".into()));
        builder.push(StreamChunk::Usage(Usage {
            prompt_tokens: Some(7),
            completion_tokens: Some(4),
        }));

        let response = builder.finish();
        assert_eq!(response.reply, Reply::Text("2 + 2 is 4.".into()));
        assert_eq!(response.usage.map(|u| u.total_tokens()), Some(11));
    }

    #[test]
    fn test_parse_arguments_keeps_invalid_json_as_string() {
        assert_eq!(parse_arguments(""), json!({}));
        assert_eq!(parse_arguments("{\"a\":1}"), json!({"a": 1}));
        assert_eq!(parse_arguments("{oops"), json!("{oops"));
    }
}
