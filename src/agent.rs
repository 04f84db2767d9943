//! Agent loop: alternate between the model and the tools until the model answers.

use futures::future::join_all;
use futures::{Stream, StreamExt};
use nonempty::NonEmpty;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::{Client, ClientError, StreamingClient};
use crate::model::{
    Message, ReplyBuilder, Reply, Response, StreamChunk, ToolRequest, ToolResult, Transcript,
    Usage,
};
use crate::options::AgentOptions;
use crate::registry::ToolRegistry;

/// Run-ending failures. Tool failures never show up here; they go back to the model.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("model endpoint failed: {source}")]
    ModelEndpoint {
        #[source]
        source: ClientError,
        transcript: Transcript,
    },

    #[error("agent loop exceeded {limit} iterations")]
    MaxIterationsExceeded { limit: usize, transcript: Transcript },

    #[error("agent run cancelled")]
    Cancelled { transcript: Transcript },

    #[error("transcript must end with a user message to resume")]
    NothingToAnswer { transcript: Transcript },
}

impl AgentError {
    /// The transcript as it stood when the run ended.
    pub fn transcript(&self) -> &Transcript {
        match self {
            AgentError::ModelEndpoint { transcript, .. }
            | AgentError::MaxIterationsExceeded { transcript, .. }
            | AgentError::Cancelled { transcript }
            | AgentError::NothingToAnswer { transcript } => transcript,
        }
    }

    pub fn into_transcript(self) -> Transcript {
        match self {
            AgentError::ModelEndpoint { transcript, .. }
            | AgentError::MaxIterationsExceeded { transcript, .. }
            | AgentError::Cancelled { transcript }
            | AgentError::NothingToAnswer { transcript } => transcript,
        }
    }

    /// The most recent failed tool call, useful when diagnosing a runaway loop.
    pub fn last_tool_failure(&self) -> Option<&ToolResult> {
        self.transcript().last_failure()
    }
}

/// A finished run.
#[derive(Debug, Clone)]
pub struct Completion {
    pub answer: String,
    pub transcript: Transcript,
    /// Number of model calls made.
    pub iterations: usize,
    pub usage: Usage,
}

/// Progress of a streaming run.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentEvent {
    ToolCallStarted(ToolRequest),
    ToolCallFinished(ToolResult),
    PartialText(String),
    FinalText(String),
}

enum LoopState {
    AwaitingModel,
    ExecutingTools(NonEmpty<ToolRequest>),
    Done(String),
}

/// Drives a model [`Client`] against the tools of a [`ToolRegistry`].
///
/// Each run owns its transcript; the registry is shared read-only, so one agent can serve
/// concurrent runs.
///
/// # Example
/// ```ignore
/// let mut registry = ToolRegistry::new();
/// registry.register(connect_in_process(MailServer::new()).await?).await?;
///
/// let agent = Agent::new(OpenAi::create(api_key, "gpt-4o-mini".into()), registry);
/// let answer = agent.run("Get my latest 3 emails from Gmail").await?;
/// ```
pub struct Agent<C: Client> {
    client: C,
    registry: Arc<ToolRegistry>,
    options: AgentOptions,
}

impl<C: Client> Agent<C> {
    pub fn new(client: C, registry: impl Into<Arc<ToolRegistry>>) -> Self {
        Self {
            client,
            registry: registry.into(),
            options: AgentOptions::default(),
        }
    }

    pub fn with_options(mut self, options: AgentOptions) -> Self {
        self.options = options;
        self
    }

    /// Set the maximum number of model calls per run.
    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.options.max_iterations = max;
        self
    }

    pub fn options(&self) -> &AgentOptions {
        &self.options
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Answer one user query.
    pub async fn run(&self, user_text: impl Into<String>) -> Result<String, AgentError> {
        self.resume(Transcript::new(user_text), None)
            .await
            .map(|completion| completion.answer)
    }

    /// Answer one user query, stopping between iterations once `cancel` fires.
    pub async fn run_with_cancel(
        &self,
        user_text: impl Into<String>,
        cancel: &CancellationToken,
    ) -> Result<Completion, AgentError> {
        self.resume(Transcript::new(user_text), Some(cancel)).await
    }

    /// Continue a conversation whose last message is user text.
    pub async fn resume(
        &self,
        mut transcript: Transcript,
        cancel: Option<&CancellationToken>,
    ) -> Result<Completion, AgentError> {
        if !matches!(transcript.last(), Some(Message::UserText { .. })) {
            return Err(AgentError::NothingToAnswer { transcript });
        }
        debug!("Starting agent loop with {} messages", transcript.len());

        let mut iterations = 0;
        let mut usage = Usage::default();
        let mut state = LoopState::AwaitingModel;

        loop {
            state = match state {
                LoopState::AwaitingModel => {
                    transcript = self.check_budget(transcript, iterations, cancel)?;
                    iterations += 1;
                    debug!("Agent iteration {}/{}", iterations, self.options.max_iterations);

                    let tools = self.registry.descriptors();
                    let response = match self.client.request(transcript.messages(), tools).await {
                        Ok(response) => response,
                        Err(source) => return Err(model_failure(source, transcript)),
                    };
                    match self.next_state(response, &mut usage) {
                        Ok(next) => next,
                        Err(source) => return Err(model_failure(source, transcript)),
                    }
                }
                LoopState::ExecutingTools(requests) => {
                    let results = self.execute_batch(&requests).await;
                    transcript.push_round(requests, results);
                    LoopState::AwaitingModel
                }
                LoopState::Done(answer) => {
                    debug!("No more tool calls, agent loop complete after {} iterations", iterations);
                    transcript.push_answer(answer.clone());
                    return Ok(Completion {
                        answer,
                        transcript,
                        iterations,
                        usage,
                    });
                }
            };
        }
    }

    /// Enforce cancellation and the iteration bound before the next model call.
    fn check_budget(
        &self,
        transcript: Transcript,
        iterations: usize,
        cancel: Option<&CancellationToken>,
    ) -> Result<Transcript, AgentError> {
        if cancel.is_some_and(|token| token.is_cancelled()) {
            info!("Agent run cancelled after {} iterations", iterations);
            return Err(AgentError::Cancelled { transcript });
        }
        if iterations >= self.options.max_iterations {
            warn!(
                "Max iterations ({}) reached in agent loop",
                self.options.max_iterations
            );
            return Err(AgentError::MaxIterationsExceeded {
                limit: self.options.max_iterations,
                transcript,
            });
        }
        Ok(transcript)
    }

    fn next_state(&self, response: Response, usage: &mut Usage) -> Result<LoopState, ClientError> {
        if let Some(turn_usage) = response.usage {
            *usage += turn_usage;
        }
        match response.reply {
            Reply::ToolCalls(requests) => {
                debug!("Model requested {} tool call(s)", requests.len());
                Ok(LoopState::ExecutingTools(requests))
            }
            Reply::Text(text) if !text.trim().is_empty() => Ok(LoopState::Done(text)),
            Reply::Text(_) => Err(ClientError::EmptyReply),
        }
    }

    /// Execute one batch; results come back in request order.
    async fn execute_batch(&self, requests: &NonEmpty<ToolRequest>) -> Vec<ToolResult> {
        if self.options.parallel_tool_calls && requests.len() > 1 {
            join_all(requests.iter().map(|req| self.registry.execute(req))).await
        } else {
            let mut results = Vec::with_capacity(requests.len());
            for req in requests.iter() {
                results.push(self.registry.execute(req).await);
            }
            results
        }
    }
}

fn model_failure(source: ClientError, transcript: Transcript) -> AgentError {
    warn!("Model endpoint failed: {}", source);
    AgentError::ModelEndpoint { source, transcript }
}

impl<C: StreamingClient> Agent<C> {
    /// Streaming variant of [`Agent::run`].
    ///
    /// Text deltas are forwarded as they arrive. The stream ends after `FinalText`, or with a
    /// single error item.
    pub fn run_stream<'a>(
        &'a self,
        user_text: impl Into<String>,
        cancel: Option<CancellationToken>,
    ) -> Pin<Box<dyn Stream<Item = Result<AgentEvent, AgentError>> + Send + 'a>> {
        let mut transcript = Transcript::new(user_text);

        Box::pin(async_stream::try_stream! {
            let mut iterations = 0;
            let mut usage = Usage::default();
            let mut state = LoopState::AwaitingModel;

            loop {
                state = match state {
                    LoopState::AwaitingModel => {
                        transcript = self.check_budget(transcript, iterations, cancel.as_ref())?;
                        iterations += 1;
                        debug!("Agent streaming iteration {}/{}", iterations, self.options.max_iterations);

                        let tools = self.registry.descriptors();
                        let mut stream = match self.client.request_stream(transcript.messages(), tools).await {
                            Ok(stream) => stream,
                            Err(source) => Err(model_failure(source, transcript.clone()))?,
                        };

                        let mut builder = ReplyBuilder::new();
                        while let Some(chunk) = stream.next().await {
                            let chunk = match chunk {
                                Ok(chunk) => chunk,
                                Err(source) => Err(model_failure(source, transcript.clone()))?,
                            };
                            if let StreamChunk::Text(delta) = &chunk {
                                yield AgentEvent::PartialText(delta.clone());
                            }
                            builder.push(chunk);
                        }

                        match self.next_state(builder.finish(), &mut usage) {
                            Ok(next) => next,
                            Err(source) => Err(model_failure(source, transcript.clone()))?,
                        }
                    }
                    LoopState::ExecutingTools(requests) => {
                        for req in requests.iter() {
                            yield AgentEvent::ToolCallStarted(req.clone());
                        }
                        let results = self.execute_batch(&requests).await;
                        for result in &results {
                            yield AgentEvent::ToolCallFinished(result.clone());
                        }
                        transcript.push_round(requests, results);
                        LoopState::AwaitingModel
                    }
                    LoopState::Done(answer) => {
                        debug!("Streaming agent loop complete after {} iterations", iterations);
                        transcript.push_answer(answer.clone());
                        yield AgentEvent::FinalText(answer);
                        break;
                    }
                };
            }
        })
    }
}
