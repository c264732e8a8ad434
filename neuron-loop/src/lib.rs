//! ReAct loop executor (spec.md §2 C5, §4.5).
//!
//! Interleaves model calls and tool dispatch: each iteration drives the
//! provider's chunk stream, assembling the turn's message as deltas arrive,
//! and if the assembled message carries tool calls, dispatches them through
//! a [`ToolMediator`] and feeds the results back as the next turn's context.
//! Streaming callers observe events in the fixed order `token* < tools_start
//! < tools_end < completed` per iteration.

pub mod config;

use std::sync::Arc;

use neuron_types::completion::{ChatChunk, ChatRequest, FinishReason, TokenUsage};
use neuron_types::{AgentError, LoopError, Message, ModelProvider, ProviderError, ToolCall, ToolContext, ToolResult};
use neuron_tool::ToolMediator;
use tokio_util::sync::CancellationToken;

pub use config::{ReActConfig, ToolErrorPolicy};

/// One event in a streamed ReAct run.
#[derive(Debug, Clone)]
pub enum LoopEvent {
    /// The model produced (or finished producing) text this iteration.
    Token(String),
    /// Tool calls were admitted and are about to run.
    ToolsStart(Vec<ToolCall>),
    /// Tool calls finished.
    ToolsEnd(Vec<ToolResult>),
    /// The run finished with a final answer.
    Completed(String),
    /// The run failed.
    Error(String),
}

/// The result of a completed (non-streaming) run.
#[derive(Debug, Clone)]
pub struct LoopOutcome {
    /// The full message transcript, including the system/user seed.
    pub messages: Vec<Message>,
    /// The final assistant text.
    pub final_text: String,
    /// Accumulated token usage across every iteration.
    pub usage: TokenUsage,
    /// Number of model-call iterations actually used.
    pub iterations: usize,
    /// Why the final iteration stopped.
    pub finish_reason: FinishReason,
    /// Set when the run stopped because `max_iterations` was reached
    /// without a tool-free response, per spec.md §4.5's "budget exhausted"
    /// bullet: the last assistant message is still returned as final.
    pub budget_exhausted: bool,
}

/// Drives the interleaved model/tool loop.
pub struct ReActExecutor {
    provider: Arc<dyn ModelProvider>,
    tools: Arc<ToolMediator>,
    config: ReActConfig,
}

impl ReActExecutor {
    /// Build an executor over `provider`/`tools` with `config`.
    #[must_use]
    pub fn new(provider: Arc<dyn ModelProvider>, tools: Arc<ToolMediator>, config: ReActConfig) -> Self {
        Self { provider, tools, config }
    }

    /// Run to completion, ignoring intermediate events.
    pub async fn run(&self, request: ChatRequest, tool_context: &ToolContext, cancellation: &CancellationToken) -> Result<LoopOutcome, AgentError> {
        self.run_streaming(request, tool_context, cancellation, None).await
    }

    /// Issue exactly one provider call without interpreting or dispatching
    /// any tool calls in the response. Used for planning-style prompts that
    /// don't need a ReAct loop (spec.md §4.7 `Plan`).
    pub async fn complete_once(&self, request: ChatRequest) -> Result<neuron_types::completion::ChatResponse, AgentError> {
        self.provider.complete(request).await.map_err(|e| AgentError::from(LoopError::from(e)))
    }

    /// Run to completion, emitting [`LoopEvent`]s on `sink` as they occur.
    /// `sink` is `None` for a plain non-streaming run.
    pub async fn run_streaming(
        &self,
        request: ChatRequest,
        tool_context: &ToolContext,
        cancellation: &CancellationToken,
        sink: Option<tokio::sync::mpsc::Sender<LoopEvent>>,
    ) -> Result<LoopOutcome, AgentError> {
        if !request.tools.is_empty() && !self.provider.supports_tools() {
            return Err(LoopError::ProviderUnsupported(self.provider.name().to_owned()).into());
        }

        let mut messages = request.messages.clone();
        let mut usage = TokenUsage::default();
        let max_iterations = self.config.effective_max_iterations();
        let mut last_response = None;

        for iteration in 1..=max_iterations {
            if cancellation.is_cancelled() {
                return Err(AgentError::Cancelled);
            }

            let call_request = ChatRequest {
                messages: messages.clone(),
                ..request.clone()
            };
            let mut chunks = self.provider.stream(call_request).await.map_err(LoopError::from)?;
            let assembled = assemble_stream(&mut chunks, &sink, self.provider.name()).await?;

            usage.input_tokens += assembled.usage.input_tokens;
            usage.output_tokens += assembled.usage.output_tokens;

            let text = assembled.message.text();
            messages.push(assembled.message.clone());

            let tool_calls = assembled.message.tool_calls();
            if tool_calls.is_empty() || !self.provider.supports_tools() {
                emit(&sink, LoopEvent::Completed(text.clone())).await;
                return Ok(LoopOutcome {
                    messages,
                    final_text: text,
                    usage,
                    iterations: iteration,
                    finish_reason: assembled.finish_reason,
                    budget_exhausted: false,
                });
            }
            last_response = Some(assembled);

            let calls: Vec<ToolCall> = tool_calls
                .into_iter()
                .map(|(id, name, input)| ToolCall {
                    id,
                    name,
                    arguments: serde_json::to_vec(&input).unwrap_or_default(),
                })
                .collect();
            emit(&sink, LoopEvent::ToolsStart(calls.clone())).await;

            let results = if self.config.parallel_tool_calls {
                let futures = calls.iter().map(|call| self.tools.dispatch(call.clone(), tool_context));
                futures::future::join_all(futures).await
            } else {
                let mut results = Vec::with_capacity(calls.len());
                for call in &calls {
                    results.push(self.tools.dispatch(call.clone(), tool_context).await);
                }
                results
            };
            emit(&sink, LoopEvent::ToolsEnd(results.clone())).await;

            let any_error = results.iter().any(ToolResult::is_error);
            for result in &results {
                messages.push(Message::tool_result(result.tool_call_id.clone(), result.as_text(), result.is_error()));
            }

            if any_error && self.config.tool_error_policy == ToolErrorPolicy::StopOnError {
                let failed = results.into_iter().find(ToolResult::is_error).unwrap();
                let err = LoopError::StoppedOnToolError(neuron_types::error::ToolError::ExecutionFailed {
                    tool: failed.name.clone(),
                    message: failed.error.clone(),
                });
                emit(&sink, LoopEvent::Error(err.to_string())).await;
                return Err(err.into());
            }
        }

        let (final_text, finish_reason) = match last_response {
            Some(response) => (response.message.text(), response.finish_reason),
            None => (String::new(), FinishReason::ToolCalls),
        };
        emit(&sink, LoopEvent::Completed(final_text.clone())).await;
        Ok(LoopOutcome {
            messages,
            final_text,
            usage,
            iterations: max_iterations,
            finish_reason,
            budget_exhausted: true,
        })
    }
}

/// One turn's message, usage, and finish reason, folded together out of a
/// [`ChatChunk`] stream.
struct AssembledTurn {
    message: Message,
    usage: TokenUsage,
    finish_reason: FinishReason,
}

/// Drain `chunks`, emitting a [`LoopEvent::Token`] for each non-empty
/// `delta_content` as it arrives (spec.md §4.5: "zero or more `token` events
/// — one per non-empty delta"), and fold the stream into one [`AssembledTurn`].
/// `id`/`provider`/`model`/`usage`/`finish_reason` are taken from whichever
/// chunk last carries each. If the channel closes without ever sending a
/// chunk that carries `finish_reason`, the stream is malformed.
async fn assemble_stream(
    chunks: &mut tokio::sync::mpsc::Receiver<ChatChunk>,
    sink: &Option<tokio::sync::mpsc::Sender<LoopEvent>>,
    provider_name: &str,
) -> Result<AssembledTurn, LoopError> {
    let mut text = String::new();
    let mut tool_calls = Vec::new();
    let mut usage = TokenUsage::default();
    let mut finish_reason = None;

    while let Some(chunk) = chunks.recv().await {
        if let Some(message) = chunk.error {
            return Err(LoopError::from(ProviderError::Transport(message)));
        }
        if let Some(delta) = chunk.delta_content.filter(|d| !d.is_empty()) {
            text.push_str(&delta);
            emit(sink, LoopEvent::Token(delta)).await;
        }
        tool_calls.extend(chunk.delta_tool_calls);
        if let Some(chunk_usage) = chunk.usage {
            usage = chunk_usage;
        }
        if let Some(fr) = chunk.finish_reason {
            finish_reason = Some(fr);
        }
    }

    let finish_reason = finish_reason.ok_or_else(|| LoopError::from(ProviderError::MalformedStream(provider_name.to_owned())))?;

    let mut content = Vec::new();
    if !text.is_empty() {
        content.push(neuron_types::ContentBlock::Text(text));
    }
    content.extend(
        tool_calls
            .into_iter()
            .map(|(id, name, input)| neuron_types::ContentBlock::ToolUse { id, name, input }),
    );

    Ok(AssembledTurn {
        message: Message { role: neuron_types::Role::Assistant, content },
        usage,
        finish_reason,
    })
}

async fn emit(sink: &Option<tokio::sync::mpsc::Sender<LoopEvent>>, event: LoopEvent) {
    if let Some(sink) = sink {
        let _ = sink.send(event).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use neuron_tool::ToolRegistry;
    use neuron_types::completion::{ChatResponse, ToolSchema};
    use neuron_types::{ContentBlock, ProviderError, Role};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedProvider {
        responses: std::sync::Mutex<Vec<ChatResponse>>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ModelProvider for ScriptedProvider {
        async fn complete(&self, _request: ChatRequest) -> Result<ChatResponse, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                return Err(ProviderError::Rejected("no more scripted responses".into()));
            }
            Ok(responses.remove(0))
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    fn final_response(text: &str) -> ChatResponse {
        ChatResponse {
            id: "r1".into(),
            provider: "scripted".into(),
            model: "test".into(),
            message: Message::assistant(text),
            usage: TokenUsage { input_tokens: 1, output_tokens: 1 },
            finish_reason: FinishReason::Stop,
        }
    }

    fn tool_call_response(tool_call_id: &str, tool: &str) -> ChatResponse {
        ChatResponse {
            id: "r1".into(),
            provider: "scripted".into(),
            model: "test".into(),
            message: Message {
                role: Role::Assistant,
                content: vec![ContentBlock::ToolUse {
                    id: tool_call_id.into(),
                    name: tool.into(),
                    input: serde_json::json!({}),
                }],
            },
            usage: TokenUsage { input_tokens: 1, output_tokens: 1 },
            finish_reason: FinishReason::ToolCalls,
        }
    }

    #[tokio::test]
    async fn toolless_response_completes_immediately() {
        let provider = Arc::new(ScriptedProvider {
            responses: std::sync::Mutex::new(vec![final_response("done")]),
            calls: AtomicUsize::new(0),
        });
        let mediator = Arc::new(ToolMediator::new(ToolRegistry::new()));
        let executor = ReActExecutor::new(provider, mediator, ReActConfig::default());

        let request = ChatRequest {
            model: "test".into(),
            messages: vec![Message::user("hi")],
            tools: vec![],
            ..Default::default()
        };
        let outcome = executor
            .run(request, &ToolContext::new("agent-1"), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome.final_text, "done");
        assert_eq!(outcome.iterations, 1);
    }

    #[tokio::test]
    async fn tool_call_then_final_answer() {
        struct Echo;
        #[async_trait]
        impl neuron_types::traits::ToolHandler for Echo {
            fn name(&self) -> &str {
                "echo"
            }
            async fn invoke(&self, _args: serde_json::Value, _env: &std::collections::HashMap<String, String>) -> Result<Vec<u8>, String> {
                Ok(b"ok".to_vec())
            }
        }
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(Echo));

        let provider = Arc::new(ScriptedProvider {
            responses: std::sync::Mutex::new(vec![tool_call_response("call-1", "echo"), final_response("done")]),
            calls: AtomicUsize::new(0),
        });
        let mediator = Arc::new(ToolMediator::new(registry));
        let executor = ReActExecutor::new(provider, mediator, ReActConfig::default());

        let request = ChatRequest {
            model: "test".into(),
            messages: vec![Message::user("hi")],
            tools: vec![ToolSchema {
                name: "echo".into(),
                description: "echoes".into(),
                parameters: serde_json::json!({}),
            }],
            ..Default::default()
        };
        let outcome = executor
            .run(request, &ToolContext::new("agent-1"), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome.final_text, "done");
        assert_eq!(outcome.iterations, 2);
    }

    #[tokio::test]
    async fn exhausting_max_iterations_completes_gracefully() {
        let responses: Vec<ChatResponse> = (0..3).map(|i| tool_call_response(&format!("c{i}"), "missing")).collect();
        let provider = Arc::new(ScriptedProvider {
            responses: std::sync::Mutex::new(responses),
            calls: AtomicUsize::new(0),
        });
        let mediator = Arc::new(ToolMediator::new(ToolRegistry::new()));
        let config = ReActConfig {
            max_iterations: 3,
            tool_error_policy: ToolErrorPolicy::ContinueOnError,
            parallel_tool_calls: true,
        };
        let executor = ReActExecutor::new(provider, mediator, config);
        let request = ChatRequest {
            model: "test".into(),
            messages: vec![Message::user("hi")],
            ..Default::default()
        };
        let outcome = executor
            .run(request, &ToolContext::new("agent-1"), &CancellationToken::new())
            .await
            .unwrap();
        assert!(outcome.budget_exhausted);
        assert_eq!(outcome.iterations, 3);
    }

    #[tokio::test]
    async fn stop_on_error_policy_halts_the_loop() {
        let provider = Arc::new(ScriptedProvider {
            responses: std::sync::Mutex::new(vec![tool_call_response("c1", "missing")]),
            calls: AtomicUsize::new(0),
        });
        let mediator = Arc::new(ToolMediator::new(ToolRegistry::new()));
        let config = ReActConfig {
            tool_error_policy: ToolErrorPolicy::StopOnError,
            ..ReActConfig::default()
        };
        let executor = ReActExecutor::new(provider, mediator, config);
        let request = ChatRequest {
            model: "test".into(),
            messages: vec![Message::user("hi")],
            ..Default::default()
        };
        let err = executor
            .run(request, &ToolContext::new("agent-1"), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Loop(LoopError::StoppedOnToolError(_))));
    }

    struct ChunkedProvider {
        chunks: Vec<ChatChunk>,
    }

    #[async_trait]
    impl ModelProvider for ChunkedProvider {
        async fn complete(&self, _request: ChatRequest) -> Result<ChatResponse, ProviderError> {
            unreachable!("this provider only exercises the streaming path")
        }

        async fn stream(&self, _request: ChatRequest) -> Result<tokio::sync::mpsc::Receiver<ChatChunk>, ProviderError> {
            let (tx, rx) = tokio::sync::mpsc::channel(self.chunks.len().max(1));
            for chunk in self.chunks.clone() {
                let _ = tx.send(chunk).await;
            }
            Ok(rx)
        }

        fn name(&self) -> &str {
            "chunked"
        }
    }

    #[tokio::test]
    async fn streaming_emits_one_token_per_non_empty_delta_and_assembles_the_final_text() {
        let provider = Arc::new(ChunkedProvider {
            chunks: vec![
                ChatChunk { delta_content: Some("hel".into()), ..Default::default() },
                ChatChunk { delta_content: Some("".into()), ..Default::default() },
                ChatChunk { delta_content: Some("lo".into()), usage: Some(TokenUsage { input_tokens: 4, output_tokens: 2 }), finish_reason: Some(FinishReason::Stop), ..Default::default() },
            ],
        });
        let mediator = Arc::new(ToolMediator::new(ToolRegistry::new()));
        let executor = ReActExecutor::new(provider, mediator, ReActConfig::default());
        let request = ChatRequest { model: "test".into(), messages: vec![Message::user("hi")], ..Default::default() };

        let (tx, mut rx) = tokio::sync::mpsc::channel(16);
        let outcome = executor
            .run_streaming(request, &ToolContext::new("agent-1"), &CancellationToken::new(), Some(tx))
            .await
            .unwrap();

        assert_eq!(outcome.final_text, "hello");
        assert_eq!(outcome.usage.total(), 6);

        let mut tokens = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let LoopEvent::Token(t) = event {
                tokens.push(t);
            }
        }
        assert_eq!(tokens, vec!["hel", "lo"]);
    }

    #[tokio::test]
    async fn a_stream_closing_without_a_finish_reason_is_malformed() {
        let provider = Arc::new(ChunkedProvider {
            chunks: vec![ChatChunk { delta_content: Some("partial".into()), ..Default::default() }],
        });
        let mediator = Arc::new(ToolMediator::new(ToolRegistry::new()));
        let executor = ReActExecutor::new(provider, mediator, ReActConfig::default());
        let request = ChatRequest { model: "test".into(), messages: vec![Message::user("hi")], ..Default::default() };

        let err = executor
            .run(request, &ToolContext::new("agent-1"), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Loop(LoopError::Provider(ProviderError::MalformedStream(_)))));
    }
}
