//! Execution orchestrator (spec.md §2 C7, §4.7).
//!
//! `Agent::execute` is the system's single entry point: acquire the
//! execution lock, validate input, run the ReAct loop, validate output
//! (retrying per the configured [`GuardrailsConfig`] policy), persist
//! memory and a checkpoint, then release the lock back to `Ready` — on
//! every exit path, success or failure.

pub mod config;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

pub use config::{FailurePolicy, GuardrailsConfig};

use neuron_checkpoint::CheckpointManager;
use neuron_guardrails::GuardrailsPipeline;
use neuron_loop::ReActExecutor;
use neuron_memory::MemoryCoordinator;
use neuron_state::StateMachine;
use neuron_subagent::{SubagentScheduler, SubagentTask};
use neuron_types::checkpoint::Checkpoint;
use neuron_types::completion::ChatRequest;
use neuron_types::event::{Event, EventPayload};
use neuron_types::memory::{MemoryKind, MemoryRecord};
use neuron_types::error::GuardrailKind;
use neuron_types::{AgentError, DurationMs, EventBus, Input, Message, Output, State};
use tokio_util::sync::CancellationToken;

/// Ties every core component together behind one `execute` call.
pub struct Agent {
    agent_id: String,
    model: String,
    system_prompt: Option<String>,
    state: StateMachine,
    events: Option<Arc<dyn EventBus>>,
    guardrails: Option<GuardrailsPipeline>,
    guardrails_config: GuardrailsConfig,
    executor: ReActExecutor,
    checkpoints: Option<CheckpointManager>,
    memory: Option<MemoryCoordinator>,
}

/// Builder for [`Agent`].
pub struct AgentBuilder {
    agent_id: String,
    model: String,
    system_prompt: Option<String>,
    events: Option<Arc<dyn EventBus>>,
    guardrails: Option<GuardrailsPipeline>,
    guardrails_config: GuardrailsConfig,
    checkpoints: Option<CheckpointManager>,
    memory: Option<MemoryCoordinator>,
}

impl AgentBuilder {
    /// Start building an agent with the given id and model name.
    #[must_use]
    pub fn new(agent_id: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            model: model.into(),
            system_prompt: None,
            events: None,
            guardrails: None,
            guardrails_config: GuardrailsConfig::default(),
            checkpoints: None,
            memory: None,
        }
    }

    /// Set the system prompt template, rendered with `Input.variables` at
    /// each `execute` call (`{{name}}` substitution).
    #[must_use]
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Publish `state.changed`/`feedback`/... events through `events`.
    #[must_use]
    pub fn with_events(mut self, events: Arc<dyn EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    /// Validate input/output through `guardrails`.
    #[must_use]
    pub fn with_guardrails(mut self, guardrails: GuardrailsPipeline) -> Self {
        self.guardrails = Some(guardrails);
        self
    }

    /// Configure the `onInputFailure`/`onOutputFailure`/`maxRetries` policy
    /// used to react to non-tripwire guardrail failures.
    #[must_use]
    pub fn with_guardrails_config(mut self, config: GuardrailsConfig) -> Self {
        self.guardrails_config = config;
        self
    }

    /// Persist a checkpoint after every `execute` call.
    #[must_use]
    pub fn with_checkpoints(mut self, checkpoints: CheckpointManager) -> Self {
        self.checkpoints = Some(checkpoints);
        self
    }

    /// Record each interaction into `memory`.
    #[must_use]
    pub fn with_memory(mut self, memory: MemoryCoordinator) -> Self {
        self.memory = Some(memory);
        self
    }

    /// Finish building, wiring in the ReAct executor.
    #[must_use]
    pub fn build(self, executor: ReActExecutor) -> Agent {
        let state = StateMachine::new(self.agent_id.clone(), self.events.clone());
        Agent {
            agent_id: self.agent_id,
            model: self.model,
            system_prompt: self.system_prompt,
            state,
            events: self.events,
            guardrails: self.guardrails,
            guardrails_config: self.guardrails_config,
            executor,
            checkpoints: self.checkpoints,
            memory: self.memory,
        }
    }
}

/// Render `template`, substituting every `{{key}}` occurrence with its value
/// from `variables`. Unmatched placeholders are left verbatim.
fn render_template(template: &str, variables: &HashMap<String, String>) -> String {
    let mut rendered = template.to_owned();
    for (key, value) in variables {
        rendered = rendered.replace(&format!("{{{{{key}}}}}"), value);
    }
    rendered
}

/// Parse a planner response into a step list: numbered (`1.`, `1)`) or
/// dashed (`-`, `*`) lines become individual steps, in order. If no line
/// matches either form, the full response is returned as a single step.
fn parse_plan_steps(response: &str) -> Vec<String> {
    let mut steps = Vec::new();
    for line in response.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let stripped = trimmed
            .strip_prefix("- ")
            .or_else(|| trimmed.strip_prefix("* "))
            .or_else(|| {
                let digits = trimmed.chars().take_while(char::is_ascii_digit).count();
                if digits == 0 {
                    return None;
                }
                let rest = &trimmed[digits..];
                rest.strip_prefix(". ").or_else(|| rest.strip_prefix(") "))
            });
        if let Some(step) = stripped {
            steps.push(step.trim().to_owned());
        }
    }
    if steps.is_empty() {
        vec![response.trim().to_owned()]
    } else {
        steps
    }
}

impl Agent {
    /// Transition `Init -> Ready`. Must be called once before the first `execute`.
    pub async fn init(&self) -> Result<(), AgentError> {
        self.state.transition(State::Ready).await
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> State {
        self.state.state()
    }

    /// This agent's memory coordinator, if one was configured.
    #[must_use]
    pub fn memory(&self) -> Option<&MemoryCoordinator> {
        self.memory.as_ref()
    }

    /// This agent's checkpoint manager, if one was configured.
    #[must_use]
    pub fn checkpoints(&self) -> Option<&CheckpointManager> {
        self.checkpoints.as_ref()
    }

    /// Run one input through the full pipeline: lock, validate, react,
    /// validate (per the configured retry policy), persist, unlock.
    #[tracing::instrument(skip(self, input), fields(agent_id = %self.agent_id, trace_id = %input.trace_id))]
    pub async fn execute(&self, input: Input) -> Result<Output, AgentError> {
        let started = Instant::now();
        let _guard = self.state.try_lock_exec()?;
        self.state.ensure_ready()?;
        self.state.transition(State::Running).await?;

        let result = self.execute_locked(&input).await;

        // Deferred transition back to Ready on every exit path, success or failure.
        if let Err(e) = self.state.transition(State::Ready).await {
            tracing::warn!(error = %e, "failed to return to Ready after execute");
        }

        result.map(|mut output| {
            output.duration = DurationMs::from(started.elapsed());
            output
        })
    }

    async fn execute_locked(&self, input: &Input) -> Result<Output, AgentError> {
        let thread_id = input
            .context
            .get("thread_id")
            .and_then(|v| v.as_str())
            .unwrap_or(&input.trace_id)
            .to_owned();

        // Step 4: input guardrails.
        if let Some(guardrails) = &self.guardrails {
            match guardrails.validate_input(&input.content).await {
                Err(tripwire) => {
                    return Err(AgentError::Tripwire {
                        validator_name: tripwire.validator_name,
                        result: tripwire.result,
                    });
                }
                Ok(validation) if !validation.valid => match self.guardrails_config.on_input_failure {
                    FailurePolicy::Warn => {
                        tracing::warn!(errors = ?validation.errors, "input guardrails rejected content, continuing per policy");
                    }
                    FailurePolicy::Reject | FailurePolicy::Retry => {
                        return Err(AgentError::Guardrails {
                            kind: GuardrailKind::Input,
                            errors: validation.errors.into_iter().map(|e| e.message).collect(),
                        });
                    }
                },
                Ok(_) => {}
            }
        }

        // Step 5: recent ShortTerm memory as context messages, oldest first.
        let mut context_messages = Vec::new();
        if let Some(memory) = &self.memory {
            let mut recent = memory.recent(MemoryKind::ShortTerm, 10).await.unwrap_or_default();
            recent.reverse();
            context_messages.extend(recent.into_iter().map(|record| Message::assistant(record.content)));
        }

        // Step 6: system prompt rendered with variables, then context, then the user prompt.
        let system_text = self
            .system_prompt
            .as_deref()
            .map(|template| render_template(template, &input.variables))
            .unwrap_or_else(|| "You are a helpful agent.".to_owned());
        let mut messages = vec![Message::system(system_text)];
        messages.extend(context_messages);
        messages.push(Message::user(input.content.clone()));

        let base_request = ChatRequest {
            model: self.model.clone(),
            messages,
            ..Default::default()
        };

        // Step 7: ReAct + output guardrails retry loop.
        let max_retries = self.guardrails_config.max_retries;
        let mut request = base_request.clone();
        let mut attempt = 0;
        let (outcome, filtered_content) = loop {
            let outcome = self
                .executor
                .run(request.clone(), &neuron_types::ToolContext::new(self.agent_id.clone()), &CancellationToken::new())
                .await?;

            let validated = match &self.guardrails {
                Some(guardrails) => guardrails.validate_output(&outcome.final_text).await,
                None => Ok(neuron_types::ValidationResult::pass(outcome.final_text.clone())),
            };

            match validated {
                Err(tripwire) => {
                    return Err(AgentError::Tripwire {
                        validator_name: tripwire.validator_name,
                        result: tripwire.result,
                    });
                }
                Ok(validation) if validation.valid => break (outcome, validation.filtered_content),
                Ok(validation) => match self.guardrails_config.on_output_failure {
                    FailurePolicy::Warn => break (outcome, validation.filtered_content),
                    FailurePolicy::Retry if attempt < max_retries => {
                        let complaint = validation
                            .errors
                            .iter()
                            .map(|e| format!("[{}] {}", e.code, e.message))
                            .collect::<Vec<_>>()
                            .join("; ");
                        request.messages.push(Message::assistant(outcome.final_text.clone()));
                        request.messages.push(Message::user(format!(
                            "Your previous response failed validation: {complaint}. Please regenerate."
                        )));
                        attempt += 1;
                    }
                    FailurePolicy::Reject | FailurePolicy::Retry => {
                        return Err(AgentError::Guardrails {
                            kind: GuardrailKind::Output,
                            errors: validation.errors.into_iter().map(|e| e.message).collect(),
                        });
                    }
                },
            }
        };

        // Step 8: persist memory — the user input and the final output, each tagged by role.
        if let Some(memory) = &self.memory {
            if let Err(e) = memory
                .remember(MemoryRecord::new(self.agent_id.clone(), MemoryKind::ShortTerm, input.content.clone()).with_metadata("role", "user"))
                .await
            {
                tracing::warn!(error = %e, "failed to persist user input to memory");
            }
            if let Err(e) = memory
                .remember(MemoryRecord::new(self.agent_id.clone(), MemoryKind::ShortTerm, filtered_content.clone()).with_metadata("role", "assistant"))
                .await
            {
                tracing::warn!(error = %e, "failed to persist output to memory");
            }
        }

        if let Some(checkpoints) = &self.checkpoints {
            let checkpoint = Checkpoint {
                thread_id,
                agent_id: self.agent_id.clone(),
                version: 0,
                state: self.state.state(),
                messages: outcome.messages.clone(),
                metadata: Default::default(),
                created_at: chrono::Utc::now(),
            };
            if let Err(e) = checkpoints.save(checkpoint).await {
                tracing::warn!(error = %e, "failed to persist checkpoint");
            }
        }

        let mut metadata = neuron_types::ValueMap::new();
        metadata.insert("model".into(), serde_json::Value::from(self.model.clone()));
        if outcome.budget_exhausted {
            metadata.insert("budget_exhausted".into(), serde_json::Value::from(true));
        }

        tracing::info!(tokens_used = outcome.usage.total(), budget_exhausted = outcome.budget_exhausted, "execute completed");

        Ok(Output {
            trace_id: input.trace_id.clone(),
            content: filtered_content,
            tokens_used: outcome.usage.total(),
            cost: None,
            duration: DurationMs::ZERO,
            finish_reason: format!("{:?}", outcome.finish_reason),
            metadata,
        })
    }

    /// One non-tool model call with a planning prompt, parsed into a list of
    /// steps (spec.md §4.7 `Plan`).
    #[tracing::instrument(skip(self, input), fields(agent_id = %self.agent_id))]
    pub async fn plan(&self, input: impl Into<String>) -> Result<Vec<String>, AgentError> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                Message::system("Break the user's request into a short, numbered list of concrete steps."),
                Message::user(input.into()),
            ],
            ..Default::default()
        };
        let response = self.executor.complete_once(request).await?;
        Ok(parse_plan_steps(&response.message.text()))
    }

    /// Persist `feedback` as a LongTerm memory record tagged with
    /// `feedback_type` and a timestamp, merging `data` as extra metadata, and
    /// publish a `Feedback` event (spec.md §4.7 `Observe`).
    #[tracing::instrument(skip(self, feedback_type, feedback, data), fields(agent_id = %self.agent_id))]
    pub async fn observe(&self, feedback_type: impl Into<String>, feedback: impl Into<String>, data: HashMap<String, serde_json::Value>) -> Result<(), AgentError> {
        let feedback_type = feedback_type.into();
        let mut record = MemoryRecord::new(self.agent_id.clone(), MemoryKind::Episodic, feedback.into())
            .with_metadata("feedback_type", feedback_type.clone())
            .with_metadata("timestamp", chrono::Utc::now().to_rfc3339());
        for (key, value) in data.clone() {
            record.metadata.insert(key, value);
        }

        if let Some(memory) = &self.memory {
            memory.remember(record).await?;
        }

        if let Some(events) = &self.events {
            events
                .publish(Event::new(
                    "feedback",
                    self.agent_id.clone(),
                    EventPayload::Feedback { feedback_type, detail: data },
                ))
                .await;
        }

        Ok(())
    }

    /// Roll `thread_id` back to `version`: restores the agent's live state to
    /// what was recorded at that version and persists a new checkpoint
    /// capturing the rollback, so the version history keeps growing forward
    /// (spec.md §4.8 `rollback`).
    pub async fn rollback(&self, thread_id: &str, version: u64) -> Result<Checkpoint, AgentError> {
        let checkpoints = self
            .checkpoints
            .as_ref()
            .ok_or_else(|| AgentError::Storage("no checkpoint store configured".into()))?;
        let restored = checkpoints.rollback(thread_id, version).await?;
        self.state.force_state(restored.state).await;
        Ok(restored)
    }

    /// Run `parent_input` through this agent, then spawn every `(subagent,
    /// input)` pair's `execute` concurrently and merge their outputs into
    /// this call's `Output` under "## Subagent i" headings, summing
    /// tokens-used and cost (spec.md §4.10 `executeWithSubagents`). Errors if
    /// every subagent fails; the parent's own output is unaffected by that.
    /// Cancelling `cancellation` aborts every still-running subagent.
    pub async fn execute_with_subagents(
        &self,
        parent_input: Input,
        subagents: Vec<(Arc<Agent>, Input)>,
        cancellation: &CancellationToken,
    ) -> Result<Output, AgentError> {
        let mut output = self.execute(parent_input).await?;
        if subagents.is_empty() {
            return Ok(output);
        }

        let tasks = subagents
            .into_iter()
            .enumerate()
            .map(|(i, (agent, input))| SubagentTask::new(format!("subagent-{i}"), async move { agent.execute(input).await.map_err(|e| e.to_string()) }))
            .collect();

        let merged = SubagentScheduler::new().spawn_parallel(tasks, cancellation).await?;
        if !merged.content.is_empty() {
            output.content.push_str("\n\n");
            output.content.push_str(&merged.content);
        }
        output.tokens_used += merged.tokens_used;
        if let Some(cost) = merged.cost {
            output.cost = Some(output.cost.unwrap_or(0.0) + cost);
        }
        Ok(output)
    }
}
