//! Subagent scheduler (spec.md §2 C10, §4.10).
//!
//! Spawns a batch of subagent `Execute` calls concurrently onto a
//! [`tokio::task::JoinSet`]; each task's failure is isolated so one subagent
//! erroring never cancels its siblings. Successful outputs are merged by
//! concatenating content under "## Subagent i" headings and summing
//! tokens-used/cost, in the order each task actually finished; if every task
//! fails the whole call errors. Dropping the `JoinSet` — whether because the
//! caller dropped `spawn_parallel`'s future or because `cancellation` fired —
//! aborts every still-running subagent.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use neuron_types::{AgentError, Output};
use tokio_util::sync::CancellationToken;

/// One subagent task: a label plus the future that runs it.
pub struct SubagentTask {
    /// Caller-assigned id, echoed back in [`SubagentResult`].
    pub task_id: String,
    /// The work itself.
    pub future: Pin<Box<dyn Future<Output = Result<Output, String>> + Send>>,
}

impl SubagentTask {
    /// Build a task from any `Send` future resolving to an output or error message.
    pub fn new(task_id: impl Into<String>, future: impl Future<Output = Result<Output, String>> + Send + 'static) -> Self {
        Self {
            task_id: task_id.into(),
            future: Box::pin(future),
        }
    }
}

/// The outcome of one subagent task, isolated from its siblings' failures.
#[derive(Debug, Clone)]
pub struct SubagentResult {
    /// Echoes [`SubagentTask::task_id`].
    pub task_id: String,
    /// `Ok` output on success, `Err` message on failure.
    pub outcome: Result<Output, String>,
}

/// The result of merging every successful task in a batch.
#[derive(Debug, Clone, Default)]
pub struct MergedOutput {
    /// Concatenation of every successful task's content, each under a
    /// "## Subagent i" heading, in completion order.
    pub content: String,
    /// Sum of every successful task's `tokens_used`.
    pub tokens_used: usize,
    /// Sum of every successful task's `cost`, `None` if none reported one.
    pub cost: Option<f64>,
    /// Per-task results, in completion order (not original submission order).
    pub results: Vec<SubagentResult>,
}

/// Runs a batch of subagent tasks in parallel and merges their results.
#[derive(Default)]
pub struct SubagentScheduler;

impl SubagentScheduler {
    /// Build a scheduler.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Spawn every task in `tasks` onto a [`tokio::task::JoinSet`] and
    /// collect them in the order they actually finish, merging the
    /// successful outputs. A panicking or erroring task never prevents its
    /// siblings' results from being collected; errors only if every task
    /// failed. If `cancellation` fires before every task has finished, the
    /// `JoinSet` is aborted and the call returns [`AgentError::Cancelled`] —
    /// as does dropping this future outright, since dropping the `JoinSet`
    /// aborts every task still running on it.
    pub async fn spawn_parallel(&self, tasks: Vec<SubagentTask>, cancellation: &CancellationToken) -> Result<MergedOutput, AgentError> {
        let total = tasks.len();
        let mut join_set = tokio::task::JoinSet::new();
        for task in tasks {
            let task_id = task.task_id.clone();
            join_set.spawn(async move {
                let outcome = task.future.await;
                (task_id, outcome)
            });
        }

        let mut results = Vec::with_capacity(total);
        loop {
            tokio::select! {
                biased;
                () = cancellation.cancelled() => {
                    join_set.abort_all();
                    return Err(AgentError::Cancelled);
                }
                next = join_set.join_next() => {
                    match next {
                        Some(Ok((task_id, outcome))) => results.push(SubagentResult { task_id, outcome }),
                        Some(Err(join_err)) => results.push(SubagentResult {
                            task_id: String::from("unknown"),
                            outcome: Err(format!("subagent task panicked: {join_err}")),
                        }),
                        None => break,
                    }
                }
            }
        }

        let mut merged = MergedOutput::default();
        let mut successes = 0usize;
        for (i, result) in results.iter().enumerate() {
            if let Ok(output) = &result.outcome {
                successes += 1;
                if !merged.content.is_empty() {
                    merged.content.push_str("\n\n");
                }
                merged.content.push_str(&format!("## Subagent {}\n{}", i + 1, output.content));
                merged.tokens_used += output.tokens_used;
                if let Some(cost) = output.cost {
                    merged.cost = Some(merged.cost.unwrap_or(0.0) + cost);
                }
            }
        }

        if successes == 0 {
            let failures = results
                .iter()
                .map(|r| (r.task_id.clone(), r.outcome.as_ref().err().cloned().unwrap_or_default()))
                .collect();
            tracing::warn!(total, "all subagents failed");
            return Err(AgentError::AllSubagentsFailed(total, failures));
        }

        merged.results = results;
        Ok(merged)
    }
}

/// Bookkeeping entry for one subagent execution tracked by a [`SubagentManager`].
#[derive(Debug, Clone)]
struct Execution {
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

/// Tracks subagent executions by id and supports pruning old completed ones.
///
/// The scheduler itself is stateless; this is the companion registry callers
/// use when they need to look up or garbage-collect past runs (spec.md
/// §4.10's "companion `SubagentManager`").
#[derive(Default)]
pub struct SubagentManager {
    executions: Mutex<HashMap<String, Execution>>,
}

impl SubagentManager {
    /// Build an empty manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a newly-started execution.
    pub fn track(&self, task_id: impl Into<String>) {
        self.executions.lock().unwrap().insert(task_id.into(), Execution { started_at: Utc::now(), completed_at: None });
    }

    /// Mark an execution as completed.
    pub fn complete(&self, task_id: &str) {
        if let Some(execution) = self.executions.lock().unwrap().get_mut(task_id) {
            execution.completed_at = Some(Utc::now());
        }
    }

    /// When `task_id` was started, if it is still tracked.
    #[must_use]
    pub fn started_at(&self, task_id: &str) -> Option<DateTime<Utc>> {
        self.executions.lock().unwrap().get(task_id).map(|e| e.started_at)
    }

    /// Number of executions currently tracked.
    #[must_use]
    pub fn len(&self) -> usize {
        self.executions.lock().unwrap().len()
    }

    /// `true` if no executions are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every completed execution whose completion timestamp is older
    /// than `older_than`. Still-running executions are never removed.
    pub fn cleanup_completed(&self, older_than: DateTime<Utc>) {
        self.executions.lock().unwrap().retain(|_, execution| match execution.completed_at {
            Some(completed_at) => completed_at >= older_than,
            None => true,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::sync::Arc;

    fn output(text: &str, tokens: usize, cost: Option<f64>) -> Output {
        Output {
            content: text.to_owned(),
            tokens_used: tokens,
            cost,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn merges_content_under_headings_and_sums_usage() {
        let scheduler = SubagentScheduler::new();
        let tasks = vec![
            SubagentTask::new("t1", async { Ok(output("hello", 2, Some(0.01))) }),
            SubagentTask::new("t2", async { Ok(output("world", 3, Some(0.02))) }),
        ];
        let merged = scheduler.spawn_parallel(tasks, &CancellationToken::new()).await.unwrap();
        assert_eq!(merged.tokens_used, 5);
        assert_eq!(merged.cost, Some(0.03));
        assert!(merged.content.contains("## Subagent 1\nhello"));
        assert!(merged.content.contains("## Subagent 2\nworld"));
        assert_eq!(merged.results.len(), 2);
    }

    #[tokio::test]
    async fn one_failure_does_not_affect_siblings() {
        let scheduler = SubagentScheduler::new();
        let tasks = vec![
            SubagentTask::new("ok", async { Ok(output("fine", 1, None)) }),
            SubagentTask::new("bad", async { Err("boom".to_owned()) }),
        ];
        let merged = scheduler.spawn_parallel(tasks, &CancellationToken::new()).await.unwrap();
        assert!(merged.content.contains("fine"));
        assert!(merged.results.iter().any(|r| r.task_id == "bad" && r.outcome.is_err()));
        assert!(merged.results.iter().any(|r| r.task_id == "ok" && r.outcome.is_ok()));
    }

    #[tokio::test]
    async fn all_failures_returns_an_error() {
        let scheduler = SubagentScheduler::new();
        let tasks = vec![
            SubagentTask::new("a", async { Err("boom a".to_owned()) }),
            SubagentTask::new("b", async { Err("boom b".to_owned()) }),
        ];
        let err = scheduler.spawn_parallel(tasks, &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, AgentError::AllSubagentsFailed(2, _)));
    }

    #[tokio::test]
    async fn results_are_collected_in_completion_order_not_submission_order() {
        let scheduler = SubagentScheduler::new();
        let tasks = vec![
            SubagentTask::new("slow", async {
                tokio::time::sleep(std::time::Duration::from_millis(30)).await;
                Ok(output("slow", 1, None))
            }),
            SubagentTask::new("fast", async { Ok(output("fast", 1, None)) }),
        ];
        let merged = scheduler.spawn_parallel(tasks, &CancellationToken::new()).await.unwrap();
        assert_eq!(merged.results[0].task_id, "fast");
        assert_eq!(merged.results[1].task_id, "slow");
    }

    #[tokio::test]
    async fn cancellation_aborts_in_flight_subagents() {
        let scheduler = SubagentScheduler::new();
        let ran_to_completion = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let flag = ran_to_completion.clone();
        let tasks = vec![SubagentTask::new("slow", async move {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            flag.store(true, std::sync::atomic::Ordering::SeqCst);
            Ok(output("slow", 1, None))
        })];

        let cancellation = CancellationToken::new();
        cancellation.cancel();
        let err = scheduler.spawn_parallel(tasks, &cancellation).await.unwrap_err();
        assert!(matches!(err, AgentError::Cancelled));

        tokio::time::sleep(std::time::Duration::from_millis(80)).await;
        assert!(!ran_to_completion.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[test]
    fn cleanup_completed_prunes_only_old_completed_entries() {
        let manager = SubagentManager::new();
        manager.track("old");
        manager.track("recent");
        manager.track("running");
        manager.complete("old");
        manager.complete("recent");

        // Backdate "old"'s completion so the cutoff only catches it.
        {
            let mut executions = manager.executions.lock().unwrap();
            executions.get_mut("old").unwrap().completed_at = Some(Utc::now() - Duration::hours(2));
        }

        manager.cleanup_completed(Utc::now() - Duration::minutes(30));

        assert_eq!(manager.len(), 2);
        assert!(manager.executions.lock().unwrap().contains_key("recent"));
        assert!(manager.executions.lock().unwrap().contains_key("running"));
        assert!(!manager.executions.lock().unwrap().contains_key("old"));
    }
}
