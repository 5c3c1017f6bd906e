use crate::executor::TaskExecutor;
use crate::registry::AgentRegistry;
use taskforce_core::{ExecutionContext, ProgressNotifier, TaskResult, TaskSpec, TeamEvent};
use tracing::{info, warn};

/// Replays a failed task against the originating agent's configured
/// backup agents, in declared order, stopping at the first success.
///
/// Each attempt produces a distinct [`TaskResult`]; the original failure
/// is never mutated.
#[derive(Clone)]
pub struct DelegationHandler {
    executor: TaskExecutor,
    notifier: ProgressNotifier,
}

impl DelegationHandler {
    /// Create a handler wrapping the given executor.
    pub fn new(executor: TaskExecutor, notifier: ProgressNotifier) -> Self {
        Self { executor, notifier }
    }

    /// Access the wrapped executor.
    pub fn executor(&self) -> &TaskExecutor {
        &self.executor
    }

    /// Execute a task, delegating on failure when the assigned agent
    /// allows it. Returns the first completed result, or the last failure
    /// once every candidate has been tried.
    pub async fn execute_with_delegation(
        &self,
        task: &TaskSpec,
        registry: &AgentRegistry,
        ctx: &ExecutionContext,
    ) -> TaskResult {
        let result = self.executor.execute(task, registry, ctx).await;
        if !result.is_failed() {
            return result;
        }

        let Some(agent) = registry.get(task.agent_id) else {
            // No spec to read a delegation chain from.
            return result;
        };
        if !agent.allow_delegation || agent.delegate_to.is_empty() {
            return result;
        }

        let reason = result.error.clone().unwrap_or_default();
        info!(
            task_id = %task.id,
            agent = %agent.name,
            candidates = agent.delegate_to.len(),
            "Task failed, starting delegation chain"
        );

        let mut last = result;
        for candidate in &agent.delegate_to {
            if ctx.is_cancelled() {
                warn!(task_id = %task.id, "Delegation chain interrupted by cancellation");
                break;
            }

            self.notifier.publish(&TeamEvent::TaskDelegated {
                task_id: task.id,
                from_agent: agent.id,
                to_agent: *candidate,
                reason: reason.clone(),
            });

            // Identical task, reassigned to the backup agent.
            let mut derived = task.clone();
            derived.agent_id = *candidate;

            let attempt = self
                .executor
                .execute(&derived, registry, ctx)
                .await
                .with_delegated_to(*candidate);

            if attempt.is_completed() {
                info!(task_id = %task.id, delegate = %candidate, "Delegation succeeded");
                return attempt;
            }
            last = attempt;
        }

        warn!(task_id = %task.id, "Delegation chain exhausted");
        last
    }
}
