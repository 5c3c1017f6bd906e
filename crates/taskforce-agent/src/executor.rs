use crate::llm::{GenerateRequest, LlmService, TokenUsage};
use crate::prompt;
use crate::registry::AgentRegistry;
use chrono::Utc;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use taskforce_core::{
    ExecutionContext, HumanInputMode, ProgressNotifier, TaskResult, TaskSpec, TaskforceError,
    TeamEvent,
};
use tracing::{info, warn};

const OUTPUT_PREVIEW_LEN: usize = 200;

fn preview(text: &str) -> String {
    if text.len() > OUTPUT_PREVIEW_LEN {
        let mut end = OUTPUT_PREVIEW_LEN;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &text[..end])
    } else {
        text.to_string()
    }
}

/// Executes one task against one agent: composes prompts, calls the LLM
/// invocation service, and returns a terminal [`TaskResult`].
///
/// Agent-not-found, LLM errors, timeouts, and cancellation all surface as
/// normal `failed` results — nothing here escapes as an `Err`.
#[derive(Clone)]
pub struct TaskExecutor {
    llm: Arc<dyn LlmService>,
    notifier: ProgressNotifier,
    human_input: HumanInputMode,
    usage: Arc<Mutex<TokenUsage>>,
}

impl TaskExecutor {
    /// Create an executor over the given LLM service and event bus.
    pub fn new(llm: Arc<dyn LlmService>, notifier: ProgressNotifier) -> Self {
        Self {
            llm,
            notifier,
            human_input: HumanInputMode::default(),
            usage: Arc::new(Mutex::new(TokenUsage::default())),
        }
    }

    /// Set how `human_input_required` tasks behave.
    pub fn with_human_input_mode(mut self, mode: HumanInputMode) -> Self {
        self.human_input = mode;
        self
    }

    /// Total token usage accumulated across executions.
    pub fn usage_total(&self) -> TokenUsage {
        match self.usage.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    fn record_usage(&self, usage: TokenUsage) {
        let mut total = match self.usage.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        total.add(usage);
    }

    /// Execute a task. The returned result is terminal.
    pub async fn execute(
        &self,
        task: &TaskSpec,
        registry: &AgentRegistry,
        ctx: &ExecutionContext,
    ) -> TaskResult {
        let Some(agent) = registry.get(task.agent_id) else {
            warn!(task_id = %task.id, agent_id = %task.agent_id, "Assigned agent not found");
            let result = TaskResult::failed(task.id, task.agent_id, "agent not found", None);
            self.notifier.publish(&TeamEvent::TaskFailed {
                task_id: task.id,
                agent_id: task.agent_id,
                error: "agent not found".to_string(),
            });
            return result;
        };

        if task.human_input_required {
            self.notifier.publish(&TeamEvent::TaskWaitingHuman {
                task_id: task.id,
                agent_id: agent.id,
            });
            if self.human_input == HumanInputMode::Blocking {
                info!(task_id = %task.id, "Task waiting for human resume signal");
                if let Err(e) = ctx.wait_for_human(task.id).await {
                    let result = TaskResult::failed(task.id, agent.id, e.to_string(), None);
                    self.notifier.publish(&TeamEvent::TaskFailed {
                        task_id: task.id,
                        agent_id: agent.id,
                        error: e.to_string(),
                    });
                    return result;
                }
            }
        }

        if ctx.is_cancelled() {
            let error = TaskforceError::Cancelled.to_string();
            let result = TaskResult::failed(task.id, agent.id, &error, None);
            self.notifier.publish(&TeamEvent::TaskFailed {
                task_id: task.id,
                agent_id: agent.id,
                error,
            });
            return result;
        }

        let started_at = Utc::now();
        info!(task_id = %task.id, agent = %agent.name, "Executing task");
        self.notifier.publish(&TeamEvent::TaskStarted {
            task_id: task.id,
            agent_id: agent.id,
        });

        let upstream = ctx.outputs_for(&task.context_from).await;
        let request = GenerateRequest {
            system_prompt: prompt::system_prompt(agent),
            user_prompt: prompt::task_prompt(task, ctx.inputs(), &upstream),
            model: agent.model.clone(),
            temperature: agent.temperature,
        };

        let reply = match task.timeout_ms {
            Some(ms) => {
                match tokio::time::timeout(Duration::from_millis(ms), self.llm.generate(request))
                    .await
                {
                    Ok(reply) => reply,
                    Err(_) => Err(TaskforceError::Execution(format!(
                        "task timed out after {ms}ms"
                    ))),
                }
            }
            None => self.llm.generate(request).await,
        };

        match reply {
            Ok(reply) => {
                self.record_usage(reply.usage);
                info!(task_id = %task.id, agent = %agent.name, "Task completed");
                self.notifier.publish(&TeamEvent::TaskCompleted {
                    task_id: task.id,
                    agent_id: agent.id,
                    output_preview: preview(&reply.content),
                });
                TaskResult::completed(
                    task.id,
                    agent.id,
                    serde_json::Value::String(reply.content),
                    started_at,
                )
            }
            Err(e) => {
                let error = e.to_string();
                warn!(task_id = %task.id, agent = %agent.name, error = %error, "Task failed");
                self.notifier.publish(&TeamEvent::TaskFailed {
                    task_id: task.id,
                    agent_id: agent.id,
                    error: error.clone(),
                });
                TaskResult::failed(task.id, agent.id, error, Some(started_at))
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::llm::GenerateReply;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};
    use taskforce_core::{AgentRole, AgentSpec, ExecutionMode, TaskforceResult, TeamSpec};
    use uuid::Uuid;

    struct EchoLlm {
        calls: AtomicU32,
        delay_ms: u64,
        fail: bool,
    }

    impl EchoLlm {
        fn new() -> Self {
            Self {
                calls: AtomicU32::new(0),
                delay_ms: 0,
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::new()
            }
        }

        fn slow(delay_ms: u64) -> Self {
            Self {
                delay_ms,
                ..Self::new()
            }
        }
    }

    #[async_trait]
    impl LlmService for EchoLlm {
        async fn generate(&self, request: GenerateRequest) -> TaskforceResult<GenerateReply> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
            }
            if self.fail {
                return Err(TaskforceError::Llm("backend unavailable".into()));
            }
            Ok(GenerateReply {
                content: format!("echo: {}", request.user_prompt),
                usage: TokenUsage {
                    input_tokens: 10,
                    output_tokens: 5,
                },
            })
        }
    }

    fn team_with_agent() -> (TeamSpec, Uuid) {
        let agent = AgentSpec::new("worker", AgentRole::Researcher, "research");
        let id = agent.id;
        (
            TeamSpec::new("t", ExecutionMode::Sequential).with_agent(agent),
            id,
        )
    }

    #[tokio::test]
    async fn test_successful_execution() {
        let (team, agent_id) = team_with_agent();
        let registry = AgentRegistry::from_team(&team);
        let executor = TaskExecutor::new(Arc::new(EchoLlm::new()), ProgressNotifier::new());
        let ctx = ExecutionContext::new(HashMap::new());

        let task = TaskSpec::new("find sources", agent_id);
        let result = executor.execute(&task, &registry, &ctx).await;

        assert!(result.is_completed());
        assert_eq!(result.agent_id, agent_id);
        assert!(result
            .output
            .as_ref()
            .unwrap()
            .as_str()
            .unwrap()
            .contains("find sources"));
        assert!(result.started_at.is_some());
        assert_eq!(executor.usage_total().input_tokens, 10);
    }

    #[tokio::test]
    async fn test_missing_agent_is_a_failed_result() {
        let team = TeamSpec::new("empty", ExecutionMode::Sequential);
        let registry = AgentRegistry::from_team(&team);
        let llm = Arc::new(EchoLlm::new());
        let executor = TaskExecutor::new(llm.clone(), ProgressNotifier::new());
        let ctx = ExecutionContext::new(HashMap::new());

        let task = TaskSpec::new("orphan", Uuid::new_v4());
        let result = executor.execute(&task, &registry, &ctx).await;

        assert!(result.is_failed());
        assert_eq!(result.error.as_deref(), Some("agent not found"));
        // The LLM was never consulted.
        assert_eq!(llm.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_llm_failure_is_a_failed_result() {
        let (team, agent_id) = team_with_agent();
        let registry = AgentRegistry::from_team(&team);
        let executor = TaskExecutor::new(Arc::new(EchoLlm::failing()), ProgressNotifier::new());
        let ctx = ExecutionContext::new(HashMap::new());

        let task = TaskSpec::new("doomed", agent_id);
        let result = executor.execute(&task, &registry, &ctx).await;

        assert!(result.is_failed());
        assert!(result.error.as_deref().unwrap().contains("backend unavailable"));
    }

    #[tokio::test]
    async fn test_timeout_becomes_failed_result() {
        let (team, agent_id) = team_with_agent();
        let registry = AgentRegistry::from_team(&team);
        let executor = TaskExecutor::new(Arc::new(EchoLlm::slow(200)), ProgressNotifier::new());
        let ctx = ExecutionContext::new(HashMap::new());

        let task = TaskSpec::new("slow", agent_id).with_timeout_ms(10);
        let result = executor.execute(&task, &registry, &ctx).await;

        assert!(result.is_failed());
        assert!(result.error.as_deref().unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn test_cancelled_run_short_circuits() {
        let (team, agent_id) = team_with_agent();
        let registry = AgentRegistry::from_team(&team);
        let llm = Arc::new(EchoLlm::new());
        let executor = TaskExecutor::new(llm.clone(), ProgressNotifier::new());
        let ctx = ExecutionContext::new(HashMap::new());
        ctx.cancel_handle().cancel();

        let task = TaskSpec::new("never runs", agent_id);
        let result = executor.execute(&task, &registry, &ctx).await;

        assert!(result.is_failed());
        assert!(result.error.as_deref().unwrap().contains("cancelled"));
        assert_eq!(llm.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_advisory_human_input_proceeds() {
        let (team, agent_id) = team_with_agent();
        let registry = AgentRegistry::from_team(&team);
        let notifier = ProgressNotifier::new();
        let waiting_seen = Arc::new(AtomicU32::new(0));
        let seen = waiting_seen.clone();
        notifier.subscribe_fn(move |event| {
            if matches!(event, TeamEvent::TaskWaitingHuman { .. }) {
                seen.fetch_add(1, Ordering::SeqCst);
            }
        });

        let executor = TaskExecutor::new(Arc::new(EchoLlm::new()), notifier)
            .with_human_input_mode(HumanInputMode::Advisory);
        let ctx = ExecutionContext::new(HashMap::new());

        let task = TaskSpec::new("review me", agent_id).with_human_input();
        let result = executor.execute(&task, &registry, &ctx).await;

        assert!(result.is_completed());
        assert_eq!(waiting_seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_blocking_human_input_waits_for_resume() {
        let (team, agent_id) = team_with_agent();
        let llm = Arc::new(EchoLlm::new());
        let executor = TaskExecutor::new(llm.clone(), ProgressNotifier::new())
            .with_human_input_mode(HumanInputMode::Blocking);
        let ctx = Arc::new(ExecutionContext::new(HashMap::new()));

        let task = TaskSpec::new("gated", agent_id).with_human_input();
        let task_id = task.id;

        let handle = {
            let executor = executor.clone();
            let ctx = ctx.clone();
            let registry = AgentRegistry::from_team(&team);
            tokio::spawn(async move { executor.execute(&task, &registry, &ctx).await })
        };

        // Give the executor a moment to park; it must not have called the
        // LLM while waiting.
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(llm.calls.load(Ordering::SeqCst), 0);

        ctx.resume_human(task_id);
        let result = tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_completed());
        assert_eq!(llm.calls.load(Ordering::SeqCst), 1);
    }
}
