use crate::adaptive;
use crate::graph::TaskGraph;
use crate::manager;
use chrono::Utc;
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use taskforce_agent::{AgentRegistry, DelegationHandler, LlmService, TaskExecutor, TokenUsage};
use taskforce_core::{
    ExecutionContext, ExecutionMode, ExecutionRecord, ProgressNotifier, TaskResult, TaskSpec,
    TaskStatus, TaskforceResult, TeamEvent, TeamSpec, TeamStore,
};
use tokio::sync::Semaphore;
use tracing::{error, info, warn};
use uuid::Uuid;

/// State machine for one team run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunState {
    Initializing,
    Running,
    Completed,
    Failed,
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunState::Initializing => write!(f, "initializing"),
            RunState::Running => write!(f, "running"),
            RunState::Completed => write!(f, "completed"),
            RunState::Failed => write!(f, "failed"),
        }
    }
}

/// Aggregated outcome of one team run.
///
/// Task-level problems never escape [`Orchestrator::run`] as an `Err`;
/// they are reported here with `success = false`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Whether every executed task completed.
    pub success: bool,
    /// Output of each completed task, keyed by task id.
    pub results: HashMap<Uuid, serde_json::Value>,
    /// One terminal result per task execution (including skips).
    pub task_results: Vec<TaskResult>,
    /// Failure description when `success` is false.
    pub error: Option<String>,
    /// Token usage accumulated across the run, planning included.
    pub usage: TokenUsage,
}

/// Strategy dispatcher: drives the task graph, executor, delegation
/// handler, and progress notifier to produce a team result.
pub struct Orchestrator {
    llm: Arc<dyn LlmService>,
    notifier: ProgressNotifier,
    store: Option<Arc<dyn TeamStore>>,
}

impl Orchestrator {
    /// Create an orchestrator over the given LLM invocation service.
    pub fn new(llm: Arc<dyn LlmService>) -> Self {
        Self {
            llm,
            notifier: ProgressNotifier::new(),
            store: None,
        }
    }

    /// Attach a team store; each run appends an execution record to it.
    pub fn with_store(mut self, store: Arc<dyn TeamStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// The event bus; subscribe here before calling `run`.
    pub fn notifier(&self) -> &ProgressNotifier {
        &self.notifier
    }

    /// Run a team with the given inputs.
    ///
    /// Returns `Err` only for configuration errors detected before any
    /// task runs; every other failure is reported in the [`RunReport`].
    pub async fn run(
        &self,
        team: &TeamSpec,
        inputs: HashMap<String, serde_json::Value>,
    ) -> TaskforceResult<RunReport> {
        let ctx = Arc::new(ExecutionContext::new(inputs));
        self.run_with_context(team, ctx).await
    }

    /// Run a team against a caller-owned context, letting the caller hold
    /// the cancellation handle and deliver human resume signals.
    pub async fn run_with_context(
        &self,
        team: &TeamSpec,
        ctx: Arc<ExecutionContext>,
    ) -> TaskforceResult<RunReport> {
        let run_started = Utc::now();
        let mut state = RunState::Initializing;
        info!(team_id = %team.id, mode = %team.execution_mode, state = %state, "Starting team run");

        if let Err(e) = TaskGraph::validate(team) {
            state = RunState::Failed;
            error!(team_id = %team.id, state = %state, error = %e, "Team validation failed");
            self.notifier.publish(&TeamEvent::TeamFailed {
                team_id: team.id,
                error: e.to_string(),
            });
            return Err(e);
        }

        let registry = Arc::new(AgentRegistry::from_team(team));
        let executor = TaskExecutor::new(Arc::clone(&self.llm), self.notifier.clone())
            .with_human_input_mode(team.human_input);
        let handler = DelegationHandler::new(executor.clone(), self.notifier.clone());

        state = RunState::Running;
        info!(team_id = %team.id, state = %state, tasks = team.tasks.len(), "Team validated");
        self.notifier.publish(&TeamEvent::TeamStarted {
            team_id: team.id,
            name: team.name.clone(),
            total_tasks: team.tasks.len(),
        });

        let mut planning_usage = TokenUsage::default();
        let (task_results, run_error) = match team.execution_mode {
            ExecutionMode::Sequential => {
                self.run_sequential(&team.tasks, &handler, &registry, &ctx)
                    .await
            }
            ExecutionMode::Parallel => self.run_parallel(team, &handler, &registry, &ctx).await,
            ExecutionMode::Hierarchical => {
                match manager::plan_assignments(&self.llm, team, &registry).await {
                    Ok((plan, usage)) => {
                        planning_usage = usage;
                        let assigned: Vec<TaskSpec> = team
                            .tasks
                            .iter()
                            .map(|task| {
                                let mut reassigned = task.clone();
                                reassigned.agent_id = plan[&task.id];
                                reassigned
                            })
                            .collect();
                        self.run_sequential(&assigned, &handler, &registry, &ctx)
                            .await
                    }
                    Err(e) => {
                        state = RunState::Failed;
                        error!(team_id = %team.id, state = %state, error = %e, "Manager plan rejected");
                        self.notifier.publish(&TeamEvent::TeamFailed {
                            team_id: team.id,
                            error: e.to_string(),
                        });
                        return Err(e);
                    }
                }
            }
            ExecutionMode::Adaptive => self.run_adaptive(team, &handler, &registry, &ctx).await,
        };

        let success = run_error.is_none();
        let mut results = HashMap::new();
        let (mut completed, mut failed, mut skipped) = (0usize, 0usize, 0usize);
        for result in &task_results {
            match result.status {
                TaskStatus::Completed => {
                    completed += 1;
                    if let Some(output) = &result.output {
                        results.insert(result.task_id, output.clone());
                    }
                }
                TaskStatus::Failed => failed += 1,
                TaskStatus::Skipped => skipped += 1,
                _ => {}
            }
        }

        if team.verbose {
            for result in &task_results {
                info!(
                    task_id = %result.task_id,
                    agent_id = %result.agent_id,
                    status = ?result.status,
                    "Task result"
                );
            }
        }

        if success {
            state = RunState::Completed;
            info!(team_id = %team.id, state = %state, completed, "Team run completed");
            self.notifier.publish(&TeamEvent::TeamCompleted {
                team_id: team.id,
                completed,
                skipped,
            });
        } else {
            state = RunState::Failed;
            let message = run_error.clone().unwrap_or_default();
            warn!(team_id = %team.id, state = %state, error = %message, "Team run failed");
            self.notifier.publish(&TeamEvent::TeamFailed {
                team_id: team.id,
                error: message,
            });
        }

        if let Some(store) = &self.store {
            let record = ExecutionRecord {
                team_id: team.id,
                started_at: run_started,
                finished_at: Utc::now(),
                success,
                completed_tasks: completed,
                failed_tasks: failed,
                skipped_tasks: skipped,
                error: run_error.clone(),
            };
            if let Err(e) = store.append_execution_record(team.id, record).await {
                warn!(team_id = %team.id, error = %e, "Failed to append execution record");
            }
        }

        let mut usage = executor.usage_total();
        usage.add(planning_usage);

        Ok(RunReport {
            success,
            results,
            task_results,
            error: run_error,
            usage,
        })
    }

    /// One task at a time in topological order; fail-fast. Tasks after
    /// the failure point are reported as skipped and never started.
    async fn run_sequential(
        &self,
        tasks: &[TaskSpec],
        handler: &DelegationHandler,
        registry: &AgentRegistry,
        ctx: &ExecutionContext,
    ) -> (Vec<TaskResult>, Option<String>) {
        let graph = TaskGraph::new(tasks);
        let order = graph.topological_order();
        let by_id: HashMap<Uuid, &TaskSpec> = tasks.iter().map(|t| (t.id, t)).collect();

        let mut results = Vec::with_capacity(order.len());
        let mut run_error = None;

        for (idx, task_id) in order.iter().enumerate() {
            let task = by_id[task_id];

            if ctx.is_cancelled() {
                run_error = Some("run cancelled".to_string());
                skip_all(&order[idx..], &by_id, &mut results);
                break;
            }

            let result = handler.execute_with_delegation(task, registry, ctx).await;
            if result.is_completed() {
                let output = result.output.clone().unwrap_or(serde_json::Value::Null);
                if let Err(e) = ctx.record_output(task.id, output).await {
                    error!(task_id = %task.id, error = %e, "Failed to record task output");
                    run_error = Some(e.to_string());
                    results.push(result);
                    skip_all(&order[idx + 1..], &by_id, &mut results);
                    break;
                }
                results.push(result);
            } else {
                run_error = Some(format!(
                    "task {} failed: {}",
                    task.id,
                    result.error.as_deref().unwrap_or("unknown error")
                ));
                results.push(result);
                skip_all(&order[idx + 1..], &by_id, &mut results);
                break;
            }
        }

        (results, run_error)
    }

    /// Dependency waves with bounded concurrent fan-out. All failures in
    /// a wave are collected before deciding to stop; gathered results are
    /// kept either way.
    async fn run_parallel(
        &self,
        team: &TeamSpec,
        handler: &DelegationHandler,
        registry: &Arc<AgentRegistry>,
        ctx: &Arc<ExecutionContext>,
    ) -> (Vec<TaskResult>, Option<String>) {
        let graph = TaskGraph::new(&team.tasks);
        let groups = graph.independent_groups();
        let by_id: HashMap<Uuid, &TaskSpec> = team.tasks.iter().map(|t| (t.id, t)).collect();
        let semaphore = Arc::new(Semaphore::new(team.max_concurrent_agents.max(1)));

        let mut results = Vec::with_capacity(team.tasks.len());
        let mut run_error: Option<String> = None;

        for (wave, group) in groups.iter().enumerate() {
            if run_error.is_some() || ctx.is_cancelled() {
                if run_error.is_none() {
                    run_error = Some("run cancelled".to_string());
                }
                skip_all(group, &by_id, &mut results);
                continue;
            }

            info!(wave, tasks = group.len(), "Dispatching parallel wave");

            let mut handles = Vec::with_capacity(group.len());
            for task_id in group {
                let task = by_id[task_id].clone();
                let handler = handler.clone();
                let registry = Arc::clone(registry);
                let ctx = Arc::clone(ctx);
                let semaphore = Arc::clone(&semaphore);
                handles.push(tokio::spawn(async move {
                    let _permit = match semaphore.acquire_owned().await {
                        Ok(permit) => permit,
                        Err(_) => {
                            return TaskResult::failed(
                                task.id,
                                task.agent_id,
                                "concurrency limiter closed",
                                None,
                            )
                        }
                    };
                    handler.execute_with_delegation(&task, &registry, &ctx).await
                }));
            }

            let wave_results = join_all(handles).await;
            let mut failures: Vec<String> = Vec::new();

            for (task_id, joined) in group.iter().zip(wave_results) {
                let result = match joined {
                    Ok(result) => result,
                    Err(e) => TaskResult::failed(
                        *task_id,
                        by_id[task_id].agent_id,
                        format!("task aborted: {e}"),
                        None,
                    ),
                };
                if result.is_completed() {
                    let output = result.output.clone().unwrap_or(serde_json::Value::Null);
                    if let Err(e) = ctx.record_output(*task_id, output).await {
                        error!(task_id = %task_id, error = %e, "Failed to record task output");
                        failures.push(format!("{task_id}: {e}"));
                    }
                } else {
                    failures.push(format!(
                        "{task_id}: {}",
                        result.error.as_deref().unwrap_or("unknown error")
                    ));
                }
                results.push(result);
            }

            if !failures.is_empty() {
                run_error = Some(format!(
                    "{} task(s) failed in wave {wave}: {}",
                    failures.len(),
                    failures.join("; ")
                ));
            }
        }

        (results, run_error)
    }

    /// Route-driven traversal: start at the entry task, follow the first
    /// matching edge after each execution, stop on failure, a dead end,
    /// or a revisited task.
    async fn run_adaptive(
        &self,
        team: &TeamSpec,
        handler: &DelegationHandler,
        registry: &AgentRegistry,
        ctx: &ExecutionContext,
    ) -> (Vec<TaskResult>, Option<String>) {
        let by_id: HashMap<Uuid, &TaskSpec> = team.tasks.iter().map(|t| (t.id, t)).collect();
        let Some(entry) = team.entry_task_id.or_else(|| team.tasks.first().map(|t| t.id)) else {
            return (Vec::new(), None);
        };

        let mut visited = HashSet::new();
        let mut results = Vec::new();
        let mut run_error = None;
        let mut current = entry;

        loop {
            if !visited.insert(current) {
                info!(task_id = %current, "Route revisited a task, stopping");
                break;
            }
            if ctx.is_cancelled() {
                run_error = Some("run cancelled".to_string());
                break;
            }

            let task = by_id[&current];
            let result = handler.execute_with_delegation(task, registry, ctx).await;

            if result.is_completed() {
                let output = result.output.clone().unwrap_or(serde_json::Value::Null);
                if let Err(e) = ctx.record_output(current, output.clone()).await {
                    error!(task_id = %current, error = %e, "Failed to record task output");
                    run_error = Some(e.to_string());
                    results.push(result);
                    break;
                }
                results.push(result);
                match adaptive::next_task(task, &output, ctx).await {
                    Some(next) => current = next,
                    None => break,
                }
            } else {
                run_error = Some(format!(
                    "task {current} failed: {}",
                    result.error.as_deref().unwrap_or("unknown error")
                ));
                results.push(result);
                break;
            }
        }

        (results, run_error)
    }
}

/// Terminal "not run" results for every task in `ids`.
fn skip_all(ids: &[Uuid], by_id: &HashMap<Uuid, &TaskSpec>, results: &mut Vec<TaskResult>) {
    for id in ids {
        results.push(TaskResult::skipped(*id, by_id[id].agent_id));
    }
}
