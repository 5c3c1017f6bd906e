use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle events published through the [`crate::ProgressNotifier`]
/// during a team run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TeamEvent {
    /// The run passed validation and is about to execute.
    TeamStarted {
        /// Team being run.
        team_id: Uuid,
        /// Team name.
        name: String,
        /// Number of tasks in the team.
        total_tasks: usize,
    },
    /// The run finished with every executed task successful.
    TeamCompleted {
        /// Team that ran.
        team_id: Uuid,
        /// Number of completed tasks.
        completed: usize,
        /// Number of skipped tasks.
        skipped: usize,
    },
    /// The run finished with a failure.
    TeamFailed {
        /// Team that ran.
        team_id: Uuid,
        /// Failure description.
        error: String,
    },
    /// A task transitioned to running.
    TaskStarted {
        /// Task that started.
        task_id: Uuid,
        /// Agent executing it.
        agent_id: Uuid,
    },
    /// A task finished successfully.
    TaskCompleted {
        /// Task that finished.
        task_id: Uuid,
        /// Agent that executed it.
        agent_id: Uuid,
        /// Truncated preview of the output.
        output_preview: String,
    },
    /// A task execution attempt failed.
    TaskFailed {
        /// Task that failed.
        task_id: Uuid,
        /// Agent whose attempt failed.
        agent_id: Uuid,
        /// Failure description.
        error: String,
    },
    /// A failed task is being replayed against a backup agent.
    TaskDelegated {
        /// Task being replayed.
        task_id: Uuid,
        /// Agent whose attempt failed.
        from_agent: Uuid,
        /// Backup agent now attempting the task.
        to_agent: Uuid,
        /// The original failure that triggered delegation.
        reason: String,
    },
    /// A task is waiting for an external human resume signal.
    TaskWaitingHuman {
        /// Task that is waiting.
        task_id: Uuid,
        /// Agent assigned to it.
        agent_id: Uuid,
    },
}

impl TeamEvent {
    /// Stable wire name of this event.
    pub fn name(&self) -> &'static str {
        match self {
            TeamEvent::TeamStarted { .. } => "team_started",
            TeamEvent::TeamCompleted { .. } => "team_completed",
            TeamEvent::TeamFailed { .. } => "team_failed",
            TeamEvent::TaskStarted { .. } => "task_started",
            TeamEvent::TaskCompleted { .. } => "task_completed",
            TeamEvent::TaskFailed { .. } => "task_failed",
            TeamEvent::TaskDelegated { .. } => "task_delegated",
            TeamEvent::TaskWaitingHuman { .. } => "task_waiting_human",
        }
    }
}
