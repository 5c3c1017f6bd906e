use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Status of a task during and after a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Not yet issued.
    Pending,
    /// Currently executing.
    Running,
    /// Suspended until an external resume signal arrives.
    WaitingHuman,
    /// Finished successfully.
    Completed,
    /// Finished with an error.
    Failed,
    /// Never started because an earlier task failed or the run was cancelled.
    Skipped,
}

impl TaskStatus {
    /// Whether this status is terminal.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Skipped
        )
    }
}

/// The outcome record of one execution attempt of a task.
///
/// A result is constructed in its terminal state and never mutated
/// afterwards; a delegation attempt produces a distinct result chained
/// through [`TaskResult::delegated_to`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    /// The task this result belongs to.
    pub task_id: Uuid,
    /// The agent that performed (or was assigned) the attempt.
    pub agent_id: Uuid,
    /// Terminal status of the attempt.
    pub status: TaskStatus,
    /// Output value on success.
    pub output: Option<serde_json::Value>,
    /// Error message on failure.
    pub error: Option<String>,
    /// When execution began.
    pub started_at: Option<DateTime<Utc>>,
    /// When the attempt reached its terminal status.
    pub completed_at: Option<DateTime<Utc>>,
    /// The backup agent that produced this result, when delegation applied.
    pub delegated_to: Option<Uuid>,
}

impl TaskResult {
    /// A successful attempt.
    pub fn completed(
        task_id: Uuid,
        agent_id: Uuid,
        output: serde_json::Value,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            task_id,
            agent_id,
            status: TaskStatus::Completed,
            output: Some(output),
            error: None,
            started_at: Some(started_at),
            completed_at: Some(Utc::now()),
            delegated_to: None,
        }
    }

    /// A failed attempt.
    pub fn failed(
        task_id: Uuid,
        agent_id: Uuid,
        error: impl Into<String>,
        started_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            task_id,
            agent_id,
            status: TaskStatus::Failed,
            output: None,
            error: Some(error.into()),
            started_at,
            completed_at: Some(Utc::now()),
            delegated_to: None,
        }
    }

    /// A task that was never started.
    pub fn skipped(task_id: Uuid, agent_id: Uuid) -> Self {
        Self {
            task_id,
            agent_id,
            status: TaskStatus::Skipped,
            output: None,
            error: None,
            started_at: None,
            completed_at: Some(Utc::now()),
            delegated_to: None,
        }
    }

    /// Mark which backup agent produced this result.
    pub fn with_delegated_to(mut self, agent_id: Uuid) -> Self {
        self.delegated_to = Some(agent_id);
        self
    }

    /// Whether the attempt completed successfully.
    pub fn is_completed(&self) -> bool {
        self.status == TaskStatus::Completed
    }

    /// Whether the attempt failed.
    pub fn is_failed(&self) -> bool {
        self.status == TaskStatus::Failed
    }
}
