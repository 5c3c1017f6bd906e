//! Core types and error definitions for the Taskforce engine.
//!
//! This crate provides the foundational types shared across all Taskforce
//! crates: the team/agent/task data model, task results, lifecycle events,
//! the progress notifier, the per-run execution context, and the team
//! repository contract.
//!
//! # Main types
//!
//! - [`TaskforceError`] — Unified error enum for all Taskforce subsystems.
//! - [`TaskforceResult`] — Convenience alias for `Result<T, TaskforceError>`.
//! - [`TeamSpec`] — Root aggregate owning agents, tasks, and the execution mode.
//! - [`TaskResult`] — The immutable outcome record of one execution attempt.
//! - [`TeamEvent`] — Lifecycle events published during a team run.
//! - [`ProgressNotifier`] — Fan-out event bus with subscriber isolation.
//! - [`ExecutionContext`] — Mutable per-run state (inputs, outputs, shared memory).
//! - [`TeamStore`] — Injected repository capability for team persistence.

/// Per-run execution state, cancellation, and the human-input gate.
pub mod context;
/// Lifecycle event vocabulary.
pub mod event;
/// Progress event bus.
pub mod notify;
/// Task status and execution results.
pub mod result;
/// Team persistence contract and reference stores.
pub mod store;
/// Agent, task, and team definitions.
pub mod team;

/// Top-level error type for the Taskforce engine.
///
/// Each variant corresponds to a subsystem that can produce errors.
#[derive(Debug, thiserror::Error)]
pub enum TaskforceError {
    /// An invalid team definition: dangling references, cyclic dependencies,
    /// or a missing manager. Detected before any task runs.
    #[error("Config error: {0}")]
    Config(String),

    /// A task execution failure (LLM error, timeout, or missing agent).
    #[error("Execution error: {0}")]
    Execution(String),

    /// An error from the LLM invocation service.
    #[error("LLM error: {0}")]
    Llm(String),

    /// A progress subscriber failure; caught and logged at the publish site.
    #[error("Notification error: {0}")]
    Notification(String),

    /// An error from the team repository.
    #[error("Store error: {0}")]
    Store(String),

    /// The run was cancelled through its cancellation handle.
    #[error("Run cancelled")]
    Cancelled,

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A convenience `Result` alias using [`TaskforceError`].
pub type TaskforceResult<T> = Result<T, TaskforceError>;

pub use context::{CancelHandle, ExecutionContext};
pub use event::TeamEvent;
pub use notify::{ProgressNotifier, ProgressSink};
pub use result::{TaskResult, TaskStatus};
pub use store::{ExecutionRecord, FileTeamStore, MemoryTeamStore, TeamStore};
pub use team::{
    AgentRole, AgentSpec, EdgeCondition, ExecutionMode, HumanInputMode, RouteEdge, TaskSpec,
    TeamSpec,
};
