//! Per-task agent execution for the Taskforce engine.
//!
//! This crate owns the boundary to the external LLM invocation service,
//! prompt composition, the per-task executor, and the failure-delegation
//! protocol.
//!
//! # Main types
//!
//! - [`LlmService`] — The opaque text-generation collaborator.
//! - [`AgentRegistry`] — Read-only per-team agent lookup.
//! - [`TaskExecutor`] — Executes one task against one agent.
//! - [`DelegationHandler`] — Replays failed tasks against backup agents.

/// Failure delegation across backup agents.
pub mod delegation;
/// Single-task execution.
pub mod executor;
/// LLM invocation service boundary.
pub mod llm;
/// System and task prompt composition.
pub mod prompt;
/// Per-team agent lookup.
pub mod registry;

pub use delegation::DelegationHandler;
pub use executor::TaskExecutor;
pub use llm::{GenerateReply, GenerateRequest, LlmService, TokenUsage};
pub use registry::AgentRegistry;
