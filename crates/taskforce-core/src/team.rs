use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role of an agent within a team.
///
/// A closed set of well-known roles plus [`AgentRole::Custom`] for roles
/// outside it, so match arms stay exhaustive without runtime string checks.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentRole {
    /// Gathers information and sources.
    Researcher,
    /// Produces prose output.
    Writer,
    /// Revises and polishes drafts.
    Editor,
    /// Interprets data and draws conclusions.
    Analyst,
    /// Generates code.
    Coder,
    /// Reviews work produced by other agents.
    Reviewer,
    /// Coordinates other agents; consulted for hierarchical planning.
    Manager,
    /// A role outside the well-known set, carrying its own label.
    Custom(String),
}

impl std::fmt::Display for AgentRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentRole::Researcher => write!(f, "researcher"),
            AgentRole::Writer => write!(f, "writer"),
            AgentRole::Editor => write!(f, "editor"),
            AgentRole::Analyst => write!(f, "analyst"),
            AgentRole::Coder => write!(f, "coder"),
            AgentRole::Reviewer => write!(f, "reviewer"),
            AgentRole::Manager => write!(f, "manager"),
            AgentRole::Custom(label) => write!(f, "{label}"),
        }
    }
}

/// Default sampling temperature per role. Deterministic roles run cooler.
fn role_temperature(role: &AgentRole) -> f32 {
    match role {
        AgentRole::Coder | AgentRole::Reviewer => 0.2,
        AgentRole::Manager | AgentRole::Analyst => 0.3,
        AgentRole::Researcher | AgentRole::Editor => 0.5,
        AgentRole::Writer | AgentRole::Custom(_) => 0.7,
    }
}

/// Configuration for a single agent. Immutable once a run starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSpec {
    /// Unique identifier for this agent.
    pub id: Uuid,
    /// Human-readable name.
    pub name: String,
    /// The agent's role.
    pub role: AgentRole,
    /// What this agent is trying to achieve.
    pub goal: String,
    /// Background used to flavor the system prompt.
    #[serde(default)]
    pub backstory: String,
    /// Names of the tool capabilities this agent may use.
    #[serde(default)]
    pub tools: Vec<String>,
    /// Model selector passed through to the LLM invocation service.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Upper bound on agentic iterations for a single task.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    /// Whether a failed task may be replayed against backup agents.
    #[serde(default)]
    pub allow_delegation: bool,
    /// Backup agents tried in order when this agent's execution fails.
    #[serde(default)]
    pub delegate_to: Vec<Uuid>,
}

fn default_max_iterations() -> u32 {
    10
}

impl AgentSpec {
    /// Create an agent with role-tuned defaults.
    pub fn new(name: impl Into<String>, role: AgentRole, goal: impl Into<String>) -> Self {
        let temperature = role_temperature(&role);
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            role,
            goal: goal.into(),
            backstory: String::new(),
            tools: Vec::new(),
            model: "claude-sonnet-4".to_string(),
            temperature,
            max_iterations: default_max_iterations(),
            allow_delegation: false,
            delegate_to: Vec::new(),
        }
    }

    /// Set the backstory.
    pub fn with_backstory(mut self, backstory: impl Into<String>) -> Self {
        self.backstory = backstory.into();
        self
    }

    /// Set the tool capability list.
    pub fn with_tools(mut self, tools: Vec<String>) -> Self {
        self.tools = tools;
        self
    }

    /// Override the model selector.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Override the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Enable delegation to the given backup agents, tried in order.
    pub fn with_delegation(mut self, delegate_to: Vec<Uuid>) -> Self {
        self.allow_delegation = true;
        self.delegate_to = delegate_to;
        self
    }
}

/// Condition attached to an outgoing route edge, evaluated after the
/// source task completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeCondition {
    /// Unconditional edge.
    Always,
    /// Matches when the finished task's output contains the substring.
    OutputContains(String),
    /// Matches when a run input or shared-memory entry equals the value.
    ContextEquals {
        /// Key looked up in inputs first, then shared memory.
        key: String,
        /// Expected value.
        value: serde_json::Value,
    },
}

/// An outgoing edge used by the adaptive strategy to pick the next task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteEdge {
    /// Condition guarding this edge.
    pub condition: EdgeCondition,
    /// Task executed next when the condition matches.
    pub to: Uuid,
}

/// A unit of work assigned to one agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSpec {
    /// Unique identifier for this task.
    pub id: Uuid,
    /// What the task asks the agent to do.
    pub description: String,
    /// The agent this task is assigned to.
    pub agent_id: Uuid,
    /// Description of the expected output shape.
    #[serde(default)]
    pub expected_output: String,
    /// Upstream tasks whose outputs feed this task's prompt. These form
    /// the dependency edges of the task graph.
    #[serde(default)]
    pub context_from: Vec<Uuid>,
    /// Tool capabilities available for this task.
    #[serde(default)]
    pub tools: Vec<String>,
    /// Hint that this task may run concurrently with its wave peers.
    #[serde(default)]
    pub async_execution: bool,
    /// Whether a human must resume this task before it runs.
    #[serde(default)]
    pub human_input_required: bool,
    /// Per-task execution timeout in milliseconds.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    /// Outgoing edges evaluated by the adaptive strategy.
    #[serde(default)]
    pub routes: Vec<RouteEdge>,
}

impl TaskSpec {
    /// Create a task assigned to the given agent.
    pub fn new(description: impl Into<String>, agent_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            description: description.into(),
            agent_id,
            expected_output: String::new(),
            context_from: Vec::new(),
            tools: Vec::new(),
            async_execution: false,
            human_input_required: false,
            timeout_ms: None,
            routes: Vec::new(),
        }
    }

    /// Describe the expected output.
    pub fn with_expected_output(mut self, expected: impl Into<String>) -> Self {
        self.expected_output = expected.into();
        self
    }

    /// Declare upstream dependencies whose outputs feed this task.
    pub fn with_context_from(mut self, upstream: Vec<Uuid>) -> Self {
        self.context_from = upstream;
        self
    }

    /// Set the tool capability list.
    pub fn with_tools(mut self, tools: Vec<String>) -> Self {
        self.tools = tools;
        self
    }

    /// Require a human resume signal before execution.
    pub fn with_human_input(mut self) -> Self {
        self.human_input_required = true;
        self
    }

    /// Set the per-task timeout.
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    /// Append an outgoing route edge for the adaptive strategy.
    pub fn with_route(mut self, condition: EdgeCondition, to: Uuid) -> Self {
        self.routes.push(RouteEdge { condition, to });
        self
    }
}

/// Strategy governing task ordering and concurrency for a team run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// One task at a time in topological order; fail-fast.
    Sequential,
    /// Dependency waves executed with bounded concurrent fan-out.
    Parallel,
    /// A manager agent produces an assignment plan, then sequential.
    Hierarchical,
    /// Route-driven traversal starting at the entry task.
    Adaptive,
}

impl std::fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionMode::Sequential => write!(f, "sequential"),
            ExecutionMode::Parallel => write!(f, "parallel"),
            ExecutionMode::Hierarchical => write!(f, "hierarchical"),
            ExecutionMode::Adaptive => write!(f, "adaptive"),
        }
    }
}

/// How `human_input_required` tasks behave.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HumanInputMode {
    /// Emit the waiting event and genuinely suspend until resumed.
    #[default]
    Blocking,
    /// Emit the waiting event and proceed immediately.
    Advisory,
}

/// A named collection of agents and tasks plus an execution mode.
/// Root aggregate; owns its agents and tasks for the lifetime of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamSpec {
    /// Unique identifier for this team.
    pub id: Uuid,
    /// Human-readable name.
    pub name: String,
    /// What this team is for.
    #[serde(default)]
    pub description: String,
    /// The agents available to this team.
    pub agents: Vec<AgentSpec>,
    /// The tasks the team executes.
    pub tasks: Vec<TaskSpec>,
    /// Strategy used to drive the run.
    pub execution_mode: ExecutionMode,
    /// Manager consulted for planning; required for hierarchical mode.
    #[serde(default)]
    pub manager_agent_id: Option<Uuid>,
    /// Where the adaptive strategy starts; defaults to the first task.
    #[serde(default)]
    pub entry_task_id: Option<Uuid>,
    /// Upper bound on concurrently executing tasks within a wave.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_agents: usize,
    /// Emit verbose progress logging.
    #[serde(default)]
    pub verbose: bool,
    /// Behavior of `human_input_required` tasks.
    #[serde(default)]
    pub human_input: HumanInputMode,
}

fn default_max_concurrent() -> usize {
    4
}

impl TeamSpec {
    /// Create an empty team with the given execution mode.
    pub fn new(name: impl Into<String>, execution_mode: ExecutionMode) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: String::new(),
            agents: Vec::new(),
            tasks: Vec::new(),
            execution_mode,
            manager_agent_id: None,
            entry_task_id: None,
            max_concurrent_agents: default_max_concurrent(),
            verbose: false,
            human_input: HumanInputMode::default(),
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Add an agent.
    pub fn with_agent(mut self, agent: AgentSpec) -> Self {
        self.agents.push(agent);
        self
    }

    /// Add a task.
    pub fn with_task(mut self, task: TaskSpec) -> Self {
        self.tasks.push(task);
        self
    }

    /// Designate the manager agent for hierarchical mode.
    pub fn with_manager(mut self, agent_id: Uuid) -> Self {
        self.manager_agent_id = Some(agent_id);
        self
    }

    /// Designate the entry task for adaptive mode.
    pub fn with_entry_task(mut self, task_id: Uuid) -> Self {
        self.entry_task_id = Some(task_id);
        self
    }

    /// Bound the concurrent fan-out of parallel waves.
    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent_agents = max.max(1);
        self
    }

    /// Set the human-input behavior.
    pub fn with_human_input_mode(mut self, mode: HumanInputMode) -> Self {
        self.human_input = mode;
        self
    }

    /// Look up an agent by id.
    pub fn agent(&self, id: Uuid) -> Option<&AgentSpec> {
        self.agents.iter().find(|a| a.id == id)
    }

    /// Look up a task by id.
    pub fn task(&self, id: Uuid) -> Option<&TaskSpec> {
        self.tasks.iter().find(|t| t.id == id)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_role_display() {
        assert_eq!(AgentRole::Researcher.to_string(), "researcher");
        assert_eq!(AgentRole::Manager.to_string(), "manager");
        assert_eq!(AgentRole::Custom("qa lead".into()).to_string(), "qa lead");
    }

    #[test]
    fn test_agent_role_serde_roundtrip() {
        let role = AgentRole::Custom("facilitator".into());
        let json = serde_json::to_string(&role).unwrap();
        let parsed: AgentRole = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, role);

        let json = serde_json::to_string(&AgentRole::Coder).unwrap();
        assert_eq!(json, "\"coder\"");
    }

    #[test]
    fn test_agent_defaults_follow_role() {
        let coder = AgentSpec::new("dev", AgentRole::Coder, "write code");
        let writer = AgentSpec::new("author", AgentRole::Writer, "write prose");
        assert!(coder.temperature < writer.temperature);
        assert!(!coder.allow_delegation);
        assert!(coder.delegate_to.is_empty());
    }

    #[test]
    fn test_agent_with_delegation() {
        let backup = Uuid::new_v4();
        let agent = AgentSpec::new("lead", AgentRole::Researcher, "research")
            .with_delegation(vec![backup]);
        assert!(agent.allow_delegation);
        assert_eq!(agent.delegate_to, vec![backup]);
    }

    #[test]
    fn test_task_builder() {
        let agent_id = Uuid::new_v4();
        let upstream = Uuid::new_v4();
        let task = TaskSpec::new("summarize findings", agent_id)
            .with_expected_output("three bullet points")
            .with_context_from(vec![upstream])
            .with_timeout_ms(30_000);
        assert_eq!(task.agent_id, agent_id);
        assert_eq!(task.context_from, vec![upstream]);
        assert_eq!(task.timeout_ms, Some(30_000));
        assert!(!task.human_input_required);
    }

    #[test]
    fn test_team_lookup() {
        let agent = AgentSpec::new("a", AgentRole::Analyst, "analyze");
        let agent_id = agent.id;
        let task = TaskSpec::new("t", agent_id);
        let task_id = task.id;

        let team = TeamSpec::new("demo", ExecutionMode::Sequential)
            .with_agent(agent)
            .with_task(task);

        assert!(team.agent(agent_id).is_some());
        assert!(team.task(task_id).is_some());
        assert!(team.agent(Uuid::new_v4()).is_none());
    }

    #[test]
    fn test_team_spec_serde_roundtrip() {
        let agent = AgentSpec::new("a", AgentRole::Writer, "write");
        let agent_id = agent.id;
        let team = TeamSpec::new("demo", ExecutionMode::Parallel)
            .with_agent(agent)
            .with_task(TaskSpec::new("t", agent_id))
            .with_max_concurrent(2);

        let json = serde_json::to_string(&team).unwrap();
        let parsed: TeamSpec = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.execution_mode, ExecutionMode::Parallel);
        assert_eq!(parsed.max_concurrent_agents, 2);
        assert_eq!(parsed.human_input, HumanInputMode::Blocking);
    }

    #[test]
    fn test_max_concurrent_floor() {
        let team = TeamSpec::new("demo", ExecutionMode::Parallel).with_max_concurrent(0);
        assert_eq!(team.max_concurrent_agents, 1);
    }

    #[test]
    fn test_route_edge_serde() {
        let edge = RouteEdge {
            condition: EdgeCondition::OutputContains("APPROVED".into()),
            to: Uuid::new_v4(),
        };
        let json = serde_json::to_string(&edge).unwrap();
        let parsed: RouteEdge = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, edge);
    }
}
