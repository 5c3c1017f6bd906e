use std::collections::{HashMap, HashSet};
use taskforce_core::{ExecutionMode, TaskSpec, TaskforceError, TaskforceResult, TeamSpec};
use uuid::Uuid;

/// Three-color DFS marks.
const IN_PROGRESS: u8 = 1;
const DONE: u8 = 2;

/// Dependency view over a task set: validation, topological ordering, and
/// wave grouping for parallel fan-out.
pub struct TaskGraph {
    /// Task ids in declaration order.
    order: Vec<Uuid>,
    /// Dependency edges: task id → the tasks it consumes context from.
    deps: HashMap<Uuid, Vec<Uuid>>,
}

impl TaskGraph {
    /// Build the graph from a task set.
    pub fn new(tasks: &[TaskSpec]) -> Self {
        let order = tasks.iter().map(|t| t.id).collect();
        let deps = tasks
            .iter()
            .map(|t| (t.id, t.context_from.clone()))
            .collect();
        Self { order, deps }
    }

    /// Validate a full team definition before any task runs.
    ///
    /// Checks dangling agent and task references, dependency cycles,
    /// delegation cycles, and the per-mode requirements (manager for
    /// hierarchical, resolvable entry task and routes for adaptive).
    pub fn validate(team: &TeamSpec) -> TaskforceResult<()> {
        let agent_ids: HashSet<Uuid> = team.agents.iter().map(|a| a.id).collect();
        let mut task_ids: HashSet<Uuid> = HashSet::with_capacity(team.tasks.len());
        for task in &team.tasks {
            if !task_ids.insert(task.id) {
                return Err(TaskforceError::Config(format!(
                    "duplicate task id {}",
                    task.id
                )));
            }
        }

        for task in &team.tasks {
            if !agent_ids.contains(&task.agent_id) {
                return Err(TaskforceError::Config(format!(
                    "task {} references unknown agent {}",
                    task.id, task.agent_id
                )));
            }
            for dep in &task.context_from {
                if !task_ids.contains(dep) {
                    return Err(TaskforceError::Config(format!(
                        "task {} depends on unknown task {dep}",
                        task.id
                    )));
                }
            }
            for edge in &task.routes {
                if !task_ids.contains(&edge.to) {
                    return Err(TaskforceError::Config(format!(
                        "task {} routes to unknown task {}",
                        task.id, edge.to
                    )));
                }
            }
        }

        let graph = Self::new(&team.tasks);
        graph.check_dependency_cycles()?;

        Self::check_delegation(team, &agent_ids)?;

        if team.execution_mode == ExecutionMode::Hierarchical {
            match team.manager_agent_id {
                Some(id) if agent_ids.contains(&id) => {}
                Some(id) => {
                    return Err(TaskforceError::Config(format!(
                        "manager agent {id} not found in team"
                    )))
                }
                None => {
                    return Err(TaskforceError::Config(
                        "hierarchical mode requires a manager agent".to_string(),
                    ))
                }
            }
        } else if let Some(id) = team.manager_agent_id {
            if !agent_ids.contains(&id) {
                return Err(TaskforceError::Config(format!(
                    "manager agent {id} not found in team"
                )));
            }
        }

        if let Some(entry) = team.entry_task_id {
            if !task_ids.contains(&entry) {
                return Err(TaskforceError::Config(format!(
                    "entry task {entry} not found in team"
                )));
            }
        }

        Ok(())
    }

    /// Detect cycles in `context_from` with three-color DFS: a back-edge
    /// to an in-progress node is a cycle.
    fn check_dependency_cycles(&self) -> TaskforceResult<()> {
        let mut marks: HashMap<Uuid, u8> = HashMap::new();
        for &id in &self.order {
            self.dfs(id, &mut marks)?;
        }
        Ok(())
    }

    fn dfs(&self, id: Uuid, marks: &mut HashMap<Uuid, u8>) -> TaskforceResult<()> {
        match marks.get(&id) {
            Some(&IN_PROGRESS) => {
                return Err(TaskforceError::Config(format!(
                    "dependency cycle detected involving task {id}"
                )))
            }
            Some(&DONE) => return Ok(()),
            _ => {}
        }
        marks.insert(id, IN_PROGRESS);
        if let Some(deps) = self.deps.get(&id) {
            for dep in deps {
                self.dfs(*dep, marks)?;
            }
        }
        marks.insert(id, DONE);
        Ok(())
    }

    /// Detect dangling or cyclic `delegate_to` chains: an agent may not
    /// directly or indirectly delegate to itself.
    fn check_delegation(team: &TeamSpec, agent_ids: &HashSet<Uuid>) -> TaskforceResult<()> {
        let edges: HashMap<Uuid, &Vec<Uuid>> =
            team.agents.iter().map(|a| (a.id, &a.delegate_to)).collect();

        for agent in &team.agents {
            for candidate in &agent.delegate_to {
                if !agent_ids.contains(candidate) {
                    return Err(TaskforceError::Config(format!(
                        "agent {} delegates to unknown agent {candidate}",
                        agent.id
                    )));
                }
            }
        }

        let mut marks: HashMap<Uuid, u8> = HashMap::new();
        for agent in &team.agents {
            Self::delegation_dfs(agent.id, &edges, &mut marks)?;
        }
        Ok(())
    }

    fn delegation_dfs(
        id: Uuid,
        edges: &HashMap<Uuid, &Vec<Uuid>>,
        marks: &mut HashMap<Uuid, u8>,
    ) -> TaskforceResult<()> {
        match marks.get(&id) {
            Some(&IN_PROGRESS) => {
                return Err(TaskforceError::Config(format!(
                    "delegation cycle detected involving agent {id}"
                )))
            }
            Some(&DONE) => return Ok(()),
            _ => {}
        }
        marks.insert(id, IN_PROGRESS);
        if let Some(candidates) = edges.get(&id) {
            for candidate in *candidates {
                Self::delegation_dfs(*candidate, edges, marks)?;
            }
        }
        marks.insert(id, DONE);
        Ok(())
    }

    /// A topological order over the task set, with ties broken by
    /// declaration order for determinism. Call only on a validated
    /// (acyclic) graph; on a cyclic input the unreachable remainder is
    /// omitted rather than looped on.
    pub fn topological_order(&self) -> Vec<Uuid> {
        let mut emitted: HashSet<Uuid> = HashSet::with_capacity(self.order.len());
        let mut result = Vec::with_capacity(self.order.len());

        while result.len() < self.order.len() {
            let next = self.order.iter().copied().find(|id| {
                !emitted.contains(id) && self.deps[id].iter().all(|dep| emitted.contains(dep))
            });
            match next {
                Some(id) => {
                    emitted.insert(id);
                    result.push(id);
                }
                None => break,
            }
        }
        result
    }

    /// Partition the task set into dependency waves: wave 0 holds every
    /// task with no dependencies, wave k+1 every task whose dependencies
    /// are all satisfied by waves ≤ k.
    pub fn independent_groups(&self) -> Vec<Vec<Uuid>> {
        let mut satisfied: HashSet<Uuid> = HashSet::new();
        let mut placed: HashSet<Uuid> = HashSet::new();
        let mut groups = Vec::new();

        loop {
            let wave: Vec<Uuid> = self
                .order
                .iter()
                .copied()
                .filter(|id| {
                    !placed.contains(id) && self.deps[id].iter().all(|dep| satisfied.contains(dep))
                })
                .collect();
            if wave.is_empty() {
                break;
            }
            placed.extend(wave.iter().copied());
            satisfied.extend(wave.iter().copied());
            groups.push(wave);
        }
        groups
    }
}
