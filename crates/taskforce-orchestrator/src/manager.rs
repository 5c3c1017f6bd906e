use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use taskforce_agent::{AgentRegistry, GenerateRequest, LlmService, TokenUsage};
use taskforce_core::{TaskforceError, TaskforceResult, TeamSpec};
use tracing::{info, warn};
use uuid::Uuid;

/// One line of the manager's assignment plan.
#[derive(Debug, Deserialize)]
struct PlanEntry {
    task_id: Uuid,
    agent_id: Uuid,
}

/// Consult the manager agent for a task→agent assignment plan.
///
/// The manager is asked for a JSON array of `{task_id, agent_id}` pairs.
/// A reply that cannot be parsed falls back to the identity assignment
/// (consultation is best-effort); a reply that parses but names an
/// unknown task or agent is a configuration error. Tasks the plan leaves
/// out keep their declared agent.
pub(crate) async fn plan_assignments(
    llm: &Arc<dyn LlmService>,
    team: &TeamSpec,
    registry: &AgentRegistry,
) -> TaskforceResult<(HashMap<Uuid, Uuid>, TokenUsage)> {
    let identity: HashMap<Uuid, Uuid> =
        team.tasks.iter().map(|t| (t.id, t.agent_id)).collect();

    // Validated before dispatch: the manager id is set and resolvable.
    let Some(manager) = team.manager_agent_id.and_then(|id| registry.get(id)) else {
        return Err(TaskforceError::Config(
            "hierarchical mode requires a manager agent".to_string(),
        ));
    };

    let request = GenerateRequest {
        system_prompt: format!(
            "You are {name}, the team manager.\nYour goal: {goal}\n\
             Assign each task to the most suitable agent and reply with a \
             JSON array of objects with \"task_id\" and \"agent_id\" fields. \
             Reply with JSON only.",
            name = manager.name,
            goal = manager.goal,
        ),
        user_prompt: plan_prompt(team),
        model: manager.model.clone(),
        temperature: manager.temperature,
    };

    let (content, usage) = match llm.generate(request).await {
        Ok(reply) => (reply.content, reply.usage),
        Err(e) => {
            warn!(error = %e, "Manager consultation failed, using declared assignments");
            return Ok((identity, TokenUsage::default()));
        }
    };

    let Some(entries) = parse_plan(&content) else {
        warn!("Manager plan was not parseable JSON, using declared assignments");
        return Ok((identity, usage));
    };

    let mut plan = identity;
    for entry in entries {
        if !plan.contains_key(&entry.task_id) {
            return Err(TaskforceError::Config(format!(
                "manager plan names unknown task {}",
                entry.task_id
            )));
        }
        if registry.get(entry.agent_id).is_none() {
            return Err(TaskforceError::Config(format!(
                "manager plan assigns unknown agent {}",
                entry.agent_id
            )));
        }
        plan.insert(entry.task_id, entry.agent_id);
    }

    info!(tasks = plan.len(), "Manager plan accepted");
    Ok((plan, usage))
}

/// Render the planning prompt: the task list with dependencies, then the
/// roster of available agents.
fn plan_prompt(team: &TeamSpec) -> String {
    let mut prompt = String::from("Tasks:\n");
    for task in &team.tasks {
        prompt.push_str(&format!("- {}: {}", task.id, task.description));
        if !task.context_from.is_empty() {
            let deps: Vec<String> = task.context_from.iter().map(Uuid::to_string).collect();
            prompt.push_str(&format!(" (depends on {})", deps.join(", ")));
        }
        prompt.push('\n');
    }
    prompt.push_str("\nAgents:\n");
    for agent in &team.agents {
        prompt.push_str(&format!(
            "- {}: {} ({}) — {}\n",
            agent.id, agent.name, agent.role, agent.goal
        ));
    }
    prompt
}

/// Extract and parse the first JSON array in the reply, tolerating fenced
/// code blocks and surrounding prose.
fn parse_plan(content: &str) -> Option<Vec<PlanEntry>> {
    let start = content.find('[')?;
    let end = content.rfind(']')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&content[start..=end]).ok()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use taskforce_agent::GenerateReply;
    use taskforce_core::{AgentRole, AgentSpec, ExecutionMode, TaskSpec};

    struct FixedLlm {
        reply: String,
    }

    #[async_trait]
    impl LlmService for FixedLlm {
        async fn generate(&self, _request: GenerateRequest) -> TaskforceResult<GenerateReply> {
            Ok(GenerateReply {
                content: self.reply.clone(),
                usage: TokenUsage::default(),
            })
        }
    }

    fn planning_team() -> (TeamSpec, Uuid, Uuid, Uuid) {
        let manager = AgentSpec::new("boss", AgentRole::Manager, "coordinate");
        let worker_a = AgentSpec::new("a", AgentRole::Researcher, "research");
        let worker_b = AgentSpec::new("b", AgentRole::Writer, "write");
        let manager_id = manager.id;
        let (a_id, b_id) = (worker_a.id, worker_b.id);
        let task = TaskSpec::new("draft the report", a_id);
        let team = TeamSpec::new("planned", ExecutionMode::Hierarchical)
            .with_agent(manager)
            .with_agent(worker_a)
            .with_agent(worker_b)
            .with_task(task)
            .with_manager(manager_id);
        (team, a_id, b_id, manager_id)
    }

    #[test]
    fn test_parse_plan_handles_fenced_json() {
        let task_id = Uuid::new_v4();
        let agent_id = Uuid::new_v4();
        let content = format!(
            "Here is my plan:\n```json\n[{{\"task_id\": \"{task_id}\", \"agent_id\": \"{agent_id}\"}}]\n```"
        );
        let entries = parse_plan(&content).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].task_id, task_id);
    }

    #[test]
    fn test_parse_plan_rejects_prose() {
        assert!(parse_plan("I think the researcher should do it.").is_none());
    }

    #[tokio::test]
    async fn test_plan_reassigns_task() {
        let (team, _a_id, b_id, _m) = planning_team();
        let task_id = team.tasks[0].id;
        let registry = AgentRegistry::from_team(&team);
        let llm: Arc<dyn LlmService> = Arc::new(FixedLlm {
            reply: format!("[{{\"task_id\": \"{task_id}\", \"agent_id\": \"{b_id}\"}}]"),
        });

        let (plan, _usage) = plan_assignments(&llm, &team, &registry).await.unwrap();
        assert_eq!(plan[&task_id], b_id);
    }

    #[tokio::test]
    async fn test_unparseable_plan_falls_back_to_identity() {
        let (team, a_id, _b_id, _m) = planning_team();
        let task_id = team.tasks[0].id;
        let registry = AgentRegistry::from_team(&team);
        let llm: Arc<dyn LlmService> = Arc::new(FixedLlm {
            reply: "The researcher is clearly best suited.".to_string(),
        });

        let (plan, _usage) = plan_assignments(&llm, &team, &registry).await.unwrap();
        assert_eq!(plan[&task_id], a_id);
    }

    #[tokio::test]
    async fn test_plan_with_unknown_agent_is_config_error() {
        let (team, _a_id, _b_id, _m) = planning_team();
        let task_id = team.tasks[0].id;
        let registry = AgentRegistry::from_team(&team);
        let llm: Arc<dyn LlmService> = Arc::new(FixedLlm {
            reply: format!(
                "[{{\"task_id\": \"{task_id}\", \"agent_id\": \"{}\"}}]",
                Uuid::new_v4()
            ),
        });

        let err = plan_assignments(&llm, &team, &registry).await.unwrap_err();
        assert!(matches!(err, TaskforceError::Config(_)));
    }

    #[tokio::test]
    async fn test_plan_with_unknown_task_is_config_error() {
        let (team, a_id, _b_id, _m) = planning_team();
        let registry = AgentRegistry::from_team(&team);
        let llm: Arc<dyn LlmService> = Arc::new(FixedLlm {
            reply: format!(
                "[{{\"task_id\": \"{}\", \"agent_id\": \"{a_id}\"}}]",
                Uuid::new_v4()
            ),
        });

        let err = plan_assignments(&llm, &team, &registry).await.unwrap_err();
        assert!(matches!(err, TaskforceError::Config(_)));
    }
}
