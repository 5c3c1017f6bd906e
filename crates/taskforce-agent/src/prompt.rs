use std::collections::HashMap;
use taskforce_core::{AgentSpec, TaskSpec};
use uuid::Uuid;

/// Compose the system prompt from an agent's identity.
pub fn system_prompt(agent: &AgentSpec) -> String {
    let mut prompt = format!(
        "You are {name}, a {role}.\nYour goal: {goal}",
        name = agent.name,
        role = agent.role,
        goal = agent.goal,
    );
    if !agent.backstory.is_empty() {
        prompt.push_str("\nBackground: ");
        prompt.push_str(&agent.backstory);
    }
    if !agent.tools.is_empty() {
        prompt.push_str("\nYou have access to the following tools: ");
        prompt.push_str(&agent.tools.join(", "));
        prompt.push('.');
    }
    prompt
}

/// Compose the task prompt from the task definition, the run inputs, and
/// the outputs of the task's declared upstream dependencies.
///
/// `upstream` must already be filtered to `task.context_from` — this
/// function renders exactly what it is handed, so a task never sees a
/// sibling's in-flight output.
pub fn task_prompt(
    task: &TaskSpec,
    inputs: &HashMap<String, serde_json::Value>,
    upstream: &[(Uuid, serde_json::Value)],
) -> String {
    let mut prompt = format!("Task: {}", task.description);

    if !task.expected_output.is_empty() {
        prompt.push_str("\n\nExpected output: ");
        prompt.push_str(&task.expected_output);
    }

    if !inputs.is_empty() {
        prompt.push_str("\n\nInputs:");
        let mut keys: Vec<&String> = inputs.keys().collect();
        keys.sort();
        for key in keys {
            prompt.push_str(&format!("\n- {key}: {}", render_value(&inputs[key])));
        }
    }

    if !upstream.is_empty() {
        prompt.push_str("\n\nContext from earlier tasks:");
        for (task_id, output) in upstream {
            prompt.push_str(&format!("\n[{task_id}]\n{}", render_value(output)));
        }
    }

    prompt
}

fn render_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use taskforce_core::AgentRole;

    #[test]
    fn test_system_prompt_contains_identity() {
        let agent = AgentSpec::new("Ada", AgentRole::Analyst, "interpret the data")
            .with_backstory("Veteran statistician.")
            .with_tools(vec!["search".into(), "calculator".into()]);

        let prompt = system_prompt(&agent);
        assert!(prompt.contains("You are Ada, a analyst."));
        assert!(prompt.contains("interpret the data"));
        assert!(prompt.contains("Veteran statistician."));
        assert!(prompt.contains("search, calculator"));
    }

    #[test]
    fn test_system_prompt_omits_empty_sections() {
        let agent = AgentSpec::new("Bo", AgentRole::Writer, "write");
        let prompt = system_prompt(&agent);
        assert!(!prompt.contains("Background:"));
        assert!(!prompt.contains("tools"));
    }

    #[test]
    fn test_task_prompt_renders_upstream_in_order() {
        let task = TaskSpec::new("summarize", Uuid::new_v4())
            .with_expected_output("a short paragraph");
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let upstream = vec![
            (a, serde_json::json!("first finding")),
            (b, serde_json::json!("second finding")),
        ];

        let prompt = task_prompt(&task, &HashMap::new(), &upstream);
        assert!(prompt.contains("Task: summarize"));
        assert!(prompt.contains("a short paragraph"));
        let first = prompt.find("first finding").unwrap();
        let second = prompt.find("second finding").unwrap();
        assert!(first < second);
    }

    #[test]
    fn test_task_prompt_renders_inputs_sorted() {
        let task = TaskSpec::new("do it", Uuid::new_v4());
        let mut inputs = HashMap::new();
        inputs.insert("topic".to_string(), serde_json::json!("rust"));
        inputs.insert("audience".to_string(), serde_json::json!("beginners"));

        let prompt = task_prompt(&task, &inputs, &[]);
        let audience = prompt.find("audience").unwrap();
        let topic = prompt.find("topic").unwrap();
        assert!(audience < topic);
        assert!(prompt.contains("- topic: rust"));
    }

    #[test]
    fn test_task_prompt_without_context_has_no_context_header() {
        let task = TaskSpec::new("standalone", Uuid::new_v4());
        let prompt = task_prompt(&task, &HashMap::new(), &[]);
        assert!(!prompt.contains("Context from earlier tasks"));
        assert!(!prompt.contains("Inputs:"));
    }
}
