use taskforce_core::{EdgeCondition, ExecutionContext, TaskSpec};
use uuid::Uuid;

/// Pick the next task after `task` finished with `output`: its route
/// edges are evaluated in declared order and the first match wins.
/// `None` means the route ends here.
pub(crate) async fn next_task(
    task: &TaskSpec,
    output: &serde_json::Value,
    ctx: &ExecutionContext,
) -> Option<Uuid> {
    for edge in &task.routes {
        if condition_matches(&edge.condition, output, ctx).await {
            return Some(edge.to);
        }
    }
    None
}

async fn condition_matches(
    condition: &EdgeCondition,
    output: &serde_json::Value,
    ctx: &ExecutionContext,
) -> bool {
    match condition {
        EdgeCondition::Always => true,
        EdgeCondition::OutputContains(needle) => match output.as_str() {
            Some(text) => text.contains(needle),
            None => output.to_string().contains(needle),
        },
        EdgeCondition::ContextEquals { key, value } => {
            if ctx.input(key) == Some(value) {
                return true;
            }
            ctx.shared(key).await.as_ref() == Some(value)
        }
    }
}
