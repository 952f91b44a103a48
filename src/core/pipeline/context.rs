//! Prompt context assembly for stage execution.

use super::types::{Project, Stage};

/// Builds the user message for a stage: the project goal, output of every
/// earlier stage that produced anything, and the stage's own assignment.
/// Blocks are markdown headed and blank-line separated so models can tell
/// them apart.
pub fn build_context(project: &Project, position: usize, assignment: &str) -> String {
    let mut parts = Vec::new();

    let goal = if project.goal.is_empty() {
        &project.title
    } else {
        &project.goal
    };
    parts.push(format!("# Task\n{goal}"));

    if let Some(pipeline) = &project.pipeline {
        let mut prior: Vec<&Stage> = pipeline
            .stages
            .iter()
            .filter(|s| s.position < position && !s.output_content.is_empty())
            .collect();
        prior.sort_by_key(|s| s.position);

        if !prior.is_empty() {
            parts.push("# Previous Work".to_string());
            for stage in prior {
                parts.push(format!("## {}\n{}", stage.role.as_str(), stage.output_content));
            }
        }
    }

    parts.push(format!("# Your Assignment\n{assignment}"));
    parts.join("\n\n")
}
