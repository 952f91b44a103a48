use crate::core::pipeline::context::build_context;
use crate::core::pipeline::types::{AgentRole, Pipeline, Project, Stage};

fn project_with_outputs(outputs: &[(AgentRole, &str)]) -> Project {
    let mut project = Project::new("Quarterly Report", "Write the Q3 report");
    let mut pipeline = Pipeline::new(true);
    pipeline.stages = outputs
        .iter()
        .enumerate()
        .map(|(i, &(role, output))| {
            let mut stage = Stage::new(role, i, format!("task {i}"));
            stage.output_content = output.to_string();
            stage
        })
        .collect();
    project.pipeline = Some(pipeline);
    project
}

#[test]
fn first_stage_sees_goal_and_assignment_only() {
    let project = project_with_outputs(&[(AgentRole::Researcher, "")]);
    let context = build_context(&project, 0, "Find market data");
    assert_eq!(
        context,
        "# Task\nWrite the Q3 report\n\n# Your Assignment\nFind market data"
    );
}

#[test]
fn later_stages_see_prior_outputs_in_order() {
    let project = project_with_outputs(&[
        (AgentRole::Researcher, "research notes"),
        (AgentRole::Producer, "draft text"),
        (AgentRole::Reviewer, ""),
    ]);
    let context = build_context(&project, 2, "Review the draft");
    let researcher = context.find("## Researcher\nresearch notes").unwrap();
    let producer = context.find("## Producer\ndraft text").unwrap();
    assert!(context.starts_with("# Task\n"));
    assert!(context.contains("# Previous Work"));
    assert!(researcher < producer);
    assert!(context.ends_with("# Your Assignment\nReview the draft"));
}

#[test]
fn empty_prior_outputs_are_skipped() {
    let project = project_with_outputs(&[
        (AgentRole::Researcher, ""),
        (AgentRole::Producer, "draft"),
        (AgentRole::Reviewer, ""),
    ]);
    let context = build_context(&project, 2, "Review");
    assert!(!context.contains("## Researcher"));
    assert!(context.contains("## Producer\ndraft"));
}

#[test]
fn title_substitutes_for_empty_goal() {
    let mut project = project_with_outputs(&[(AgentRole::Producer, "")]);
    project.goal = String::new();
    let context = build_context(&project, 0, "Write");
    assert!(context.starts_with("# Task\nQuarterly Report"));
}
