//! Pipeline planning and execution.
//!
//! `plan` turns planner output into typed stages, `runner` walks them in
//! order against a completion backend, `review` recovers structured fields
//! from reviewer output, and `types` holds the persistent entities.

pub mod context;
pub mod plan;
pub mod review;
pub mod runner;
pub mod types;

#[cfg(test)]
mod tests;

use types::{AgentRole, ArtifactKind, StageStatus};

/// Legal stage transitions. Same-state writes are allowed (idempotent);
/// `Approved` and `Failed` are terminal.
pub fn can_transition(from: StageStatus, to: StageStatus) -> bool {
    use StageStatus::*;
    if from == to {
        return true;
    }
    matches!(
        (from, to),
        (Waiting, Running)
            | (Running, Completed)
            | (Running, Failed)
            | (Running, Approved)
            | (Completed, Approved)
            | (Completed, Failed)
    )
}

/// Artifact classification by the role that produced it.
pub fn artifact_kind_for(role: AgentRole) -> ArtifactKind {
    match role {
        AgentRole::Researcher => ArtifactKind::Notes,
        AgentRole::Reviewer => ArtifactKind::Report,
        AgentRole::Planner | AgentRole::Producer => ArtifactKind::Document,
    }
}
