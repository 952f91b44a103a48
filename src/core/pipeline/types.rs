use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Specialist function of a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    Planner,
    Researcher,
    Producer,
    Reviewer,
}

impl AgentRole {
    pub fn as_str(self) -> &'static str {
        match self {
            AgentRole::Planner => "Planner",
            AgentRole::Researcher => "Researcher",
            AgentRole::Producer => "Producer",
            AgentRole::Reviewer => "Reviewer",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Waiting,
    Running,
    Completed,
    Failed,
    Approved,
}

impl StageStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            StageStatus::Waiting => "waiting",
            StageStatus::Running => "running",
            StageStatus::Completed => "completed",
            StageStatus::Failed => "failed",
            StageStatus::Approved => "approved",
        }
    }

    /// Terminal states never transition again.
    pub fn is_terminal(self) -> bool {
        matches!(self, StageStatus::Approved | StageStatus::Failed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Idle,
    Running,
    Paused,
    Completed,
    Failed,
}

/// Reviewer verdict recovered from free-form output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Recommendation {
    Approve,
    Revise,
    Reject,
}

impl Recommendation {
    pub fn as_str(self) -> &'static str {
        match self {
            Recommendation::Approve => "APPROVE",
            Recommendation::Revise => "REVISE",
            Recommendation::Reject => "REJECT",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Document,
    Code,
    Report,
    Notes,
}

/// Durable output of a completed stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    pub id: Uuid,
    pub kind: ArtifactKind,
    pub title: String,
    pub content: String,
    /// Filesystem location when the artifact sink exported it; export is
    /// best-effort so this may stay empty.
    pub file_path: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Artifact {
    pub fn new(kind: ArtifactKind, title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            title: title.into(),
            content: content.into(),
            file_path: None,
            created_at: Utc::now(),
        }
    }
}

/// One agent's unit of work within a pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stage {
    pub id: Uuid,
    pub role: AgentRole,
    pub status: StageStatus,
    pub input_context: String,
    pub output_content: String,
    pub cost_usd: f64,
    pub approved: bool,
    /// Reviewer-only, 0–10.
    pub quality_score: Option<i32>,
    /// Reviewer-only.
    pub recommendation: Option<Recommendation>,
    /// Zero-based execution order, unique within a pipeline.
    pub position: usize,
    pub artifacts: Vec<Artifact>,
    pub created_at: DateTime<Utc>,
}

impl Stage {
    pub fn new(role: AgentRole, position: usize, input_context: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            status: StageStatus::Waiting,
            input_context: input_context.into(),
            output_content: String::new(),
            cost_usd: 0.0,
            approved: false,
            quality_score: None,
            recommendation: None,
            position,
            artifacts: Vec::new(),
            created_at: Utc::now(),
        }
    }
}

/// Ordered collection of stages for one project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pipeline {
    pub id: Uuid,
    /// "Yolo" mode: stages advance without human confirmation.
    pub auto_approve: bool,
    pub stages: Vec<Stage>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Pipeline {
    pub fn new(auto_approve: bool) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            auto_approve,
            stages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Stage indices sorted by pipeline position.
    pub fn ordered_indices(&self) -> Vec<usize> {
        let mut indices: Vec<usize> = (0..self.stages.len()).collect();
        indices.sort_by_key(|&i| self.stages[i].position);
        indices
    }

    /// Sum of all stage costs in USD.
    pub fn total_cost_usd(&self) -> f64 {
        self.stages.iter().map(|s| s.cost_usd).sum()
    }

    pub fn stage_by_id(&self, id: Uuid) -> Option<&Stage> {
        self.stages.iter().find(|s| s.id == id)
    }

    /// Marks the pipeline as modified.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: Uuid,
    pub title: String,
    pub goal: String,
    pub status: ProjectStatus,
    pub pipeline: Option<Pipeline>,
    pub created_at: DateTime<Utc>,
}

impl Project {
    pub fn new(title: impl Into<String>, goal: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            goal: goal.into(),
            status: ProjectStatus::Idle,
            pipeline: None,
            created_at: Utc::now(),
        }
    }
}
