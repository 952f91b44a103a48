//! Per-role agent configuration. Persistence belongs to the embedding
//! application; the scheduler resolves configs through [`ConfigStore`] at
//! stage start, so edits take effect on the next run without restarts.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

use crate::core::pipeline::types::AgentRole;

pub const DEFAULT_TEMPERATURE: f64 = 0.7;

/// Settings for one agent role. Provider id and model identifier are open
/// strings so custom/local providers and unlisted models work unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub role: AgentRole,
    pub provider: String,
    pub model: String,
    pub temperature: f64,
    pub system_prompt: String,
}

impl AgentConfig {
    /// Built-in defaults used when nothing is persisted for a role.
    pub fn default_for(role: AgentRole) -> Self {
        Self {
            role,
            provider: "anthropic".to_string(),
            model: default_model(role).to_string(),
            temperature: DEFAULT_TEMPERATURE,
            system_prompt: default_system_prompt(role).to_string(),
        }
    }
}

fn default_model(role: AgentRole) -> &'static str {
    match role {
        AgentRole::Planner => "claude-opus-4-6",
        AgentRole::Researcher | AgentRole::Producer | AgentRole::Reviewer => "claude-sonnet-4-6",
    }
}

fn default_system_prompt(role: AgentRole) -> &'static str {
    match role {
        AgentRole::Planner => PLANNER_PROMPT,
        AgentRole::Researcher => {
            "You are a research specialist. Your job is to gather accurate, up-to-date \
             information on the given topic. Synthesize findings into clear, structured notes."
        }
        AgentRole::Producer => {
            "You are a content producer and developer. Your job is to create high-quality \
             deliverables (documents, code, reports) based on the research and brief provided."
        }
        AgentRole::Reviewer => {
            "You are a quality assurance reviewer. Your job is to critically evaluate the \
             produced content for accuracy, completeness, clarity, and quality. Start your \
             review with the lines `Quality Score: N/10` and \
             `Recommendation: APPROVE|REVISE|REJECT`, then provide specific improvement \
             suggestions."
        }
    }
}

/// The planner must emit the JSON `pipeline` schema the plan extractor
/// understands; the schema and role strings here are a contract with
/// `pipeline::plan`.
const PLANNER_PROMPT: &str = r#"You are the planner of a high-performance AI team. Your job is to help the user accomplish their goals by orchestrating a team of specialized agents.

When the user describes a task:
1. Briefly acknowledge the goal in 1-2 sentences
2. Output a pipeline plan as a JSON block using this exact schema:
```json
{
  "pipeline": [
    { "role": "researcher", "task": "...", "researchURLs": [] },
    { "role": "producer", "task": "..." },
    { "role": "reviewer", "task": "..." }
  ]
}
```
3. After the JSON, provide a concise numbered summary for human readability

Valid agent roles (use exactly these strings in the JSON):
- researcher: web research, competitive analysis, fact-gathering
- producer: writing, coding, content creation
- reviewer: quality review, accuracy checking, improvement suggestions

If the task is simple, propose just 1-2 stages. Don't over-engineer. Maximum 6 stages."#;

/// Configuration collaborator. Returning `None` means "nothing persisted";
/// callers fall back to [`AgentConfig::default_for`].
pub trait ConfigStore: Send + Sync {
    fn agent_config(&self, role: AgentRole) -> Option<AgentConfig>;
}

/// In-memory store for tests and programmatic embedding.
#[derive(Default)]
pub struct MemoryConfigStore {
    configs: Mutex<HashMap<AgentRole, AgentConfig>>,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, config: AgentConfig) {
        self.configs
            .lock()
            .expect("config lock")
            .insert(config.role, config);
    }
}

impl ConfigStore for MemoryConfigStore {
    fn agent_config(&self, role: AgentRole) -> Option<AgentConfig> {
        self.configs.lock().expect("config lock").get(&role).cloned()
    }
}
