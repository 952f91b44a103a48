pub mod core;
pub mod logging;

pub use crate::core::config::{AgentConfig, ConfigStore, MemoryConfigStore};
pub use crate::core::error::{ProviderError, RunError};
pub use crate::core::export::{ArtifactSink, FileExporter};
pub use crate::core::llm::registry::ProviderRegistry;
pub use crate::core::llm::{Completion, CompletionBackend, CompletionRequest, ProviderGateway};
pub use crate::core::pipeline::runner::{
    PipelineRunner, PlannerReply, SharedProject, create_pipeline,
};
pub use crate::core::pipeline::types::{
    AgentRole, Artifact, ArtifactKind, Pipeline, Project, ProjectStatus, Recommendation, Stage,
    StageStatus,
};
pub use crate::core::secrets::{EnvSecrets, SecretsStore};
pub use crate::core::web::{HttpFetcher, WebFetcher};
