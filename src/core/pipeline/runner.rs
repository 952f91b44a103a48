//! Sequential pipeline execution with human approval gates.
//!
//! One runner drives one project at a time. Stages execute strictly in
//! position order; in manual mode the run suspends on a oneshot channel
//! after each stage until `approve` or `reject` delivers a decision. All
//! entity mutation happens here, under the project lock, so approval
//! signals themselves never touch the project.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, LazyLock, Mutex as StdMutex};

use regex::Regex;
use tokio::sync::{Mutex, oneshot};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::plan::ParsedPlan;
use super::types::{
    AgentRole, Artifact, Pipeline, Project, ProjectStatus, Stage, StageStatus,
};
use super::{artifact_kind_for, can_transition, context, plan, review};
use crate::core::config::{AgentConfig, ConfigStore};
use crate::core::error::{ProviderError, RunError};
use crate::core::export::ArtifactSink;
use crate::core::llm::{Completion, CompletionBackend, CompletionRequest};
use crate::core::web::WebFetcher;

/// Researcher stages fetch at most this many URLs per stage.
const MAX_RESEARCH_FETCHES: usize = 3;

static URL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"https?://\S+").unwrap());

pub type SharedProject = Arc<Mutex<Project>>;

/// Planner call result: the raw completion plus the plan extracted from it,
/// when one was present.
#[derive(Debug)]
pub struct PlannerReply {
    pub completion: Completion,
    pub plan: Option<ParsedPlan>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Decision {
    Approved,
    Rejected,
}

struct PendingApproval {
    stage_id: Uuid,
    tx: oneshot::Sender<Decision>,
}

/// Drives a project's pipeline against a completion backend.
pub struct PipelineRunner {
    backend: Arc<dyn CompletionBackend>,
    config: Arc<dyn ConfigStore>,
    fetcher: Arc<dyn WebFetcher>,
    sink: Arc<dyn ArtifactSink>,
    running: AtomicBool,
    last_error: StdMutex<Option<String>>,
    // At most one stage awaits approval at a time (execution is sequential).
    pending: StdMutex<Option<PendingApproval>>,
}

impl PipelineRunner {
    pub fn new(
        backend: Arc<dyn CompletionBackend>,
        config: Arc<dyn ConfigStore>,
        fetcher: Arc<dyn WebFetcher>,
        sink: Arc<dyn ArtifactSink>,
    ) -> Self {
        Self {
            backend,
            config,
            fetcher,
            sink,
            running: AtomicBool::new(false),
            last_error: StdMutex::new(None),
            pending: StdMutex::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Message of the failure that ended the most recent run, if any.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().expect("error lock").clone()
    }

    /// Asks the planner model to decompose a goal. A reply without an
    /// extractable plan is conversational, not a failure.
    pub async fn plan(&self, goal: &str) -> Result<PlannerReply, ProviderError> {
        let config = self.resolve_config(AgentRole::Planner);
        let completion = self
            .backend
            .complete(CompletionRequest {
                provider: config.provider,
                model: config.model,
                system_prompt: config.system_prompt,
                user_message: goal.to_string(),
                temperature: config.temperature,
            })
            .await?;
        let parsed = plan::parse(&completion.content);
        Ok(PlannerReply {
            plan: parsed,
            completion,
        })
    }

    /// Executes the project's pipeline to completion, failure, or rejection.
    /// A second call while a run is in flight is a no-op.
    pub async fn run(&self, project: SharedProject) {
        if self.running.swap(true, Ordering::SeqCst) {
            debug!("pipeline run already in progress");
            return;
        }
        self.set_last_error(None);

        {
            let mut proj = project.lock().await;
            proj.status = ProjectStatus::Running;
            touch_pipeline(&mut proj);
        }

        let outcome = self.run_stages(&project).await;

        {
            let mut proj = project.lock().await;
            match outcome {
                Ok(()) => {
                    proj.status = ProjectStatus::Completed;
                    let cost = proj
                        .pipeline
                        .as_ref()
                        .map(Pipeline::total_cost_usd)
                        .unwrap_or(0.0);
                    info!(project = %proj.id, cost_usd = cost, "pipeline completed");
                }
                Err(err) => {
                    proj.status = ProjectStatus::Failed;
                    warn!(project = %proj.id, %err, "pipeline run ended early");
                    self.set_last_error(Some(err.to_string()));
                }
            }
            touch_pipeline(&mut proj);
        }

        self.pending.lock().expect("pending lock").take();
        self.running.store(false, Ordering::SeqCst);
    }

    /// Approves the stage currently awaiting a decision. Returns false for
    /// stale or mistimed signals, which are logged and otherwise ignored.
    pub fn approve(&self, stage_id: Uuid) -> bool {
        self.deliver(stage_id, Decision::Approved)
    }

    /// Rejects the stage currently awaiting a decision, aborting the run.
    pub fn reject(&self, stage_id: Uuid) -> bool {
        self.deliver(stage_id, Decision::Rejected)
    }

    fn deliver(&self, stage_id: Uuid, decision: Decision) -> bool {
        let mut slot = self.pending.lock().expect("pending lock");
        match slot.take() {
            Some(pending) if pending.stage_id == stage_id => {
                let _ = pending.tx.send(decision);
                true
            }
            Some(pending) => {
                warn!(
                    awaiting = %pending.stage_id,
                    signalled = %stage_id,
                    "approval signal for a different stage ignored"
                );
                *slot = Some(pending);
                false
            }
            None => {
                warn!(stage = %stage_id, "approval signal with no stage awaiting");
                false
            }
        }
    }

    async fn run_stages(&self, project: &SharedProject) -> Result<(), RunError> {
        loop {
            // A stage runs only once every earlier position is Approved. Any
            // other status ahead of the next Waiting stage blocks the run.
            let next = {
                let proj = project.lock().await;
                let Some(pipeline) = proj.pipeline.as_ref() else {
                    return Ok(());
                };
                let mut next = None;
                for i in pipeline.ordered_indices() {
                    let stage = &pipeline.stages[i];
                    match stage.status {
                        StageStatus::Approved => continue,
                        StageStatus::Waiting => {
                            next = Some((stage.id, stage.role, stage.position,
                                stage.input_context.clone()));
                            break;
                        }
                        StageStatus::Running
                        | StageStatus::Completed
                        | StageStatus::Failed => {
                            warn!(
                                stage = %stage.id,
                                status = stage.status.as_str(),
                                "cannot run past an unapproved stage"
                            );
                            return Err(RunError::Blocked);
                        }
                    }
                }
                next
            };
            let Some((stage_id, role, position, input_context)) = next else {
                return Ok(());
            };
            self.execute_stage(project, stage_id, role, position, &input_context)
                .await?;
        }
    }

    async fn execute_stage(
        &self,
        project: &SharedProject,
        stage_id: Uuid,
        role: AgentRole,
        position: usize,
        input_context: &str,
    ) -> Result<(), RunError> {
        let (mut user_message, auto_approve, project_title) = {
            let mut proj = project.lock().await;
            let title = if proj.title.is_empty() {
                proj.goal.clone()
            } else {
                proj.title.clone()
            };
            let auto = proj.pipeline.as_ref().is_none_or(|p| p.auto_approve);
            let message = context::build_context(&proj, position, input_context);
            transition(&mut proj, stage_id, StageStatus::Running);
            (message, auto, title)
        };
        info!(stage = %stage_id, role = role.as_str(), "stage started");

        if role == AgentRole::Researcher {
            self.augment_with_research(&mut user_message, input_context)
                .await;
        }

        let config = self.resolve_config(role);
        let request = CompletionRequest {
            provider: config.provider,
            model: config.model,
            system_prompt: config.system_prompt,
            user_message,
            temperature: config.temperature,
        };

        let completion = match self.backend.complete(request).await {
            Ok(completion) => completion,
            Err(err) => {
                let mut proj = project.lock().await;
                transition(&mut proj, stage_id, StageStatus::Failed);
                return Err(err.into());
            }
        };

        let mut artifact = Artifact::new(
            artifact_kind_for(role),
            format!("{} - {}", role.as_str(), project_title),
            completion.content.clone(),
        );
        match self.sink.export(&completion.content, role, &project_title) {
            Ok(path) => artifact.file_path = Some(path.to_string_lossy().into_owned()),
            Err(err) => warn!(stage = %stage_id, %err, "artifact export failed"),
        }

        {
            let mut proj = project.lock().await;
            if let Some(stage) = stage_mut(&mut proj, stage_id) {
                stage.output_content = completion.content.clone();
                stage.cost_usd = completion.cost_usd;
                if role == AgentRole::Reviewer {
                    stage.quality_score = review::extract_score(&completion.content);
                    stage.recommendation = review::extract_recommendation(&completion.content);
                }
                stage.artifacts.push(artifact);
            }
            touch_pipeline(&mut proj);
        }

        if auto_approve {
            let mut proj = project.lock().await;
            if let Some(stage) = stage_mut(&mut proj, stage_id) {
                stage.approved = true;
            }
            transition(&mut proj, stage_id, StageStatus::Approved);
            Ok(())
        } else {
            self.await_approval(project, stage_id).await
        }
    }

    /// Fetches URLs mentioned in the stage brief and appends their text to
    /// the prompt. Best-effort: failures are logged and skipped.
    async fn augment_with_research(&self, user_message: &mut String, input_context: &str) {
        for url in extract_urls(input_context)
            .into_iter()
            .take(MAX_RESEARCH_FETCHES)
        {
            match self.fetcher.fetch(&url).await {
                Ok(text) => {
                    user_message.push_str(&format!("\n\n## Web Content: {url}\n{text}"));
                }
                Err(err) => debug!(%url, %err, "research fetch failed"),
            }
        }
    }

    /// Suspends until `approve`/`reject` delivers a decision for this stage.
    /// The pending slot is registered before the stage becomes `Completed`,
    /// so a caller reacting to that status always finds a live slot.
    async fn await_approval(
        &self,
        project: &SharedProject,
        stage_id: Uuid,
    ) -> Result<(), RunError> {
        let (tx, rx) = oneshot::channel();
        *self.pending.lock().expect("pending lock") = Some(PendingApproval { stage_id, tx });

        {
            let mut proj = project.lock().await;
            transition(&mut proj, stage_id, StageStatus::Completed);
            proj.status = ProjectStatus::Paused;
        }
        info!(stage = %stage_id, "awaiting approval");

        // A dropped sender means the slot was discarded; treat as rejection.
        let decision = rx.await.unwrap_or(Decision::Rejected);

        let mut proj = project.lock().await;
        match decision {
            Decision::Approved => {
                if let Some(stage) = stage_mut(&mut proj, stage_id) {
                    stage.approved = true;
                }
                transition(&mut proj, stage_id, StageStatus::Approved);
                proj.status = ProjectStatus::Running;
                info!(stage = %stage_id, "stage approved");
                Ok(())
            }
            Decision::Rejected => {
                transition(&mut proj, stage_id, StageStatus::Failed);
                info!(stage = %stage_id, "stage rejected");
                Err(RunError::Rejected)
            }
        }
    }

    fn resolve_config(&self, role: AgentRole) -> AgentConfig {
        self.config
            .agent_config(role)
            .unwrap_or_else(|| AgentConfig::default_for(role))
    }

    fn set_last_error(&self, message: Option<String>) {
        *self.last_error.lock().expect("error lock") = message;
    }
}

/// Materializes a parsed plan onto a project, replacing any prior pipeline.
pub fn create_pipeline(project: &mut Project, parsed: &ParsedPlan, auto_approve: bool) {
    let mut pipeline = Pipeline::new(auto_approve);
    pipeline.stages = plan::build_stages(parsed);
    project.pipeline = Some(pipeline);
    project.status = ProjectStatus::Idle;
}

fn stage_mut(project: &mut Project, stage_id: Uuid) -> Option<&mut Stage> {
    project
        .pipeline
        .as_mut()?
        .stages
        .iter_mut()
        .find(|s| s.id == stage_id)
}

/// Applies a guarded status change and bumps the pipeline timestamp.
fn transition(project: &mut Project, stage_id: Uuid, to: StageStatus) {
    if let Some(stage) = stage_mut(project, stage_id) {
        if can_transition(stage.status, to) {
            stage.status = to;
        } else {
            warn!(
                stage = %stage_id,
                from = stage.status.as_str(),
                to = to.as_str(),
                "illegal stage transition ignored"
            );
        }
    }
    touch_pipeline(project);
}

fn touch_pipeline(project: &mut Project) {
    if let Some(pipeline) = project.pipeline.as_mut() {
        pipeline.touch();
    }
}

fn extract_urls(text: &str) -> Vec<String> {
    URL_RE
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}
