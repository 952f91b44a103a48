//! Pipeline tests, split by concern. `support` holds scripted collaborator
//! doubles shared across the suite.

mod context;

pub mod support {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::Mutex as AsyncMutex;

    use crate::core::config::MemoryConfigStore;
    use crate::core::error::ProviderError;
    use crate::core::export::MemorySink;
    use crate::core::llm::{Completion, CompletionBackend, CompletionRequest};
    use crate::core::pipeline::runner::{PipelineRunner, SharedProject};
    use crate::core::pipeline::types::{AgentRole, Pipeline, Project, Stage};
    use crate::core::web::WebFetcher;

    pub fn completion(content: &str) -> Completion {
        Completion {
            content: content.to_string(),
            input_tokens: 100,
            output_tokens: 200,
            cost_usd: 0.5,
        }
    }

    /// Replays a scripted sequence of replies and records every request.
    /// Replies past the end of the script fall back to a canned success.
    #[derive(Default)]
    pub struct ScriptedBackend {
        replies: Mutex<VecDeque<Result<Completion, ProviderError>>>,
        requests: Mutex<Vec<CompletionRequest>>,
    }

    impl ScriptedBackend {
        pub fn new(replies: Vec<Result<Completion, ProviderError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub fn requests(&self) -> Vec<CompletionRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CompletionBackend for ScriptedBackend {
        async fn complete(
            &self,
            request: CompletionRequest,
        ) -> Result<Completion, ProviderError> {
            self.requests.lock().unwrap().push(request);
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(completion("ok")))
        }
    }

    /// Returns `fetched:<url>` for every URL, or errors when `failing`.
    #[derive(Default)]
    pub struct ScriptedFetcher {
        pub failing: bool,
        fetched: Mutex<Vec<String>>,
    }

    impl ScriptedFetcher {
        pub fn failing() -> Self {
            Self {
                failing: true,
                ..Self::default()
            }
        }

        pub fn fetched(&self) -> Vec<String> {
            self.fetched.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl WebFetcher for ScriptedFetcher {
        async fn fetch(&self, url: &str) -> anyhow::Result<String> {
            self.fetched.lock().unwrap().push(url.to_string());
            if self.failing {
                anyhow::bail!("connection refused");
            }
            Ok(format!("fetched:{url}"))
        }
    }

    pub struct Harness {
        pub backend: Arc<ScriptedBackend>,
        pub config: Arc<MemoryConfigStore>,
        pub fetcher: Arc<ScriptedFetcher>,
        pub sink: Arc<MemorySink>,
        pub runner: Arc<PipelineRunner>,
    }

    pub fn harness(replies: Vec<Result<Completion, ProviderError>>) -> Harness {
        harness_with_fetcher(replies, ScriptedFetcher::default())
    }

    pub fn harness_with_fetcher(
        replies: Vec<Result<Completion, ProviderError>>,
        fetcher: ScriptedFetcher,
    ) -> Harness {
        let backend = Arc::new(ScriptedBackend::new(replies));
        let config = Arc::new(MemoryConfigStore::new());
        let fetcher = Arc::new(fetcher);
        let sink = Arc::new(MemorySink::new());
        let runner = Arc::new(PipelineRunner::new(
            backend.clone(),
            config.clone(),
            fetcher.clone(),
            sink.clone(),
        ));
        Harness {
            backend,
            config,
            fetcher,
            sink,
            runner,
        }
    }

    pub fn project_with_stages(
        roles: &[AgentRole],
        auto_approve: bool,
    ) -> SharedProject {
        let mut project = Project::new("Test Project", "Write a short report");
        let mut pipeline = Pipeline::new(auto_approve);
        pipeline.stages = roles
            .iter()
            .enumerate()
            .map(|(i, &role)| Stage::new(role, i, format!("task {i}")))
            .collect();
        project.pipeline = Some(pipeline);
        Arc::new(AsyncMutex::new(project))
    }

    /// Polls an async condition until it holds or two seconds elapse.
    pub async fn eventually<F, Fut>(mut condition: F) -> bool
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = bool>,
    {
        for _ in 0..200 {
            if condition().await {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }
}
