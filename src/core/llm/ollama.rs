//! Ollama connectivity check and local model discovery.
//!
//! Settings surfaces call this before offering local models: one `GET
//! /api/tags` both proves the daemon is up and lists what it can serve.

use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

pub const DEFAULT_ORIGIN: &str = "http://localhost:11434";

// Liveness probes against localhost should answer fast or not at all.
const HEALTH_TIMEOUT: Duration = Duration::from_secs(3);

/// Outcome of one health probe. An unreachable daemon is a normal state,
/// not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OllamaStatus {
    pub reachable: bool,
    /// Locally installed model names, e.g. `llama3.2:latest`.
    pub models: Vec<String>,
}

impl OllamaStatus {
    fn unreachable() -> Self {
        Self {
            reachable: false,
            models: Vec::new(),
        }
    }
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagModel>,
}

#[derive(Deserialize)]
struct TagModel {
    name: String,
}

/// Probes an Ollama daemon at `origin` (scheme + host + port).
pub async fn check(origin: &str) -> OllamaStatus {
    let client = match reqwest::Client::builder().timeout(HEALTH_TIMEOUT).build() {
        Ok(client) => client,
        Err(err) => {
            debug!(%err, "health check client build failed");
            return OllamaStatus::unreachable();
        }
    };
    let url = format!("{}/api/tags", origin.trim_end_matches('/'));

    let response = match client.get(&url).send().await {
        Ok(response) if response.status().is_success() => response,
        Ok(response) => {
            debug!(status = response.status().as_u16(), "ollama tags probe refused");
            return OllamaStatus::unreachable();
        }
        Err(err) => {
            debug!(%err, "ollama unreachable");
            return OllamaStatus::unreachable();
        }
    };

    // A daemon that answers but returns an unexpected body is still up.
    let models = match response.json::<TagsResponse>().await {
        Ok(tags) => tags.models.into_iter().map(|m| m.name).collect(),
        Err(_) => Vec::new(),
    };
    OllamaStatus {
        reachable: true,
        models,
    }
}
