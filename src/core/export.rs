//! Artifact export collaborator. Best-effort by contract: a failed export
//! never aborts a pipeline run.

use anyhow::{Context, Result};
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::core::pipeline::types::AgentRole;

pub trait ArtifactSink: Send + Sync {
    /// Writes stage output somewhere durable and returns its location.
    fn export(&self, content: &str, role: AgentRole, project_title: &str) -> Result<PathBuf>;
}

/// Writes markdown files under `<base>/<project>/<role>-<timestamp>.md`.
pub struct FileExporter {
    base_dir: PathBuf,
}

impl FileExporter {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Defaults to `~/Documents/crewflow` (home directory fallback).
    pub fn default_location() -> Self {
        let base = dirs::document_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("crewflow");
        Self::new(base)
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }
}

impl ArtifactSink for FileExporter {
    fn export(&self, content: &str, role: AgentRole, project_title: &str) -> Result<PathBuf> {
        let title = if project_title.is_empty() {
            "untitled"
        } else {
            project_title
        };
        let project_dir = self.base_dir.join(sanitize_filename(title));
        std::fs::create_dir_all(&project_dir)
            .with_context(|| format!("creating {}", project_dir.display()))?;

        let timestamp = Utc::now().format("%Y-%m-%dT%H-%M-%SZ");
        let slug = sanitize_filename(&role.as_str().to_lowercase());
        let path = project_dir.join(format!("{}-{}.md", slug, timestamp));
        std::fs::write(&path, content).with_context(|| format!("writing {}", path.display()))?;
        Ok(path)
    }
}

/// Keeps alphanumerics, `-` and `_`; collapses everything else to `-`.
fn sanitize_filename(name: &str) -> String {
    name.split(|c: char| !c.is_alphanumeric() && c != '-' && c != '_')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// Captures exports in memory for tests.
#[derive(Default)]
pub struct MemorySink {
    exports: Mutex<Vec<(AgentRole, String, String)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn exports(&self) -> Vec<(AgentRole, String, String)> {
        self.exports.lock().expect("sink lock").clone()
    }
}

impl ArtifactSink for MemorySink {
    fn export(&self, content: &str, role: AgentRole, project_title: &str) -> Result<PathBuf> {
        self.exports.lock().expect("sink lock").push((
            role,
            project_title.to_string(),
            content.to_string(),
        ));
        Ok(PathBuf::from(format!(
            "memory://{}/{}",
            project_title,
            role.as_str()
        )))
    }
}
