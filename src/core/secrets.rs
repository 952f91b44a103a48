//! Credential resolution. Durable secret storage (keychain, encrypted vault)
//! belongs to the embedding application; this crate only consumes keys
//! through the [`SecretsStore`] seam, addressed by the registry's vault keys
//! (`anthropic.api_key`, `custom.<key>.api_key`, ...).

use std::collections::HashMap;
use std::sync::Mutex;

pub trait SecretsStore: Send + Sync {
    fn get(&self, vault_key: &str) -> Option<String>;

    fn contains(&self, vault_key: &str) -> bool {
        self.get(vault_key).is_some_and(|k| !k.is_empty())
    }
}

/// Resolves vault keys from the process environment:
/// `anthropic.api_key` → `ANTHROPIC_API_KEY`, `custom.lab.api_key` →
/// `CUSTOM_LAB_API_KEY`.
pub struct EnvSecrets;

impl EnvSecrets {
    fn env_name(vault_key: &str) -> String {
        vault_key.replace(['.', '-'], "_").to_uppercase()
    }
}

impl SecretsStore for EnvSecrets {
    fn get(&self, vault_key: &str) -> Option<String> {
        std::env::var(Self::env_name(vault_key)).ok()
    }
}

/// In-memory store for tests and programmatic embedding.
#[derive(Default)]
pub struct MemorySecrets {
    entries: Mutex<HashMap<String, String>>,
}

impl MemorySecrets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, vault_key: impl Into<String>, value: impl Into<String>) {
        self.entries
            .lock()
            .expect("secrets lock")
            .insert(vault_key.into(), value.into());
    }
}

impl SecretsStore for MemorySecrets {
    fn get(&self, vault_key: &str) -> Option<String> {
        self.entries
            .lock()
            .expect("secrets lock")
            .get(vault_key)
            .cloned()
    }
}
