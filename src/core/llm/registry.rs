use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const PROVIDERS_JSON: &str = include_str!("providers.json");

/// Built-in and user-registered provider definitions, plus per-provider
/// base-URL overrides. Model identifiers stay open strings: anything not in
/// a def's model table still routes, it just prices at zero.
#[derive(Debug, Clone)]
pub struct ProviderRegistry {
    providers: Vec<ProviderDef>,
    base_url_overrides: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderDef {
    pub id: String,
    pub name: String,
    pub api_format: ApiFormat,
    pub base_url: String,
    pub auth: AuthConfig,
    #[serde(default = "default_true")]
    pub requires_api_key: bool,
    pub default_model: String,
    #[serde(default)]
    pub models: Vec<ModelDef>,
}

fn default_true() -> bool {
    true
}

/// Wire format spoken at the provider's endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiFormat {
    /// Anthropic messages: `system` + `messages`, `x-api-key` auth.
    AnthropicMessages,
    /// OpenAI-compatible chat completions, Bearer auth. Reused across most
    /// vendors and the common case for custom/local endpoints.
    ChatCompletions,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(rename = "type")]
    pub auth_type: AuthType,
    /// Header name for `AuthType::Header`; bearer auth always uses
    /// `Authorization`.
    #[serde(default)]
    pub header_name: Option<String>,
    pub vault_key: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthType {
    Bearer,
    /// Raw key sent as-is in the header named by `header_name`.
    Header,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelDef {
    pub id: String,
    pub name: String,
    /// USD per million input tokens. Zero for local/unpriced models.
    #[serde(default)]
    pub input_price: f64,
    /// USD per million output tokens.
    #[serde(default)]
    pub output_price: f64,
}

/// Parameters for registering a user-defined provider at runtime.
#[derive(Debug, Clone)]
pub struct CustomProviderSpec {
    /// Short key, unique among custom providers. The provider id becomes
    /// `custom.<key>` and its credential account `custom.<key>.api_key`.
    pub key: String,
    pub name: String,
    pub base_url: String,
    pub api_format: ApiFormat,
    pub requires_api_key: bool,
    pub default_model: String,
    /// Optional (input, output) USD-per-million pricing. Local models are
    /// typically free; a paid custom endpoint can still be accounted for.
    pub pricing: Option<(f64, f64)>,
}

impl ProviderRegistry {
    /// Loads the built-in provider table embedded in the binary.
    pub fn load() -> Self {
        #[derive(Deserialize)]
        struct Manifest {
            providers: Vec<ProviderDef>,
        }
        let manifest: Manifest =
            serde_json::from_str(PROVIDERS_JSON).expect("providers.json is invalid");
        Self {
            providers: manifest.providers,
            base_url_overrides: HashMap::new(),
        }
    }

    pub fn get(&self, id: &str) -> Option<&ProviderDef> {
        let normalized = id.to_lowercase();
        self.providers
            .iter()
            .find(|p| p.id == normalized || p.name.to_lowercase() == normalized)
    }

    /// Base URL for a def, honoring any user override.
    pub fn effective_base_url(&self, def: &ProviderDef) -> String {
        self.base_url_overrides
            .get(&def.id)
            .cloned()
            .unwrap_or_else(|| def.base_url.clone())
    }

    /// Points a built-in provider at a different endpoint (proxies,
    /// self-hosted gateways).
    pub fn set_base_url(&mut self, provider_id: &str, url: impl Into<String>) {
        self.base_url_overrides
            .insert(provider_id.to_lowercase(), url.into());
    }

    /// Registers a user-defined provider. Replaces any previous registration
    /// under the same key.
    pub fn add_custom(&mut self, spec: CustomProviderSpec) -> String {
        // Keys are lowercased so lookup, which normalizes its query, can
        // always resolve the id.
        let key = spec.key.to_lowercase();
        let id = format!("custom.{key}");
        let vault_key = format!("custom.{key}.api_key");
        let (input_price, output_price) = spec.pricing.unwrap_or((0.0, 0.0));
        let def = ProviderDef {
            id: id.clone(),
            name: spec.name,
            api_format: spec.api_format,
            base_url: spec.base_url,
            auth: AuthConfig {
                auth_type: match spec.api_format {
                    ApiFormat::AnthropicMessages => AuthType::Header,
                    ApiFormat::ChatCompletions => AuthType::Bearer,
                },
                header_name: match spec.api_format {
                    ApiFormat::AnthropicMessages => Some("x-api-key".to_string()),
                    ApiFormat::ChatCompletions => None,
                },
                vault_key,
            },
            requires_api_key: spec.requires_api_key,
            default_model: spec.default_model.clone(),
            models: vec![ModelDef {
                id: spec.default_model,
                name: "Custom model".to_string(),
                input_price,
                output_price,
            }],
        };
        self.providers.retain(|p| p.id != id);
        self.providers.push(def);
        id
    }

    pub fn providers(&self) -> &[ProviderDef] {
        &self.providers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_table_loads_and_resolves_case_insensitively() {
        let registry = ProviderRegistry::load();
        assert!(registry.get("anthropic").is_some());
        assert!(registry.get("Anthropic").is_some());
        assert!(registry.get("OpenAI").is_some());
        assert!(registry.get("nonexistent").is_none());
    }

    #[test]
    fn anthropic_uses_native_format_and_api_key_header() {
        let registry = ProviderRegistry::load();
        let def = registry.get("anthropic").unwrap();
        assert_eq!(def.api_format, ApiFormat::AnthropicMessages);
        assert_eq!(def.auth.auth_type, AuthType::Header);
        assert_eq!(def.auth.header_name.as_deref(), Some("x-api-key"));
    }

    #[test]
    fn ollama_requires_no_api_key() {
        let registry = ProviderRegistry::load();
        let def = registry.get("ollama").unwrap();
        assert!(!def.requires_api_key);
        assert_eq!(def.api_format, ApiFormat::ChatCompletions);
    }

    #[test]
    fn base_url_override_takes_effect() {
        let mut registry = ProviderRegistry::load();
        registry.set_base_url("openai", "http://proxy.local/v1/chat/completions");
        let def = registry.get("openai").unwrap().clone();
        assert_eq!(
            registry.effective_base_url(&def),
            "http://proxy.local/v1/chat/completions"
        );
    }

    #[test]
    fn custom_provider_registers_with_account_key_and_pricing() {
        let mut registry = ProviderRegistry::load();
        let id = registry.add_custom(CustomProviderSpec {
            key: "lab".to_string(),
            name: "Lab Gateway".to_string(),
            base_url: "http://lab.internal/v1/chat/completions".to_string(),
            api_format: ApiFormat::ChatCompletions,
            requires_api_key: true,
            default_model: "lab-7b".to_string(),
            pricing: Some((0.5, 1.5)),
        });
        assert_eq!(id, "custom.lab");
        let def = registry.get("custom.lab").unwrap();
        assert_eq!(def.auth.vault_key, "custom.lab.api_key");
        assert_eq!(def.models[0].input_price, 0.5);
        assert_eq!(def.models[0].output_price, 1.5);
    }

    #[test]
    fn custom_keys_are_normalized_to_lowercase() {
        let mut registry = ProviderRegistry::load();
        let id = registry.add_custom(CustomProviderSpec {
            key: "MyLab".to_string(),
            name: "My Lab".to_string(),
            base_url: "http://lab.internal/v1/chat/completions".to_string(),
            api_format: ApiFormat::ChatCompletions,
            requires_api_key: false,
            default_model: "lab-7b".to_string(),
            pricing: None,
        });
        assert_eq!(id, "custom.mylab");
        let def = registry.get("custom.MyLab").unwrap();
        assert_eq!(def.id, "custom.mylab");
        assert_eq!(def.auth.vault_key, "custom.mylab.api_key");
    }
}
