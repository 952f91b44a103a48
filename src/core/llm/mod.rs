//! Provider gateway: one completion contract over heterogeneous model APIs.
//!
//! Two wire formats cover every vendor: Anthropic's native messages API and
//! the OpenAI-compatible chat-completions shape the rest of the industry
//! converged on. A single gateway struct dispatches on the registry's
//! per-provider format tag; there is no inheritance hierarchy to extend,
//! only a new registry entry to add.

pub mod ollama;
pub mod pricing;
pub mod registry;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::error::ProviderError;
use crate::core::secrets::SecretsStore;
use pricing::{ModelPrice, price_for};
use registry::{ApiFormat, AuthType, ProviderDef, ProviderRegistry};

/// Every provider call is capped here; a hung endpoint must not park the
/// scheduler for longer.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_TOKENS: u32 = 4096;
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// One completion call. Model identifier is an open string so custom and
/// local models route without a registry entry.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub provider: String,
    pub model: String,
    pub system_prompt: String,
    pub user_message: String,
    pub temperature: f64,
}

/// Immutable result of one completion call.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub content: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost_usd: f64,
}

/// Seam between the scheduler and the network. Tests script this; production
/// uses [`ProviderGateway`].
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, ProviderError>;
}

// ── Chat-completions request/response ──

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatRequestMessage<'a>>,
    temperature: f64,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatRequestMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    // Some OpenAI-compatible servers omit usage entirely.
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize, Default)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

// ── Anthropic messages request/response ──

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f64,
    system: &'a str,
    messages: Vec<ChatRequestMessage<'a>>,
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<MessagesBlock>,
    #[serde(default)]
    usage: Option<MessagesUsage>,
}

#[derive(Deserialize)]
struct MessagesBlock {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize, Default)]
struct MessagesUsage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

// ── Gateway ──

/// Production [`CompletionBackend`]: resolves the provider def, attaches the
/// vendor's auth header, speaks its wire format, and computes cost from the
/// registry's pricing tables.
pub struct ProviderGateway {
    registry: ProviderRegistry,
    secrets: Arc<dyn SecretsStore>,
    client: Client,
}

impl ProviderGateway {
    pub fn new(registry: ProviderRegistry, secrets: Arc<dyn SecretsStore>) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("reqwest client");
        Self {
            registry,
            secrets,
            client,
        }
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Resolves the credential for a def. Missing-but-required keys fail
    /// before any network traffic.
    fn resolve_api_key(&self, def: &ProviderDef) -> Result<Option<String>, ProviderError> {
        let key = self
            .secrets
            .get(&def.auth.vault_key)
            .filter(|k| !k.is_empty());
        if def.requires_api_key && key.is_none() {
            return Err(ProviderError::MissingCredential(def.name.clone()));
        }
        Ok(key)
    }

    async fn send(
        &self,
        def: &ProviderDef,
        url: &str,
        body: serde_json::Value,
        api_key: Option<&str>,
    ) -> Result<String, ProviderError> {
        let mut request = self.client.post(url).json(&body);

        if let Some(key) = api_key {
            request = match def.auth.auth_type {
                AuthType::Bearer => request.header("Authorization", format!("Bearer {}", key)),
                AuthType::Header => {
                    let header = def.auth.header_name.as_deref().unwrap_or("x-api-key");
                    request.header(header, key)
                }
            };
        }
        if def.api_format == ApiFormat::AnthropicMessages {
            request = request.header("anthropic-version", ANTHROPIC_VERSION);
        }

        let response = request.send().await.map_err(classify_transport_error)?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(classify_transport_error)?;

        match status.as_u16() {
            200..=299 => Ok(text),
            401 => Err(ProviderError::MissingCredential(def.name.clone())),
            429 => Err(ProviderError::RateLimited),
            code => Err(ProviderError::Server(code)),
        }
    }
}

#[async_trait]
impl CompletionBackend for ProviderGateway {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, ProviderError> {
        let def = self
            .registry
            .get(&request.provider)
            .ok_or_else(|| ProviderError::UnknownProvider(request.provider.clone()))?
            .clone();
        let api_key = self.resolve_api_key(&def)?;
        let url = self.registry.effective_base_url(&def);
        let price = price_for(&self.registry, &request.model);

        debug!(
            provider = %def.id,
            model = %request.model,
            format = ?def.api_format,
            "dispatching completion"
        );

        let body = match def.api_format {
            ApiFormat::ChatCompletions => serde_json::to_value(ChatRequest {
                model: &request.model,
                messages: vec![
                    ChatRequestMessage {
                        role: "system",
                        content: &request.system_prompt,
                    },
                    ChatRequestMessage {
                        role: "user",
                        content: &request.user_message,
                    },
                ],
                temperature: request.temperature,
                max_tokens: MAX_TOKENS,
            }),
            ApiFormat::AnthropicMessages => serde_json::to_value(MessagesRequest {
                model: &request.model,
                max_tokens: MAX_TOKENS,
                temperature: request.temperature,
                system: &request.system_prompt,
                messages: vec![ChatRequestMessage {
                    role: "user",
                    content: &request.user_message,
                }],
            }),
        }
        .map_err(|_| ProviderError::InvalidResponse)?;

        let text = self.send(&def, &url, body, api_key.as_deref()).await?;

        match def.api_format {
            ApiFormat::ChatCompletions => parse_chat_completions_body(&text, price),
            ApiFormat::AnthropicMessages => parse_messages_body(&text, price),
        }
    }
}

/// Maps a transport failure onto the taxonomy, with an actionable message
/// for the common network causes.
fn classify_transport_error(err: reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        return ProviderError::Timeout;
    }
    let chain = error_chain(&err).to_lowercase();
    let message = if chain.contains("dns") || chain.contains("failed to lookup") {
        "DNS lookup failed. Check the endpoint hostname.".to_string()
    } else if chain.contains("certificate") || chain.contains("tls") || chain.contains("ssl") {
        "TLS handshake failed. The endpoint's certificate may be invalid.".to_string()
    } else if err.is_connect() {
        "Could not reach the provider. It may be offline or unreachable.".to_string()
    } else {
        err.to_string()
    };
    ProviderError::Network(message)
}

fn error_chain(err: &reqwest::Error) -> String {
    let mut parts = vec![err.to_string()];
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        parts.push(cause.to_string());
        source = cause.source();
    }
    parts.join(": ")
}

/// Parses an OpenAI-compatible reply. Missing content is a shape error;
/// missing usage counters degrade to a zero-cost call.
fn parse_chat_completions_body(
    body: &str,
    price: ModelPrice,
) -> Result<Completion, ProviderError> {
    let parsed: ChatResponse =
        serde_json::from_str(body).map_err(|_| ProviderError::InvalidResponse)?;
    let content = parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or(ProviderError::InvalidResponse)?;
    let usage = parsed.usage.unwrap_or_default();
    Ok(Completion {
        cost_usd: price.cost_usd(usage.prompt_tokens, usage.completion_tokens),
        content,
        input_tokens: usage.prompt_tokens,
        output_tokens: usage.completion_tokens,
    })
}

/// Parses an Anthropic messages reply.
fn parse_messages_body(body: &str, price: ModelPrice) -> Result<Completion, ProviderError> {
    let parsed: MessagesResponse =
        serde_json::from_str(body).map_err(|_| ProviderError::InvalidResponse)?;
    let content = parsed
        .content
        .into_iter()
        .next()
        .and_then(|b| b.text)
        .ok_or(ProviderError::InvalidResponse)?;
    let usage = parsed.usage.unwrap_or_default();
    Ok(Completion {
        cost_usd: price.cost_usd(usage.input_tokens, usage.output_tokens),
        content,
        input_tokens: usage.input_tokens,
        output_tokens: usage.output_tokens,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SONNET_PRICE: ModelPrice = ModelPrice {
        input_per_million: 3.0,
        output_per_million: 15.0,
    };

    #[test]
    fn chat_completions_body_parses_content_and_usage() {
        let body = r#"{
            "choices": [{"message": {"role": "assistant", "content": "hello"}}],
            "usage": {"prompt_tokens": 1000, "completion_tokens": 2000}
        }"#;
        let completion = parse_chat_completions_body(body, SONNET_PRICE).unwrap();
        assert_eq!(completion.content, "hello");
        assert_eq!(completion.input_tokens, 1000);
        assert_eq!(completion.output_tokens, 2000);
        assert!((completion.cost_usd - (0.001 * 3.0 + 0.002 * 15.0)).abs() < 1e-12);
    }

    #[test]
    fn chat_completions_missing_usage_costs_zero() {
        let body = r#"{"choices": [{"message": {"content": "ok"}}]}"#;
        let completion = parse_chat_completions_body(body, SONNET_PRICE).unwrap();
        assert_eq!(completion.input_tokens, 0);
        assert_eq!(completion.output_tokens, 0);
        assert_eq!(completion.cost_usd, 0.0);
    }

    #[test]
    fn chat_completions_missing_content_is_shape_error() {
        let no_choices = r#"{"choices": []}"#;
        assert!(matches!(
            parse_chat_completions_body(no_choices, SONNET_PRICE),
            Err(ProviderError::InvalidResponse)
        ));
        let null_content = r#"{"choices": [{"message": {"content": null}}]}"#;
        assert!(matches!(
            parse_chat_completions_body(null_content, SONNET_PRICE),
            Err(ProviderError::InvalidResponse)
        ));
    }

    #[test]
    fn messages_body_parses_first_text_block() {
        let body = r#"{
            "content": [{"type": "text", "text": "response text"}],
            "usage": {"input_tokens": 500, "output_tokens": 250}
        }"#;
        let completion = parse_messages_body(body, SONNET_PRICE).unwrap();
        assert_eq!(completion.content, "response text");
        assert_eq!(completion.input_tokens, 500);
        assert_eq!(completion.output_tokens, 250);
    }

    #[test]
    fn messages_body_without_usage_degrades_to_zero_cost() {
        let body = r#"{"content": [{"text": "free"}]}"#;
        let completion = parse_messages_body(body, SONNET_PRICE).unwrap();
        assert_eq!(completion.cost_usd, 0.0);
    }

    #[test]
    fn messages_body_without_content_is_shape_error() {
        assert!(matches!(
            parse_messages_body(r#"{"content": []}"#, SONNET_PRICE),
            Err(ProviderError::InvalidResponse)
        ));
        assert!(matches!(
            parse_messages_body("not json", SONNET_PRICE),
            Err(ProviderError::InvalidResponse)
        ));
    }

    #[test]
    fn chat_request_serializes_expected_shape() {
        let req = ChatRequest {
            model: "gpt-4o",
            messages: vec![
                ChatRequestMessage {
                    role: "system",
                    content: "be brief",
                },
                ChatRequestMessage {
                    role: "user",
                    content: "hi",
                },
            ],
            temperature: 0.7,
            max_tokens: MAX_TOKENS,
        };
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["model"], "gpt-4o");
        assert_eq!(value["messages"][0]["role"], "system");
        assert_eq!(value["messages"][1]["content"], "hi");
        assert_eq!(value["max_tokens"], 4096);
    }

    #[test]
    fn messages_request_keeps_system_outside_messages() {
        let req = MessagesRequest {
            model: "claude-sonnet-4-6",
            max_tokens: MAX_TOKENS,
            temperature: 0.2,
            system: "you are a planner",
            messages: vec![ChatRequestMessage {
                role: "user",
                content: "plan this",
            }],
        };
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["system"], "you are a planner");
        assert_eq!(value["messages"].as_array().unwrap().len(), 1);
        assert_eq!(value["messages"][0]["role"], "user");
    }

    // ── Gateway dispatch against a local responder ──

    use crate::core::secrets::MemorySecrets;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    async fn serve_once(
        status_line: &str,
        body: &str,
        hits: Arc<AtomicUsize>,
    ) -> std::net::SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let response = format!(
            "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        tokio::spawn(async move {
            if let Ok((mut stream, _)) = listener.accept().await {
                hits.fetch_add(1, Ordering::SeqCst);
                let mut buf = [0u8; 8192];
                let _ = stream.read(&mut buf).await;
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            }
        });
        addr
    }

    fn gateway_at(addr: std::net::SocketAddr, with_key: bool) -> ProviderGateway {
        let mut registry = ProviderRegistry::load();
        registry.set_base_url("openai", format!("http://{addr}/v1/chat/completions"));
        let secrets = MemorySecrets::new();
        if with_key {
            secrets.set("openai.api_key", "sk-test");
        }
        ProviderGateway::new(registry, Arc::new(secrets))
    }

    fn openai_request() -> CompletionRequest {
        CompletionRequest {
            provider: "openai".to_string(),
            model: "gpt-4o".to_string(),
            system_prompt: "be brief".to_string(),
            user_message: "hi".to_string(),
            temperature: 0.7,
        }
    }

    #[tokio::test]
    async fn gateway_parses_successful_replies() {
        let body = r#"{
            "choices": [{"message": {"content": "hello"}}],
            "usage": {"prompt_tokens": 1000000, "completion_tokens": 1000000}
        }"#;
        let addr = serve_once("200 OK", body, Arc::new(AtomicUsize::new(0))).await;
        let completion = gateway_at(addr, true)
            .complete(openai_request())
            .await
            .unwrap();
        assert_eq!(completion.content, "hello");
        // One million tokens each way at gpt-4o's registry prices.
        assert!((completion.cost_usd - 12.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn gateway_maps_401_to_missing_credential() {
        let addr = serve_once(
            "401 Unauthorized",
            r#"{"error": "bad key"}"#,
            Arc::new(AtomicUsize::new(0)),
        )
        .await;
        let err = gateway_at(addr, true)
            .complete(openai_request())
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::MissingCredential(name) if name == "OpenAI"));
    }

    #[tokio::test]
    async fn gateway_maps_429_to_rate_limited() {
        let addr = serve_once(
            "429 Too Many Requests",
            r#"{"error": "slow down"}"#,
            Arc::new(AtomicUsize::new(0)),
        )
        .await;
        let err = gateway_at(addr, true)
            .complete(openai_request())
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::RateLimited));
    }

    #[tokio::test]
    async fn gateway_maps_other_statuses_to_server() {
        let addr = serve_once(
            "500 Internal Server Error",
            "boom",
            Arc::new(AtomicUsize::new(0)),
        )
        .await;
        let err = gateway_at(addr, true)
            .complete(openai_request())
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Server(500)));
    }

    #[tokio::test]
    async fn missing_key_fails_before_any_network_traffic() {
        let hits = Arc::new(AtomicUsize::new(0));
        let addr = serve_once("200 OK", "{}", hits.clone()).await;
        let err = gateway_at(addr, false)
            .complete(openai_request())
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::MissingCredential(name) if name == "OpenAI"));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unregistered_provider_id_is_rejected() {
        let gateway = ProviderGateway::new(
            ProviderRegistry::load(),
            Arc::new(MemorySecrets::new()),
        );
        let mut request = openai_request();
        request.provider = "nonexistent".to_string();
        let err = gateway.complete(request).await.unwrap_err();
        assert!(matches!(err, ProviderError::UnknownProvider(id) if id == "nonexistent"));
    }
}
