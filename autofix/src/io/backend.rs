//! Suggestion backends consulted when no deterministic rule applies.
//!
//! The [`SuggestionBackend`] trait decouples remediation from the service that
//! produces suggestions. [`MockBackend`] returns a fixed answer; [`HttpBackend`]
//! calls an OpenAI-compatible chat completions endpoint and pulls the JSON
//! suggestion out of the model's free-form reply.

use anyhow::{Context, Result, anyhow, bail};
use jsonschema::Draft;
use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::core::extract::first_balanced_object;
use crate::core::types::{EnvironmentSnapshot, FixKind, RiskLevel};
use crate::io::config::BackendConfig;
use crate::io::prompt::{PromptEngine, SYSTEM_PROMPT};

const SUGGESTION_SCHEMA: &str = include_str!("../../schemas/suggestion.schema.json");

/// Everything a backend may use to propose a fix.
#[derive(Debug, Clone, Serialize)]
pub struct SuggestionRequest<'a> {
    pub environment: &'a EnvironmentSnapshot,
    pub command: &'a str,
    pub stderr: &'a str,
    pub exit_code: i32,
    pub attempt: u32,
}

/// A backend's proposal. An empty `proposed_fix` means "nothing actionable".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub proposed_fix: String,
    #[serde(default = "default_risk")]
    pub risk_level: RiskLevel,
    #[serde(default)]
    pub fix_type: FixKind,
}

fn default_risk() -> RiskLevel {
    RiskLevel::Medium
}

/// Capability interface for suggestion services.
pub trait SuggestionBackend {
    /// Propose a fix. `Err` covers transport, timeout and parse failures.
    fn suggest(&self, request: &SuggestionRequest<'_>) -> Result<Suggestion>;
}

/// Fixed-response backend for offline use and demos.
pub struct MockBackend;

impl SuggestionBackend for MockBackend {
    fn suggest(&self, request: &SuggestionRequest<'_>) -> Result<Suggestion> {
        debug!(command = request.command, "mock backend suggestion");
        Ok(Suggestion {
            explanation: "Mock suggestion: placeholder for a model response".to_string(),
            proposed_fix: "echo 'Mock fix applied'".to_string(),
            risk_level: RiskLevel::Low,
            fix_type: FixKind::Preparation,
        })
    }
}

/// OpenAI-compatible chat completions client.
pub struct HttpBackend {
    client: Client,
    endpoint: String,
    model: String,
    api_key: String,
    prompts: PromptEngine,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    message: String,
}

impl HttpBackend {
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .context("build http client")?;
        Ok(Self::with_client(config, client))
    }

    /// Use a preconfigured client (proxy or TLS settings, tests).
    pub fn with_client(config: &BackendConfig, client: Client) -> Self {
        Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: config.resolved_api_key(),
            prompts: PromptEngine::new(),
        }
    }
}

impl SuggestionBackend for HttpBackend {
    #[instrument(skip_all, fields(model = %self.model, attempt = request.attempt))]
    fn suggest(&self, request: &SuggestionRequest<'_>) -> Result<Suggestion> {
        let user_prompt = self.prompts.render_suggestion(request)?;
        let body = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &user_prompt,
                },
            ],
        };

        let url = format!("{}/chat/completions", self.endpoint);
        info!(url = %url, "requesting suggestion");
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .with_context(|| format!("POST {url}"))?;
        let status = response.status();
        let text = response.text().context("read suggestion response body")?;

        let content = chat_content(status, &text)?;
        let suggestion = parse_suggestion(&content)?;
        debug!(risk = suggestion.risk_level.as_str(), "parsed suggestion");
        Ok(suggestion)
    }
}

/// Pull the first choice's message content out of a chat completions body.
fn chat_content(status: StatusCode, body: &str) -> Result<String> {
    let parsed: Option<ChatResponse> = serde_json::from_str(body).ok();
    let api_message = parsed
        .as_ref()
        .and_then(|resp| resp.error.as_ref())
        .map(|err| err.message.trim())
        .filter(|message| !message.is_empty());

    if let Some(message) = api_message {
        bail!("suggestion backend error (HTTP {status}): {message}");
    }
    if !status.is_success() {
        bail!("suggestion backend returned HTTP {status}");
    }
    let parsed = parsed.ok_or_else(|| anyhow!("suggestion backend returned malformed JSON"))?;
    parsed
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message.content)
        .ok_or_else(|| anyhow!("suggestion backend returned no choices"))
}

/// Extract, validate and decode a suggestion from free-form model output.
pub fn parse_suggestion(content: &str) -> Result<Suggestion> {
    let object = first_balanced_object(content)
        .ok_or_else(|| anyhow!("no JSON object in suggestion response"))?;
    let value: Value = serde_json::from_str(object).context("parse suggestion json")?;
    validate_schema(&value)?;
    let suggestion: Suggestion =
        serde_json::from_value(value).context("decode suggestion fields")?;
    Ok(suggestion)
}

/// Validate a suggestion object against the embedded JSON Schema (Draft 2020-12).
fn validate_schema(instance: &Value) -> Result<()> {
    let schema: Value =
        serde_json::from_str(SUGGESTION_SCHEMA).context("parse suggestion schema")?;
    let compiled = jsonschema::options()
        .with_draft(Draft::Draft202012)
        .build(&schema)
        .context("compile suggestion schema")?;
    let messages: Vec<String> = compiled
        .iter_errors(instance)
        .map(|err| err.to_string())
        .collect();
    if !messages.is_empty() {
        bail!("suggestion schema violation:\n- {}", messages.join("\n- "));
    }
    Ok(())
}

/// Select a backend for the configured provider.
///
/// `local` has no client of its own yet and falls back to the mock backend.
pub fn backend_from_config(config: &BackendConfig) -> Result<Box<dyn SuggestionBackend>> {
    match config.provider.as_str() {
        "mock" => Ok(Box::new(MockBackend)),
        "local" => {
            warn!("local provider has no client yet; using mock suggestions");
            Ok(Box::new(MockBackend))
        }
        "openai" => Ok(Box::new(HttpBackend::new(config)?)),
        other => {
            debug!(provider = other, "unrecognised provider, using http backend");
            Ok(Box::new(HttpBackend::new(config)?))
        }
    }
}
