use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::config::Settings;
use crate::models::Message;
use crate::providers::{ProviderKind, GEMINI, OPENAI};
use crate::telemetry::preview;

/**
 * \brief Parameters of a single non-streaming completion.
 */
#[derive(Debug, Clone)]
pub struct ChatOptions {
    /** \brief Messages already normalized for the target provider */
    pub messages: Vec<Message>,
    /** \brief Model override; the provider default when `None` */
    pub model: Option<String>,
    pub temperature: f64,
    pub max_tokens: Option<u32>,
}

/**
 * \brief Raw provider reply: first candidate text plus optional usage figures.
 */
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Completion {
    pub text: String,
    pub usage: Option<Value>,
}

/**
 * \brief One implementation per provider API.
 */
#[async_trait]
pub trait ChatService: Send + Sync {
    fn provider(&self) -> ProviderKind;

    async fn chat_completion(&self, options: &ChatOptions) -> Result<Completion>;
}

/**
 * \brief Builds the client for a provider from settings.
 * \return error when the provider is unknown or has no API key
 */
pub fn get_ai_service(
    provider: &str,
    settings: &Settings,
    client: reqwest::Client,
) -> Result<Box<dyn ChatService>> {
    let kind = ProviderKind::parse(provider)
        .ok_or_else(|| anyhow!("Unknown AI provider: {}", provider))?;
    let api_key = settings
        .api_key_for(kind)
        .ok_or_else(|| anyhow!("no API key configured for {}", kind.as_str()))?;
    let api_base = settings.api_base_for(kind);
    let service: Box<dyn ChatService> = match kind {
        ProviderKind::OpenAI => Box::new(OpenAiService::new(client, api_base, api_key)),
        ProviderKind::Gemini => Box::new(GeminiService::new(client, api_base, api_key)),
    };
    Ok(service)
}

pub struct OpenAiService {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
}

impl OpenAiService {
    pub fn new(client: reqwest::Client, api_base: &str, api_key: &str) -> Self {
        Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }
}

#[async_trait]
impl ChatService for OpenAiService {
    fn provider(&self) -> ProviderKind {
        ProviderKind::OpenAI
    }

    async fn chat_completion(&self, options: &ChatOptions) -> Result<Completion> {
        let url = format!("{}/v1/chat/completions", self.api_base);
        let model = options.model.as_deref().unwrap_or(OPENAI.default_model());
        let mut body = json!({
            "model": model,
            "messages": options.messages,
            "temperature": options.temperature,
        });
        if let Some(max_tokens) = options.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }

        info!(model, messages = options.messages.len(), "sending request to openai");
        let resp = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .context("openai request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(anyhow!("openai request failed: {} -> {}", status, text));
        }
        let v: Value = resp.json().await.context("decode openai response failed")?;
        let completion = Completion {
            text: extract_openai_content(&v),
            usage: v.get("usage").cloned(),
        };
        debug!(raw = %preview(&completion.text), "raw openai response");
        Ok(completion)
    }
}

pub struct GeminiService {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
}

impl GeminiService {
    pub fn new(client: reqwest::Client, api_base: &str, api_key: &str) -> Self {
        Self {
            client,
            api_base: normalize_gemini_base(api_base),
            api_key: api_key.to_string(),
        }
    }
}

#[async_trait]
impl ChatService for GeminiService {
    fn provider(&self) -> ProviderKind {
        ProviderKind::Gemini
    }

    async fn chat_completion(&self, options: &ChatOptions) -> Result<Completion> {
        let model = options.model.as_deref().unwrap_or(GEMINI.default_model());
        let url = format!("{}/models/{}:generateContent", self.api_base, model);

        let mut generation_config = json!({
            "temperature": options.temperature.min(GEMINI.max_temperature),
        });
        if let Some(max_tokens) = options.max_tokens {
            generation_config["maxOutputTokens"] = json!(max_tokens);
        }
        let body = json!({
            "contents": gemini_contents(&options.messages),
            "generationConfig": generation_config,
        });

        info!(model, messages = options.messages.len(), "sending request to gemini");
        let resp = self
            .client
            .post(url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .context("gemini request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(anyhow!("gemini request failed: {} -> {}", status, text));
        }
        let v: Value = resp.json().await.context("decode gemini response failed")?;
        let completion = Completion {
            text: extract_gemini_content(&v),
            usage: v.get("usageMetadata").cloned(),
        };
        debug!(raw = %preview(&completion.text), "raw gemini response");
        Ok(completion)
    }
}

fn extract_openai_content(v: &Value) -> String {
    v.get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .unwrap_or("")
        .to_string()
}

fn extract_gemini_content(v: &Value) -> String {
    if let Some(candidates) = v.get("candidates").and_then(|c| c.as_array()) {
        if let Some(first) = candidates.first() {
            if let Some(content) = first.get("content") {
                if let Some(parts) = content.get("parts").and_then(|p| p.as_array()) {
                    return parts
                        .iter()
                        .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
                        .collect::<Vec<_>>()
                        .join("");
                }
            }
            if let Some(text) = first.get("output").and_then(|t| t.as_str()) {
                return text.to_string();
            }
        }
    }
    v.get("text")
        .and_then(|t| t.as_str())
        .unwrap_or("")
        .to_string()
}

/// Messages reaching here are already normalized to `user` / `model`.
fn gemini_contents(messages: &[Message]) -> Vec<Value> {
    messages
        .iter()
        .map(|msg| {
            let role = match msg.role.as_str() {
                "model" | "assistant" => "model",
                _ => "user",
            };
            json!({
                "role": role,
                "parts": [{"text": msg.content}]
            })
        })
        .collect()
}

fn normalize_gemini_base(api_base: &str) -> String {
    let trimmed = api_base.trim_end_matches('/');
    if trimmed.ends_with("/v1")
        || trimmed.ends_with("/v1beta")
        || trimmed.contains("/v1/")
        || trimmed.contains("/v1beta/")
    {
        trimmed.to_string()
    } else {
        format!("{}/v1beta", trimmed)
    }
}
