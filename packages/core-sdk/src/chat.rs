use axum::http::StatusCode;
use thiserror::Error;
use tracing::{debug, info};

use crate::cleanup::clean_ai_response;
use crate::config::Settings;
use crate::llm::{get_ai_service, ChatOptions};
use crate::models::{ChatRequest, ChatResponse};
use crate::normalize::normalize_messages_for_provider;
use crate::providers::{validate_provider_request, ValidationError};
use crate::telemetry::preview;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Provider {provider} is not configured")]
    NotConfigured { provider: &'static str },
    #[error("AI API error from {provider}: {source:#}")]
    Provider {
        provider: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

impl ChatError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(err) => err.status_code(),
            Self::NotConfigured { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::Provider { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn provider(&self) -> Option<&'static str> {
        match self {
            Self::Validation(ValidationError::TemperatureTooHigh { provider, .. }) => {
                Some(*provider)
            }
            Self::Validation(_) => None,
            Self::NotConfigured { provider } | Self::Provider { provider, .. } => Some(*provider),
        }
    }
}

/**
 * \brief Runs one chat request end to end.
 *
 * validate -> normalize roles -> provider call -> clean reply.
 * The provider is `request.provider`, or the configured default.
 */
pub async fn complete_chat(
    settings: &Settings,
    client: &reqwest::Client,
    request: &ChatRequest,
) -> Result<ChatResponse, ChatError> {
    let provider = request
        .provider
        .as_deref()
        .unwrap_or(settings.default_ai_provider.as_str());
    let temperature = request.temperature();

    let profile = validate_provider_request(provider, request.model.as_deref(), temperature)?;
    if request.messages.is_empty() {
        return Err(ValidationError::EmptyMessages.into());
    }
    if request.max_tokens == Some(0) {
        return Err(ValidationError::InvalidMaxTokens.into());
    }
    let provider = profile.name;
    if settings.api_key_for(profile.kind).is_none() {
        return Err(ChatError::NotConfigured { provider });
    }

    let service = get_ai_service(provider, settings, client.clone())
        .map_err(|source| ChatError::Provider { provider, source })?;

    let messages = normalize_messages_for_provider(&request.messages, provider);
    info!(provider, messages = messages.len(), "sending chat request");

    let options = ChatOptions {
        messages,
        model: request.model.clone(),
        temperature,
        max_tokens: request.max_tokens,
    };
    let completion = service
        .chat_completion(&options)
        .await
        .map_err(|source| ChatError::Provider { provider, source })?;

    let cleaned = clean_ai_response(&completion.text, provider);
    info!(provider, chars = cleaned.len(), "received response");
    debug!(provider, cleaned = %preview(&cleaned), "cleaned response");

    Ok(ChatResponse {
        response: cleaned,
        provider: provider.to_string(),
        model: request.model.clone(),
        usage: completion.usage,
    })
}
