use serde::{Deserialize, Serialize};

/** \brief Default sampling temperature when a request omits one. */
pub const DEFAULT_TEMPERATURE: f64 = 0.7;

/**
 * \brief Chat message, aligned with the OpenAI chat message shape.
 */
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /** \brief Role: system/user/assistant, or any custom role */
    pub role: String,
    /** \brief Content */
    pub content: String,
}

impl Message {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

/**
 * \brief Body of `POST /api/chat`.
 */
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    /** \brief Conversation so far, oldest first */
    pub messages: Vec<Message>,
    /** \brief Specific model to use; the provider default when absent */
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    /** \brief Provider tag (openai, gemini); the configured default when absent */
    #[serde(default)]
    pub provider: Option<String>,
}

impl ChatRequest {
    pub fn temperature(&self) -> f64 {
        self.temperature.unwrap_or(DEFAULT_TEMPERATURE)
    }
}

/**
 * \brief Reply of `POST /api/chat`; `response` holds a JSON array of strings.
 */
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
    pub provider: String,
    pub model: Option<String>,
    /** \brief Token usage, when the provider reports it */
    pub usage: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub detail: Option<String>,
    pub provider: Option<String>,
}
