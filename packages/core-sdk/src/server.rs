use std::sync::Arc;

use anyhow::Result;
use axum::{
    extract::{Path, State},
    http::{HeaderValue, Method, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::json;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info, warn};

use crate::chat::{complete_chat, ChatError};
use crate::config::Settings;
use crate::models::{ChatRequest, ChatResponse, ErrorResponse};
use crate::providers::get_supported_models_for_provider;

type ApiError = (StatusCode, Json<ErrorResponse>);

/**
 * \brief State shared by every handler: immutable settings and one HTTP client.
 */
#[derive(Debug, Clone)]
pub struct AppState {
    pub settings: Settings,
    pub client: reqwest::Client,
}

impl AppState {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            client: reqwest::Client::new(),
        }
    }
}

/**
 * \brief Builds the API router.
 */
pub fn router(settings: Settings) -> Router {
    let cors = cors_layer(&settings.cors_origins);
    let state = Arc::new(AppState::new(settings));

    Router::new()
        .route("/", get(read_root))
        .route("/api/models", get(get_available_providers))
        .route("/api/models/{provider}", get(get_provider_models))
        .route("/api/chat", post(chat))
        .route("/api/health", get(health_check))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/**
 * \brief Starts the HTTP service.
 * \param addr listen address, e.g. "127.0.0.1:8000"
 */
pub async fn run(addr: &str, settings: Settings) -> Result<()> {
    let app = router(settings);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Server listening on http://{}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(origin = %o, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([axum::http::header::CONTENT_TYPE, axum::http::header::AUTHORIZATION])
        .allow_credentials(true)
}

async fn read_root() -> Json<serde_json::Value> {
    Json(json!({"message": "EventQuill API"}))
}

/**
 * \brief Lists providers that have an API key configured.
 */
async fn get_available_providers(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<&'static str>>, ApiError> {
    let available = state.settings.available_providers();
    if available.is_empty() {
        return Err(api_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "No AI providers are currently configured",
            None,
        ));
    }
    Ok(Json(available))
}

/**
 * \brief Lists the known models of one provider.
 */
async fn get_provider_models(
    Path(provider): Path<String>,
) -> Result<Json<&'static [&'static str]>, ApiError> {
    get_supported_models_for_provider(&provider)
        .map(Json)
        .map_err(|_| {
            api_error(
                StatusCode::NOT_FOUND,
                &format!("Provider {} not found", provider.to_ascii_lowercase()),
                None,
            )
        })
}

/**
 * \brief Chat completion through the configured or requested provider.
 */
async fn chat(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    complete_chat(&state.settings, &state.client, &request)
        .await
        .map(Json)
        .map_err(chat_err)
}

#[derive(Serialize, Debug)]
struct ProvidersConfigured {
    openai: bool,
    gemini: bool,
}

#[derive(Serialize, Debug)]
struct HealthStatus {
    status: &'static str,
    providers_configured: ProvidersConfigured,
    default_provider: String,
}

async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthStatus> {
    let settings = &state.settings;
    Json(HealthStatus {
        status: "healthy",
        providers_configured: ProvidersConfigured {
            openai: !settings.openai_api_key.is_empty(),
            gemini: !settings.gemini_api_key.is_empty(),
        },
        default_provider: settings.default_ai_provider.clone(),
    })
}

fn chat_err(err: ChatError) -> ApiError {
    let status = err.status_code();
    if status.is_server_error() {
        error!(error = %err, "chat completion error");
    } else {
        warn!(error = %err, "chat request rejected");
    }
    api_error(status, &err.to_string(), err.provider())
}

fn api_error(status: StatusCode, detail: &str, provider: Option<&str>) -> ApiError {
    let error = status
        .canonical_reason()
        .unwrap_or("Error")
        .to_string();
    (
        status,
        Json(ErrorResponse {
            error,
            detail: Some(detail.to_string()),
            provider: provider.map(str::to_string),
        }),
    )
}
