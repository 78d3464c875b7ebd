use axum::http::StatusCode;
use thiserror::Error;
use tracing::warn;

/**
 * \brief Static per-provider configuration record.
 */
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProviderProfile {
    pub kind: ProviderKind,
    /** \brief Provider tag as used in requests */
    pub name: &'static str,
    /** \brief Known models; the first entry is the default */
    pub default_models: &'static [&'static str],
    /** \brief Roles the provider API accepts as-is */
    pub supported_roles: &'static [&'static str],
    pub max_temperature: f64,
}

impl ProviderProfile {
    pub fn default_model(&self) -> &'static str {
        self.default_models[0]
    }

    pub fn supports_role(&self, role: &str) -> bool {
        self.supported_roles.contains(&role)
    }

    pub fn knows_model(&self, model: &str) -> bool {
        self.default_models.contains(&model)
    }
}

pub const OPENAI: ProviderProfile = ProviderProfile {
    kind: ProviderKind::OpenAI,
    name: "openai",
    default_models: &["gpt-4o-mini"],
    supported_roles: &["system", "user", "assistant", "function", "tool"],
    max_temperature: 2.0,
};

/// Gemini calls the assistant side `model` and has no system role.
pub const GEMINI: ProviderProfile = ProviderProfile {
    kind: ProviderKind::Gemini,
    name: "gemini",
    default_models: &["gemini-2.0-flash"],
    supported_roles: &["user", "model"],
    max_temperature: 1.0,
};

pub static PROVIDER_CONFIG: [ProviderProfile; 2] = [OPENAI, GEMINI];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    OpenAI,
    Gemini,
}

impl ProviderKind {
    /** \brief Case-insensitive lookup of a provider tag. */
    pub fn parse(provider: &str) -> Option<Self> {
        match provider.trim().to_ascii_lowercase().as_str() {
            "openai" => Some(Self::OpenAI),
            "gemini" => Some(Self::Gemini),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        self.profile().name
    }

    pub fn profile(self) -> &'static ProviderProfile {
        match self {
            Self::OpenAI => &PROVIDER_CONFIG[0],
            Self::Gemini => &PROVIDER_CONFIG[1],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Unsupported provider: {provider}. Supported providers: {supported}")]
    UnsupportedProvider { provider: String, supported: String },
    #[error("Temperature {temperature} exceeds maximum {max} for {provider}")]
    TemperatureTooHigh {
        provider: &'static str,
        temperature: f64,
        max: f64,
    },
    #[error("Temperature {temperature} must be a non-negative number")]
    InvalidTemperature { temperature: f64 },
    #[error("At least one message is required")]
    EmptyMessages,
    #[error("max_tokens must be at least 1")]
    InvalidMaxTokens,
}

impl ValidationError {
    /** \brief Every validation failure is the caller's fault. */
    pub fn status_code(&self) -> StatusCode {
        StatusCode::BAD_REQUEST
    }
}

/**
 * \brief Looks up the profile for a provider tag.
 */
pub fn get_provider_config(provider: &str) -> Result<&'static ProviderProfile, ValidationError> {
    ProviderKind::parse(provider)
        .map(ProviderKind::profile)
        .ok_or_else(|| ValidationError::UnsupportedProvider {
            provider: provider.trim().to_ascii_lowercase(),
            supported: get_supported_providers().join(", "),
        })
}

pub fn get_supported_providers() -> Vec<&'static str> {
    PROVIDER_CONFIG.iter().map(|p| p.name).collect()
}

pub fn is_provider_supported(provider: &str) -> bool {
    ProviderKind::parse(provider).is_some()
}

pub fn get_default_model_for_provider(provider: &str) -> Result<&'static str, ValidationError> {
    get_provider_config(provider).map(ProviderProfile::default_model)
}

pub fn get_supported_models_for_provider(
    provider: &str,
) -> Result<&'static [&'static str], ValidationError> {
    get_provider_config(provider).map(|p| p.default_models)
}

/**
 * \brief Checks provider, temperature and model before a request is forwarded.
 * \return the provider profile on success
 *
 * Unknown models only produce a warning and are forwarded as-is.
 */
pub fn validate_provider_request(
    provider: &str,
    model: Option<&str>,
    temperature: f64,
) -> Result<&'static ProviderProfile, ValidationError> {
    let config = get_provider_config(provider)?;

    if !temperature.is_finite() || temperature < 0.0 {
        return Err(ValidationError::InvalidTemperature { temperature });
    }
    if temperature > config.max_temperature {
        return Err(ValidationError::TemperatureTooHigh {
            provider: config.name,
            temperature,
            max: config.max_temperature,
        });
    }

    if let Some(model) = model.filter(|m| !config.knows_model(m)) {
        warn!(
            provider = config.name,
            model,
            known = ?config.default_models,
            "model not in default models, forwarding as-is"
        );
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_lookup_is_case_insensitive() {
        assert_eq!(ProviderKind::parse("OpenAI"), Some(ProviderKind::OpenAI));
        assert_eq!(ProviderKind::parse(" gemini "), Some(ProviderKind::Gemini));
        assert_eq!(ProviderKind::parse("claude"), None);
        assert_eq!(ProviderKind::Gemini.as_str(), "gemini");
    }

    #[test]
    fn profile_helpers_expose_static_table() {
        assert_eq!(get_supported_providers(), vec!["openai", "gemini"]);
        assert_eq!(get_default_model_for_provider("openai").unwrap(), "gpt-4o-mini");
        assert_eq!(
            get_supported_models_for_provider("GEMINI").unwrap(),
            &["gemini-2.0-flash"]
        );
        assert!(is_provider_supported("Gemini"));
        assert!(!is_provider_supported("unknown"));
        assert!(GEMINI.supports_role("model"));
        assert!(!GEMINI.supports_role("assistant"));
    }

    #[test]
    fn unsupported_provider_is_bad_request() {
        let err = validate_provider_request("claude", None, 0.7).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            err.to_string(),
            "Unsupported provider: claude. Supported providers: openai, gemini"
        );
    }

    #[test]
    fn temperature_is_bounded_per_provider() {
        assert!(validate_provider_request("openai", None, 1.5).is_ok());
        assert!(validate_provider_request("openai", None, 2.0).is_ok());

        let err = validate_provider_request("gemini", None, 1.5).unwrap_err();
        assert_eq!(
            err,
            ValidationError::TemperatureTooHigh {
                provider: "gemini",
                temperature: 1.5,
                max: 1.0,
            }
        );
        assert!(matches!(
            validate_provider_request("openai", None, -0.1),
            Err(ValidationError::InvalidTemperature { .. })
        ));
    }

    #[test]
    fn unknown_model_is_not_fatal() {
        let profile = validate_provider_request("openai", Some("gpt-4-turbo"), 0.7).unwrap();
        assert_eq!(profile.name, "openai");
    }
}
