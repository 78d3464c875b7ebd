use std::collections::HashMap;
use std::path::Path;

use crate::providers::{ProviderKind, PROVIDER_CONFIG};

pub const DEFAULT_OPENAI_API_BASE: &str = "https://api.openai.com";
pub const DEFAULT_GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_CORS_ORIGIN: &str = "http://localhost:3000";

/**
 * \brief Process-wide service settings, read once at startup.
 */
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /** \brief Provider used when a request does not name one */
    pub default_ai_provider: String,
    pub openai_api_key: String,
    pub gemini_api_key: String,
    pub openai_api_base: String,
    pub gemini_api_base: String,
    /** \brief Origins allowed by the CORS layer */
    pub cors_origins: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_ai_provider: "openai".to_string(),
            openai_api_key: String::new(),
            gemini_api_key: String::new(),
            openai_api_base: DEFAULT_OPENAI_API_BASE.to_string(),
            gemini_api_base: DEFAULT_GEMINI_API_BASE.to_string(),
            cors_origins: vec![DEFAULT_CORS_ORIGIN.to_string()],
        }
    }
}

impl Settings {
    /**
     * \brief Loads settings from environment variables, defaulting what is unset.
     *
     * A `.env` file in the working directory (or a parent) is read first; it
     * never overrides variables already set in the process environment.
     */
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /**
     * \brief Loads settings from a specific env file, process environment first.
     */
    pub fn from_env_file(path: &Path) -> dotenvy::Result<Self> {
        let file = dotenvy::from_path_iter(path)?.collect::<dotenvy::Result<HashMap<_, _>>>()?;
        Ok(Self::from_lookup(|key| {
            std::env::var(key).ok().or_else(|| file.get(key).cloned())
        }))
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let defaults = Self::default();
        Self {
            default_ai_provider: get("EVENTQUILL_DEFAULT_PROVIDER")
                .map(|p| p.to_ascii_lowercase())
                .unwrap_or(defaults.default_ai_provider),
            openai_api_key: get("OPENAI_API_KEY").unwrap_or_default(),
            gemini_api_key: get("GEMINI_API_KEY").unwrap_or_default(),
            openai_api_base: get("OPENAI_API_BASE").unwrap_or(defaults.openai_api_base),
            gemini_api_base: get("GEMINI_API_BASE").unwrap_or(defaults.gemini_api_base),
            cors_origins: get("EVENTQUILL_CORS_ORIGINS")
                .map(|raw| {
                    raw.split(',')
                        .map(str::trim)
                        .filter(|o| !o.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or(defaults.cors_origins),
        }
    }

    /** \brief API key for a provider, `None` when not configured. */
    pub fn api_key_for(&self, kind: ProviderKind) -> Option<&str> {
        let key = match kind {
            ProviderKind::OpenAI => &self.openai_api_key,
            ProviderKind::Gemini => &self.gemini_api_key,
        };
        (!key.is_empty()).then_some(key.as_str())
    }

    pub fn api_base_for(&self, kind: ProviderKind) -> &str {
        match kind {
            ProviderKind::OpenAI => &self.openai_api_base,
            ProviderKind::Gemini => &self.gemini_api_base,
        }
    }

    /** \brief Providers that have an API key, in table order. */
    pub fn available_providers(&self) -> Vec<&'static str> {
        PROVIDER_CONFIG
            .iter()
            .filter(|p| self.api_key_for(p.kind).is_some())
            .map(|p| p.name)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn settings_from(pairs: &[(&str, &str)]) -> Settings {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_env_is_empty() {
        let settings = settings_from(&[]);
        assert_eq!(settings, Settings::default());
        assert!(settings.available_providers().is_empty());
    }

    #[test]
    fn env_values_override_defaults() {
        let settings = settings_from(&[
            ("EVENTQUILL_DEFAULT_PROVIDER", "Gemini"),
            ("GEMINI_API_KEY", "g-key"),
            ("OPENAI_API_KEY", "  "),
            ("GEMINI_API_BASE", "http://127.0.0.1:9000"),
            ("EVENTQUILL_CORS_ORIGINS", "http://a.test, ,http://b.test"),
        ]);
        assert_eq!(settings.default_ai_provider, "gemini");
        assert_eq!(settings.api_key_for(ProviderKind::Gemini), Some("g-key"));
        assert_eq!(settings.api_key_for(ProviderKind::OpenAI), None);
        assert_eq!(settings.api_base_for(ProviderKind::Gemini), "http://127.0.0.1:9000");
        assert_eq!(settings.cors_origins, vec!["http://a.test", "http://b.test"]);
        assert_eq!(settings.available_providers(), vec!["gemini"]);
    }

    #[test]
    fn env_file_values_reach_settings() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# local overrides").unwrap();
        writeln!(file, "EVENTQUILL_CORS_ORIGINS=\"http://dotenv.test\"").unwrap();

        let settings = Settings::from_env_file(file.path()).unwrap();
        if std::env::var("EVENTQUILL_CORS_ORIGINS").is_err() {
            assert_eq!(settings.cors_origins, vec!["http://dotenv.test"]);
        }
    }

    #[test]
    fn missing_env_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Settings::from_env_file(&dir.path().join(".env")).is_err());
    }
}
