use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::ai::{DEFAULT_MODEL, ModelSpec, ProviderKind, resolve_model};
use crate::db::Database;

/// Runtime settings gathered from the environment (and `.env`, if present).
/// CLI flags override individual values after loading.
#[derive(Debug, Clone)]
pub struct Config {
    pub model: String,
    pub openai_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub db_path: PathBuf,
    pub pandoc: String,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            model: optional_env("TAILOR_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            openai_api_key: optional_env("OPENAI_API_KEY"),
            anthropic_api_key: optional_env("ANTHROPIC_API_KEY"),
            db_path: optional_env("TAILOR_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(Database::default_path),
            pandoc: optional_env("TAILOR_PANDOC").unwrap_or_else(|| "pandoc".to_string()),
            rust_log: optional_env("RUST_LOG").unwrap_or_else(|| "tailor=info".to_string()),
        }
    }

    pub fn model_spec(&self) -> Result<ModelSpec> {
        resolve_model(&self.model)
    }

    /// API key matching the configured model's provider.
    pub fn api_key_for(&self, spec: &ModelSpec) -> Result<String> {
        let key = match spec.provider {
            ProviderKind::Anthropic => self.anthropic_api_key.clone(),
            ProviderKind::OpenAI => self.openai_api_key.clone(),
        };
        key.with_context(|| {
            format!(
                "{} is not set. Set it with: export {}=your-key-here",
                spec.api_key_var(),
                spec.api_key_var()
            )
        })
    }
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config {
            model: "api-sonnet".to_string(),
            openai_api_key: Some("openai-key".to_string()),
            anthropic_api_key: None,
            db_path: PathBuf::from("tailor.db"),
            pandoc: "pandoc".to_string(),
            rust_log: "info".to_string(),
        }
    }

    #[test]
    fn test_api_key_for_matches_provider() {
        let mut config = config();
        let openai = resolve_model("gpt-4o").unwrap();
        assert_eq!(config.api_key_for(&openai).unwrap(), "openai-key");

        let anthropic = config.model_spec().unwrap();
        let err = config.api_key_for(&anthropic).unwrap_err();
        assert!(err.to_string().contains("ANTHROPIC_API_KEY"));

        config.anthropic_api_key = Some("anthropic-key".to_string());
        assert_eq!(config.api_key_for(&anthropic).unwrap(), "anthropic-key");
    }

    #[test]
    fn test_unknown_model_is_rejected() {
        let mut config = config();
        config.model = "gpt-2".to_string();
        assert!(config.model_spec().is_err());
    }
}
