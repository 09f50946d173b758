// Provider settings read from the environment

use anyhow::{Context, Result};
use ragloop_core::{AgentConfig, ProviderConfig, TavilySearch};

/// Credentials and model defaults for the CLI
#[derive(Clone, Default)]
pub struct ProviderSettings {
    pub openai_api_key: Option<String>,
    pub openai_base_url: Option<String>,
    pub model: Option<String>,
    pub max_iterations: Option<usize>,
    pub tavily_api_key: Option<String>,
}

impl ProviderSettings {
    /// Read settings from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through a variable lookup. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let max_iterations = get("RAGLOOP_MAX_ITERATIONS")
            .map(|v| v.trim().parse::<usize>())
            .transpose()
            .context("RAGLOOP_MAX_ITERATIONS must be a non-negative integer")?;

        Ok(Self {
            openai_api_key: get("OPENAI_API_KEY"),
            openai_base_url: get("OPENAI_BASE_URL"),
            model: get("RAGLOOP_MODEL"),
            max_iterations,
            tavily_api_key: get("TAVILY_API_KEY"),
        })
    }

    /// Agent configuration with command-line overrides applied
    pub fn agent_config(&self, model: Option<String>, max_iterations: Option<usize>) -> AgentConfig {
        let mut config = AgentConfig::default();
        if let Some(model) = model.or_else(|| self.model.clone()) {
            config.model = model;
        }
        if let Some(max) = max_iterations.or(self.max_iterations) {
            config.max_iterations = max;
        }
        config
    }

    pub fn provider_config(&self) -> ProviderConfig {
        let mut provider = ProviderConfig::new();
        if let Some(key) = &self.openai_api_key {
            provider = provider.with_api_key(key.clone());
        }
        if let Some(url) = &self.openai_base_url {
            provider = provider.with_base_url(url.clone());
        }
        provider
    }

    /// Web search client, when a Tavily key is configured
    pub fn web_search(&self) -> Option<TavilySearch> {
        TavilySearch::from_key(self.tavily_api_key.as_deref())
    }
}

impl std::fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderSettings")
            .field("openai_api_key", &self.openai_api_key.as_ref().map(|_| "[REDACTED]"))
            .field("openai_base_url", &self.openai_base_url)
            .field("model", &self.model)
            .field("max_iterations", &self.max_iterations)
            .field("tavily_api_key", &self.tavily_api_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_reads_all_variables() {
        let settings = ProviderSettings::from_lookup(lookup(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("OPENAI_BASE_URL", "http://localhost:8080/v1/chat/completions"),
            ("RAGLOOP_MODEL", "gpt-4.1-nano"),
            ("RAGLOOP_MAX_ITERATIONS", "5"),
            ("TAVILY_API_KEY", "tvly-test"),
        ]))
        .unwrap();

        assert_eq!(settings.openai_api_key.as_deref(), Some("sk-test"));
        assert_eq!(settings.max_iterations, Some(5));
        assert!(settings.web_search().is_some());

        let config = settings.agent_config(None, None);
        assert_eq!(config.model, "gpt-4.1-nano");
        assert_eq!(config.max_iterations, 5);
    }

    #[test]
    fn test_flags_override_environment() {
        let settings =
            ProviderSettings::from_lookup(lookup(&[("RAGLOOP_MODEL", "gpt-4.1-nano")])).unwrap();
        let config = settings.agent_config(Some("gpt-4o".into()), Some(1));
        assert_eq!(config.model, "gpt-4o");
        assert_eq!(config.max_iterations, 1);
    }

    #[test]
    fn test_blank_values_are_unset() {
        let settings = ProviderSettings::from_lookup(lookup(&[
            ("OPENAI_API_KEY", "  "),
            ("TAVILY_API_KEY", ""),
        ]))
        .unwrap();
        assert!(settings.openai_api_key.is_none());
        assert!(settings.web_search().is_none());
        assert_eq!(settings.agent_config(None, None).max_iterations, 3);
    }

    #[test]
    fn test_invalid_max_iterations() {
        let result =
            ProviderSettings::from_lookup(lookup(&[("RAGLOOP_MAX_ITERATIONS", "many")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_debug_redacts_keys() {
        let settings =
            ProviderSettings::from_lookup(lookup(&[("OPENAI_API_KEY", "sk-secret")])).unwrap();
        assert!(!format!("{:?}", settings).contains("sk-secret"));
    }
}
