//! Configuration system (layered: defaults < config file < env < code).

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::SwarmError;

/// Base URL of the hosted OpenAI API.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

const DEFAULT_TIMEOUT_SECS: u64 = 120;
const DEFAULT_MAX_RETRIES: u32 = 3;

/// Settings shared by the gateway and the turn loop.
///
/// Resolution order, later wins:
/// 1. Built-in defaults
/// 2. TOML file (`SWARMKIT_CONFIG`, else the platform config dir)
/// 3. Environment (`OPENAI_API_KEY`, `OPENAI_BASE_URL`, `SWARMKIT_*`, `.env`)
/// 4. Setters called in code
#[derive(Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct SwarmConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    /// Model used when an agent leaves its own model blank.
    pub default_model: Option<String>,
    pub request_timeout_secs: u64,
    /// Attempts beyond the first for retryable gateway failures.
    pub max_retries: u32,
    pub debug: bool,
}

impl Default for SwarmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            default_model: None,
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
            debug: false,
        }
    }
}

impl std::fmt::Debug for SwarmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SwarmConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("default_model", &self.default_model)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("debug", &self.debug)
            .finish()
    }
}

impl SwarmConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Full resolution: defaults, then the config file if one exists, then env.
    pub fn load() -> Result<Self, SwarmError> {
        let _ = dotenvy::dotenv();
        let mut config = match Self::config_path() {
            Some(path) if path.is_file() => Self::from_file(&path)?,
            _ => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Defaults overlaid with the environment only.
    pub fn from_env() -> Result<Self, SwarmError> {
        let _ = dotenvy::dotenv();
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Parse a TOML file. Missing keys keep their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SwarmError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text).map_err(|e| {
            SwarmError::Configuration(format!("{}: {e}", path.display()))
        })
    }

    pub fn from_toml_str(text: &str) -> Result<Self, SwarmError> {
        toml::from_str(text).map_err(|e| SwarmError::Configuration(e.to_string()))
    }

    /// `SWARMKIT_CONFIG` if set, else `<config dir>/swarmkit/config.toml`.
    pub fn config_path() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("SWARMKIT_CONFIG") {
            return Some(PathBuf::from(path));
        }
        directories::ProjectDirs::from("", "", "swarmkit")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Overlay values from `lookup`. Exposed so callers can layer a custom
    /// source; `load` and `from_env` pass the process environment.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), SwarmError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("OPENAI_API_KEY").filter(|k| !k.is_empty()) {
            self.api_key = Some(key);
        }
        if let Some(url) = lookup("OPENAI_BASE_URL").filter(|u| !u.is_empty()) {
            self.base_url = url;
        }
        if let Some(model) = lookup("SWARMKIT_MODEL").filter(|m| !m.is_empty()) {
            self.default_model = Some(model);
        }
        if let Some(secs) = lookup("SWARMKIT_TIMEOUT_SECS") {
            self.request_timeout_secs = parse_env("SWARMKIT_TIMEOUT_SECS", &secs)?;
        }
        if let Some(retries) = lookup("SWARMKIT_MAX_RETRIES") {
            self.max_retries = parse_env("SWARMKIT_MAX_RETRIES", &retries)?;
        }
        if let Some(debug) = lookup("SWARMKIT_DEBUG") {
            self.debug = is_truthy(&debug);
        }
        Ok(())
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = Some(model.into());
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_secs = timeout.as_secs().max(1);
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, SwarmError> {
    value
        .trim()
        .parse()
        .map_err(|_| SwarmError::Configuration(format!("{name} has an invalid value: {value}")))
}

pub(crate) fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn toml_overrides_only_named_keys() {
        let config = SwarmConfig::from_toml_str(
            r#"
            base_url = "http://localhost:8080/v1"
            max_retries = 0
            "#,
        )
        .expect("parse");
        assert_eq!(config.base_url, "http://localhost:8080/v1");
        assert_eq!(config.max_retries, 0);
        assert_eq!(config.request_timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert!(config.api_key.is_none());
    }

    #[test]
    fn env_overlays_file_values() {
        let mut config = SwarmConfig::from_toml_str("default_model = \"gpt-4o-mini\"").expect("parse");
        let env: HashMap<&str, &str> = [
            ("OPENAI_API_KEY", "sk-test"),
            ("SWARMKIT_MODEL", "gpt-4.1"),
            ("SWARMKIT_DEBUG", "true"),
        ]
        .into_iter()
        .collect();
        config
            .apply_env(|key| env.get(key).map(|v| v.to_string()))
            .expect("apply");
        assert_eq!(config.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.default_model.as_deref(), Some("gpt-4.1"));
        assert!(config.debug);
    }

    #[test]
    fn invalid_numeric_env_is_a_configuration_error() {
        let mut config = SwarmConfig::default();
        let err = config
            .apply_env(|key| (key == "SWARMKIT_TIMEOUT_SECS").then(|| "soon".to_string()))
            .expect_err("must fail");
        assert!(matches!(err, SwarmError::Configuration(_)));
    }

    #[test]
    fn debug_output_redacts_the_key() {
        let config = SwarmConfig::default().with_api_key("sk-secret");
        assert!(!format!("{config:?}").contains("sk-secret"));
    }
}
