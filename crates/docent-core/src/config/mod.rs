use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::DocentError;

/// Overrides `backend.base_url` when set.
pub const BACKEND_URL_ENV: &str = "DOCENT_BACKEND_URL";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub backend: BackendSettings,
    #[serde(default)]
    pub session: SessionSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendSettings {
    pub base_url: String,
    pub transport: TransportMode,
    #[serde(default = "default_graphql_path")]
    pub graphql_path: String,
    #[serde(default = "default_stream_path")]
    pub stream_path: String,
    /// Query parameter carrying the question on the streaming endpoint.
    #[serde(default = "default_prompt_param")]
    pub prompt_param: String,
    pub request_timeout_secs: Option<u64>,
    pub stream_idle_timeout_secs: Option<u64>,
}

/// How questions reach the backend. Chosen by configuration, never by
/// the content of a question.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransportMode {
    #[default]
    Batch,
    Stream,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionSettings {
    /// Unset keeps every follow-up exchange.
    pub max_history_entries: Option<usize>,
}

fn default_graphql_path() -> String {
    "/graphql".to_string()
}

fn default_stream_path() -> String {
    "/ask-llm".to_string()
}

fn default_prompt_param() -> String {
    "prompt".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            backend: BackendSettings {
                base_url: "http://127.0.0.1:8000".to_string(),
                transport: TransportMode::Batch,
                graphql_path: default_graphql_path(),
                stream_path: default_stream_path(),
                prompt_param: default_prompt_param(),
                request_timeout_secs: Some(60),
                stream_idle_timeout_secs: Some(60),
            },
            session: SessionSettings::default(),
        }
    }
}

impl BackendSettings {
    pub fn graphql_url(&self) -> String {
        join_url(&self.base_url, &self.graphql_path)
    }

    pub fn stream_url(&self) -> String {
        join_url(&self.base_url, &self.stream_path)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    pub fn stream_idle_timeout(&self) -> Option<Duration> {
        self.stream_idle_timeout_secs.map(Duration::from_secs)
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

impl Settings {
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("docent")
            .join("config.toml")
    }

    /// Load from the default location, falling back to defaults, then apply
    /// the environment override.
    pub fn load() -> Self {
        let config_path = Self::config_path();
        let mut settings = if config_path.exists() {
            Self::load_from(&config_path).unwrap_or_else(|e| {
                tracing::warn!("Ignoring unreadable config {}: {e}", config_path.display());
                Self::default()
            })
        } else {
            Self::default()
        };
        settings.apply_env();
        settings
    }

    pub fn load_from(path: &Path) -> Result<Self, DocentError> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| DocentError::Config(e.to_string()))
    }

    pub fn save(&self) -> Result<(), DocentError> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), DocentError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| DocentError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    fn apply_env(&mut self) {
        if let Ok(url) = std::env::var(BACKEND_URL_ENV) {
            let url = url.trim();
            if !url.is_empty() {
                self.backend.base_url = url.to_string();
            }
        }
    }

    pub fn validate(&self) -> Result<(), DocentError> {
        let base_url = &self.backend.base_url;
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(DocentError::Config(format!(
                "backend.base_url must start with http:// or https:// (got {base_url:?})"
            )));
        }
        if !matches!(self.backend.prompt_param.as_str(), "prompt" | "query") {
            return Err(DocentError::Config(format!(
                "backend.prompt_param must be \"prompt\" or \"query\" (got {:?})",
                self.backend.prompt_param
            )));
        }
        if self.session.max_history_entries == Some(0) {
            return Err(DocentError::Config(
                "session.max_history_entries must be at least 1 when set".into(),
            ));
        }
        Ok(())
    }
}
