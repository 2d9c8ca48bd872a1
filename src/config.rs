//! Configuration and settings management
//!
//! Loads settings from environment variables and the two declarative
//! crew documents (`agents.yaml`, `tasks.yaml`).

use config::{Config, Environment};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// Default per-user request limit within the rate-limit window
pub const DEFAULT_RATE_LIMIT_MAX_REQUESTS: usize = 5;
/// Default rate-limit window in seconds
pub const DEFAULT_RATE_LIMIT_WINDOW_SECS: u64 = 60;

/// Errors raised during startup configuration. All of these are fatal:
/// the process reports them once and exits.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying error from the config loader
    #[error("configuration error: {0}")]
    Load(#[from] config::ConfigError),
    /// No LLM provider credential found
    #[error("no LLM API key configured (set OPENROUTER_API_KEY, GROQ_API_KEY or OPENAI_API_KEY)")]
    MissingLlmKey,
    /// Bot entry point started without a Telegram token
    #[error("TELEGRAM_BOT_TOKEN is not set (get one from @BotFather)")]
    MissingBotToken,
    /// Crew YAML document missing or unreadable
    #[error("cannot read crew config {path}: {source}")]
    CrewRead {
        /// Path that failed to load
        path: String,
        /// Underlying I/O error
        source: std::io::Error,
    },
    /// Crew YAML document failed to parse
    #[error("invalid YAML in {path}: {source}")]
    CrewParse {
        /// Path that failed to parse
        path: String,
        /// Underlying parse error
        source: serde_yaml::Error,
    },
    /// Crew YAML document parsed but a required entry is absent
    #[error("crew config {path} is missing required entry '{entry}'")]
    CrewIncomplete {
        /// Path of the offending document
        path: String,
        /// Name of the missing agent or task
        entry: String,
    },
}

/// Application settings loaded from environment variables
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Telegram Bot API token (required only by the bot entry point)
    pub telegram_bot_token: Option<String>,

    /// `OpenRouter` API key
    pub openrouter_api_key: Option<String>,
    /// Groq API key
    pub groq_api_key: Option<String>,
    /// `OpenAI` API key
    pub openai_api_key: Option<String>,

    /// Max admitted submissions per user within the window
    #[serde(default = "default_rate_limit_max_requests")]
    pub rate_limit_max_requests: usize,
    /// Rate-limit window length in seconds
    #[serde(default = "default_rate_limit_window_secs")]
    pub rate_limit_window_secs: u64,
}

const fn default_rate_limit_max_requests() -> usize {
    DEFAULT_RATE_LIMIT_MAX_REQUESTS
}

const fn default_rate_limit_window_secs() -> u64 {
    DEFAULT_RATE_LIMIT_WINDOW_SECS
}

impl Settings {
    /// Create new settings by loading from the environment
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading or deserialization fails.
    pub fn new() -> Result<Self, ConfigError> {
        let s = Config::builder()
            // Environment::default() auto-converts UPPER_SNAKE_CASE to snake_case;
            // ignore_empty treats empty env vars as unset
            .add_source(Environment::default().ignore_empty(true))
            .build()?;

        Ok(s.try_deserialize()?)
    }

    /// Validate that at least one LLM provider credential is present
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingLlmKey` when no key is configured.
    pub fn require_llm_key(&self) -> Result<(), ConfigError> {
        if self.openrouter_api_key.is_none()
            && self.groq_api_key.is_none()
            && self.openai_api_key.is_none()
        {
            return Err(ConfigError::MissingLlmKey);
        }
        Ok(())
    }

    /// Return the Telegram token, failing fast if absent
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingBotToken` when the token is not set.
    pub fn require_bot_token(&self) -> Result<&str, ConfigError> {
        self.telegram_bot_token
            .as_deref()
            .ok_or(ConfigError::MissingBotToken)
    }
}

/// Prompt configuration for one crew agent
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AgentSpec {
    /// Short role line, e.g. "Senior QA Engineer"
    pub role: String,
    /// What the agent is trying to achieve
    pub goal: String,
    /// Persona text prepended to the system prompt
    pub backstory: String,
}

/// Prompt configuration for one crew task
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TaskSpec {
    /// Task description with `{placeholder}` slots
    pub description: String,
    /// Template describing the expected output shape
    pub expected_output: String,
}

/// The two declarative crew documents, loaded at startup and treated as
/// opaque prompt parameters by everything except the crew itself.
#[derive(Debug, Clone)]
pub struct CrewConfig {
    /// Agent name -> prompt spec
    pub agents: HashMap<String, AgentSpec>,
    /// Task name -> prompt spec
    pub tasks: HashMap<String, TaskSpec>,
}

/// Agents the crew requires to be present in `agents.yaml`
pub const REQUIRED_AGENTS: &[&str] = &["code_analyzer_agent", "qa_test_agent", "test_validator_agent"];
/// Tasks the crew requires to be present in `tasks.yaml`
pub const REQUIRED_TASKS: &[&str] = &["analyze_code_task", "write_tests_task", "validate_tests_task"];

impl CrewConfig {
    /// Load and validate the crew documents from a config directory
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if either document is unreadable, fails to
    /// parse, or lacks a required agent/task entry.
    pub fn load(config_dir: &Path) -> Result<Self, ConfigError> {
        let agents: HashMap<String, AgentSpec> = load_yaml(&config_dir.join("agents.yaml"))?;
        let tasks: HashMap<String, TaskSpec> = load_yaml(&config_dir.join("tasks.yaml"))?;

        for name in REQUIRED_AGENTS {
            if !agents.contains_key(*name) {
                return Err(ConfigError::CrewIncomplete {
                    path: config_dir.join("agents.yaml").display().to_string(),
                    entry: (*name).to_string(),
                });
            }
        }
        for name in REQUIRED_TASKS {
            if !tasks.contains_key(*name) {
                return Err(ConfigError::CrewIncomplete {
                    path: config_dir.join("tasks.yaml").display().to_string(),
                    entry: (*name).to_string(),
                });
            }
        }

        Ok(Self { agents, tasks })
    }

    /// Returns the agent spec for `name`
    ///
    /// # Panics
    ///
    /// Never panics after a successful `load`, which guarantees all
    /// required entries exist.
    #[must_use]
    pub fn agent(&self, name: &str) -> &AgentSpec {
        &self.agents[name]
    }

    /// Returns the task spec for `name`
    #[must_use]
    pub fn task(&self, name: &str) -> &TaskSpec {
        &self.tasks[name]
    }
}

fn load_yaml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::CrewRead {
        path: path.display().to_string(),
        source,
    })?;
    serde_yaml::from_str(&text).map_err(|source| ConfigError::CrewParse {
        path: path.display().to_string(),
        source,
    })
}

/// Information about an LLM model used by a provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Provider-side model identifier
    pub id: &'static str,
    /// Maximum allowed output tokens
    pub max_tokens: u32,
}

/// Default model for the `OpenRouter` provider
pub const OPENROUTER_MODEL: ModelInfo = ModelInfo {
    id: "google/gemini-2.5-flash",
    max_tokens: 16384,
};

/// Default model for the Groq provider
pub const GROQ_MODEL: ModelInfo = ModelInfo {
    id: "llama-3.3-70b-versatile",
    max_tokens: 8192,
};

/// Default model for the `OpenAI` provider
pub const OPENAI_MODEL: ModelInfo = ModelInfo {
    id: "gpt-4o-mini",
    max_tokens: 16384,
};
