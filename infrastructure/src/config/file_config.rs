//! Raw TOML configuration data types
//!
//! These structs mirror the exact structure of `crossbar.toml`. They are
//! deserialized directly; conversion helpers hand typed settings to the
//! layers that consume them.

use crossbar_application::ExecutionParams;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Complete file configuration (raw TOML structure)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// Bind addresses
    pub server: FileServerConfig,
    /// LLM provider settings
    pub llm: FileLlmConfig,
    /// Orchestration and lifecycle limits
    pub limits: FileLimitsConfig,
    /// Telegram transport settings
    pub telegram: FileTelegramConfig,
    /// Web endpoint authentication
    pub auth: FileAuthConfig,
    /// Transcript logging
    pub log: FileLogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileServerConfig {
    /// Address the HTTP transports (web + webhook) listen on
    pub http_bind: String,
    /// Address tool backends connect to
    pub bots_bind: String,
}

impl Default for FileServerConfig {
    fn default() -> Self {
        Self {
            http_bind: "127.0.0.1:8080".to_string(),
            bots_bind: "127.0.0.1:8081".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileLlmConfig {
    /// OpenAI-compatible base URL
    pub endpoint: String,
    /// Bearer token; prefer supplying via CROSSBAR_LLM__API_KEY
    pub api_key: String,
    pub model: String,
    /// Optional system preamble for every conversation
    pub system_prompt: Option<String>,
    pub request_timeout_secs: u64,
}

impl Default for FileLlmConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:11434/v1".to_string(),
            api_key: String::new(),
            model: "llama3".to_string(),
            system_prompt: None,
            request_timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileLimitsConfig {
    /// Ceiling on LLM/tool cycles per user message
    pub max_steps: u32,
    /// Deadline for each tool call, in seconds
    pub tool_timeout_secs: u64,
    /// Conversations idle longer than this are evicted, in seconds
    pub idle_eviction_secs: u64,
    /// How often the eviction sweep runs, in seconds
    pub sweep_period_secs: u64,
}

impl Default for FileLimitsConfig {
    fn default() -> Self {
        Self {
            max_steps: 8,
            tool_timeout_secs: 30,
            idle_eviction_secs: 3600,
            sweep_period_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileTelegramConfig {
    pub enabled: bool,
    pub bot_token: String,
    /// Value expected in X-Telegram-Bot-Api-Secret-Token
    pub webhook_secret: String,
    /// Bot API base URL, overridable for tests
    pub api_base: String,
}

impl Default for FileTelegramConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bot_token: String::new(),
            webhook_secret: String::new(),
            api_base: crate::telegram::DEFAULT_API_BASE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileAuthConfig {
    /// Keys accepted in X-Api-Key on the web endpoint; empty disables the check
    pub api_keys: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileLogConfig {
    /// JSONL transcript path; unset disables transcript logging
    pub transcript_path: Option<String>,
}

/// Severity of a configuration issue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

/// One detected configuration problem
#[derive(Debug, Clone)]
pub struct ConfigIssue {
    pub severity: Severity,
    pub message: String,
}

impl ConfigIssue {
    fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            message: message.into(),
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
        }
    }
}

impl FileConfig {
    /// Validate the configuration, returning all detected issues.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        if self.limits.max_steps == 0 {
            issues.push(ConfigIssue::warning(
                "limits.max_steps is 0; every message would be cut off immediately",
            ));
        }
        if self.limits.tool_timeout_secs == 0 {
            issues.push(ConfigIssue::warning(
                "limits.tool_timeout_secs is 0; every tool call would time out",
            ));
        }
        if self.limits.sweep_period_secs == 0 {
            issues.push(ConfigIssue::warning(
                "limits.sweep_period_secs is 0; the sweep runs at the 1s minimum",
            ));
        }
        if self.telegram.enabled {
            if self.telegram.bot_token.is_empty() {
                issues.push(ConfigIssue::error(
                    "telegram.enabled is set but telegram.bot_token is empty",
                ));
            }
            if self.telegram.webhook_secret.is_empty() {
                issues.push(ConfigIssue::warning(
                    "telegram.webhook_secret is empty; webhook updates are unauthenticated",
                ));
            }
        }
        if self.llm.endpoint.is_empty() {
            issues.push(ConfigIssue::error("llm.endpoint is empty"));
        }

        issues
    }

    /// Orchestration limits in typed form.
    pub fn execution_params(&self) -> ExecutionParams {
        ExecutionParams::new(
            self.limits.max_steps,
            Duration::from_secs(self.limits.tool_timeout_secs),
        )
    }

    pub fn idle_eviction(&self) -> Duration {
        Duration::from_secs(self.limits.idle_eviction_secs)
    }

    pub fn sweep_period(&self) -> Duration {
        // a zero interval would panic in the sweeper
        Duration::from_secs(self.limits.sweep_period_secs.max(1))
    }

    /// Provider settings in typed form.
    pub fn llm_settings(&self) -> crate::llm::LlmSettings {
        crate::llm::LlmSettings {
            endpoint: self.llm.endpoint.clone(),
            api_key: self.llm.api_key.clone(),
            model: self.llm.model.clone(),
            system_prompt: self.llm.system_prompt.clone(),
            request_timeout: Duration::from_secs(self.llm.request_timeout_secs),
        }
    }
}
