//! Configuration types.
//!
//! Everything is read once from the environment (optionally seeded from a
//! `.env` file by the binary) into an [`AppConfig`], whose sections are
//! handed by reference to the component that needs them.

use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::channels::gmail::GmailConfig;
use crate::error::ConfigError;
use crate::llm::LlmConfig;

/// Agent loop configuration.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Upper bound on messages requested from the gateway per pass.
    pub max_emails: u32,
    /// Sender address that always classifies as BUSINESS (case-insensitive substring).
    pub trusted_sender: Option<String>,
    /// Where the processed-id set lives.
    pub processed_path: PathBuf,
    /// Courtesy delay between candidates within a pass.
    pub message_delay: Duration,
    /// Fallback wait after a failed pass in monitor mode.
    pub monitor_retry: Duration,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_emails: 10,
            trusted_sender: None,
            processed_path: PathBuf::from("processed_messages.json"),
            message_delay: Duration::from_secs(2),
            monitor_retry: Duration::from_secs(60),
        }
    }
}

impl AgentConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            max_emails: env_or("MAX_EMAILS_TO_PROCESS", defaults.max_emails)?,
            trusted_sender: env_opt("TRUSTED_SENDER"),
            processed_path: env_opt("PROCESSED_MESSAGES_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.processed_path),
            message_delay: Duration::from_secs(env_or(
                "MESSAGE_DELAY_SECS",
                defaults.message_delay.as_secs(),
            )?),
            monitor_retry: Duration::from_secs(env_or(
                "MONITOR_RETRY_SECS",
                defaults.monitor_retry.as_secs(),
            )?),
        })
    }
}

/// Log output configuration.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
    /// Log file path; its parent directory holds the rolling files.
    pub file: PathBuf,
}

impl LoggingConfig {
    pub fn from_env() -> Self {
        Self {
            level: env_opt("LOG_LEVEL")
                .map(|l| l.to_lowercase())
                .unwrap_or_else(|| "info".to_string()),
            file: env_opt("LOG_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("logs/gmail_agent.log")),
        }
    }
}

/// Full process configuration, constructed once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub agent: AgentConfig,
    pub gmail: GmailConfig,
    pub llm: LlmConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            agent: AgentConfig::from_env()?,
            gmail: GmailConfig::from_env(),
            llm: LlmConfig::from_env()?,
            logging: LoggingConfig::from_env(),
        })
    }
}

/// Read a non-empty environment variable.
pub(crate) fn env_opt(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse an environment variable, falling back to `default` when unset.
///
/// A value that is present but unparsable is an error rather than a silent default.
pub(crate) fn env_or<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    match env_opt(key) {
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("{raw:?}: {e}"),
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agent_defaults_match_documented_values() {
        let config = AgentConfig::default();
        assert_eq!(config.max_emails, 10);
        assert!(config.trusted_sender.is_none());
        assert_eq!(config.message_delay, Duration::from_secs(2));
        assert_eq!(config.monitor_retry, Duration::from_secs(60));
    }

    #[test]
    fn env_or_uses_default_when_unset() {
        let value: u32 = env_or("MAIL_RESPONDER_TEST_UNSET_VAR", 42).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn env_or_rejects_garbage() {
        // SAFETY: the variable name is unique to this test.
        unsafe { std::env::set_var("MAIL_RESPONDER_TEST_BAD_NUMBER", "ten") };
        let result: Result<u32, _> = env_or("MAIL_RESPONDER_TEST_BAD_NUMBER", 10);
        match result {
            Err(ConfigError::InvalidValue { key, .. }) => {
                assert_eq!(key, "MAIL_RESPONDER_TEST_BAD_NUMBER")
            }
            other => panic!("Expected InvalidValue, got {:?}", other),
        }
    }

    #[test]
    fn env_opt_treats_blank_as_unset() {
        // SAFETY: the variable name is unique to this test.
        unsafe { std::env::set_var("MAIL_RESPONDER_TEST_BLANK", "   ") };
        assert!(env_opt("MAIL_RESPONDER_TEST_BLANK").is_none());
    }
}
