//! LLM integration.
//!
//! Two interchangeable backends sit behind [`LlmProvider`]:
//! - **Sdk**: rig-core's Groq client (`RigAdapter`)
//! - **Http**: direct `reqwest` calls to the OpenAI-compatible endpoint (`HttpProvider`)
//!
//! The backend is chosen once in [`create_provider`]; nothing downstream
//! knows which one is active.

pub mod http;
pub mod provider;
mod rig_adapter;

pub use http::HttpProvider;
pub use provider::*;
pub use rig_adapter::RigAdapter;

use std::str::FromStr;
use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};

use crate::config::{env_opt, env_or};
use crate::error::{ConfigError, Error};

const DEFAULT_MODEL: &str = "llama-3.1-8b-instant";
const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";

/// Supported LLM backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmBackend {
    Sdk,
    Http,
}

impl FromStr for LlmBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sdk" | "rig" => Ok(Self::Sdk),
            "http" | "direct" => Ok(Self::Http),
            other => Err(format!("unknown backend '{other}' (expected sdk or http)")),
        }
    }
}

/// Configuration for creating an LLM provider.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub backend: LlmBackend,
    pub api_key: SecretString,
    pub model: String,
    /// Base URL for the HTTP backend.
    pub base_url: String,
    /// Sampling temperature for reply generation.
    pub reply_temperature: f32,
    /// Token cap for reply generation.
    pub reply_max_tokens: u32,
}

impl LlmConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            backend: env_or("LLM_BACKEND", LlmBackend::Sdk)?,
            api_key: SecretString::from(env_opt("GROQ_API_KEY").unwrap_or_default()),
            model: env_opt("GROQ_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url: env_opt("GROQ_API_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            reply_temperature: env_or("REPLY_TEMPERATURE", 0.7)?,
            reply_max_tokens: env_or("REPLY_MAX_TOKENS", 500)?,
        })
    }
}

/// Create an LLM provider from configuration.
///
/// The SDK backend degrades to the HTTP backend when its client cannot be
/// constructed.
pub fn create_provider(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>, Error> {
    if config.api_key.expose_secret().is_empty() {
        return Err(ConfigError::MissingEnvVar("GROQ_API_KEY".to_string()).into());
    }

    match config.backend {
        LlmBackend::Sdk => match RigAdapter::groq(config.api_key.expose_secret(), &config.model) {
            Ok(adapter) => {
                tracing::info!("Using Groq SDK client (model: {})", config.model);
                Ok(Arc::new(adapter))
            }
            Err(e) => {
                tracing::warn!(error = %e, "Groq SDK client unavailable, falling back to direct API calls");
                Ok(create_http_provider(config))
            }
        },
        LlmBackend::Http => Ok(create_http_provider(config)),
    }
}

fn create_http_provider(config: &LlmConfig) -> Arc<dyn LlmProvider> {
    tracing::info!(
        "Using direct chat-completions API at {} (model: {})",
        config.base_url,
        config.model
    );
    Arc::new(HttpProvider::new(
        &config.base_url,
        config.api_key.clone(),
        &config.model,
    ))
}
