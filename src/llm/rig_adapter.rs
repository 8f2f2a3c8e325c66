//! SDK-backed provider. Bridges rig-core's Groq client to [`LlmProvider`].

use async_trait::async_trait;
use rig::client::CompletionClient;
use rig::completion::Prompt;
use rig::providers::groq;

use crate::error::LlmError;
use crate::llm::provider::{CompletionRequest, CompletionResponse, FinishReason, LlmProvider};

const PROVIDER: &str = "groq";

/// rig-core Groq client adapter.
///
/// rig's prompt API does not surface token usage, so the usage fields of
/// the response are always zero.
pub struct RigAdapter {
    client: groq::Client,
    model: String,
}

impl RigAdapter {
    /// Build a Groq client for `model`.
    pub fn groq(api_key: &str, model: &str) -> Result<Self, LlmError> {
        let client: groq::Client =
            groq::Client::new(api_key).map_err(|e| LlmError::RequestFailed {
                provider: PROVIDER.to_string(),
                reason: format!("Failed to create Groq client: {}", e),
            })?;

        Ok(Self {
            client,
            model: model.to_string(),
        })
    }
}

#[async_trait]
impl LlmProvider for RigAdapter {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let mut builder = self.client.agent(&self.model);
        if let Some(system) = request.system_prompt() {
            builder = builder.preamble(&system);
        }
        if let Some(temperature) = request.temperature {
            builder = builder.temperature(f64::from(temperature));
        }
        if let Some(max_tokens) = request.max_tokens {
            builder = builder.max_tokens(u64::from(max_tokens));
        }
        let agent = builder.build();

        let content = agent
            .prompt(request.user_prompt())
            .await
            .map_err(|e| LlmError::RequestFailed {
                provider: PROVIDER.to_string(),
                reason: e.to_string(),
            })?;

        Ok(CompletionResponse {
            content: content.trim().to_string(),
            input_tokens: 0,
            output_tokens: 0,
            finish_reason: FinishReason::Unknown,
        })
    }
}
