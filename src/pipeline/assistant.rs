//! Intent classification and reply drafting on top of an [`LlmProvider`].

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::llm::{ChatMessage, CompletionRequest, FinishReason, LlmConfig, LlmProvider};
use crate::pipeline::intent::Intent;

/// Temperature for classification (near-deterministic).
const CLASSIFY_TEMPERATURE: f32 = 0.3;

/// Max tokens for classification; the answer is a single word.
const CLASSIFY_MAX_TOKENS: u32 = 50;

const CLASSIFY_SYSTEM_PROMPT: &str =
    "You are an email classification assistant. Classify emails into the given categories.";

const REPLY_SYSTEM_PROMPT: &str = "You are a professional email assistant. Generate appropriate, \
     helpful, and contextually relevant email replies. Keep responses concise and professional.";

/// Classifier/generator capability consumed by the agent loop.
///
/// Neither method fails: classification falls back to [`Intent::Other`] and
/// generation to `None`, with the cause logged.
#[async_trait]
pub trait ReplyEngine: Send + Sync {
    async fn classify(&self, subject: &str, body: &str, sender: &str) -> Intent;

    async fn generate_reply(
        &self,
        sender: &str,
        subject: &str,
        body: &str,
        context: &str,
    ) -> Option<String>;
}

/// LLM-backed [`ReplyEngine`].
pub struct EmailAssistant {
    llm: Arc<dyn LlmProvider>,
    reply_temperature: f32,
    reply_max_tokens: u32,
}

impl EmailAssistant {
    pub fn new(llm: Arc<dyn LlmProvider>, config: &LlmConfig) -> Self {
        Self {
            llm,
            reply_temperature: config.reply_temperature,
            reply_max_tokens: config.reply_max_tokens,
        }
    }

    pub fn with_sampling(llm: Arc<dyn LlmProvider>, temperature: f32, max_tokens: u32) -> Self {
        Self {
            llm,
            reply_temperature: temperature,
            reply_max_tokens: max_tokens,
        }
    }
}

#[async_trait]
impl ReplyEngine for EmailAssistant {
    async fn classify(&self, subject: &str, body: &str, sender: &str) -> Intent {
        let request = CompletionRequest::new(vec![
            ChatMessage::system(CLASSIFY_SYSTEM_PROMPT),
            ChatMessage::user(build_classify_prompt(subject, body)),
        ])
        .with_temperature(CLASSIFY_TEMPERATURE)
        .with_max_tokens(CLASSIFY_MAX_TOKENS);

        match self.llm.complete(request).await {
            Ok(response) => {
                let intent = Intent::from_model_output(&response.content);
                if intent == Intent::Other {
                    debug!(raw = %response.content, "Classified as OTHER");
                }
                intent
            }
            Err(e) => {
                error!(sender = %sender, error = %e, "Error analyzing email intent");
                Intent::Other
            }
        }
    }

    async fn generate_reply(
        &self,
        sender: &str,
        subject: &str,
        body: &str,
        context: &str,
    ) -> Option<String> {
        let request = CompletionRequest::new(vec![
            ChatMessage::system(REPLY_SYSTEM_PROMPT),
            ChatMessage::user(build_reply_prompt(sender, subject, body, context)),
        ])
        .with_temperature(self.reply_temperature)
        .with_max_tokens(self.reply_max_tokens);

        match self.llm.complete(request).await {
            Ok(response) => {
                if response.finish_reason == FinishReason::Length {
                    warn!(sender = %sender, "Reply hit the token limit and may be truncated");
                }
                let reply = response.content.trim();
                if reply.is_empty() {
                    warn!(sender = %sender, "Model returned an empty reply");
                    return None;
                }
                info!(sender = %sender, "Generated reply");
                Some(reply.to_string())
            }
            Err(e) => {
                error!(sender = %sender, error = %e, "Error generating reply");
                None
            }
        }
    }
}

// ── Prompt construction ─────────────────────────────────────────────

fn build_classify_prompt(subject: &str, body: &str) -> String {
    let mut prompt = String::with_capacity(512 + body.len());
    prompt.push_str("Analyze the following email and categorize its intent/purpose:\n\n");
    prompt.push_str(&format!("SUBJECT: {subject}\n"));
    prompt.push_str(&format!("BODY: {body}\n\n"));
    prompt.push_str(
        "Categorize this email as one of the following:\n\
         - QUESTION (asking for information)\n\
         - REQUEST (asking for action/task)\n\
         - COMPLAINT (expressing dissatisfaction)\n\
         - COMPLIMENT (positive feedback)\n\
         - MEETING (scheduling/meeting related)\n\
         - BUSINESS (general business communication)\n\
         - PERSONAL (personal communication)\n\
         - SPAM (potentially spam/unwanted)\n\
         - OTHER\n\n\
         Respond with just the category name:",
    );
    prompt
}

fn build_reply_prompt(sender: &str, subject: &str, body: &str, context: &str) -> String {
    let mut prompt = String::with_capacity(768 + body.len());
    prompt.push_str(
        "Please generate a professional email reply based on the following information:\n\n",
    );
    prompt.push_str(&format!("FROM: {sender}\n"));
    prompt.push_str(&format!("SUBJECT: {subject}\n\n"));
    prompt.push_str(&format!("ORIGINAL MESSAGE:\n{body}\n\n"));
    if !context.is_empty() {
        prompt.push_str(&format!("ADDITIONAL CONTEXT: {context}\n\n"));
    }
    prompt.push_str(
        "INSTRUCTIONS:\n\
         1. Generate a professional and appropriate reply\n\
         2. Address the main points from the original message\n\
         3. Keep the tone professional but friendly\n\
         4. Include a proper greeting and closing\n\
         5. Make the response helpful and actionable where appropriate\n\
         6. Keep it concise (2-3 paragraphs maximum)\n\n\
         REPLY:",
    );
    prompt
}
