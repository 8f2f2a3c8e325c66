//! The mail gateway seam: what the agent loop needs from a mailbox.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::MailError;

/// An inbound message with its body already normalized to plain text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
    /// Provider-assigned unique identifier.
    pub id: String,
    /// Raw From header: `Name <address>` or a bare address.
    pub sender: String,
    pub subject: String,
    pub body: String,
    /// Thread the reply should be attached to.
    pub thread_id: String,
}

/// A saved draft, for reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Draft {
    pub draft_id: String,
    pub message_id: Option<String>,
    pub to: String,
    pub subject: String,
    pub body: String,
    pub thread_id: Option<String>,
}

/// Mailbox operations consumed by the agent loop and the CLI.
#[async_trait]
pub trait MailGateway: Send + Sync {
    /// Unread messages received after `since`, at most `max_count`, in
    /// provider order.
    async fn list_unread(
        &self,
        max_count: u32,
        since: DateTime<Utc>,
    ) -> Result<Vec<MailMessage>, MailError>;

    /// Send `body` as a reply on `thread_id`.
    async fn send_reply(
        &self,
        thread_id: &str,
        to: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), MailError>;

    /// Save `body` as a draft reply on `thread_id`.
    async fn save_draft(
        &self,
        thread_id: &str,
        to: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), MailError>;

    async fn mark_read(&self, message_id: &str) -> Result<(), MailError>;

    async fn list_drafts(&self, max_count: u32) -> Result<Vec<Draft>, MailError>;

    async fn send_draft(&self, draft_id: &str) -> Result<(), MailError>;

    async fn delete_draft(&self, draft_id: &str) -> Result<(), MailError>;
}

/// Bare address from a From header.
///
/// `"Alice <alice@example.com>"` → `alice@example.com`; anything without a
/// closed angle-bracket pair is returned trimmed.
pub fn extract_address(sender: &str) -> &str {
    if let Some(start) = sender.find('<')
        && let Some(len) = sender[start + 1..].find('>')
    {
        return sender[start + 1..start + 1 + len].trim();
    }
    sender.trim()
}

/// Subject line for a reply, without stacking `Re:` prefixes.
pub fn reply_subject(subject: &str) -> String {
    let trimmed = subject.trim();
    if trimmed
        .get(..3)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("re:"))
    {
        trimmed.to_string()
    } else {
        format!("Re: {trimmed}")
    }
}
