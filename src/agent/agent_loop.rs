//! Main agent loop: one processing pass, and the monitor that repeats it.
//!
//! A pass fetches unread mail since the previous watermark, drops anything
//! already in the processed set, classifies each candidate, and drafts or
//! sends a reply. Every candidate ends up in the processed set whatever
//! happened to it, and the set is flushed once at the end of the pass.

use std::collections::HashSet;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::FutureExt;

use crate::agent::{AgentStats, PassReport, ReplyMode};
use crate::channels::{MailGateway, MailMessage, extract_address};
use crate::config::AgentConfig;
use crate::error::{Error, StoreError};
use crate::pipeline::{Intent, ReplyEngine};
use crate::store::ProcessedStore;

/// Characters of the original body shown in dry-run output.
const DRY_RUN_BODY_PREVIEW: usize = 200;

/// How a single candidate ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Spam,
    Dispatched,
    /// Dry run: reply generated and logged only.
    Previewed,
    Failed,
}

/// The email agent. Owns the processed set for the life of the process.
pub struct EmailAgent {
    gateway: Arc<dyn MailGateway>,
    engine: Arc<dyn ReplyEngine>,
    store: ProcessedStore,
    processed: HashSet<String>,
    last_check_time: DateTime<Utc>,
    max_emails: u32,
    /// Lowercased trusted address, if configured.
    trusted_sender: Option<String>,
    message_delay: Duration,
    monitor_retry: Duration,
}

impl EmailAgent {
    /// Load the processed set and start the watermark at now.
    pub fn new(
        config: &AgentConfig,
        gateway: Arc<dyn MailGateway>,
        engine: Arc<dyn ReplyEngine>,
        store: ProcessedStore,
    ) -> Self {
        let processed = store.load();
        Self {
            gateway,
            engine,
            store,
            processed,
            last_check_time: Utc::now(),
            max_emails: config.max_emails,
            trusted_sender: config
                .trusted_sender
                .as_ref()
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty()),
            message_delay: config.message_delay,
            monitor_retry: config.monitor_retry,
        }
    }

    /// Lower bound for the next pass's "new mail" query.
    pub fn last_check_time(&self) -> DateTime<Utc> {
        self.last_check_time
    }

    pub fn is_processed(&self, message_id: &str) -> bool {
        self.processed.contains(message_id)
    }

    pub fn processed_count(&self) -> usize {
        self.processed.len()
    }

    // ── Passes ──────────────────────────────────────────────────────

    /// Run one pass, logging and absorbing any failure.
    pub async fn run_pass(&mut self, mode: ReplyMode, dry_run: bool) -> PassReport {
        match self.try_pass(mode, dry_run).await {
            Ok(report) => report,
            Err(e) => {
                tracing::error!("Error in agent execution: {}", e);
                PassReport::default()
            }
        }
    }

    /// Run one pass. Gateway, engine and store failures are logged and
    /// absorbed inside the pass; only a pass that panics is returned as an
    /// error.
    pub async fn try_pass(&mut self, mode: ReplyMode, dry_run: bool) -> Result<PassReport, Error> {
        AssertUnwindSafe(self.pass(mode, dry_run))
            .catch_unwind()
            .await
            .map_err(|payload| Error::PassPanicked(panic_message(payload.as_ref())))
    }

    async fn pass(&mut self, mode: ReplyMode, dry_run: bool) -> PassReport {
        tracing::info!("Starting pass in {} mode (dry_run: {})", mode, dry_run);

        let since = self.last_check_time;
        self.last_check_time = Utc::now();

        let messages = match self.gateway.list_unread(self.max_emails, since).await {
            Ok(messages) => messages,
            Err(e) => {
                tracing::error!("Error fetching unread messages: {}", e);
                Vec::new()
            }
        };
        let candidates: Vec<MailMessage> = messages
            .into_iter()
            .filter(|m| !self.processed.contains(&m.id))
            .collect();

        let mut report = PassReport {
            candidates: candidates.len(),
            ..Default::default()
        };

        if candidates.is_empty() {
            tracing::info!("No new unread messages found since {}", since);
            return report;
        }
        tracing::info!("Found {} new unread messages since {}", candidates.len(), since);

        for message in &candidates {
            let outcome = self.handle_message(message, mode, dry_run).await;
            self.processed.insert(message.id.clone());

            match outcome {
                Outcome::Spam => {
                    report.skipped_spam += 1;
                    continue;
                }
                Outcome::Dispatched => report.dispatched += 1,
                Outcome::Previewed => {}
                Outcome::Failed => report.failed += 1,
            }

            if !self.message_delay.is_zero() {
                tokio::time::sleep(self.message_delay).await;
            }
        }

        if let Err(e) = self.store.save(&self.processed, Utc::now()) {
            tracing::error!("Could not save processed messages: {}", e);
        }

        tracing::info!(
            "Processed {} new messages successfully ({} candidates, {} spam, {} failed)",
            report.dispatched,
            report.candidates,
            report.skipped_spam,
            report.failed
        );
        report
    }

    async fn handle_message(&self, message: &MailMessage, mode: ReplyMode, dry_run: bool) -> Outcome {
        tracing::info!("Processing new message from {}", message.sender);

        let intent = self.classify(message).await;
        tracing::info!("Email intent: {}", intent);

        if intent == Intent::Spam {
            tracing::info!("Skipping spam email {}", message.id);
            return Outcome::Spam;
        }

        let context = format!("Email category: {intent}");
        let Some(reply) = self
            .engine
            .generate_reply(&message.sender, &message.subject, &message.body, &context)
            .await
        else {
            tracing::warn!("No reply generated for message {}", message.id);
            return Outcome::Failed;
        };

        if dry_run {
            log_dry_run(message, &reply, intent, mode);
            return Outcome::Previewed;
        }

        let to = extract_address(&message.sender);
        match mode {
            ReplyMode::Auto => {
                if let Err(e) = self
                    .gateway
                    .send_reply(&message.thread_id, to, &message.subject, &reply)
                    .await
                {
                    tracing::error!("Failed to send reply to {}: {}", to, e);
                    return Outcome::Failed;
                }
                match self.gateway.mark_read(&message.id).await {
                    Ok(()) => tracing::info!("Reply sent automatically and message marked as read"),
                    Err(e) => {
                        tracing::warn!("Reply sent but could not mark {} read: {}", message.id, e)
                    }
                }
            }
            ReplyMode::Draft => {
                if let Err(e) = self
                    .gateway
                    .save_draft(&message.thread_id, to, &message.subject, &reply)
                    .await
                {
                    tracing::error!("Failed to save draft for {}: {}", to, e);
                    return Outcome::Failed;
                }
                tracing::info!("Reply saved as draft for manual review");
            }
        }
        Outcome::Dispatched
    }

    async fn classify(&self, message: &MailMessage) -> Intent {
        if let Some(trusted) = &self.trusted_sender
            && message.sender.to_lowercase().contains(trusted.as_str())
        {
            tracing::debug!("Trusted sender {}, treating as BUSINESS", message.sender);
            return Intent::Business;
        }
        self.engine
            .classify(&message.subject, &message.body, &message.sender)
            .await
    }

    // ── Monitor ─────────────────────────────────────────────────────

    /// Run passes until `shutdown` resolves, sleeping `interval` between
    /// them. Monitor passes always dispatch (never dry run).
    pub async fn monitor<F>(&mut self, mode: ReplyMode, interval: Duration, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let retry = self.monitor_retry;

        tracing::info!(
            "Starting continuous monitoring in {} mode (checking every {:?})",
            mode,
            interval
        );

        loop {
            let delay = tokio::select! {
                biased;
                _ = &mut shutdown => {
                    tracing::info!("Monitoring stopped by user");
                    return;
                }
                result = self.try_pass(mode, false) => match result {
                    Ok(_) => interval,
                    Err(e) => {
                        tracing::error!("Error in continuous monitoring: {}", e);
                        retry
                    }
                }
            };

            tracing::info!("Sleeping for {:?}...", delay);
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    tracing::info!("Monitoring stopped by user");
                    return;
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    // ── Maintenance ─────────────────────────────────────────────────

    /// Forget every processed id and persist the empty set.
    pub fn clear_history(&mut self) -> Result<(), StoreError> {
        self.processed.clear();
        self.store.clear()
    }

    pub fn stats(&self) -> AgentStats {
        AgentStats::collect(&self.store, self.processed.len())
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "pass panicked".to_string())
}

fn log_dry_run(message: &MailMessage, reply: &str, intent: Intent, mode: ReplyMode) {
    let preview: String = message.body.chars().take(DRY_RUN_BODY_PREVIEW).collect();
    tracing::info!("DRY RUN MODE - Reply not sent/saved");
    tracing::info!("{}", "=".repeat(80));
    tracing::info!("MODE: {}", mode.as_str().to_uppercase());
    tracing::info!("FROM: {}", message.sender);
    tracing::info!("SUBJECT: {}", message.subject);
    tracing::info!("INTENT: {}", intent);
    tracing::info!("ORIGINAL MESSAGE:\n{}...", preview);
    tracing::info!("GENERATED REPLY:\n{}", reply);
    tracing::info!("{}", "=".repeat(80));
}
