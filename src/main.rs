use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

use mail_responder::agent::{AgentStats, EmailAgent, ReplyMode};
use mail_responder::channels::{GmailGateway, MailGateway};
use mail_responder::config::{AppConfig, LoggingConfig};
use mail_responder::llm::create_provider;
use mail_responder::pipeline::EmailAssistant;
use mail_responder::store::ProcessedStore;

/// Drafts shown by `--list-drafts`.
const LIST_DRAFTS_MAX: u32 = 10;

#[derive(Parser)]
#[command(name = "mail-responder", version)]
#[command(about = "Gmail AI agent: classify new unread mail and reply to it")]
struct Cli {
    /// Operation mode.
    #[arg(long, value_enum, default_value_t = RunMode::Draft)]
    mode: RunMode,

    /// Generate replies but don't send or save them.
    #[arg(long)]
    dry_run: bool,

    /// Monitoring interval in minutes for the monitor modes.
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u64).range(1..))]
    interval: u64,

    /// Clear the history of processed messages.
    #[arg(long)]
    clear_history: bool,

    /// Show statistics about processed messages.
    #[arg(long)]
    stats: bool,

    /// List current draft messages.
    #[arg(long)]
    list_drafts: bool,

    /// Send an existing draft.
    #[arg(long, value_name = "ID")]
    send_draft: Option<String>,

    /// Delete an existing draft.
    #[arg(long, value_name = "ID")]
    delete_draft: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum RunMode {
    /// Automatically send replies to new emails
    Auto,
    /// Save replies as drafts for manual review
    Draft,
    /// Continuously monitor and auto-reply
    MonitorAuto,
    /// Continuously monitor and save as drafts
    MonitorDraft,
}

impl RunMode {
    fn reply_mode(self) -> ReplyMode {
        match self {
            Self::Auto | Self::MonitorAuto => ReplyMode::Auto,
            Self::Draft | Self::MonitorDraft => ReplyMode::Draft,
        }
    }

    fn is_monitor(self) -> bool {
        matches!(self, Self::MonitorAuto | Self::MonitorDraft)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = AppConfig::from_env().context("Failed to load configuration")?;
    let _log_guard = init_logging(&config.logging)?;

    tracing::info!("Gmail AI Agent v{} starting...", env!("CARGO_PKG_VERSION"));
    tracing::info!("Mode: {:?}, dry-run: {}", cli.mode, cli.dry_run);

    let store = ProcessedStore::new(&config.agent.processed_path);

    // ── Maintenance (no credentials needed) ─────────────────────────
    if cli.clear_history {
        store.clear()?;
        tracing::info!("Processed messages history cleared ({})", store.path().display());
        return Ok(());
    }

    if cli.stats {
        let stats = AgentStats::collect(&store, store.load().len());
        tracing::info!("=== AGENT STATISTICS ===");
        tracing::info!("Total processed messages: {}", stats.total_processed);
        tracing::info!("History file exists: {}", stats.history_file_exists);
        if let Some(at) = stats.last_updated {
            tracing::info!("Last updated: {}", at.to_rfc3339());
        }
        return Ok(());
    }

    // ── Mailbox ─────────────────────────────────────────────────────
    let gateway = Arc::new(
        GmailGateway::connect(&config.gmail)
            .await
            .with_context(|| {
                format!(
                    "Failed to connect to Gmail using {}",
                    config.gmail.token_path.display()
                )
            })?,
    );

    if cli.list_drafts {
        let drafts = gateway.list_drafts(LIST_DRAFTS_MAX).await?;
        tracing::info!("=== DRAFT MESSAGES ({}) ===", drafts.len());
        for (i, draft) in drafts.iter().enumerate() {
            let preview: String = draft.body.chars().take(100).collect();
            tracing::info!("{}. TO: {}", i + 1, draft.to);
            tracing::info!("   SUBJECT: {}", draft.subject);
            tracing::info!("   DRAFT ID: {}", draft.draft_id);
            tracing::info!("   BODY: {}...", preview);
            tracing::info!("   {}", "-".repeat(50));
        }
        return Ok(());
    }

    if let Some(id) = &cli.send_draft {
        gateway.send_draft(id).await?;
        return Ok(());
    }

    if let Some(id) = &cli.delete_draft {
        gateway.delete_draft(id).await?;
        return Ok(());
    }

    // ── Agent ───────────────────────────────────────────────────────
    let llm = create_provider(&config.llm)?;
    tracing::info!("Model: {}", llm.model_name());
    let engine = Arc::new(EmailAssistant::new(llm, &config.llm));
    let mut agent = EmailAgent::new(&config.agent, gateway, engine, store);
    tracing::info!("{} messages already processed", agent.processed_count());
    let mode = cli.mode.reply_mode();

    if cli.mode.is_monitor() {
        if cli.dry_run {
            tracing::warn!("--dry-run is ignored in monitor modes");
        }
        let interval = Duration::from_secs(cli.interval * 60);
        agent.monitor(mode, interval, ctrl_c()).await;
    } else {
        tokio::select! {
            biased;
            _ = ctrl_c() => {
                tracing::info!("Application stopped by user");
            }
            report = agent.run_pass(mode, cli.dry_run) => {
                tracing::debug!(?report, "Pass finished");
            }
        }
    }

    Ok(())
}

/// Resolves on Ctrl+C. If the handler can't be installed, never resolves.
async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Could not listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}

/// Log to stderr and to a daily-rolling file next to `config.file`.
fn init_logging(config: &LoggingConfig) -> anyhow::Result<WorkerGuard> {
    let dir = config
        .file
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let file_name = config
        .file
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "mail_responder.log".into());

    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
    let (file_writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, file_name));

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(file_writer),
        )
        .init();

    Ok(guard)
}
