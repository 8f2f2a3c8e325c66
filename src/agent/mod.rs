//! Agent module: reply modes, pass reporting, and the agent loop.

pub mod agent_loop;

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};

pub use agent_loop::EmailAgent;

use crate::store::ProcessedStore;

/// What to do with a generated reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyMode {
    /// Send immediately and mark the original read.
    Auto,
    /// Save as a draft for manual review.
    Draft,
}

impl ReplyMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Draft => "draft",
        }
    }
}

impl fmt::Display for ReplyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReplyMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "draft" => Ok(Self::Draft),
            other => Err(format!("unknown reply mode '{other}', expected auto or draft")),
        }
    }
}

/// Counts from one pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassReport {
    /// Unread messages not already in the processed set.
    pub candidates: usize,
    /// Replies successfully sent or drafted.
    pub dispatched: usize,
    pub skipped_spam: usize,
    /// Candidates whose generation or dispatch failed.
    pub failed: usize,
}

/// Processed-history summary for `--stats`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentStats {
    pub total_processed: usize,
    pub history_file_exists: bool,
    pub last_updated: Option<DateTime<Utc>>,
}

impl AgentStats {
    /// Summarize `store`, given how many ids are currently held in memory.
    pub fn collect(store: &ProcessedStore, total_processed: usize) -> Self {
        let history_file_exists = store.exists();
        Self {
            total_processed,
            history_file_exists,
            last_updated: if history_file_exists {
                store.read_last_updated()
            } else {
                None
            },
        }
    }
}
