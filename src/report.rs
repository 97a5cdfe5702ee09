//! Progress reporting and message delivery
//!
//! The session talks to its host through two injected collaborators:
//! a [`StatusReporter`] for progress and the final
//! [`OutcomeSummary`], and a [`MessageSink`] that receives each
//! [`ParsedMessage`] as soon as it is parsed.

use crate::parser::ParsedMessage;
use serde::Serialize;
use std::fmt;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{error, info, warn};

/// Final classification of a retrieval run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    /// Every folder was processed without error.
    Success,
    /// At least one folder failed to open or search.
    Warning,
    /// The connection failed; the run ended early.
    Error,
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Error => "error",
        })
    }
}

/// Number of unseen messages found in one successfully processed folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FolderCount {
    pub folder: String,
    pub messages: usize,
}

/// The one-per-session result of a retrieval run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutcomeSummary {
    pub status: OutcomeStatus,
    pub total_messages: usize,
    pub folder_counts: Vec<FolderCount>,
    pub successes: usize,
    pub failures: usize,
    pub processed_folders: usize,
    pub total_folders: usize,
    pub errors: Vec<String>,
}

impl OutcomeSummary {
    /// One-line, human readable summary prefixed with the status.
    #[must_use]
    pub fn headline(&self) -> String {
        let mut line = format!(
            "{}: {} message(s) from {}/{} folder(s)",
            self.status, self.total_messages, self.successes, self.total_folders
        );
        if self.failures > 0 {
            line.push_str(&format!(", {} failed", self.failures));
        }
        if let Some(last) = self.errors.last() {
            line.push_str(&format!(" (last error: {last})"));
        }
        line
    }
}

/// Transient progress notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress<'a> {
    Connecting { host: &'a str },
    Connected,
    Fetching { folder: &'a str },
}

/// Receives progress and the final outcome. Owned by the host.
pub trait StatusReporter: Send {
    fn progress(&mut self, progress: Progress<'_>);

    fn finished(&mut self, summary: &OutcomeSummary);
}

/// Receives each parsed message, in discovery order.
pub trait MessageSink: Send {
    fn deliver(&mut self, message: ParsedMessage);
}

/// [`StatusReporter`] that writes to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

impl StatusReporter for LogReporter {
    fn progress(&mut self, progress: Progress<'_>) {
        match progress {
            Progress::Connecting { host } => info!(host, "connecting"),
            Progress::Connected => info!("connected"),
            Progress::Fetching { folder } => info!(folder, "fetching"),
        }
    }

    fn finished(&mut self, summary: &OutcomeSummary) {
        let headline = summary.headline();
        match summary.status {
            OutcomeStatus::Success => info!("{headline}"),
            OutcomeStatus::Warning => warn!("{headline}"),
            OutcomeStatus::Error => error!("{headline}"),
        }
    }
}

impl MessageSink for Vec<ParsedMessage> {
    fn deliver(&mut self, message: ParsedMessage) {
        self.push(message);
    }
}

impl MessageSink for UnboundedSender<ParsedMessage> {
    fn deliver(&mut self, message: ParsedMessage) {
        if self.send(message).is_err() {
            warn!("Message receiver dropped, discarding message");
        }
    }
}
