//! Retrieval session
//!
//! A [`RetrievalSession`] owns one [`MailStore`] for its whole life,
//! walks the folder list strictly in order and finalizes exactly once:
//! the [`OutcomeSummary`] goes to the reporter, then the store is
//! closed. Finalization runs on every path that got past parameter
//! validation, including a failed connect.

use crate::config::{ConnectionParams, RetrievalPolicy};
use crate::error::{Error, Result};
use crate::folder::FolderList;
use crate::processor::{FolderOutcome, FolderProcessor};
use crate::report::{FolderCount, MessageSink, OutcomeStatus, OutcomeSummary, Progress, StatusReporter};
use crate::store::MailStore;
use tracing::{debug, error, warn};

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Connecting,
    Ready,
    /// Index into the folder list.
    ProcessingFolder(usize),
    Finalizing,
    /// Terminal.
    Closed,
}

/// Bookkeeping for one run.
#[derive(Debug, Default)]
struct Tally {
    total_folders: usize,
    processed_folders: usize,
    successes: usize,
    failures: usize,
    total_messages: usize,
    folder_counts: Vec<FolderCount>,
    errors: Vec<String>,
}

impl Tally {
    fn new(total_folders: usize) -> Self {
        Self {
            total_folders,
            ..Self::default()
        }
    }

    fn record(&mut self, folder: &str, outcome: FolderOutcome) {
        self.processed_folders += 1;
        match outcome {
            FolderOutcome::Completed(messages) => {
                self.successes += 1;
                self.total_messages += messages;
                self.folder_counts.push(FolderCount {
                    folder: folder.to_string(),
                    messages,
                });
            }
            FolderOutcome::OpenFailed(reason) | FolderOutcome::SearchFailed(reason) => {
                self.failures += 1;
                self.errors.push(reason);
            }
        }
    }

    fn into_summary(mut self, fatal: Option<&Error>) -> OutcomeSummary {
        let status = if let Some(e) = fatal {
            self.errors.push(e.to_string());
            OutcomeStatus::Error
        } else if self.failures > 0 {
            OutcomeStatus::Warning
        } else {
            OutcomeStatus::Success
        };

        OutcomeSummary {
            status,
            total_messages: self.total_messages,
            folder_counts: self.folder_counts,
            successes: self.successes,
            failures: self.failures,
            processed_folders: self.processed_folders,
            total_folders: self.total_folders,
            errors: self.errors,
        }
    }
}

pub struct RetrievalSession<S, R, K> {
    store: S,
    reporter: R,
    sink: K,
    phase: Phase,
}

impl<S, R, K> RetrievalSession<S, R, K>
where
    S: MailStore,
    R: StatusReporter,
    K: MessageSink,
{
    #[must_use]
    pub const fn new(store: S, reporter: R, sink: K) -> Self {
        Self {
            store,
            reporter,
            sink,
            phase: Phase::Idle,
        }
    }

    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    #[must_use]
    pub const fn sink(&self) -> &K {
        &self.sink
    }

    #[must_use]
    pub const fn reporter(&self) -> &R {
        &self.reporter
    }

    pub fn into_sink(self) -> K {
        self.sink
    }

    /// Run one retrieval over `folders`.
    ///
    /// Connection and folder failures do not produce an `Err`: they are
    /// reflected in the returned summary's status.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if `params` fail validation. Nothing is
    ///   attempted and the session stays [`Phase::Idle`].
    /// - [`Error::SessionClosed`] if the session already ran.
    pub async fn start(
        &mut self,
        params: &ConnectionParams,
        folders: &FolderList,
        policy: RetrievalPolicy,
    ) -> Result<OutcomeSummary> {
        if self.phase != Phase::Idle {
            return Err(Error::SessionClosed);
        }
        params.validate()?;

        let mut tally = Tally::new(folders.len());
        let fatal = self.run(params, folders, policy, &mut tally).await.err();
        Ok(self.finalize(tally, fatal).await)
    }

    async fn run(
        &mut self,
        params: &ConnectionParams,
        folders: &FolderList,
        policy: RetrievalPolicy,
        tally: &mut Tally,
    ) -> Result<()> {
        self.enter(Phase::Connecting);
        self.reporter.progress(Progress::Connecting { host: &params.host });
        self.store.connect(params).await?;

        self.enter(Phase::Ready);
        self.reporter.progress(Progress::Connected);

        for (idx, folder) in folders.iter().enumerate() {
            self.enter(Phase::ProcessingFolder(idx));
            self.reporter.progress(Progress::Fetching { folder });

            let outcome = FolderProcessor::new(&mut self.store, &mut self.sink, policy)
                .process(folder)
                .await?;
            tally.record(folder, outcome);
        }
        Ok(())
    }

    async fn finalize(&mut self, tally: Tally, fatal: Option<Error>) -> OutcomeSummary {
        self.enter(Phase::Finalizing);
        if let Some(e) = &fatal {
            error!(error = %e, "Retrieval aborted");
        }

        let summary = tally.into_summary(fatal.as_ref());
        self.reporter.finished(&summary);

        if let Err(e) = self.store.close().await {
            warn!(error = %e, "Failed to close connection");
        }
        self.enter(Phase::Closed);
        summary
    }

    fn enter(&mut self, phase: Phase) {
        debug!(from = ?self.phase, to = ?phase, "Session phase change");
        self.phase = phase;
    }
}
