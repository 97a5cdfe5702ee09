//! Per-folder search and fetch
//!
//! A [`FolderProcessor`] runs one folder to completion: open, search
//! for unseen messages, fetch them in a single command, and parse each
//! body as it streams in. Parses run on the blocking pool while the
//! fetch stream is still being read, and every parse is awaited before
//! the folder reports its outcome, so each fetched item is delivered
//! to the sink at most once and in the order the server sent it.

use crate::config::RetrievalPolicy;
use crate::error::Result;
use crate::parser::{self, ParsedMessage};
use crate::report::MessageSink;
use crate::store::{FetchOptions, MailStore};
use futures::StreamExt;
use futures::stream::FuturesOrdered;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// How one folder attempt ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FolderOutcome {
    /// Search and fetch ran; the count is the number of unseen hits.
    /// A folder with no unseen messages completes with `0`.
    Completed(usize),
    OpenFailed(String),
    SearchFailed(String),
}

impl FolderOutcome {
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Completed(_))
    }
}

pub struct FolderProcessor<'a, S: ?Sized, K: ?Sized> {
    store: &'a mut S,
    sink: &'a mut K,
    policy: RetrievalPolicy,
}

impl<'a, S, K> FolderProcessor<'a, S, K>
where
    S: MailStore + ?Sized,
    K: MessageSink + ?Sized,
{
    pub const fn new(store: &'a mut S, sink: &'a mut K, policy: RetrievalPolicy) -> Self {
        Self {
            store,
            sink,
            policy,
        }
    }

    /// Process one folder.
    ///
    /// Open and search failures are reported through the returned
    /// [`FolderOutcome`]. Fetch rejections, per-item stream errors and
    /// parse failures are logged and do not change the outcome.
    ///
    /// # Errors
    ///
    /// Only fatal connection errors (see [`crate::Error::is_fatal`]) are
    /// returned; messages still being parsed at that point are dropped.
    pub async fn process(&mut self, folder: &str) -> Result<FolderOutcome> {
        let read_only = !self.policy.mark_seen;
        if let Err(e) = self.store.open_mailbox(folder, read_only).await {
            if e.is_fatal() {
                return Err(e);
            }
            warn!(folder, error = %e, "Could not open folder");
            return Ok(FolderOutcome::OpenFailed(e.to_string()));
        }

        let uids = match self.store.search(self.policy.criterion).await {
            Ok(uids) => uids,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!(folder, error = %e, "Search failed");
                return Ok(FolderOutcome::SearchFailed(e.to_string()));
            }
        };

        if uids.is_empty() {
            info!(folder, "No unseen messages");
            return Ok(FolderOutcome::Completed(0));
        }

        info!(folder, count = uids.len(), "Fetching unseen messages");
        self.fetch_and_parse(folder, &uids).await?;
        Ok(FolderOutcome::Completed(uids.len()))
    }

    async fn fetch_and_parse(&mut self, folder: &str, uids: &[u32]) -> Result<()> {
        let options = FetchOptions {
            mark_seen: self.policy.mark_seen,
        };
        let mut pending: FuturesOrdered<JoinHandle<Result<ParsedMessage>>> = FuturesOrdered::new();

        let mut stream = match self.store.fetch(uids, options).await {
            Ok(stream) => stream,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!(folder, error = %e, "Fetch failed");
                return Ok(());
            }
        };

        let mut stream_done = false;
        loop {
            tokio::select! {
                item = stream.next(), if !stream_done => match item {
                    Some(Ok(raw)) => {
                        let name = folder.to_string();
                        pending.push_back(tokio::task::spawn_blocking(move || {
                            parser::parse(&raw, &name)
                        }));
                    }
                    Some(Err(e)) if e.is_fatal() => return Err(e),
                    Some(Err(e)) => warn!(folder, error = %e, "Fetch stream error"),
                    None => {
                        debug!(folder, "Fetch stream ended");
                        stream_done = true;
                    }
                },
                Some(joined) = pending.next(), if !pending.is_empty() => {
                    deliver(&mut *self.sink, folder, joined);
                }
                else => break,
            }
        }
        Ok(())
    }
}

fn deliver<K: MessageSink + ?Sized>(
    sink: &mut K,
    folder: &str,
    joined: std::result::Result<Result<ParsedMessage>, tokio::task::JoinError>,
) {
    match joined {
        Ok(Ok(message)) => sink.deliver(message),
        Ok(Err(e)) => warn!(folder, error = %e, "Dropping message that failed to parse"),
        Err(e) => warn!(folder, error = %e, "Parse task did not complete"),
    }
}
