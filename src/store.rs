//! The protocol client seam
//!
//! [`MailStore`] is the set of operations the retrieval pipeline needs
//! from a mail store. [`crate::ImapStore`] implements it over
//! `async-imap`; tests substitute scripted stores.

use crate::config::{ConnectionParams, SearchCriterion};
use crate::error::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;

/// Raw message bodies as they arrive from a fetch. The stream ends
/// when the server completes the fetch command.
pub type RawMessageStream<'a> = BoxStream<'a, Result<Vec<u8>>>;

/// Options for a single fetch command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchOptions {
    /// Let the fetch set `\Seen` on each returned message.
    pub mark_seen: bool,
}

#[async_trait]
pub trait MailStore: Send {
    /// Establish and authenticate the connection.
    async fn connect(&mut self, params: &ConnectionParams) -> Result<()>;

    /// Select a mailbox for the following search/fetch calls.
    async fn open_mailbox(&mut self, name: &str, read_only: bool) -> Result<()>;

    /// Search the open mailbox. Returns UIDs in ascending order.
    async fn search(&mut self, criterion: SearchCriterion) -> Result<Vec<u32>>;

    /// Fetch full bodies for `uids` from the open mailbox.
    async fn fetch<'a>(
        &'a mut self,
        uids: &[u32],
        options: FetchOptions,
    ) -> Result<RawMessageStream<'a>>;

    /// Release the connection. Calling this on a closed (or never
    /// opened) store does nothing.
    async fn close(&mut self) -> Result<()>;
}
