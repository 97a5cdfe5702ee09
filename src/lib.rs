//! Multi-folder IMAP retrieval
//!
//! Sweeps unseen messages out of an ordered list of mailboxes over a
//! single IMAP connection, parses each one into a [`ParsedMessage`]
//! as it streams in, and reports an [`OutcomeSummary`]. A mailbox
//! that cannot be opened or searched, or a message that cannot be
//! parsed, never aborts the run; only a broken connection does.
//!
//! ```no_run
//! # async fn run() -> mailsweep::Result<()> {
//! use mailsweep::{
//!     ConnectionParams, Credentials, FolderList, ImapStore, LogReporter,
//!     RetrievalPolicy, RetrievalSession,
//! };
//!
//! let params = ConnectionParams::new("imap.example.com", 993, Credentials::new("me", "pw"));
//! let folders = FolderList::parse("INBOX,Spam")?;
//!
//! let mut session = RetrievalSession::new(ImapStore::new(), LogReporter, Vec::new());
//! let summary = session.start(&params, &folders, RetrievalPolicy::default()).await?;
//! println!("{}", summary.headline());
//! # Ok(())
//! # }
//! ```

mod config;
mod connection;
mod error;
mod folder;
mod parser;
mod processor;
mod report;
mod session;
mod store;


pub use config::{ConnectionParams, Credentials, RetrievalPolicy, SearchCriterion, TransportSecurity};
pub use connection::{ImapIo, ImapSession, ImapStore};
pub use error::{Error, Result};
pub use folder::FolderList;
pub use parser::{Attachment, ParsedMessage, parse};
pub use processor::{FolderOutcome, FolderProcessor};
pub use report::{
    FolderCount, LogReporter, MessageSink, OutcomeStatus, OutcomeSummary, Progress, StatusReporter,
};
pub use session::{Phase, RetrievalSession};
pub use store::{FetchOptions, MailStore, RawMessageStream};
