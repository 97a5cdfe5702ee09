//! Fake IMAP server for integration testing
//!
//! An in-process server that speaks just enough IMAP to drive
//! `ImapStore` through a whole retrieval run:
//!
//! TCP -> greeting -> [STARTTLS -> TLS handshake] -> LOGIN ->
//! SELECT/EXAMINE -> UID SEARCH -> UID FETCH -> LOGOUT
//!
//! ## Module layout
//!
//! - `server` -- TCP listener, optional STARTTLS upgrade, command loop
//! - `handlers/` -- one file per IMAP command
//! - `mailbox` -- test data model (folders, emails, seen flags)
//! - `io` -- response writers

mod handlers;
mod io;
mod server;

pub use mailbox::MailboxBuilder;
pub use server::FakeImapServer;
