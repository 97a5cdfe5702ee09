//! Error types for mailsweep

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to open {folder}: {reason}")]
    FolderOpen { folder: String, reason: String },

    #[error("Search failed in {folder}: {reason}")]
    FolderSearch { folder: String, reason: String },

    #[error("Fetch error: {0}")]
    FetchStream(String),

    #[error("Email parsing error: {0}")]
    Parse(String),

    #[error("Session is closed")]
    SessionClosed,
}

impl Error {
    /// Whether this error means the connection itself is unusable.
    ///
    /// Fatal errors end the whole retrieval run. Everything else is
    /// scoped to a single folder or message.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Tls(_) | Self::Io(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
