//! Ordered list of mailboxes to sweep
//!
//! A [`FolderList`] is the normalized form of whatever the host
//! configuration supplies (a comma separated string or a list of
//! names). Order is significant and duplicates are kept: each entry is
//! processed once, in the order given.

use crate::error::{Error, Result};
use serde::Serialize;
use std::fmt;

/// A non-empty, ordered list of non-empty mailbox names.
///
/// # Examples
///
/// ```
/// use mailsweep::FolderList;
///
/// let folders = FolderList::parse("INBOX, Spam").unwrap();
/// assert_eq!(folders.as_slice(), ["INBOX", "Spam"]);
///
/// assert!(FolderList::parse(" , ").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FolderList(Vec<String>);

impl FolderList {
    /// Build a list from individual names, stored exactly as given.
    ///
    /// A name that is blank after trimming is rejected, but surrounding
    /// whitespace on any other name is kept: it is part of the mailbox
    /// name on the server.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the list is empty or any name is
    /// blank.
    pub fn new<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut folders = Vec::new();
        for (idx, name) in names.into_iter().enumerate() {
            let name = name.as_ref();
            if name.trim().is_empty() {
                return Err(Error::Config(format!("folder #{} has an empty name", idx + 1)));
            }
            folders.push(name.to_string());
        }

        if folders.is_empty() {
            return Err(Error::Config("folder list is empty".into()));
        }
        Ok(Self(folders))
    }

    /// Parse a comma separated list such as `"INBOX,Spam"`.
    ///
    /// Whitespace around each segment is separator padding and is
    /// dropped. Empty segments (`"INBOX,,Spam"`) are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if no folder names remain.
    pub fn parse(list: &str) -> Result<Self> {
        Self::new(list.split(',').map(str::trim).filter(|s| !s.is_empty()))
    }

    /// Reads `IMAP_FOLDERS` (default: `INBOX`).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the variable holds no folder names.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        std::env::var("IMAP_FOLDERS").map_or_else(|_| Self::new(["INBOX"]), |v| Self::parse(&v))
    }

    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always `false`: every constructor rejects an empty list.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for FolderList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(","))
    }
}

impl<'a> IntoIterator for &'a FolderList {
    type Item = &'a str;
    type IntoIter = std::iter::Map<std::slice::Iter<'a, String>, fn(&String) -> &str>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter().map(String::as_str as fn(&String) -> &str)
    }
}
