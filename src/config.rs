//! Connection parameters and retrieval policy

use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// How the TCP connection to the mail store is secured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportSecurity {
    /// TLS from the first byte (usually port 993).
    #[default]
    Tls,
    /// Plain TCP upgraded with the STARTTLS command.
    StartTls,
    /// No transport security at all.
    Plain,
}

impl FromStr for TransportSecurity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tls" | "ssl" | "true" => Ok(Self::Tls),
            "starttls" => Ok(Self::StartTls),
            "plain" | "none" | "false" => Ok(Self::Plain),
            other => Err(Error::Config(format!("Unknown transport security '{other}'"))),
        }
    }
}

/// Login credentials. The password never appears in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Everything needed to open one IMAP session.
#[derive(Debug, Clone)]
pub struct ConnectionParams {
    pub host: String,
    pub port: u16,
    pub security: TransportSecurity,
    pub credentials: Credentials,
    /// Bounds TCP connect plus the TLS handshake.
    pub connect_timeout: Duration,
    /// Bounds the LOGIN exchange.
    pub auth_timeout: Duration,
    /// Enable TCP keep-alive on the socket.
    pub keepalive: bool,
    /// Verify the server certificate against the webpki roots.
    pub verify_tls: bool,
}

impl ConnectionParams {
    pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
    pub const DEFAULT_AUTH_TIMEOUT: Duration = Duration::from_secs(5);

    /// Parameters for an implicit-TLS connection with default timeouts.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16, credentials: Credentials) -> Self {
        Self {
            host: host.into(),
            port,
            security: TransportSecurity::Tls,
            credentials,
            connect_timeout: Self::DEFAULT_CONNECT_TIMEOUT,
            auth_timeout: Self::DEFAULT_AUTH_TIMEOUT,
            keepalive: true,
            verify_tls: true,
        }
    }

    #[must_use]
    pub const fn with_security(mut self, security: TransportSecurity) -> Self {
        self.security = security;
        self
    }

    #[must_use]
    pub const fn with_verify_tls(mut self, verify_tls: bool) -> Self {
        self.verify_tls = verify_tls;
        self
    }

    #[must_use]
    pub const fn with_timeouts(mut self, connect: Duration, auth: Duration) -> Self {
        self.connect_timeout = connect;
        self.auth_timeout = auth;
        self
    }

    #[must_use]
    pub const fn with_keepalive(mut self, keepalive: bool) -> Self {
        self.keepalive = keepalive;
        self
    }

    /// Load connection parameters from environment variables
    ///
    /// Reads from `.env` file if present. Required variables:
    /// - `IMAP_USERNAME`
    /// - `IMAP_PASSWORD`
    ///
    /// Optional (with defaults):
    /// - `IMAP_HOST` (default: `127.0.0.1`)
    /// - `IMAP_PORT` (default: `993`)
    /// - `IMAP_SECURITY` (`tls`, `starttls` or `plain`; default: `tls`)
    /// - `IMAP_TLS_VERIFY` (default: `true`)
    /// - `IMAP_CONNECT_TIMEOUT_SECS` (default: `10`)
    /// - `IMAP_AUTH_TIMEOUT_SECS` (default: `5`)
    /// - `IMAP_KEEPALIVE` (default: `true`)
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a required variable is missing or a
    /// value cannot be parsed.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ConnectionParams::from_env`] over an arbitrary lookup.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] on missing or malformed values.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let username = lookup("IMAP_USERNAME")
            .ok_or_else(|| Error::Config("IMAP_USERNAME not set".into()))?;
        let password = lookup("IMAP_PASSWORD")
            .ok_or_else(|| Error::Config("IMAP_PASSWORD not set".into()))?;

        let port = lookup("IMAP_PORT")
            .map_or(Ok(993), |v| v.trim().parse())
            .map_err(|e| Error::Config(format!("Invalid IMAP_PORT: {e}")))?;

        let security = lookup("IMAP_SECURITY")
            .map_or(Ok(TransportSecurity::Tls), |v| v.parse())?;

        let connect_timeout = secs(&lookup, "IMAP_CONNECT_TIMEOUT_SECS", Self::DEFAULT_CONNECT_TIMEOUT)?;
        let auth_timeout = secs(&lookup, "IMAP_AUTH_TIMEOUT_SECS", Self::DEFAULT_AUTH_TIMEOUT)?;

        Ok(Self {
            host: lookup("IMAP_HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port,
            security,
            credentials: Credentials::new(username, password),
            connect_timeout,
            auth_timeout,
            keepalive: flag(&lookup, "IMAP_KEEPALIVE", true)?,
            verify_tls: flag(&lookup, "IMAP_TLS_VERIFY", true)?,
        })
    }

    /// Structural checks performed before any connection attempt.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the host, username or password is
    /// empty, or the port is zero.
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(Error::Config("host is empty".into()));
        }
        if self.port == 0 {
            return Err(Error::Config("port must be non-zero".into()));
        }
        if self.credentials.username.is_empty() {
            return Err(Error::Config("username is empty".into()));
        }
        if self.credentials.password.is_empty() {
            return Err(Error::Config("password is empty".into()));
        }
        Ok(())
    }
}

/// The fixed search criterion used to select messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchCriterion {
    #[default]
    Unseen,
}

impl SearchCriterion {
    #[must_use]
    pub const fn as_imap_str(self) -> &'static str {
        match self {
            Self::Unseen => "UNSEEN",
        }
    }
}

/// What happens to messages once they are fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrievalPolicy {
    /// Flag fetched messages `\Seen` on the server.
    pub mark_seen: bool,
    pub criterion: SearchCriterion,
}

impl Default for RetrievalPolicy {
    fn default() -> Self {
        Self {
            mark_seen: true,
            criterion: SearchCriterion::Unseen,
        }
    }
}

impl RetrievalPolicy {
    /// Leave fetched messages unread.
    #[must_use]
    pub fn peek() -> Self {
        Self {
            mark_seen: false,
            ..Self::default()
        }
    }

    /// Reads `IMAP_MARK_SEEN` (default: `true`).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the value is not a boolean.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        let lookup = |key: &str| std::env::var(key).ok();
        Ok(Self {
            mark_seen: flag(&lookup, "IMAP_MARK_SEEN", true)?,
            ..Self::default()
        })
    }
}

fn flag(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: bool) -> Result<bool> {
    let Some(value) = lookup(key) else {
        return Ok(default);
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(Error::Config(format!("Invalid {key}: '{other}'"))),
    }
}

fn secs(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: Duration,
) -> Result<Duration> {
    lookup(key).map_or(Ok(default), |v| {
        v.trim()
            .parse()
            .map(Duration::from_secs)
            .map_err(|e| Error::Config(format!("Invalid {key}: {e}")))
    })
}
