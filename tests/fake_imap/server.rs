//! In-process fake IMAP server for integration testing
//!
//! ## Connection lifecycle
//!
//! ```text
//!   Client connects via TCP
//!       |
//!   Server greets: "* OK IMAP4rev1 Fake server ready"
//!       |
//!   [STARTTLS + TLS handshake, unless started with `start_plain`]
//!       |
//!   LOGIN, then SELECT/EXAMINE, UID SEARCH, UID FETCH per folder
//!       |
//!   LOGOUT
//! ```
//!
//! Commands are parsed with `imap-codec`. The raw line is kept as well
//! because two details the client relies on are easier to read from it
//! directly: the LOGIN password and whether a fetch asked for
//! `BODY.PEEK[]`.

use super::handlers::{
    Selection, handle_login, handle_logout, handle_select, handle_uid_fetch, handle_uid_search,
};
use super::io::{tagged, untagged};
use super::mailbox::Mailbox;
use imap_codec::CommandCodec;
use imap_codec::decode::Decoder;
use imap_codec::imap_types::command::CommandBody;
use imap_codec::imap_types::mailbox::Mailbox as ImapMailbox;
use rcgen::generate_simple_self_signed;
use rustls::pki_types::PrivatePkcs8KeyDer;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::TlsAcceptor;

/// Per-server state shared by every connection.
struct Shared {
    mailbox: Mutex<Mailbox>,
    logouts: AtomicUsize,
}

/// A fake IMAP server on `127.0.0.1` with an OS-assigned port.
///
/// The background accept loop stops when the server is dropped.
pub struct FakeImapServer {
    port: u16,
    shared: Arc<Shared>,
    handle: tokio::task::JoinHandle<()>,
}

impl FakeImapServer {
    /// Start a server that requires STARTTLS before LOGIN, using a
    /// freshly generated self-signed certificate for `127.0.0.1`.
    pub async fn start(mailbox: Mailbox) -> Self {
        let cert = generate_simple_self_signed(vec!["127.0.0.1".to_string()])
            .expect("generate self-signed cert");
        let key_der = PrivatePkcs8KeyDer::from(cert.key_pair.serialize_der());

        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let tls_config = rustls::ServerConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .expect("protocol versions")
            .with_no_client_auth()
            .with_single_cert(vec![cert.cert.der().clone()], key_der.into())
            .expect("build server TLS config");

        Self::spawn(mailbox, Some(TlsAcceptor::from(Arc::new(tls_config)))).await
    }

    /// Start a server that talks IMAP in cleartext from the greeting on.
    pub async fn start_plain(mailbox: Mailbox) -> Self {
        Self::spawn(mailbox, None).await
    }

    async fn spawn(mailbox: Mailbox, acceptor: Option<TlsAcceptor>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind to ephemeral port");
        let port = listener.local_addr().unwrap().port();
        let shared = Arc::new(Shared {
            mailbox: Mutex::new(mailbox),
            logouts: AtomicUsize::new(0),
        });

        let state = Arc::clone(&shared);
        let handle = tokio::spawn(async move {
            while let Ok((stream, _addr)) = listener.accept().await {
                let acceptor = acceptor.clone();
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    handle_connection(stream, acceptor, &state).await;
                });
            }
        });

        Self {
            port,
            shared,
            handle,
        }
    }

    pub const fn port(&self) -> u16 {
        self.port
    }

    /// How many LOGOUT commands the server has answered so far.
    pub fn logouts(&self) -> usize {
        self.shared.logouts.load(Ordering::SeqCst)
    }

    /// A copy of the current mailbox state, including `\Seen` changes.
    pub fn mailbox(&self) -> Mailbox {
        self.shared.mailbox.lock().unwrap().clone()
    }
}

impl Drop for FakeImapServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn handle_connection(stream: TcpStream, acceptor: Option<TlsAcceptor>, shared: &Shared) {
    let mut reader = BufReader::new(stream);
    if untagged(&mut reader, "OK IMAP4rev1 Fake server ready")
        .await
        .is_err()
    {
        return;
    }

    let Some(acceptor) = acceptor else {
        handle_imap_session(reader, shared).await;
        return;
    };

    let mut line = String::new();
    if reader.read_line(&mut line).await.is_err() {
        return;
    }
    let mut parts = line.trim().splitn(2, ' ');
    let tag = parts.next().unwrap_or("*").to_string();
    if !parts.next().is_some_and(|c| c.eq_ignore_ascii_case("STARTTLS")) {
        let _ = tagged(&mut reader, &tag, "BAD", "Expected STARTTLS").await;
        return;
    }
    if tagged(&mut reader, &tag, "OK", "Begin TLS negotiation now")
        .await
        .is_err()
    {
        return;
    }

    let Ok(tls_stream) = acceptor.accept(reader.into_inner()).await else {
        return;
    };
    handle_imap_session(BufReader::new(tls_stream), shared).await;
}

fn mailbox_name(mb: &ImapMailbox<'_>) -> String {
    match mb {
        ImapMailbox::Inbox => "INBOX".to_string(),
        ImapMailbox::Other(other) => {
            let bytes: &[u8] = other.as_ref();
            String::from_utf8_lossy(bytes).into_owned()
        }
    }
}

/// Command loop for one connection.
///
/// Read-only handlers get a snapshot of the mailbox taken under the
/// lock; UID FETCH gets the mutex itself because it may set `\Seen`.
async fn handle_imap_session<S: AsyncRead + AsyncWrite + Unpin>(
    mut reader: BufReader<S>,
    shared: &Shared,
) {
    let mut selection: Option<Selection> = None;
    let codec = CommandCodec::default();

    loop {
        let mut line = String::new();
        match reader.read_line(&mut line).await {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        if line.trim().is_empty() {
            continue;
        }

        let Ok((_, command)) = codec.decode(line.as_bytes()) else {
            let tag = line.split_whitespace().next().unwrap_or("*");
            if tagged(&mut reader, tag, "BAD", "Parse error").await.is_err() {
                break;
            }
            continue;
        };

        let tag = command.tag.inner();
        let snap = shared.mailbox.lock().unwrap().clone();

        match command.body {
            CommandBody::Login { .. } => {
                handle_login(tag, &line, snap.password.as_deref(), &mut reader).await;
            }
            CommandBody::Select { mailbox: mb, .. } => {
                selection = handle_select(tag, &mailbox_name(&mb), false, &snap, &mut reader).await;
            }
            CommandBody::Examine { mailbox: mb, .. } => {
                selection = handle_select(tag, &mailbox_name(&mb), true, &snap, &mut reader).await;
            }
            CommandBody::Search {
                criteria,
                uid: true,
                ..
            } => {
                handle_uid_search(tag, criteria.as_ref(), &snap, selection.as_ref(), &mut reader)
                    .await;
            }
            CommandBody::Fetch {
                sequence_set,
                uid: true,
                ..
            } => {
                let peek = line.to_ascii_uppercase().contains("BODY.PEEK");
                handle_uid_fetch(
                    tag,
                    &sequence_set,
                    peek,
                    &shared.mailbox,
                    selection.as_ref(),
                    &mut reader,
                )
                .await;
            }
            CommandBody::Logout => {
                shared.logouts.fetch_add(1, Ordering::SeqCst);
                handle_logout(tag, &mut reader).await;
                break;
            }
            _ => {
                if tagged(&mut reader, tag, "BAD", "Unsupported command")
                    .await
                    .is_err()
                {
                    break;
                }
            }
        }
    }
}
