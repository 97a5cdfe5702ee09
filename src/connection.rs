//! IMAP connection and TLS helpers
//!
//! Provides [`ImapStore`], the [`MailStore`] implementation backed by
//! `async-imap`. The transport is plain TCP, implicit TLS, or TCP
//! upgraded with STARTTLS, chosen by [`TransportSecurity`].

use crate::config::{ConnectionParams, SearchCriterion, TransportSecurity};
use crate::error::{Error, Result};
use crate::store::{FetchOptions, MailStore, RawMessageStream};
use async_imap::Session;
use async_imap::imap_proto::{AttributeValue, MailboxDatum, RequestId, Response, Status};
use async_trait::async_trait;
use futures::io::{AsyncRead, AsyncWrite};
use futures::StreamExt;
use rustls::pki_types::ServerName;
use std::fmt;
use std::sync::Arc;
use tokio::net::{TcpSocket, TcpStream};
use tokio::time::timeout;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;
use tokio_util::compat::TokioAsyncReadCompatExt;
use tracing::{debug, info, warn};

/// Any byte stream an IMAP session can run over.
pub trait ImapIo: AsyncRead + AsyncWrite + Unpin + Send + fmt::Debug {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send + fmt::Debug> ImapIo for T {}

/// An authenticated IMAP session over any supported transport.
pub type ImapSession = Session<Box<dyn ImapIo>>;

/// [`MailStore`] over a real IMAP server.
///
/// Created disconnected; [`MailStore::connect`] opens the session and
/// [`MailStore::close`] logs out and drops it.
#[derive(Default)]
pub struct ImapStore {
    session: Option<ImapSession>,
    selected: Option<String>,
}

impl ImapStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    fn session(&mut self) -> Result<&mut ImapSession> {
        self.session
            .as_mut()
            .ok_or_else(|| Error::Connection("not connected".into()))
    }

    fn selected(&self) -> String {
        self.selected.clone().unwrap_or_default()
    }
}

impl fmt::Debug for ImapStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImapStore")
            .field("connected", &self.session.is_some())
            .field("selected", &self.selected)
            .finish()
    }
}

#[async_trait]
impl MailStore for ImapStore {
    async fn connect(&mut self, params: &ConnectionParams) -> Result<()> {
        if self.session.is_some() {
            return Ok(());
        }
        self.session = Some(connect(params).await?);
        Ok(())
    }

    async fn open_mailbox(&mut self, name: &str, read_only: bool) -> Result<()> {
        let session = self.session()?;
        let result = if read_only {
            session.examine(name).await
        } else {
            session.select(name).await
        };

        let mailbox = result.map_err(|e| {
            classify(e, |reason| Error::FolderOpen {
                folder: name.to_string(),
                reason,
            })
        })?;

        debug!(
            folder = name,
            exists = mailbox.exists,
            read_only,
            "Opened mailbox"
        );
        self.selected = Some(name.to_string());
        Ok(())
    }

    async fn search(&mut self, criterion: SearchCriterion) -> Result<Vec<u32>> {
        let folder = self.selected();
        let session = self.session()?;
        let id = session
            .run_command(format!("UID SEARCH {}", criterion.as_imap_str()))
            .await
            .map_err(|e| {
                classify(e, |reason| Error::FolderSearch {
                    folder: folder.clone(),
                    reason,
                })
            })?;

        let mut uids = Vec::new();
        loop {
            let Some(response) = session.read_response().await? else {
                return Err(connection_lost());
            };
            match response.parsed() {
                Response::MailboxData(MailboxDatum::Search(ids)) => uids.extend_from_slice(ids),
                parsed => match completion(parsed, &id) {
                    Some(Ok(())) => break,
                    Some(Err(reason)) => return Err(Error::FolderSearch { folder, reason }),
                    None => debug!(response = ?parsed, "Ignoring untagged response"),
                },
            }
        }

        uids.sort_unstable();
        uids.dedup();
        Ok(uids)
    }

    async fn fetch<'a>(
        &'a mut self,
        uids: &[u32],
        options: FetchOptions,
    ) -> Result<RawMessageStream<'a>> {
        let uid_set = uids
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");
        let query = if options.mark_seen {
            "(BODY[])"
        } else {
            "(BODY.PEEK[])"
        };

        let session = self.session()?;
        let id = session
            .run_command(format!("UID FETCH {uid_set} {query}"))
            .await
            .map_err(|e| classify(e, Error::FetchStream))?;

        // A rejected FETCH surfaces as the stream's last item.
        let bodies = futures::stream::unfold(Some((session, id)), |state| async move {
            let (session, id) = state?;
            match next_body(session, &id).await {
                Ok(Some(body)) => Some((Ok(body), Some((session, id)))),
                Ok(None) => None,
                Err(e) => Some((Err(e), None)),
            }
        });

        Ok(bodies.boxed())
    }

    async fn close(&mut self) -> Result<()> {
        let Some(mut session) = self.session.take() else {
            return Ok(());
        };
        self.selected = None;

        if let Err(e) = session.logout().await {
            warn!(error = %e, "LOGOUT failed, dropping connection");
        }
        debug!("Connection closed");
        Ok(())
    }
}

/// Map an `async-imap` error to our taxonomy.
///
/// Transport failures are fatal; protocol-level rejections become the
/// recoverable error built by `rejected`.
fn classify(err: async_imap::error::Error, rejected: impl FnOnce(String) -> Error) -> Error {
    match err {
        async_imap::error::Error::Io(e) => Error::Io(e),
        async_imap::error::Error::ConnectionLost => connection_lost(),
        other => rejected(other.to_string()),
    }
}

fn connection_lost() -> Error {
    Error::Connection("connection lost".into())
}

/// `Some` once `response` is the tagged completion of `id`: `Ok` for an
/// OK status, otherwise the server's reason.
///
/// `async-imap` drops this status for UID SEARCH and UID FETCH, so both
/// commands read their responses here.
fn completion(response: &Response<'_>, id: &RequestId) -> Option<std::result::Result<(), String>> {
    let Response::Done {
        tag,
        status,
        information,
        ..
    } = response
    else {
        return None;
    };
    if tag != id {
        return None;
    }
    Some(match status {
        Status::Ok => Ok(()),
        status => Err(format!(
            "{status:?}: {}",
            information.as_deref().unwrap_or("no reason given")
        )),
    })
}

/// Next message body of the fetch tagged `id`, or `None` once the
/// server completes the command.
async fn next_body(session: &mut ImapSession, id: &RequestId) -> Result<Option<Vec<u8>>> {
    loop {
        let Some(response) = session.read_response().await? else {
            return Err(connection_lost());
        };
        match response.parsed() {
            Response::Fetch(seq, attributes) => {
                let body = attributes.iter().find_map(|attr| match attr {
                    AttributeValue::BodySection {
                        data: Some(data), ..
                    } => Some(data.to_vec()),
                    _ => None,
                });
                if body.is_some() {
                    return Ok(body);
                }
                debug!(seq, "Skipping FETCH response without a body");
            }
            parsed => match completion(parsed, id) {
                Some(Ok(())) => return Ok(None),
                Some(Err(reason)) => return Err(Error::FetchStream(reason)),
                None => debug!(response = ?parsed, "Ignoring untagged response"),
            },
        }
    }
}

/// Open a fresh, authenticated IMAP session.
///
/// `connect_timeout` covers TCP connect and any TLS negotiation;
/// `auth_timeout` covers LOGIN.
///
/// # Errors
///
/// Every error returned here is fatal: [`Error::Connection`],
/// [`Error::Tls`] or [`Error::Io`].
pub async fn connect(params: &ConnectionParams) -> Result<ImapSession> {
    let addr = format!("{}:{}", params.host, params.port);
    debug!(%addr, security = ?params.security, "Connecting to IMAP server");

    let stream = timeout(params.connect_timeout, open_transport(params))
        .await
        .map_err(|_| Error::Connection(format!("Timed out connecting to {addr}")))??;

    let client = async_imap::Client::new(stream);
    let session = timeout(
        params.auth_timeout,
        client.login(&params.credentials.username, &params.credentials.password),
    )
    .await
    .map_err(|_| Error::Connection("Timed out waiting for LOGIN".into()))?
    .map_err(|(e, _)| Error::Connection(format!("Login failed: {e}")))?;

    info!(%addr, "Connected to IMAP server");
    Ok(session)
}

async fn open_transport(params: &ConnectionParams) -> Result<Box<dyn ImapIo>> {
    let tcp = open_tcp(params).await?;

    match params.security {
        TransportSecurity::Plain => Ok(Box::new(tcp.compat())),
        TransportSecurity::Tls => {
            let tls = tls_handshake(params, tcp).await?;
            Ok(Box::new(tls.compat()))
        }
        TransportSecurity::StartTls => {
            let mut client = async_imap::Client::new(tcp.compat());
            client
                .run_command_and_check_ok("STARTTLS", None)
                .await
                .map_err(|e| Error::Tls(format!("STARTTLS failed: {e}")))?;

            let tcp = client.into_inner().into_inner();
            let tls = tls_handshake(params, tcp).await?;
            Ok(Box::new(tls.compat()))
        }
    }
}

async fn open_tcp(params: &ConnectionParams) -> Result<TcpStream> {
    let addr = tokio::net::lookup_host((params.host.as_str(), params.port))
        .await?
        .next()
        .ok_or_else(|| Error::Connection(format!("Could not resolve {}", params.host)))?;

    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };
    socket.set_keepalive(params.keepalive)?;
    Ok(socket.connect(addr).await?)
}

async fn tls_handshake(params: &ConnectionParams, tcp: TcpStream) -> Result<TlsStream<TcpStream>> {
    let connector = tls_connector(params.verify_tls)?;
    let server_name = ServerName::try_from(params.host.clone())
        .map_err(|e| Error::Tls(format!("Invalid server name: {e}")))?;

    connector
        .connect(server_name, tcp)
        .await
        .map_err(|e| Error::Tls(e.to_string()))
}

/// Build a TLS connector.
///
/// With `verify` the server certificate is checked against the webpki
/// roots; without it any certificate is accepted (self-signed local
/// bridges and test servers).
fn tls_connector(verify: bool) -> Result<TlsConnector> {
    let builder = rustls::ClientConfig::builder_with_provider(Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_safe_default_protocol_versions()
    .map_err(|e| Error::Tls(e.to_string()))?;

    let config = if verify {
        let roots = rustls::RootCertStore {
            roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
        };
        builder.with_root_certificates(roots).with_no_client_auth()
    } else {
        builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(AcceptAnyCertificate))
            .with_no_client_auth()
    };
    Ok(TlsConnector::from(Arc::new(config)))
}

/// Certificate verifier used when verification is switched off.
#[derive(Debug)]
struct AcceptAnyCertificate;

impl rustls::client::danger::ServerCertVerifier for AcceptAnyCertificate {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::pki_types::CertificateDer<'_>,
        _intermediates: &[rustls::pki_types::CertificateDer<'_>],
        _server_name: &rustls::pki_types::ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> std::result::Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        rustls::crypto::ring::default_provider()
            .signature_verification_algorithms
            .supported_schemes()
    }
}
