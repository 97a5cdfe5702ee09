//! Response writers for the fake IMAP server.
//!
//! Every write is flushed immediately so the client never waits on a
//! buffered response.

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

/// Write an untagged `* ...` response line.
pub async fn untagged<S: AsyncRead + AsyncWrite + Unpin>(
    stream: &mut BufReader<S>,
    text: &str,
) -> std::io::Result<()> {
    raw(stream, format!("* {text}\r\n").as_bytes()).await
}

/// Write the tagged completion line for a command, e.g.
/// `A0003 OK SEARCH completed`.
pub async fn tagged<S: AsyncRead + AsyncWrite + Unpin>(
    stream: &mut BufReader<S>,
    tag: &str,
    status: &str,
    text: &str,
) -> std::io::Result<()> {
    raw(stream, format!("{tag} {status} {text}\r\n").as_bytes()).await
}

/// Write bytes as-is.
pub async fn raw<S: AsyncRead + AsyncWrite + Unpin>(
    stream: &mut BufReader<S>,
    data: &[u8],
) -> std::io::Result<()> {
    stream.get_mut().write_all(data).await?;
    stream.get_mut().flush().await
}

/// Drain whatever a handler wrote to the server half of a duplex pipe.
#[cfg(test)]
pub async fn collect<S: AsyncRead + Unpin>(client: S) -> String {
    let mut buf = Vec::new();
    tokio::io::AsyncReadExt::read_to_end(&mut BufReader::new(client), &mut buf)
        .await
        .unwrap();
    String::from_utf8(buf).unwrap()
}
