//! LOGIN command handler.
//!
//! Any credentials are accepted unless the mailbox was built with a
//! password, in which case the last argument of the LOGIN line must
//! match it.

use crate::fake_imap::io::tagged;
use tokio::io::{AsyncRead, AsyncWrite, BufReader};

fn password_matches(line: &str, expected: &str) -> bool {
    line.split_whitespace()
        .last()
        .is_some_and(|arg| arg.trim_matches('"') == expected)
}

/// Handle LOGIN. Returns whether the client is now authenticated.
pub async fn handle_login<S: AsyncRead + AsyncWrite + Unpin>(
    tag: &str,
    line: &str,
    expected_password: Option<&str>,
    stream: &mut BufReader<S>,
) -> bool {
    let accepted = expected_password.is_none_or(|p| password_matches(line, p));
    let result = if accepted {
        tagged(stream, tag, "OK", "LOGIN completed").await
    } else {
        tagged(stream, tag, "NO", "[AUTHENTICATIONFAILED] Invalid credentials").await
    };
    accepted && result.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake_imap::io::collect;

    async fn run(line: &str, expected: Option<&str>) -> (String, bool) {
        let (client, server) = tokio::io::duplex(1024);
        let mut stream = BufReader::new(server);
        let ok = handle_login("A0001", line, expected, &mut stream).await;
        drop(stream);
        (collect(client).await, ok)
    }

    #[tokio::test]
    async fn accepts_anything_without_password() {
        let (output, ok) = run("A0001 LOGIN \"u\" \"p\"", None).await;
        assert!(ok);
        assert_eq!(output, "A0001 OK LOGIN completed\r\n");
    }

    #[tokio::test]
    async fn checks_configured_password() {
        let (_, ok) = run("A0001 LOGIN \"u\" \"secret\"", Some("secret")).await;
        assert!(ok);

        let (output, ok) = run("A0001 LOGIN \"u\" \"wrong\"", Some("secret")).await;
        assert!(!ok);
        assert!(output.starts_with("A0001 NO"));
    }
}
