//! Raw message parsing
//!
//! Turns the bytes of one fetched message into a [`ParsedMessage`]
//! using `mail-parser`.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use mail_parser::{Address, MessageParser, MessagePart, MimeHeaders, PartType};
use serde::Serialize;
use sha2::{Digest, Sha256};

/// One attachment of a parsed message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attachment {
    pub content_type: String,
    pub file_name: Option<String>,
    pub transfer_encoding: Option<String>,
    pub content_disposition: Option<String>,
    /// Stable identifier: the content-id when present, else the checksum.
    pub generated_file_name: String,
    pub content_id: Option<String>,
    /// Lowercase hex SHA-256 of `content`.
    pub checksum: String,
    pub length: usize,
    #[serde(skip)]
    pub content: Vec<u8>,
}

/// A message retrieved from a folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedMessage {
    pub subject: Option<String>,
    /// Plain-text body (derived from HTML when there is no text part).
    pub text: Option<String>,
    /// HTML body, only when the message actually carries one.
    pub html: Option<String>,
    /// Reply-To display text, falling back to From.
    pub from: Option<String>,
    pub date: Option<DateTime<Utc>>,
    /// Mailbox the message was fetched from.
    pub folder: String,
    /// Top-level headers in message order, values unparsed.
    pub headers: Vec<(String, String)>,
    pub attachments: Vec<Attachment>,
}

impl ParsedMessage {
    /// First header value with the given name (case-insensitive).
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Parse one raw RFC 5322 message fetched from `folder`.
///
/// # Errors
///
/// Returns [`Error::Parse`] if the input is empty or carries no
/// headers.
pub fn parse(raw: &[u8], folder: &str) -> Result<ParsedMessage> {
    let message = MessageParser::default()
        .parse(raw)
        .ok_or_else(|| Error::Parse("not an RFC 5322 message".into()))?;

    if message.headers().is_empty() {
        return Err(Error::Parse("message has no headers".into()));
    }

    let from = message
        .reply_to()
        .and_then(display_text)
        .or_else(|| message.from().and_then(display_text));

    let html = message
        .html_part(0)
        .filter(|part| matches!(part.body, PartType::Html(_)))
        .and_then(MessagePart::text_contents)
        .map(str::to_string);

    Ok(ParsedMessage {
        subject: message.subject().map(str::to_string),
        text: message.body_text(0).map(|t| t.into_owned()),
        html,
        from,
        date: message
            .date()
            .and_then(|d| DateTime::from_timestamp(d.to_timestamp(), 0)),
        folder: folder.to_string(),
        headers: message
            .headers_raw()
            .map(|(name, value)| (name.to_string(), value.trim().to_string()))
            .collect(),
        attachments: message.attachments().map(attachment).collect(),
    })
}

/// Render an address header as `Name <addr>` entries joined by `, `.
fn display_text(address: &Address<'_>) -> Option<String> {
    let addrs: Vec<_> = match address {
        Address::List(list) => list.iter().collect(),
        Address::Group(groups) => groups.iter().flat_map(|g| g.addresses.iter()).collect(),
    };

    let rendered: Vec<String> = addrs
        .into_iter()
        .filter_map(|addr| match (addr.name(), addr.address()) {
            (Some(name), Some(email)) => Some(format!("{name} <{email}>")),
            (None, Some(email)) => Some(email.to_string()),
            (Some(name), None) => Some(name.to_string()),
            (None, None) => None,
        })
        .collect();

    if rendered.is_empty() {
        None
    } else {
        Some(rendered.join(", "))
    }
}

fn attachment(part: &MessagePart<'_>) -> Attachment {
    let content = part.contents().to_vec();
    let checksum = format!("{:x}", Sha256::digest(&content));
    let content_id = part.content_id().map(str::to_string);

    Attachment {
        content_type: part.content_type().map_or_else(
            || "application/octet-stream".to_string(),
            |ct| match ct.subtype() {
                Some(sub) => format!("{}/{}", ct.ctype(), sub),
                None => ct.ctype().to_string(),
            },
        ),
        file_name: part.attachment_name().map(str::to_string),
        transfer_encoding: part.content_transfer_encoding().map(str::to_string),
        content_disposition: part.content_disposition().map(|d| d.ctype().to_string()),
        generated_file_name: content_id.clone().unwrap_or_else(|| checksum.clone()),
        content_id,
        checksum,
        length: content.len(),
        content,
    }
}
