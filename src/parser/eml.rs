//! RFC 5322 message source: raw bytes or `.eml` files to [`EmailMessage`].

use std::path::Path;

use mail_parser::{Address, Message, MessageParser, MimeHeaders, PartType};
use tracing::{debug, warn};

use crate::error::{MailsiftError, Result};
use crate::model::mail::{EmailMessage, MessageHeaders};
use crate::model::part::{MessagePart, TransferEncoding};
use crate::parser::mime::MAX_DEPTH;
use crate::parser::normalize::normalize;

/// Length of the generated snippet, in characters.
const SNIPPET_CHARS: usize = 200;

/// Parse a single `.eml` file.
///
/// The message id is the `Message-ID` header, or the file stem when the
/// header is missing.
pub fn parse_eml(path: impl AsRef<Path>) -> Result<EmailMessage> {
    let path = path.as_ref();
    let data = std::fs::read(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            MailsiftError::FileNotFound(path.to_path_buf())
        } else {
            MailsiftError::io(path, e)
        }
    })?;

    let mut message = parse_message(&data)?;
    if message.id.is_empty() {
        message.id = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
    }
    Ok(message)
}

/// Parse a raw RFC 5322 message, tolerating a leading BOM or mbox `From ` line.
///
/// Text parts that are still quoted-printable on the wire are handed over
/// undecoded, with their charset, so the extraction decoder sees them as
/// the transport delivered them. Every other part carries the bytes
/// `mail-parser` already decoded.
pub fn parse_message(raw: &[u8]) -> Result<EmailMessage> {
    let bytes = skip_from_line(raw);
    let msg = MessageParser::default()
        .parse(bytes)
        .ok_or_else(|| MailsiftError::MimeError("Not an RFC 5322 message".into()))?;

    let headers = MessageHeaders {
        from: msg.from().and_then(format_address),
        to: msg.to().and_then(format_address),
        cc: msg.cc().and_then(format_address),
        bcc: msg.bcc().and_then(format_address),
        subject: msg.subject().map(str::to_string),
    };

    let snippet = msg
        .body_text(0)
        .map(|text| normalize(&text).chars().take(SNIPPET_CHARS).collect())
        .unwrap_or_default();

    let root = convert_part(&msg, 0, 0);
    let id = msg.message_id().map(str::to_string).unwrap_or_default();
    debug!(id = %id, parts = msg.parts.len(), "Parsed RFC 5322 message");

    Ok(EmailMessage {
        id,
        headers,
        snippet,
        root,
    })
}

fn convert_part(msg: &Message<'_>, index: usize, depth: usize) -> MessagePart {
    let Some(part) = msg.parts.get(index) else {
        return MessagePart::default();
    };
    let mime_type = content_type(part);

    match &part.body {
        PartType::Multipart(ids) => {
            if depth >= MAX_DEPTH {
                warn!(depth, "Multipart nesting too deep, skipping children");
                return MessagePart::multipart(mime_type, Vec::new());
            }
            let children = ids
                .iter()
                .map(|id| convert_part(msg, *id, depth + 1))
                .collect();
            MessagePart::multipart(mime_type, children)
        }
        PartType::Message(inner) => {
            if depth >= MAX_DEPTH {
                warn!(depth, "Attached message nested too deep, skipping");
                return MessagePart::multipart(mime_type, Vec::new());
            }
            MessagePart::multipart(mime_type, vec![convert_part(inner, 0, depth + 1)])
        }
        PartType::Text(_) | PartType::Html(_) => text_part(msg, part, mime_type),
        _ => MessagePart::leaf(mime_type, part.contents().to_vec()),
    }
}

fn text_part(msg: &Message<'_>, part: &mail_parser::MessagePart<'_>, mime_type: String) -> MessagePart {
    let encoding = part
        .content_transfer_encoding()
        .map(TransferEncoding::from_header)
        .unwrap_or_default();

    if encoding == TransferEncoding::QuotedPrintable {
        let raw = msg
            .raw_message()
            .get(part.raw_body_offset() as usize..part.raw_end_offset() as usize);
        if let Some(raw) = raw {
            let leaf = MessagePart::leaf(mime_type, raw.to_vec()).with_encoding(encoding);
            return match part.content_type().and_then(|ct| ct.attribute("charset")) {
                Some(charset) => leaf.with_charset(charset),
                None => leaf,
            };
        }
    }

    // Already transfer- and charset-decoded to UTF-8.
    MessagePart::leaf(mime_type, part.contents().to_vec())
}

fn content_type(part: &mail_parser::MessagePart<'_>) -> String {
    match part.content_type() {
        Some(ct) => match ct.subtype() {
            Some(sub) => format!("{}/{}", ct.ctype(), sub),
            None => ct.ctype().to_string(),
        },
        None => match part.body {
            PartType::Html(_) => "text/html".to_string(),
            PartType::Text(_) => "text/plain".to_string(),
            PartType::Multipart(_) => "multipart/mixed".to_string(),
            PartType::Message(_) => "message/rfc822".to_string(),
            _ => "application/octet-stream".to_string(),
        },
    }
}

/// Render an address header as `Name <addr>, addr, ...`.
fn format_address(address: &Address<'_>) -> Option<String> {
    let addrs: Vec<&mail_parser::Addr<'_>> = match address {
        Address::List(list) => list.iter().collect(),
        Address::Group(groups) => groups.iter().flat_map(|g| g.addresses.iter()).collect(),
    };

    let rendered: Vec<String> = addrs
        .into_iter()
        .filter_map(|addr| match (addr.name.as_deref(), addr.address.as_deref()) {
            (Some(name), Some(email)) if !name.is_empty() => Some(format!("{name} <{email}>")),
            (_, Some(email)) => Some(email.to_string()),
            (Some(name), None) => Some(name.to_string()),
            (None, None) => None,
        })
        .collect();

    (!rendered.is_empty()).then(|| rendered.join(", "))
}

/// Skip a UTF-8 BOM and the mbox `From ` separator line, if present.
fn skip_from_line(data: &[u8]) -> &[u8] {
    let data = data.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(data);

    if data.starts_with(b"From ") {
        if let Some(pos) = data.iter().position(|&b| b == b'\n') {
            return &data[pos + 1..];
        }
    }
    data
}
