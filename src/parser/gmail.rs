//! Gmail API message source.
//!
//! Converts the JSON returned by `users.messages.get` (format `full`) into an
//! [`EmailMessage`]. Part bodies arrive base64url encoded; that layer is
//! removed here, while quoted-printable is left to the extraction decoder.

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::Result;
use crate::model::mail::{EmailMessage, MessageHeaders};
use crate::model::part::{MessagePart, TransferEncoding};

/// Base64url, with or without trailing `=` padding.
const BASE64URL: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// A message resource as returned by the Gmail API.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GmailMessage {
    pub id: String,
    #[serde(default)]
    pub snippet: String,
    #[serde(default)]
    pub payload: GmailPart,
}

/// A MIME part; the message payload is the root part.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GmailPart {
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub headers: Vec<GmailHeader>,
    #[serde(default)]
    pub body: Option<GmailBody>,
    #[serde(default)]
    pub parts: Vec<GmailPart>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GmailHeader {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GmailBody {
    #[serde(default)]
    pub data: Option<String>,
}

impl GmailPart {
    /// Case-insensitive header lookup, first occurrence.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }
}

/// Deserialize a Gmail message resource and convert it.
pub fn from_json(json: &str) -> Result<EmailMessage> {
    let message: GmailMessage = serde_json::from_str(json)?;
    Ok(message_from_gmail(&message))
}

/// Convert a Gmail message resource into an [`EmailMessage`].
pub fn message_from_gmail(message: &GmailMessage) -> EmailMessage {
    let payload = &message.payload;
    let header = |name: &str| payload.header(name).map(str::to_string);

    EmailMessage {
        id: message.id.clone(),
        headers: MessageHeaders {
            from: header("From"),
            to: header("To"),
            cc: header("Cc"),
            bcc: header("Bcc"),
            subject: header("Subject"),
        },
        snippet: message.snippet.clone(),
        root: convert_part(payload, &message.id),
    }
}

fn convert_part(part: &GmailPart, message_id: &str) -> MessagePart {
    if !part.parts.is_empty() {
        let children = part
            .parts
            .iter()
            .map(|child| convert_part(child, message_id))
            .collect();
        return MessagePart::multipart(&part.mime_type, children);
    }

    let data = part
        .body
        .as_ref()
        .and_then(|b| b.data.as_deref())
        .and_then(|data| match BASE64URL.decode(data.trim()) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                warn!(
                    message_id,
                    mime_type = %part.mime_type,
                    error = %e,
                    "Undecodable part body, skipping"
                );
                None
            }
        });

    let encoding = part
        .header("Content-Transfer-Encoding")
        .map(TransferEncoding::from_header)
        .unwrap_or_default();
    let charset = part
        .header("Content-Type")
        .and_then(|ct| header_param(ct, "charset"));
    if let Some(charset) = &charset {
        debug!(message_id, charset = %charset, "Part declares charset");
    }

    MessagePart {
        mime_type: part.mime_type.to_ascii_lowercase(),
        raw_data: data,
        transfer_encoding: encoding,
        charset,
        children: Vec::new(),
    }
}

/// Value of a `; name=value` parameter in a structured header.
fn header_param(value: &str, name: &str) -> Option<String> {
    value.split(';').skip(1).find_map(|param| {
        let (key, val) = param.split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case(name)
            .then(|| val.trim().trim_matches('"').to_string())
            .filter(|v| !v.is_empty())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(text: &str) -> String {
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(text)
    }

    #[test]
    fn test_header_param() {
        assert_eq!(
            header_param("text/plain; charset=\"ISO-8859-1\"; format=flowed", "charset").as_deref(),
            Some("ISO-8859-1")
        );
        assert_eq!(header_param("text/plain;CHARSET=utf-8", "charset").as_deref(), Some("utf-8"));
        assert_eq!(header_param("text/plain", "charset"), None);
    }

    #[test]
    fn test_single_part_payload() {
        let json = serde_json::json!({
            "id": "m1",
            "snippet": "Hi there",
            "payload": {
                "mimeType": "text/plain",
                "headers": [
                    {"name": "From", "value": "Ann <ann@example.com>"},
                    {"name": "subject", "value": "Lunch?"}
                ],
                "body": {"data": encode("Lunch at noon?")}
            }
        });
        let msg = from_json(&json.to_string()).unwrap();
        assert_eq!(msg.id, "m1");
        assert_eq!(msg.headers.from.as_deref(), Some("Ann <ann@example.com>"));
        assert_eq!(msg.headers.subject.as_deref(), Some("Lunch?"));
        assert_eq!(msg.headers.to, None);
        assert!(msg.root.is_leaf());
        assert_eq!(msg.root.raw_data.as_deref(), Some(b"Lunch at noon?".as_slice()));
    }

    #[test]
    fn test_nested_parts_with_qp_and_charset() {
        let json = serde_json::json!({
            "id": "m2",
            "payload": {
                "mimeType": "multipart/mixed",
                "parts": [{
                    "mimeType": "multipart/alternative",
                    "parts": [{
                        "mimeType": "text/plain",
                        "headers": [
                            {"name": "Content-Type", "value": "text/plain; charset=iso-8859-1"},
                            {"name": "Content-Transfer-Encoding", "value": "quoted-printable"}
                        ],
                        "body": {"data": encode("R=E9sum=E9")}
                    }]
                }, {
                    "mimeType": "application/pdf",
                    "body": {"attachmentId": "x1", "size": 1024}
                }]
            }
        });
        let msg = from_json(&json.to_string()).unwrap();
        let leaf = &msg.root.children[0].children[0];
        assert_eq!(leaf.transfer_encoding, TransferEncoding::QuotedPrintable);
        assert_eq!(leaf.charset.as_deref(), Some("iso-8859-1"));
        assert_eq!(msg.root.children[1].raw_data, None);
    }

    #[test]
    fn test_padded_and_unpadded_base64() {
        for data in ["aGk=", "aGk"] {
            let part = GmailPart {
                mime_type: "text/plain".into(),
                body: Some(GmailBody {
                    data: Some(data.into()),
                }),
                ..GmailPart::default()
            };
            assert_eq!(convert_part(&part, "m").raw_data.as_deref(), Some(b"hi".as_slice()));
        }
    }

    #[test]
    fn test_invalid_base64_is_skipped() {
        let part = GmailPart {
            mime_type: "text/plain".into(),
            body: Some(GmailBody {
                data: Some("!!not base64!!".into()),
            }),
            ..GmailPart::default()
        };
        assert_eq!(convert_part(&part, "m").raw_data, None);
    }

    #[test]
    fn test_unused_resource_fields_are_ignored() {
        let json = serde_json::json!({
            "id": "m2",
            "threadId": "t9",
            "labelIds": ["INBOX", "UNREAD"],
            "historyId": "1234",
            "sizeEstimate": 512,
            "payload": {"mimeType": "text/plain", "body": {"data": encode("ok")}}
        });
        let msg = from_json(&json.to_string()).unwrap();
        assert_eq!(msg.id, "m2");
        assert_eq!(msg.root.raw_data.as_deref(), Some(b"ok".as_slice()));
    }

    #[test]
    fn test_malformed_json_is_an_error() {
        assert!(from_json("{\"payload\": 3}").is_err());
    }
}
