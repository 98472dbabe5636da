//! The document handed to the classifier: headers, link metadata, body.

use std::fmt::Write;

use crate::model::mail::{EmailMessage, ExtractedBody};

/// Separator between the metadata block and the body.
const SEPARATOR: &str = "\n---\n";

/// Render the classifier input for one message.
///
/// ```text
/// From: ...
/// To: ...
/// Subject: ...
/// Cc: ...                         (only when present)
/// Bcc: ...                        (only when present)
/// Email has Unsubscribe Link: Yes
/// Number of Links in Email: 3
/// ---
/// <body text>
/// ```
pub fn render(message: &EmailMessage, body: &ExtractedBody) -> String {
    let headers = &message.headers;
    let mut doc = String::with_capacity(body.text.len() + 256);

    // Writing into a String cannot fail.
    let _ = writeln!(doc, "From: {}", headers.from.as_deref().unwrap_or_default());
    let _ = writeln!(doc, "To: {}", headers.to.as_deref().unwrap_or_default());
    let _ = writeln!(doc, "Subject: {}", headers.subject.as_deref().unwrap_or_default());
    if let Some(cc) = headers.cc.as_deref().filter(|v| !v.is_empty()) {
        let _ = writeln!(doc, "Cc: {cc}");
    }
    if let Some(bcc) = headers.bcc.as_deref().filter(|v| !v.is_empty()) {
        let _ = writeln!(doc, "Bcc: {bcc}");
    }
    let _ = writeln!(
        doc,
        "Email has Unsubscribe Link: {}",
        if body.has_unsubscribe_link() { "Yes" } else { "No" }
    );
    let _ = write!(doc, "Number of Links in Email: {}", body.link_count);

    doc.push_str(SEPARATOR);
    doc.push_str(&body.text);
    doc
}
