//! Message envelope and extracted body types.

use super::part::MessagePart;

/// A message as handed over by a message source.
///
/// The identifier is whatever the source uses to address the message again
/// (Gmail message id, `Message-ID` header, ...). It is the key of the
/// classification cache.
#[derive(Debug, Clone, Default)]
pub struct EmailMessage {
    /// Stable, source-specific message identifier.
    pub id: String,

    /// Headers shown to the classifier.
    pub headers: MessageHeaders,

    /// Short plain-text preview used when no part yields text.
    pub snippet: String,

    /// Root of the MIME tree.
    pub root: MessagePart,
}

/// Addressing and subject headers, decoded to display strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageHeaders {
    pub from: Option<String>,
    pub to: Option<String>,
    pub cc: Option<String>,
    pub bcc: Option<String>,
    pub subject: Option<String>,
}

/// Result of reducing a MIME tree.
///
/// `text` is whitespace-normalized and bounded by the reducer's token budget.
/// It is only empty when the message had no usable part *and* an empty
/// snippet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedBody {
    /// Plain text of the message.
    pub text: String,

    /// First unsubscribe / preferences link found in an HTML part.
    pub unsubscribe_link: Option<String>,

    /// Number of `<a href>` elements across all HTML parts.
    pub link_count: usize,
}

impl ExtractedBody {
    /// Whether an unsubscribe link was detected.
    pub fn has_unsubscribe_link(&self) -> bool {
        self.unsubscribe_link.is_some()
    }
}
