//! MIME part tree.

/// Content-Transfer-Encoding that still has to be undone before the payload
/// is text.
///
/// Outer transport encodings (e.g. the base64 wrapping of a provider API, or
/// a part's own base64) are removed by the message source; only
/// quoted-printable is left for the decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransferEncoding {
    /// Payload bytes are already the content.
    #[default]
    Identity,
    /// Payload is quoted-printable encoded.
    QuotedPrintable,
}

impl TransferEncoding {
    /// Interpret a `Content-Transfer-Encoding` header value.
    ///
    /// Anything other than `quoted-printable` is treated as identity.
    pub fn from_header(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("quoted-printable") {
            Self::QuotedPrintable
        } else {
            Self::Identity
        }
    }
}

/// A node in a message's MIME tree.
///
/// A part carries either a payload (`raw_data`) or children. When both are
/// present the children win: the reducer recurses and ignores the payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessagePart {
    /// Lower-cased `type/subtype`, e.g. `"text/html"`.
    pub mime_type: String,

    /// Encoded payload bytes of a leaf part.
    pub raw_data: Option<Vec<u8>>,

    /// Encoding still applied to `raw_data`.
    pub transfer_encoding: TransferEncoding,

    /// `charset` parameter of the part's `Content-Type`, if any.
    pub charset: Option<String>,

    /// Child parts, in document order.
    pub children: Vec<MessagePart>,
}

impl MessagePart {
    /// Build a leaf part with an identity-encoded payload.
    pub fn leaf(mime_type: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            mime_type: mime_type.into().to_ascii_lowercase(),
            raw_data: Some(data.into()),
            ..Self::default()
        }
    }

    /// Build an internal (multipart) node.
    pub fn multipart(mime_type: impl Into<String>, children: Vec<MessagePart>) -> Self {
        Self {
            mime_type: mime_type.into().to_ascii_lowercase(),
            children,
            ..Self::default()
        }
    }

    /// Set the transfer encoding of the payload.
    pub fn with_encoding(mut self, encoding: TransferEncoding) -> Self {
        self.transfer_encoding = encoding;
        self
    }

    /// Set the charset used to turn the decoded payload into text.
    pub fn with_charset(mut self, charset: impl Into<String>) -> Self {
        self.charset = Some(charset.into());
        self
    }

    /// `true` when the reducer will treat this part as a leaf.
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// `true` for `text/plain` parts.
    pub fn is_plain_text(&self) -> bool {
        self.mime_type.contains("text/plain")
    }

    /// `true` for `text/html` parts.
    pub fn is_html(&self) -> bool {
        self.mime_type.contains("text/html")
    }
}
