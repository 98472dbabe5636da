//! Transfer decoding: quoted-printable and charset conversion with lossy fallback.

use tracing::{debug, warn};

use crate::model::part::TransferEncoding;

/// Turn a part payload into text.
///
/// - `Identity` payloads are only charset-decoded.
/// - `QuotedPrintable` payloads have non-ASCII bytes stripped first (the
///   encoding is defined over ASCII), are decoded leniently, then
///   charset-decoded.
///
/// Never fails: invalid byte sequences become U+FFFD.
pub fn decode(data: &[u8], encoding: TransferEncoding, charset: Option<&str>) -> String {
    match encoding {
        TransferEncoding::Identity => decode_charset(data, charset),
        TransferEncoding::QuotedPrintable => {
            let bytes = decode_quoted_printable(data);
            decode_charset(&bytes, charset)
        }
    }
}

/// Quoted-printable decode of the ASCII subset of `data`.
fn decode_quoted_printable(data: &[u8]) -> Vec<u8> {
    let ascii: Vec<u8> = data.iter().copied().filter(u8::is_ascii).collect();
    if ascii.len() != data.len() {
        debug!(
            dropped = data.len() - ascii.len(),
            "Stripped non-ASCII bytes from quoted-printable payload"
        );
    }
    match quoted_printable::decode(&ascii, quoted_printable::ParseMode::Robust) {
        Ok(bytes) => bytes,
        Err(e) => {
            debug!(error = %e, "Quoted-printable decode failed, keeping raw text");
            ascii
        }
    }
}

/// Decode bytes using a named charset, UTF-8 when none is given.
fn decode_charset(bytes: &[u8], charset: Option<&str>) -> String {
    let label = charset.map(str::trim).filter(|c| !c.is_empty());
    match label {
        None => utf8_lossy(bytes),
        Some(name) if name.eq_ignore_ascii_case("utf-8") || name.eq_ignore_ascii_case("utf8") => {
            utf8_lossy(bytes)
        }
        Some(name) => {
            if let Some(encoding) = encoding_rs::Encoding::for_label(name.as_bytes()) {
                let (decoded, _, had_errors) = encoding.decode(bytes);
                if had_errors {
                    debug!(charset = name, "Replaced malformed sequences while decoding");
                }
                decoded.into_owned()
            } else {
                warn!(charset = name, "Unknown charset, falling back to UTF-8 lossy");
                utf8_lossy(bytes)
            }
        }
    }
}

fn utf8_lossy(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            debug!("Payload is not valid UTF-8, decoding lossily");
            String::from_utf8_lossy(bytes).into_owned()
        }
    }
}
