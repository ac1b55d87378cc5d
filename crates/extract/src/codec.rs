//! Payload decoding and certificate chain splitting.

use base64::{engine::general_purpose::STANDARD, Engine};

use crate::error::RecordError;

/// Decode a base64 payload into bytes. ASCII whitespace, including line
/// wrapping inside the payload, is ignored.
pub fn decode_base64(field: &'static str, encoded: &str) -> Result<Vec<u8>, RecordError> {
    let compact: String = encoded
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    STANDARD
        .decode(compact)
        .map_err(|source| RecordError::Decode { field, source })
}

/// Decode a base64 payload that must hold UTF-8 text (PEM).
pub fn decode_pem(field: &'static str, encoded: &str) -> Result<String, RecordError> {
    let bytes = decode_base64(field, encoded)?;
    String::from_utf8(bytes).map_err(|_| RecordError::InvalidUtf8 { field })
}

/// Split a concatenated chain into the leaf certificate and the remainder.
///
/// The split point is the second occurrence of `delimiter`, searching from
/// byte offset 1 so the delimiter opening the leaf is skipped. Without a
/// second occurrence the leaf is the whole input and the remainder is empty.
/// `leaf + remainder == full` always holds.
pub fn split_chain<'a>(full: &'a str, delimiter: &str) -> (&'a str, &'a str) {
    let at = full
        .char_indices()
        .nth(1)
        .and_then(|(start, _)| full[start..].find(delimiter).map(|i| start + i));

    match at {
        Some(i) => full.split_at(i),
        None => (full, ""),
    }
}
